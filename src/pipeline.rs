//! Offline indexing pipeline / 离线索引构建流程
//!
//! (1) 解析 XML 建立网页集合
//! (2) SimHash 去重（线性扫描已保留签名）
//! (3) 建立 TF-IDF 倒排索引
//! (4) 写出 pages.bin / offsets.bin / index.txt

use std::path::{Path, PathBuf};

use crate::error::{Result, ZhisouError};
use crate::index::WeightedInvertedIndex;
use crate::parser::{self, Page};
use crate::simhash;
use crate::store::PageStoreWriter;
use crate::tokenizer;

/// Collect `.xml` files directly under a directory / 收集目录下的 XML 文件
pub fn collect_xml_files(input_dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = std::fs::read_dir(input_dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if ext == "xml" {
            files.push(path);
        }
    }
    files.sort();
    files
}

/// Run the offline pipeline end to end / 运行离线流水线
pub fn run(xml_files: &[PathBuf], output_dir: &Path, simhash_threshold: u32) -> Result<()> {
    if xml_files.is_empty() {
        return Err(ZhisouError::Parse("no xml files".to_string()));
    }
    std::fs::create_dir_all(output_dir)?;

    // 1) 解析所有 XML；单个文件失败只跳过
    let mut pages: Vec<Page> = Vec::new();
    for file in xml_files {
        match parser::parse_xml_file(file) {
            Ok(mut one) => {
                tracing::info!("Parsed {} pages from {:?}", one.len(), file);
                pages.append(&mut one);
            }
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", file, e);
            }
        }
    }
    if pages.is_empty() {
        return Err(ZhisouError::Parse("no pages parsed".to_string()));
    }

    // 2) SimHash 去重
    let kept = dedup_pages(pages, simhash_threshold);
    if kept.is_empty() {
        return Err(ZhisouError::Parse("no pages survive dedup".to_string()));
    }
    tracing::info!("Dedup kept {} pages", kept.len());

    // 3) 建立 TF-IDF 倒排索引
    let documents: Vec<(i32, String)> = kept
        .iter()
        .map(|p| (p.docid, format!("{}\n{}", p.title, p.description)))
        .collect();
    let mut index = WeightedInvertedIndex::new();
    index.build(&documents);
    tracing::info!(
        "Index built: {} documents, {} terms",
        index.doc_count(),
        index.term_count()
    );

    // 4) 写网页库、偏移库与索引
    let mut writer = PageStoreWriter::create(output_dir)?;
    for page in &kept {
        writer.append(page)?;
    }
    let written = writer.finish()?;
    index.save(&output_dir.join("index.txt"))?;
    tracing::info!("Wrote {} page blocks to {:?}", written, output_dir);

    Ok(())
}

/// 保留与已有签名汉明距离大于阈值的网页
fn dedup_pages(pages: Vec<Page>, threshold: u32) -> Vec<Page> {
    let mut kept: Vec<Page> = Vec::with_capacity(pages.len());
    let mut signatures: Vec<u64> = Vec::with_capacity(pages.len());

    for page in pages {
        let tokens = tokenizer::tokenize(&format!("{}\n{}", page.title, page.description));
        let signature = simhash::simhash64(&tokens);
        let duplicate = signatures
            .iter()
            .any(|kept_sig| simhash::hamming(signature, *kept_sig) <= threshold);
        if !duplicate {
            kept.push(page);
            signatures.push(signature);
        }
    }
    kept
}
