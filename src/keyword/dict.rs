//! Offline keyword dictionary / 离线关键词字典
//!
//! 输入：候选词文件（每行一个词）或语料目录（递归读取后分词）。
//! 归一化：去首尾空白与 ASCII 标点，ASCII 字母小写。
//! 过滤：必须含至少一个 CJK 统一表意字符（U+4E00..U+9FFF）且字节长度 >= 3。
//! 输出：
//! - `keyword_dict.txt`   每行 `word frequency`，按词典序
//! - `keyword_index.txt`  首字符 -> 逗号分隔的 0 基 id 列表

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, ZhisouError};
use crate::tokenizer;

/// 关键词字典：words 与 frequencies 平行，words 严格升序
#[derive(Debug, Clone, Default)]
pub struct KeywordDict {
    pub words: Vec<String>,
    pub frequencies: Vec<u32>,
}

impl KeywordDict {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// 是否含 CJK 统一表意字符
fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| matches!(c, '\u{4e00}'..='\u{9fff}'))
}

/// 归一化候选词：去空白与首尾 ASCII 标点，ASCII 小写
fn normalize(candidate: &str) -> String {
    candidate
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .chars()
        .map(|c| {
            if c.is_ascii_alphabetic() {
                c.to_ascii_lowercase()
            } else {
                c
            }
        })
        .collect()
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else if path.is_file() {
            out.push(path);
        }
    }
}

/// Build the dictionary from a candidate file or corpus directory
/// / 从候选词文件或语料目录构建字典
pub fn build_keyword_dict(candidates_path: &Path) -> Result<KeywordDict> {
    let mut candidates: Vec<String> = Vec::new();

    if candidates_path.is_dir() {
        // 目录：递归读取所有文件并分词
        let mut files = Vec::new();
        collect_files(candidates_path, &mut files);
        files.sort();
        for file in files {
            match std::fs::read_to_string(&file) {
                Ok(content) => candidates.extend(tokenizer::tokenize(&content)),
                Err(e) => tracing::warn!("Skipping corpus file {:?}: {}", file, e),
            }
        }
    } else {
        let file = File::open(candidates_path)?;
        let reader = BufReader::new(file);
        for line in reader.lines() {
            candidates.push(line?);
        }
    }

    let mut freq: HashMap<String, u32> = HashMap::new();
    for candidate in candidates {
        let word = normalize(&candidate);
        if word.is_empty() || !contains_cjk(&word) || word.len() < 3 {
            continue;
        }
        *freq.entry(word).or_insert(0) += 1;
    }
    if freq.is_empty() {
        return Err(ZhisouError::Parse("no keyword candidates".to_string()));
    }

    // 词典序排序，保证二分与索引稳定
    let mut entries: Vec<(String, u32)> = freq.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut dict = KeywordDict::default();
    for (word, frequency) in entries {
        dict.words.push(word);
        dict.frequencies.push(frequency);
    }
    Ok(dict)
}

/// Write `keyword_dict.txt` and `keyword_index.txt` / 写出字典与索引文件
pub fn write_keyword_files(dict: &KeywordDict, output_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(output_dir)?;
    let dict_path = output_dir.join("keyword_dict.txt");
    let index_path = output_dir.join("keyword_index.txt");

    // 字典：word frequency
    {
        let file = File::create(&dict_path)?;
        let mut writer = BufWriter::new(file);
        for (word, frequency) in dict.words.iter().zip(&dict.frequencies) {
            writeln!(writer, "{} {}", word, frequency)?;
        }
        writer.flush()?;
    }

    // 索引：首字符 -> id1,id2,...（id 为 0 基，升序）
    {
        let mut index: std::collections::BTreeMap<char, Vec<usize>> =
            std::collections::BTreeMap::new();
        for (id, word) in dict.words.iter().enumerate() {
            if let Some(first) = word.chars().next() {
                index.entry(first).or_default().push(id);
            }
        }

        let file = File::create(&index_path)?;
        let mut writer = BufWriter::new(file);
        for (ch, ids) in index {
            let joined: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
            writeln!(writer, "{}\t{}", ch, joined.join(","))?;
        }
        writer.flush()?;
    }

    Ok((dict_path, index_path))
}

/// Load a dictionary file / 加载关键词字典
pub fn load_keyword_dict(dict_path: &Path) -> Result<KeywordDict> {
    let file = File::open(dict_path)?;
    let reader = BufReader::new(file);

    let mut dict = KeywordDict::default();
    for line in reader.lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let (Some(word), Some(frequency)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(frequency) = frequency.parse::<u32>() else {
            continue;
        };
        dict.words.push(word.to_string());
        dict.frequencies.push(frequency);
    }
    if dict.is_empty() {
        return Err(ZhisouError::Parse("empty keyword dictionary".to_string()));
    }
    Ok(dict)
}
