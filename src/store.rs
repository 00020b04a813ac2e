//! Page store and offset directory / 网页库与偏移库
//!
//! 离线写入（追加式）：
//! - `offsets.bin`  每行 `docid\t偏移量`
//! - `pages.bin`    每篇文档一个 `<doc>` 块，字段 XML 转义、空白归一化
//!
//! 在线读取：按偏移 seek，逐行读到 `</doc>`，用首次出现的子串匹配抽取
//! 标签内容。转义不做还原，保持与离线写入的往返一致。

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::parser::Page;

/// Raw page block fields / 原始网页块字段
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    pub title: String,
    pub link: String,
    pub description: String,
}

/// XML escape `& < > " '` / XML 转义
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Tabs/newlines become spaces, runs of spaces collapse / 空白归一化
pub fn sanitize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = false;
    for c in text.chars() {
        let c = if c == '\t' || c == '\n' || c == '\r' { ' ' } else { c };
        if c == ' ' {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

/// Drop bytes that do not form a valid 1-4 byte UTF-8 sequence / 清理非法 UTF-8
pub fn clean_utf8(input: &[u8]) -> String {
    // 快速路径：全 ASCII 直接返回
    if input.is_ascii() {
        return String::from_utf8_lossy(input).into_owned();
    }

    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let c = input[i];
        let len = if c < 0x80 {
            1
        } else if c & 0xE0 == 0xC0 {
            2
        } else if c & 0xF0 == 0xE0 {
            3
        } else if c & 0xF8 == 0xF0 {
            4
        } else {
            i += 1;
            continue;
        };
        if i + len <= input.len()
            && input[i + 1..i + len].iter().all(|b| b & 0xC0 == 0x80)
            && std::str::from_utf8(&input[i..i + len]).is_ok()
        {
            out.extend_from_slice(&input[i..i + len]);
            i += len;
        } else {
            i += 1;
        }
    }
    // 上面已逐序列校验
    String::from_utf8(out).unwrap_or_default()
}

/// Extract the content of the first `<tag>...</tag>` occurrence / 抽取标签内容
pub fn extract_tag(block: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = block.find(&open)? + open.len();
    let end = block[start..].find(&close)? + start;
    Some(block[start..end].to_string())
}

/// Streaming writer for the page store / 网页库写入器（流式写入）
pub struct PageStoreWriter {
    pages: BufWriter<File>,
    offsets: BufWriter<File>,
    offset: u64,
    pub page_count: u64,
}

impl PageStoreWriter {
    /// Create `pages.bin` and `offsets.bin` under `output_dir` / 在输出目录创建网页库
    pub fn create(output_dir: &Path) -> Result<Self> {
        let pages = File::create(output_dir.join("pages.bin"))?;
        let offsets = File::create(output_dir.join("offsets.bin"))?;
        Ok(Self {
            pages: BufWriter::with_capacity(64 * 1024, pages),
            offsets: BufWriter::with_capacity(64 * 1024, offsets),
            offset: 0,
            page_count: 0,
        })
    }

    /// Append one page block and its offset entry / 追加一个网页块并记录偏移
    pub fn append(&mut self, page: &Page) -> Result<()> {
        writeln!(self.offsets, "{}\t{}", page.docid, self.offset)?;

        let block = format!(
            "<doc>\n<docid>{}</docid>\n<title>{}</title>\n<link>{}</link>\n<description>{}</description>\n</doc>\n",
            page.docid,
            xml_escape(&sanitize_whitespace(&page.title)),
            xml_escape(&sanitize_whitespace(&page.link)),
            xml_escape(&sanitize_whitespace(&page.description)),
        );
        self.pages.write_all(block.as_bytes())?;
        self.offset += block.len() as u64;
        self.page_count += 1;
        Ok(())
    }

    /// Flush both files / 完成写入
    pub fn finish(mut self) -> Result<u64> {
        self.pages.flush()?;
        self.offsets.flush()?;
        Ok(self.page_count)
    }
}

/// Read-side page store / 网页库读取端
pub struct PageStore {
    pages_path: PathBuf,
    offsets: HashMap<i32, u64>,
}

impl PageStore {
    /// Load the offset directory / 加载偏移库
    pub fn open(pages_path: &Path, offsets_path: &Path) -> Result<Self> {
        let file = File::open(offsets_path)?;
        let reader = BufReader::new(file);

        let mut offsets = HashMap::new();
        for line in reader.lines() {
            let line = line?;
            let mut parts = line.split_whitespace();
            let (Some(docid), Some(offset)) = (parts.next(), parts.next()) else {
                continue;
            };
            let (Ok(docid), Ok(offset)) = (docid.parse::<i32>(), offset.parse::<u64>()) else {
                continue;
            };
            offsets.insert(docid, offset);
        }

        Ok(Self {
            pages_path: pages_path.to_path_buf(),
            offsets,
        })
    }

    /// Number of documents in the directory / 偏移库文档数
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Read a page block by docid / 按 docid 读取网页块
    pub fn read_by_docid(&self, docid: i32) -> Option<RawPage> {
        let offset = *self.offsets.get(&docid)?;
        self.read_by_offset(offset)
    }

    fn read_by_offset(&self, offset: u64) -> Option<RawPage> {
        let mut file = File::open(&self.pages_path).ok()?;
        file.seek(SeekFrom::Start(offset)).ok()?;
        let mut reader = BufReader::new(file);

        let mut block: Vec<u8> = Vec::with_capacity(2048);
        let mut line: Vec<u8> = Vec::new();
        loop {
            line.clear();
            let n = reader.read_until(b'\n', &mut line).ok()?;
            if n == 0 {
                break;
            }
            block.extend_from_slice(&line);
            let trimmed: &[u8] = if line.ends_with(b"\n") {
                &line[..line.len() - 1]
            } else {
                &line
            };
            if trimmed == b"</doc>" {
                break;
            }
        }
        if block.is_empty() {
            return None;
        }

        let text = clean_utf8(&block);
        Some(RawPage {
            title: extract_tag(&text, "title").unwrap_or_default(),
            link: extract_tag(&text, "link").unwrap_or_default(),
            description: extract_tag(&text, "description").unwrap_or_default(),
        })
    }
}
