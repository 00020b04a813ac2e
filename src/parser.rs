//! XML page feed parser / XML 网页解析
//!
//! 解析如下结构的 XML 文件：
//! ```text
//! <feed>
//!   <doc>
//!     <docid>1</docid>
//!     <link>https://example.com</link>
//!     <title>标题</title>
//!     <description>正文...</description>
//!   </doc>
//! </feed>
//! ```
//! 标题与正文都为空的文档被丢弃。

use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;

use crate::error::{Result, ZhisouError};

/// Parsed page / 单个网页
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub docid: i32,
    pub link: String,
    pub title: String,
    pub description: String,
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Docid,
    Link,
    Title,
    Description,
}

/// Parse all pages from one XML file / 从单个 XML 文件解析出所有网页
pub fn parse_xml_file(path: &Path) -> Result<Vec<Page>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ZhisouError::Parse(format!("cannot read {:?}: {}", path, e)))?;
    parse_xml_str(&content).map_err(|e| match e {
        ZhisouError::Parse(msg) => ZhisouError::Parse(format!("{:?}: {}", path, msg)),
        other => other,
    })
}

/// Parse pages from an XML string / 从 XML 字符串解析网页
pub fn parse_xml_str(xml: &str) -> Result<Vec<Page>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut pages = Vec::new();
    let mut in_doc = false;
    let mut field: Option<Field> = None;
    let mut current = Page::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let local_name = e.local_name();
                let name = std::str::from_utf8(local_name.as_ref()).unwrap_or("");
                match name {
                    "doc" => {
                        in_doc = true;
                        current = Page::default();
                    }
                    "docid" if in_doc => field = Some(Field::Docid),
                    "link" if in_doc => field = Some(Field::Link),
                    "title" if in_doc => field = Some(Field::Title),
                    "description" if in_doc => field = Some(Field::Description),
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(field) = field {
                    let text = e.unescape().unwrap_or_default();
                    append_field(&mut current, field, &text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(field) = field {
                    let text = String::from_utf8_lossy(e).into_owned();
                    append_field(&mut current, field, &text);
                }
            }
            Ok(Event::End(ref e)) => {
                let local_name = e.local_name();
                let name = std::str::from_utf8(local_name.as_ref()).unwrap_or("");
                match name {
                    "doc" => {
                        in_doc = false;
                        // 标题或正文至少一个非空才保留
                        if !current.title.is_empty() || !current.description.is_empty() {
                            pages.push(std::mem::take(&mut current));
                        }
                    }
                    "docid" | "link" | "title" | "description" => field = None,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ZhisouError::Parse(e.to_string())),
        }
    }

    Ok(pages)
}

fn append_field(page: &mut Page, field: Field, text: &str) {
    match field {
        Field::Docid => page.docid = text.trim().parse().unwrap_or(0),
        Field::Link => page.link.push_str(text),
        Field::Title => page.title.push_str(text),
        Field::Description => page.description.push_str(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_feed() {
        let xml = r#"<feed>
            <doc>
                <docid>1</docid>
                <link>https://a.example</link>
                <title>第一篇</title>
                <description>正文内容</description>
            </doc>
            <doc>
                <docid>2</docid>
                <link>https://b.example</link>
                <title>Second</title>
                <description>more text</description>
            </doc>
        </feed>"#;

        let pages = parse_xml_str(xml).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].docid, 1);
        assert_eq!(pages[0].title, "第一篇");
        assert_eq!(pages[1].link, "https://b.example");
    }

    #[test]
    fn test_discards_empty_pages() {
        let xml = r#"<feed>
            <doc><docid>1</docid><link>https://a</link><title></title><description></description></doc>
            <doc><docid>2</docid><link>https://b</link><title>有标题</title><description></description></doc>
        </feed>"#;

        let pages = parse_xml_str(xml).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].docid, 2);
    }

    #[test]
    fn test_cdata_and_entities() {
        let xml = r#"<feed>
            <doc>
                <docid>3</docid>
                <link>https://c.example</link>
                <title>A &amp; B</title>
                <description><![CDATA[原始 <b>内容</b>]]></description>
            </doc>
        </feed>"#;

        let pages = parse_xml_str(xml).unwrap();
        assert_eq!(pages[0].title, "A & B");
        assert_eq!(pages[0].description, "原始 <b>内容</b>");
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let xml = "<feed><doc><title>未闭合";
        assert!(parse_xml_str(xml).is_err() || parse_xml_str(xml).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file() {
        assert!(parse_xml_file(Path::new("/no/such/file.xml")).is_err());
    }
}
