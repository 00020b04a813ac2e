//! Search engine - joins index results with the page store / 搜索引擎
//!
//! 查询流程：缓存查找 → AND 余弦检索 → 偏移定位读网页块 → 摘要抽取 →
//! UTF-8 清理 → 写缓存。缓存命中会区分本地/远端层记录日志。

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CacheStats, CacheTier, SearchCache};
use crate::error::Result;
use crate::index::WeightedInvertedIndex;
use crate::store::{clean_utf8, PageStore};

/// One ranked search result / 单条检索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub docid: i32,
    pub score: f64,
    pub title: String,
    pub link: String,
    pub summary: String,
}

/// 搜索引擎：只读共享倒排索引，独占缓存
pub struct SearchEngine {
    index: Arc<WeightedInvertedIndex>,
    store: PageStore,
    cache: Option<SearchCache>,
}

impl SearchEngine {
    pub fn new(
        index: Arc<WeightedInvertedIndex>,
        pages_path: &Path,
        offsets_path: &Path,
    ) -> Result<Self> {
        let store = PageStore::open(pages_path, offsets_path)?;
        Ok(Self {
            index,
            store,
            cache: None,
        })
    }

    /// Number of documents with offsets / 偏移库文档数
    pub fn doc_count(&self) -> usize {
        self.store.len()
    }

    /// 启用双层缓存
    pub fn enable_cache(
        &mut self,
        redis_host: &str,
        redis_port: u16,
        local_capacity: usize,
        cache_ttl: u64,
    ) {
        self.cache = Some(SearchCache::new(
            redis_host,
            redis_port,
            local_capacity,
            cache_ttl,
        ));
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// 缓存键：空格连接的查询词 + "|" + top_k
    pub fn make_cache_key(terms: &[String], top_k: usize) -> String {
        format!("{}|{}", terms.join(" "), top_k)
    }

    /// Ranked AND-cosine query / 基于 AND + 余弦相似度的查询
    pub fn query_ranked(&self, terms: &[String], top_k: usize) -> Vec<SearchResult> {
        if terms.is_empty() {
            return Vec::new();
        }
        let started = Instant::now();
        let query = terms.join(" ");

        // 先查缓存
        if let Some(cache) = &self.cache {
            let key = Self::make_cache_key(terms, top_k);
            if let Some((results, tier)) = cache.get(&key) {
                let tier = match tier {
                    CacheTier::Local => "local",
                    CacheTier::Remote => "remote",
                };
                tracing::info!(
                    query = %query,
                    results = results.len(),
                    tier,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "cache hit"
                );
                return results;
            }
            tracing::info!(query = %query, "cache miss");
        }

        let mut ranked = self.index.search_and_cosine_ranked(terms);
        if top_k > 0 && ranked.len() > top_k {
            ranked.truncate(top_k);
        }

        let mut results: Vec<SearchResult> = Vec::with_capacity(ranked.len());
        for (docid, score) in ranked {
            let Some(page) = self.store.read_by_docid(docid) else {
                continue;
            };
            let summary = make_summary(&page.description, terms, 120);
            results.push(SearchResult {
                docid,
                score,
                title: clean_utf8(page.title.as_bytes()),
                link: clean_utf8(page.link.as_bytes()),
                summary: clean_utf8(summary.as_bytes()),
            });
        }

        tracing::info!(
            query = %query,
            results = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search"
        );

        if !results.is_empty() {
            if let Some(cache) = &self.cache {
                let key = Self::make_cache_key(terms, top_k);
                cache.put(&key, &results);
            }
        }
        results
    }
}

/// Snippet around the earliest query-term occurrence / 根据查询词抽取摘要
///
/// 窗口按字节计算，再把首尾收敛到 UTF-8 字符边界，窗口不超过
/// `window` 字节，必要时两端补省略号。
pub fn make_summary(text: &str, terms: &[String], window: usize) -> String {
    if text.is_empty() {
        return String::new();
    }

    // 小写副本仅用于定位（ASCII 范围），字节长度不变
    let lower = text.to_ascii_lowercase();
    let mut pos: Option<usize> = None;
    for term in terms {
        let term = term.to_ascii_lowercase();
        if term.is_empty() {
            continue;
        }
        if let Some(p) = lower.find(&term) {
            pos = Some(pos.map_or(p, |cur: usize| cur.min(p)));
        }
    }

    let Some(pos) = pos else {
        if text.len() <= window {
            return text.to_string();
        }
        let end = floor_boundary(text, window);
        return format!("{}...", &text[..end]);
    };

    let start = pos.saturating_sub(window / 2);
    let end = (start + window).min(text.len());
    let start = ceil_boundary(text, start);
    let end = floor_boundary(text, end);

    let mut out = String::with_capacity(end - start + 6);
    if start > 0 {
        out.push_str("...");
    }
    out.push_str(&text[start..end]);
    if end < text.len() {
        out.push_str("...");
    }
    out
}

fn ceil_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

fn floor_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Page;
    use crate::store::PageStoreWriter;

    fn q(terms: &[&str]) -> Vec<String> {
        terms.iter().map(|t| t.to_string()).collect()
    }

    fn build_engine(dir: &Path) -> SearchEngine {
        let pages = vec![
            Page {
                docid: 1,
                link: "https://a.example".to_string(),
                title: "apple banana".to_string(),
                description: "a page about apple and banana fruit".to_string(),
            },
            Page {
                docid: 2,
                link: "https://b.example".to_string(),
                title: "apple cherry".to_string(),
                description: "a page about apple and cherry fruit".to_string(),
            },
        ];

        let mut writer = PageStoreWriter::create(dir).unwrap();
        for page in &pages {
            writer.append(page).unwrap();
        }
        writer.finish().unwrap();

        let documents: Vec<(i32, String)> = pages
            .iter()
            .map(|p| (p.docid, format!("{}\n{}", p.title, p.description)))
            .collect();
        let mut index = WeightedInvertedIndex::new();
        index.build(&documents);

        SearchEngine::new(
            Arc::new(index),
            &dir.join("pages.bin"),
            &dir.join("offsets.bin"),
        )
        .unwrap()
    }

    #[test]
    fn test_query_ranked_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let engine = build_engine(dir.path());

        let results = engine.query_ranked(&q(&["banana"]), 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].docid, 1);
        assert_eq!(results[0].title, "apple banana");
        assert!(results[0].summary.contains("banana"));

        let results = engine.query_ranked(&q(&["apple"]), 1);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_query_empty_terms() {
        let dir = tempfile::tempdir().unwrap();
        let engine = build_engine(dir.path());
        assert!(engine.query_ranked(&[], 10).is_empty());
    }

    #[test]
    fn test_cache_miss_then_local_hit() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = build_engine(dir.path());
        // 端口 1 不可达：远端层降级，只有本地层生效
        engine.enable_cache("127.0.0.1", 1, 16, 60);

        let first = engine.query_ranked(&q(&["apple"]), 10);
        let stats = engine.cache_stats().unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.local_hits, 0);

        let second = engine.query_ranked(&q(&["apple"]), 10);
        let stats = engine.cache_stats().unwrap();
        assert_eq!(stats.local_hits, 1);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_summary_window() {
        // 300 个 ASCII 字符，查询词出现在偏移 200
        let mut text = "x".repeat(200);
        text.push_str("needle");
        text.push_str(&"y".repeat(94));
        assert_eq!(text.len(), 300);

        let summary = make_summary(&text, &q(&["needle"]), 120);
        assert!(summary.starts_with("..."));
        assert!(summary.ends_with("..."));
        assert!(summary.contains("needle"));
        assert!(summary.len() <= 120 + 6);
    }

    #[test]
    fn test_summary_no_match_prefix() {
        let text = "z".repeat(200);
        let summary = make_summary(&text, &q(&["missing"]), 120);
        assert_eq!(summary.len(), 123);
        assert!(summary.ends_with("..."));

        let short = "short text";
        assert_eq!(make_summary(short, &q(&["missing"]), 120), short);
    }

    #[test]
    fn test_summary_utf8_boundaries() {
        // 多字节文本：窗口边界必须收敛到字符边界
        let text = "汉字".repeat(60); // 360 字节
        let needle = "查询词";
        let mut full = text.clone();
        full.push_str(needle);
        full.push_str(&"汉字".repeat(20));

        let summary = make_summary(&full, &q(&[needle]), 120);
        assert!(summary.contains(needle));
        // 结果必须是合法 UTF-8 子串（String 类型本身保证），且不超窗口
        assert!(summary.len() <= 120 + 6);
    }

    #[test]
    fn test_summary_case_insensitive_ascii() {
        let text = "Some NEEDLE in the haystack";
        let summary = make_summary(text, &q(&["needle"]), 120);
        assert!(summary.contains("NEEDLE"));
    }
}
