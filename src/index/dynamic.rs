//! Dynamic inverted index - real-time add/remove/update / 动态倒排索引
//!
//! 特性：
//! - 支持动态添加/删除文档，删除为墓碑标记，compact 时物理清理
//! - 权重存储拆分为 TF 与派生权重，重算 IDF 不会叠乘
//! - 读写锁保护整个结构，compact 不会重入锁
//! - 支持持久化（与离线 index.txt 同格式，跳过墓碑）

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::RwLock;

use crate::error::Result;
use crate::tokenizer;

/// Document metadata / 文档元数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub title: String,
    pub link: String,
    pub summary: String,
    /// Full text, used for (re)tokenization / 完整文本
    pub text: String,
}

/// Index statistics / 索引统计
#[derive(Debug, Clone, Serialize)]
pub struct DynamicIndexStats {
    pub total_docs: usize,
    pub active_docs: usize,
    pub deleted_docs: usize,
    pub total_terms: usize,
    pub pending_updates: usize,
}

/// One posting entry. `tf` is the normalized term frequency the weight is
/// derived from; entries loaded from disk only carry their persisted weight
/// (`tf` is `None`) and are left untouched by IDF recomputation.
#[derive(Debug, Clone, Copy)]
struct Posting {
    tf: Option<f64>,
    weight: f64,
}

#[derive(Default)]
struct DynamicState {
    /// term -> (docid -> posting)，按 docid 升序
    postings: HashMap<String, BTreeMap<i32, Posting>>,
    /// 墓碑集合：逻辑删除的 docid
    tombstones: HashSet<i32>,
    /// 文档 -> 分词结果（用于更新时重算）
    doc_tokens: HashMap<i32, Vec<String>>,
    /// 文档元数据
    doc_meta: HashMap<i32, DocumentMeta>,
    total_docs: usize,
}

/// Dynamic inverted index, safe for concurrent readers and writers / 线程安全的动态倒排索引
#[derive(Default)]
pub struct DynamicInvertedIndex {
    state: RwLock<DynamicState>,
}

impl DynamicInvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load base postings from an `index.txt` file; resets tombstones and
    /// metadata / 从文件加载基础索引，清空墓碑与元数据
    pub fn load(&self, path: &Path, total_docs: usize) -> Result<()> {
        let file = File::open(path)?;
        let reader = BufReader::with_capacity(64 * 1024, file);

        let mut state = self.state.write().expect("dynamic index lock poisoned");
        state.postings.clear();
        state.tombstones.clear();
        state.doc_tokens.clear();
        state.doc_meta.clear();
        state.total_docs = total_docs;

        for line in reader.lines() {
            let line = line?;
            let Some((term, rest)) = line.split_once('\t') else {
                continue;
            };
            let mut docs = BTreeMap::new();
            for pair in rest.split(',') {
                let Some((docid, weight)) = pair.split_once(':') else {
                    continue;
                };
                let (Ok(docid), Ok(weight)) = (docid.parse::<i32>(), weight.parse::<f64>())
                else {
                    continue;
                };
                docs.insert(docid, Posting { tf: None, weight });
            }
            if !docs.is_empty() {
                state.postings.insert(term.to_string(), docs);
            }
        }
        Ok(())
    }

    /// Add a document / 添加单个文档（自动重算 IDF）
    pub fn add(&self, docid: i32, text: &str) {
        let mut state = self.state.write().expect("dynamic index lock poisoned");
        Self::add_locked(&mut state, docid, text, None);
        Self::recompute_idf_locked(&mut state);
    }

    /// Add a document with metadata / 添加文档（带元数据）
    pub fn add_with_meta(&self, docid: i32, meta: DocumentMeta) {
        let mut state = self.state.write().expect("dynamic index lock poisoned");
        let text = meta.text.clone();
        Self::add_locked(&mut state, docid, &text, Some(meta));
        Self::recompute_idf_locked(&mut state);
    }

    /// Batch add, single IDF recomputation at the end / 批量添加，最后统一重算
    pub fn add_many(&self, documents: &[(i32, String)]) {
        let mut state = self.state.write().expect("dynamic index lock poisoned");
        for (docid, text) in documents {
            Self::add_locked(&mut state, *docid, text, None);
        }
        Self::recompute_idf_locked(&mut state);
    }

    /// Mark a document deleted / 标记删除，不立即重建索引
    ///
    /// Compaction is left to explicit `compact()` calls; `needs_compaction`
    /// reports when the tombstone share passes the threshold.
    pub fn remove(&self, docid: i32) {
        let mut state = self.state.write().expect("dynamic index lock poisoned");
        state.tombstones.insert(docid);
    }

    /// Update = remove + add / 更新文档（先删后加）
    pub fn update(&self, docid: i32, text: &str) {
        self.remove(docid);
        self.add(docid, text);
    }

    /// Metadata lookup; tombstoned documents read as absent / 获取文档元数据
    pub fn get_meta(&self, docid: i32) -> Option<DocumentMeta> {
        let state = self.state.read().expect("dynamic index lock poisoned");
        if state.tombstones.contains(&docid) {
            return None;
        }
        state.doc_meta.get(&docid).cloned()
    }

    /// 余弦相似度排序（AND 语义），跳过墓碑文档
    ///
    /// 查询向量取 tf=1，idf = ln(N/df)
    pub fn search_and_cosine_ranked(&self, terms: &[String]) -> Vec<(i32, f64)> {
        let state = self.state.read().expect("dynamic index lock poisoned");
        if terms.is_empty() {
            return Vec::new();
        }

        // 每个候选文档在查询词各维度上的权重；None 表示该词不含此文档
        let mut doc_weights: HashMap<i32, Vec<Option<f64>>> = HashMap::new();
        for (i, term) in terms.iter().enumerate() {
            let Some(docs) = state.postings.get(term) else {
                return Vec::new();
            };
            for (docid, posting) in docs {
                if state.tombstones.contains(docid) {
                    continue;
                }
                doc_weights
                    .entry(*docid)
                    .or_insert_with(|| vec![None; terms.len()])[i] = Some(posting.weight);
            }
        }

        // 只保留在每个查询词下都有权重的文档
        let candidates: Vec<(i32, Vec<f64>)> = doc_weights
            .into_iter()
            .filter_map(|(docid, weights)| {
                let mut doc_vec = Vec::with_capacity(weights.len());
                for weight in weights {
                    doc_vec.push(weight?);
                }
                Some((docid, doc_vec))
            })
            .collect();

        // 查询向量
        let n = state.total_docs as f64;
        let mut query_weights = vec![0.0; terms.len()];
        for (i, term) in terms.iter().enumerate() {
            let df = state.postings.get(term).map(|d| d.len()).unwrap_or(1).max(1) as f64;
            query_weights[i] = (n / df).ln();
        }

        let mut results: Vec<(i32, f64)> = Vec::with_capacity(candidates.len());
        for (docid, doc_vec) in candidates {
            let mut dot = 0.0;
            let mut doc_norm_sq = 0.0;
            let mut query_norm_sq = 0.0;
            for i in 0..terms.len() {
                dot += query_weights[i] * doc_vec[i];
                doc_norm_sq += doc_vec[i] * doc_vec[i];
                query_norm_sq += query_weights[i] * query_weights[i];
            }
            let denom = doc_norm_sq.sqrt() * query_norm_sq.sqrt();
            let cosine = if denom > 0.0 { dot / denom } else { 0.0 };
            results.push((docid, cosine));
        }

        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results
    }

    /// 获取索引统计
    pub fn stats(&self) -> DynamicIndexStats {
        let state = self.state.read().expect("dynamic index lock poisoned");
        DynamicIndexStats {
            total_docs: state.total_docs,
            active_docs: state.total_docs.saturating_sub(state.tombstones.len()),
            deleted_docs: state.tombstones.len(),
            total_terms: state.postings.len(),
            pending_updates: 0,
        }
    }

    /// 是否需要压缩（墓碑超过 20%）
    pub fn needs_compaction(&self) -> bool {
        let state = self.state.read().expect("dynamic index lock poisoned");
        Self::needs_compaction_locked(&state)
    }

    /// 物理清理墓碑文档并重算 IDF / 清理删除的文档
    pub fn compact(&self) {
        let mut state = self.state.write().expect("dynamic index lock poisoned");
        Self::compact_locked(&mut state);
    }

    /// Persist live postings in the `index.txt` format / 持久化到文件，跳过墓碑
    pub fn save(&self, path: &Path) -> Result<()> {
        let state = self.state.read().expect("dynamic index lock poisoned");
        let file = File::create(path)?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);

        for (term, docs) in &state.postings {
            let live: Vec<(&i32, &Posting)> = docs
                .iter()
                .filter(|(docid, _)| !state.tombstones.contains(docid))
                .collect();
            if live.is_empty() {
                continue;
            }
            write!(writer, "{}\t", term)?;
            let mut first = true;
            for (docid, posting) in live {
                if !first {
                    write!(writer, ",")?;
                }
                write!(writer, "{}:{}", docid, posting.weight)?;
                first = false;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn add_locked(state: &mut DynamicState, docid: i32, text: &str, meta: Option<DocumentMeta>) {
        // 文档已存在：先清掉旧词项的倒排条目，重算时整体覆盖
        if let Some(old_tokens) = state.doc_tokens.remove(&docid) {
            let mut seen: HashSet<&str> = HashSet::new();
            for token in &old_tokens {
                if !seen.insert(token.as_str()) {
                    continue;
                }
                let now_empty = match state.postings.get_mut(token.as_str()) {
                    Some(docs) => {
                        docs.remove(&docid);
                        docs.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    state.postings.remove(token.as_str());
                }
            }
        }

        let tokens = tokenizer::tokenize(text);
        if let Some(meta) = meta {
            state.doc_meta.insert(docid, meta);
        }
        state.tombstones.remove(&docid);

        // 归一化 TF 写入倒排表，权重由 recompute_idf 派生
        if !tokens.is_empty() {
            let mut tf: HashMap<&str, usize> = HashMap::new();
            for token in &tokens {
                *tf.entry(token.as_str()).or_insert(0) += 1;
            }
            let len = tokens.len() as f64;
            for (term, count) in tf {
                let tf_value = count as f64 / len;
                state.postings.entry(term.to_string()).or_default().insert(
                    docid,
                    Posting {
                        tf: Some(tf_value),
                        weight: tf_value,
                    },
                );
            }
        }
        state.doc_tokens.insert(docid, tokens);
        state.total_docs += 1;
    }

    fn needs_compaction_locked(state: &DynamicState) -> bool {
        state.tombstones.len() as f64 > state.total_docs as f64 * 0.2
    }

    /// 已持有写锁时调用，不可重入加锁
    fn compact_locked(state: &mut DynamicState) {
        let tombstones = std::mem::take(&mut state.tombstones);
        for docid in &tombstones {
            state.doc_tokens.remove(docid);
            state.doc_meta.remove(docid);
        }
        state.postings.retain(|_, docs| {
            docs.retain(|docid, _| !tombstones.contains(docid));
            !docs.is_empty()
        });
        state.total_docs = state.total_docs.saturating_sub(tombstones.len());
        Self::recompute_idf_locked(state);
    }

    /// 重算所有词的 IDF 并由存储的 TF 派生权重，同时物理移除墓碑条目。
    /// 磁盘加载的条目（无 TF）保留其持久化权重。
    fn recompute_idf_locked(state: &mut DynamicState) {
        let n = state.total_docs as f64;
        let tombstones = &state.tombstones;
        state.postings.retain(|_, docs| {
            docs.retain(|docid, _| !tombstones.contains(docid));
            if docs.is_empty() {
                return false;
            }
            let df = docs.len() as f64;
            let idf = (n / df).ln();
            for posting in docs.values_mut() {
                if let Some(tf) = posting.tf {
                    posting.weight = tf * idf;
                }
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(terms: &[&str]) -> Vec<String> {
        terms.iter().map(|t| t.to_string()).collect()
    }

    fn ids(results: &[(i32, f64)]) -> Vec<i32> {
        results.iter().map(|(id, _)| *id).collect()
    }

    #[test]
    fn test_add_remove_flow() {
        let index = DynamicInvertedIndex::new();
        index.add(10, "foo bar");
        index.add(11, "foo baz");

        assert_eq!(ids(&index.search_and_cosine_ranked(&q(&["foo"]))), vec![10, 11]);

        index.remove(10);
        assert_eq!(ids(&index.search_and_cosine_ranked(&q(&["foo"]))), vec![11]);
        assert_eq!(index.stats().deleted_docs, 1);
        assert_eq!(index.stats().active_docs, 1);
    }

    #[test]
    fn test_removed_doc_never_returned() {
        let index = DynamicInvertedIndex::new();
        index.add(1, "rust 搜索 引擎");
        index.add(2, "rust 网络 服务");
        index.remove(1);
        for query in [q(&["rust"]), q(&["搜索"])] {
            assert!(!ids(&index.search_and_cosine_ranked(&query)).contains(&1));
        }
    }

    #[test]
    fn test_weights_do_not_compound() {
        let index = DynamicInvertedIndex::new();
        index.add(1, "alpha beta");
        index.add(2, "alpha gamma");
        index.add(3, "beta gamma");

        // alpha: tf=1/2，df=2，N=3；多次重算后权重仍应为 tf*ln(N/df)
        let expected = 0.5 * (3.0f64 / 2.0).ln();
        let state = index.state.read().unwrap();
        let posting = state.postings["alpha"][&1];
        assert!((posting.weight - expected).abs() < 1e-12);
    }

    #[test]
    fn test_update_equivalent_to_remove_add() {
        let a = DynamicInvertedIndex::new();
        a.add(1, "old text here");
        a.add(2, "stable document");
        a.update(1, "new words entirely");

        let b = DynamicInvertedIndex::new();
        b.add(1, "old text here");
        b.add(2, "stable document");
        b.remove(1);
        b.add(1, "new words entirely");

        for query in [q(&["new"]), q(&["old"]), q(&["stable"])] {
            assert_eq!(
                ids(&a.search_and_cosine_ranked(&query)),
                ids(&b.search_and_cosine_ranked(&query))
            );
        }
    }

    #[test]
    fn test_compact_preserves_results() {
        let index = DynamicInvertedIndex::new();
        for (docid, text) in [
            (1, "shared term one"),
            (2, "shared term two"),
            (3, "shared term three"),
            (4, "shared term four"),
            (5, "shared term five"),
            (6, "shared term six"),
        ] {
            index.add(docid, text);
        }
        index.remove(2);

        let before = ids(&index.search_and_cosine_ranked(&q(&["shared"])));
        index.compact();
        let after = ids(&index.search_and_cosine_ranked(&q(&["shared"])));
        assert_eq!(before, after);
        assert_eq!(index.stats().deleted_docs, 0);
    }

    #[test]
    fn test_needs_compaction_threshold() {
        let index = DynamicInvertedIndex::new();
        for docid in 1..=10 {
            index.add(docid, "shared words here");
        }
        index.remove(1);
        index.remove(2);
        // 2/10 未超过 20%
        assert!(!index.needs_compaction());
        index.remove(3);
        assert!(index.needs_compaction());

        index.compact();
        assert!(!index.needs_compaction());
        assert_eq!(index.stats().total_docs, 7);
    }

    #[test]
    fn test_meta_roundtrip_and_tombstone() {
        let index = DynamicInvertedIndex::new();
        index.add_with_meta(
            7,
            DocumentMeta {
                title: "动态文档".to_string(),
                link: "https://example.com/7".to_string(),
                summary: "摘要".to_string(),
                text: "动态 添加 的 文档".to_string(),
            },
        );

        let meta = index.get_meta(7).expect("meta stored");
        assert_eq!(meta.title, "动态文档");

        index.remove(7);
        assert!(index.get_meta(7).is_none());
    }

    #[test]
    fn test_save_skips_tombstones_and_loads_back() {
        let index = DynamicInvertedIndex::new();
        index.add(1, "apple banana");
        index.add(2, "apple cherry");
        index.add(3, "banana cherry");
        index.add(4, "apple banana cherry");
        index.add(5, "banana durian");
        index.remove(2);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dynamic.txt");
        index.save(&path).unwrap();

        let reloaded = DynamicInvertedIndex::new();
        reloaded.load(&path, 4).unwrap();
        let hits = reloaded.search_and_cosine_ranked(&q(&["apple"]));
        assert!(!ids(&hits).contains(&2));
        assert!(ids(&hits).contains(&1));
    }

    #[test]
    fn test_batch_add() {
        let index = DynamicInvertedIndex::new();
        index.add_many(&[
            (1, "batch one".to_string()),
            (2, "batch two".to_string()),
            (3, "batch three".to_string()),
        ]);
        assert_eq!(index.stats().total_docs, 3);
        assert_eq!(ids(&index.search_and_cosine_ranked(&q(&["batch"]))), vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_term_empty() {
        let index = DynamicInvertedIndex::new();
        index.add(1, "present words");
        assert!(index
            .search_and_cosine_ranked(&q(&["present", "absent"]))
            .is_empty());
    }
}
