//! TF-IDF weighted inverted index / TF-IDF 加权倒排索引
//!
//! postings: term -> (docid -> weight)，按 docid 升序、唯一
//! weight = (0.5 + 0.5 * tf/max_tf) * (ln((N+1)/(df+1)) + 1)
//!
//! Built offline by the pipeline, loaded read-only by the online engine.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::tokenizer;

#[derive(Debug, Default)]
pub struct WeightedInvertedIndex {
    /// term -> (docid -> TF-IDF weight) / 倒排表
    postings: HashMap<String, BTreeMap<i32, f64>>,
    /// Document count used for IDF / 文档总数
    total_docs: usize,
}

impl WeightedInvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document count / 文档总数
    pub fn doc_count(&self) -> usize {
        self.total_docs
    }

    /// Vocabulary size / 词表大小
    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Posting list for a term, ascending by docid / 指定词的倒排列表
    pub fn postings_for(&self, term: &str) -> Option<&BTreeMap<i32, f64>> {
        self.postings.get(term)
    }

    /// Build the index from `(docid, text)` documents / 从文档集合构建索引
    ///
    /// Two passes: DF first, then per-document TF and TF-IDF weights. Both
    /// passes run on a worker pool sized by hardware concurrency; workers
    /// claim docid ranges, build private partial maps and merge under a
    /// single mutex / 工作线程各自构建局部映射，在单一互斥锁下合并.
    pub fn build(&mut self, documents: &[(i32, String)]) {
        self.postings.clear();
        self.total_docs = documents.len();
        if documents.is_empty() {
            return;
        }

        let workers = num_cpus::get().max(1);
        let chunk_size = documents.len().div_ceil(workers);

        // 1) 统计 DF（每篇文档的去重词集）
        let df: Mutex<HashMap<String, usize>> = Mutex::new(HashMap::new());
        std::thread::scope(|s| {
            for chunk in documents.chunks(chunk_size) {
                let df = &df;
                s.spawn(move || {
                    let mut local: HashMap<String, usize> = HashMap::new();
                    for (_, text) in chunk {
                        let mut terms = tokenizer::tokenize(text);
                        terms.sort_unstable();
                        terms.dedup();
                        for term in terms {
                            *local.entry(term).or_insert(0) += 1;
                        }
                    }
                    let mut shared = df.lock();
                    for (term, count) in local {
                        *shared.entry(term).or_insert(0) += count;
                    }
                });
            }
        });
        let df = df.into_inner();
        let n = documents.len() as f64;

        // 2) 计算每篇文档的 TF 和 TF-IDF
        let merged: Mutex<HashMap<String, BTreeMap<i32, f64>>> = Mutex::new(HashMap::new());
        std::thread::scope(|s| {
            for chunk in documents.chunks(chunk_size) {
                let df = &df;
                let merged = &merged;
                s.spawn(move || {
                    let mut partial: HashMap<String, BTreeMap<i32, f64>> = HashMap::new();
                    for (docid, text) in chunk {
                        let tokens = tokenizer::tokenize(text);
                        if tokens.is_empty() {
                            continue;
                        }

                        let mut tf: HashMap<&str, usize> = HashMap::new();
                        for token in &tokens {
                            *tf.entry(token.as_str()).or_insert(0) += 1;
                        }
                        let max_tf = tf.values().copied().max().unwrap_or(0);
                        if max_tf == 0 {
                            continue;
                        }

                        for (term, count) in tf {
                            let df_t = df.get(term).copied().unwrap_or(0) as f64;
                            let tf_norm = 0.5 + 0.5 * (count as f64 / max_tf as f64);
                            let idf = ((n + 1.0) / (df_t + 1.0)).ln() + 1.0;
                            partial
                                .entry(term.to_string())
                                .or_default()
                                .insert(*docid, tf_norm * idf);
                        }
                    }
                    let mut shared = merged.lock();
                    for (term, docs) in partial {
                        shared.entry(term).or_default().extend(docs);
                    }
                });
            }
        });
        self.postings = merged.into_inner();
    }

    /// Persist as `term\tdocid:weight,docid:weight` lines / 写出文本索引
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);

        for (term, docs) in &self.postings {
            write!(writer, "{}\t", term)?;
            let mut first = true;
            for (docid, weight) in docs {
                if !first {
                    write!(writer, ",")?;
                }
                write!(writer, "{}:{}", docid, weight)?;
                first = false;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Load from the text format; replaces any prior state / 从文本索引加载
    pub fn load(&mut self, path: &Path, total_docs: usize) -> Result<()> {
        let file = File::open(path)?;
        let reader = BufReader::with_capacity(64 * 1024, file);

        self.postings.clear();
        self.total_docs = total_docs;

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
                docs.insert(docid, weight);
            }
            if !docs.is_empty() {
                self.postings.insert(term.to_string(), docs);
            }
        }
        Ok(())
    }

    /// AND 交集查询，返回升序 docid 列表（不做权重融合）
    pub fn search_and(&self, terms: &[String]) -> Vec<i32> {
        if terms.is_empty() {
            return Vec::new();
        }
        let mut lists: Vec<&BTreeMap<i32, f64>> = Vec::with_capacity(terms.len());
        for term in terms {
            match self.postings.get(term) {
                Some(p) => lists.push(p),
                None => return Vec::new(),
            }
        }
        // 从最短列表开始求交
        lists.sort_by_key(|p| p.len());
        let mut result: Vec<i32> = lists[0].keys().copied().collect();
        for list in &lists[1..] {
            result.retain(|docid| list.contains_key(docid));
            if result.is_empty() {
                break;
            }
        }
        result
    }

    /// AND 语义的加权查询：各词权重之和降序
    pub fn search_and_weighted(&self, terms: &[String]) -> Vec<i32> {
        if terms.is_empty() {
            return Vec::new();
        }
        let mut appear: HashMap<i32, usize> = HashMap::new();
        let mut score: HashMap<i32, f64> = HashMap::new();
        for term in terms {
            let Some(docs) = self.postings.get(term) else {
                return Vec::new();
            };
            for (docid, weight) in docs {
                *appear.entry(*docid).or_insert(0) += 1;
                *score.entry(*docid).or_insert(0.0) += weight;
            }
        }
        let need = terms.len();
        let mut items: Vec<(i32, f64)> = score
            .into_iter()
            .filter(|(docid, _)| appear[docid] == need)
            .collect();
        sort_by_score(&mut items);
        items.into_iter().map(|(docid, _)| docid).collect()
    }

    /// OR 语义的加权查询：各词权重之和降序
    pub fn search_or_weighted(&self, terms: &[String]) -> Vec<i32> {
        if terms.is_empty() {
            return Vec::new();
        }
        let mut score: HashMap<i32, f64> = HashMap::new();
        for term in terms {
            let Some(docs) = self.postings.get(term) else {
                continue;
            };
            for (docid, weight) in docs {
                *score.entry(*docid).or_insert(0.0) += weight;
            }
        }
        let mut items: Vec<(i32, f64)> = score.into_iter().collect();
        sort_by_score(&mut items);
        items.into_iter().map(|(docid, _)| docid).collect()
    }

    /// 余弦相似度排序（AND 语义）
    ///
    /// 1) 将查询词当作文档，用同一 TF-IDF 公式计算查询向量
    /// 2) 仅保留包含全部查询词的文档
    /// 3) 在查询词子空间内计算 cos = (X·Y)/(|X||Y|)，降序排序
    pub fn search_and_cosine_ranked(&self, terms: &[String]) -> Vec<(i32, f64)> {
        if terms.is_empty() {
            return Vec::new();
        }

        // 查询词去重并统计词频
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut unique: Vec<&str> = Vec::new();
        for term in terms {
            let entry = counts.entry(term.as_str()).or_insert(0);
            if *entry == 0 {
                unique.push(term.as_str());
            }
            *entry += 1;
        }
        let max_tf = counts.values().copied().max().unwrap_or(0) as f64;

        let n = if self.total_docs == 0 {
            1.0
        } else {
            self.total_docs as f64
        };

        // 查询向量：df 取自当前倒排表，词不存在直接返回空
        let mut term_postings: Vec<(&BTreeMap<i32, f64>, f64)> = Vec::with_capacity(unique.len());
        for term in &unique {
            let Some(docs) = self.postings.get(*term) else {
                return Vec::new();
            };
            let tf_norm = 0.5 + 0.5 * (counts[term] as f64 / max_tf);
            let idf = ((n + 1.0) / (docs.len() as f64 + 1.0)).ln() + 1.0;
            term_postings.push((docs, tf_norm * idf));
        }

        // AND 交集，从最短列表开始
        let mut order: Vec<usize> = (0..term_postings.len()).collect();
        order.sort_by_key(|&i| term_postings[i].0.len());
        let mut candidates: Vec<i32> = term_postings[order[0]].0.keys().copied().collect();
        for &i in &order[1..] {
            let docs = term_postings[i].0;
            candidates.retain(|docid| docs.contains_key(docid));
            if candidates.is_empty() {
                return Vec::new();
            }
        }

        let query_norm_sq: f64 = term_postings.iter().map(|(_, qw)| qw * qw).sum();

        let mut results: Vec<(i32, f64)> = Vec::with_capacity(candidates.len());
        for docid in candidates {
            let mut dot = 0.0;
            let mut doc_norm_sq = 0.0;
            for (docs, qw) in &term_postings {
                let w = docs.get(&docid).copied().unwrap_or(0.0);
                dot += qw * w;
                doc_norm_sq += w * w;
            }
            let denom = doc_norm_sq.sqrt() * query_norm_sq.sqrt();
            let cosine = if denom > 0.0 { dot / denom } else { 0.0 };
            results.push((docid, cosine));
        }

        sort_by_score(&mut results);
        results
    }
}

/// 分数降序，分数相同时 docid 升序
fn sort_by_score(items: &mut [(i32, f64)]) {
    items.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(items: &[(i32, &str)]) -> Vec<(i32, String)> {
        items.iter().map(|(id, t)| (*id, t.to_string())).collect()
    }

    fn q(terms: &[&str]) -> Vec<String> {
        terms.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_and_cosine_basic() {
        let mut index = WeightedInvertedIndex::new();
        index.build(&docs(&[
            (1, "apple banana"),
            (2, "apple cherry"),
            (3, "banana cherry"),
        ]));

        let hits = index.search_and_cosine_ranked(&q(&["apple", "banana"]));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 1);

        let hits = index.search_and_cosine_ranked(&q(&["cherry"]));
        let ids: Vec<i32> = hits.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!((hits[0].1 - hits[1].1).abs() < 1e-9);
    }

    #[test]
    fn test_missing_term_returns_empty() {
        let mut index = WeightedInvertedIndex::new();
        index.build(&docs(&[(1, "apple banana")]));
        assert!(index
            .search_and_cosine_ranked(&q(&["apple", "durian"]))
            .is_empty());
        assert!(index.search_and(&q(&["durian"])).is_empty());
    }

    #[test]
    fn test_and_intersection_ascending() {
        let mut index = WeightedInvertedIndex::new();
        index.build(&docs(&[
            (7, "rust search engine"),
            (3, "rust tokio engine"),
            (5, "rust search ranking"),
        ]));
        let ids = index.search_and(&q(&["rust", "search"]));
        assert_eq!(ids, vec![5, 7]);
    }

    #[test]
    fn test_weight_formula() {
        let mut index = WeightedInvertedIndex::new();
        index.build(&docs(&[(1, "apple apple banana"), (2, "apple cherry")]));

        // apple 在 doc1：tf=2 max_tf=2，df=2，N=2
        let apple = index.postings_for("apple").unwrap();
        let expected = (0.5 + 0.5 * 1.0) * ((3.0f64 / 3.0).ln() + 1.0);
        assert!((apple[&1] - expected).abs() < 1e-12);

        // banana 在 doc1：tf=1 max_tf=2，df=1
        let banana = index.postings_for("banana").unwrap();
        let expected = (0.5 + 0.5 * 0.5) * ((3.0f64 / 2.0).ln() + 1.0);
        assert!((banana[&1] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut index = WeightedInvertedIndex::new();
        let documents = docs(&[
            (1, "中国 经济 发展"),
            (2, "中国 科技 创新"),
            (3, "经济 全球化 趋势"),
        ]);
        index.build(&documents);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.txt");
        index.save(&path).unwrap();

        let mut loaded = WeightedInvertedIndex::new();
        loaded.load(&path, documents.len()).unwrap();

        assert_eq!(loaded.doc_count(), index.doc_count());
        assert_eq!(loaded.term_count(), index.term_count());
        for (term, docs) in &index.postings {
            let other = loaded.postings_for(term).expect("term survives reload");
            assert_eq!(
                docs.keys().collect::<Vec<_>>(),
                other.keys().collect::<Vec<_>>()
            );
            for (docid, weight) in docs {
                assert!((weight - other[docid]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_ranked_results_sorted() {
        let mut index = WeightedInvertedIndex::new();
        index.build(&docs(&[
            (1, "apple apple apple"),
            (2, "apple banana banana"),
            (3, "apple banana cherry"),
        ]));
        let hits = index.search_and_cosine_ranked(&q(&["apple"]));
        for pair in hits.windows(2) {
            assert!(pair[0].1 >= pair[1].1 || (pair[0].1 - pair[1].1).abs() < 1e-12);
            if (pair[0].1 - pair[1].1).abs() < 1e-12 {
                assert!(pair[0].0 < pair[1].0);
            }
        }
    }

    #[test]
    fn test_or_weighted_union() {
        let mut index = WeightedInvertedIndex::new();
        index.build(&docs(&[(1, "apple banana"), (2, "cherry")]));
        let ids = index.search_or_weighted(&q(&["apple", "cherry"]));
        assert_eq!(ids.len(), 2);
        // 未知词不影响 OR 结果
        let ids = index.search_or_weighted(&q(&["apple", "durian"]));
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_and_weighted_requires_all_terms() {
        let mut index = WeightedInvertedIndex::new();
        index.build(&docs(&[
            (1, "apple banana"),
            (2, "apple cherry"),
            (3, "banana cherry"),
        ]));
        assert_eq!(index.search_and_weighted(&q(&["apple", "banana"])), vec![1]);
    }

    #[test]
    fn test_empty_build() {
        let mut index = WeightedInvertedIndex::new();
        index.build(&[]);
        assert!(index.is_empty());
        assert!(index.search_and_cosine_ranked(&q(&["apple"])).is_empty());
    }
}
