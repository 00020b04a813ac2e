//! Keyword suggestions / 关键词联想推荐
//!
//! 第一阶段收集前缀匹配；数量足够时直接按频次排序返回。
//! 不足时用有界堆补充编辑距离相近的词，堆顶为当前最差项，便于淘汰。
//! 最终排序：距离升序、频次降序、词典序。

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// 推荐结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordSuggestion {
    pub word: String,
    pub frequency: u32,
    pub distance: usize,
}

/// 堆元素：堆顶是最该被淘汰的项
/// （距离大者为差；距离同则频次小者为差；再同则词典序大者为差）
#[derive(Debug, Clone)]
struct HeapEntry(KeywordSuggestion);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .distance
            .cmp(&other.0.distance)
            .then_with(|| other.0.frequency.cmp(&self.0.frequency))
            .then_with(|| self.0.word.cmp(&other.0.word))
    }
}

/// 字节级 Levenshtein 距离（双行滚动）
fn edit_distance(a: &[u8], b: &[u8]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Suggest keywords for an input / 为输入推荐关键词
///
/// `words` 与 `frequencies` 为平行数组，`words` 按词典序。
pub fn recommend(
    input: &str,
    words: &[String],
    frequencies: &[u32],
    top_k: usize,
) -> Vec<KeywordSuggestion> {
    if input.is_empty() || words.is_empty() || top_k == 0 {
        return Vec::new();
    }

    // 第一阶段：前缀匹配
    let mut prefix_matches: Vec<KeywordSuggestion> = Vec::new();
    for (word, frequency) in words.iter().zip(frequencies) {
        if word.starts_with(input) {
            prefix_matches.push(KeywordSuggestion {
                word: word.clone(),
                frequency: *frequency,
                distance: 0,
            });
        }
    }

    if prefix_matches.len() >= top_k {
        // 前缀匹配足够：频次降序、词典序升序
        prefix_matches.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.word.cmp(&b.word))
        });
        prefix_matches.truncate(top_k);
        return prefix_matches;
    }

    // 第二阶段：有界堆补充编辑距离相近的词
    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(top_k + 1);
    for suggestion in prefix_matches {
        heap.push(HeapEntry(suggestion));
    }

    for (word, frequency) in words.iter().zip(frequencies) {
        if word.starts_with(input) {
            continue;
        }
        let mut distance = edit_distance(input.as_bytes(), word.as_bytes());
        // 包含输入（非前缀）的词打折
        if word.contains(input) {
            distance /= 2;
        }
        heap.push(HeapEntry(KeywordSuggestion {
            word: word.clone(),
            frequency: *frequency,
            distance,
        }));
        if heap.len() > top_k {
            heap.pop();
        }
    }

    let mut results: Vec<KeywordSuggestion> =
        heap.into_iter().map(|entry| entry.0).collect();
    results.sort_by(|a, b| {
        a.distance
            .cmp(&b.distance)
            .then_with(|| b.frequency.cmp(&a.frequency))
            .then_with(|| a.word.cmp(&b.word))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(entries: &[(&str, u32)]) -> (Vec<String>, Vec<u32>) {
        let mut entries: Vec<(&str, u32)> = entries.to_vec();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        (
            entries.iter().map(|(w, _)| w.to_string()).collect(),
            entries.iter().map(|(_, f)| *f).collect(),
        )
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance(b"", b""), 0);
        assert_eq!(edit_distance(b"abc", b"abc"), 0);
        assert_eq!(edit_distance(b"abc", b"abd"), 1);
        assert_eq!(edit_distance(b"abc", b"abcd"), 1);
        assert_eq!(edit_distance(b"kitten", b"sitting"), 3);
    }

    #[test]
    fn test_prefix_priority() {
        let (words, freqs) = dict(&[("中国", 10), ("中间", 5), ("国家", 3)]);
        let suggestions = recommend("中", &words, &freqs, 5);

        assert!(suggestions.len() >= 2);
        assert_eq!(suggestions[0].word, "中国");
        assert_eq!(suggestions[0].distance, 0);
        assert_eq!(suggestions[1].word, "中间");
        assert_eq!(suggestions[1].distance, 0);
        // 前缀匹配之间按频次降序
        assert!(suggestions[0].frequency >= suggestions[1].frequency);
    }

    #[test]
    fn test_enough_prefix_matches_all_distance_zero() {
        let (words, freqs) = dict(&[
            ("中国", 10),
            ("中间", 5),
            ("中心", 8),
            ("中文", 2),
            ("国家", 30),
        ]);
        let suggestions = recommend("中", &words, &freqs, 3);
        assert_eq!(suggestions.len(), 3);
        for suggestion in &suggestions {
            assert!(suggestion.word.starts_with('中'));
            assert_eq!(suggestion.distance, 0);
        }
        // 频次降序
        assert_eq!(suggestions[0].word, "中国");
        assert_eq!(suggestions[1].word, "中心");
        assert_eq!(suggestions[2].word, "中间");
    }

    #[test]
    fn test_ordering_distance_frequency_word() {
        let (words, freqs) = dict(&[("abcd", 1), ("abce", 9), ("xyz", 100)]);
        let suggestions = recommend("abc", &words, &freqs, 3);
        // 全部返回：距离升序优先于频次
        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0].distance, 0);
        assert!(suggestions[0].frequency >= suggestions[1].frequency || suggestions[0].distance < suggestions[1].distance);
        assert_eq!(suggestions.last().unwrap().word, "xyz");
    }

    #[test]
    fn test_substring_discount() {
        let (words, freqs) = dict(&[("大中国", 1)]);
        let suggestions = recommend("中国", &words, &freqs, 1);
        // "大中国" 包含 "中国" 但不是前缀：距离打对折（3/2=1）
        assert_eq!(suggestions[0].distance, 1);
    }

    #[test]
    fn test_bounded_heap_keeps_best() {
        let (words, freqs) = dict(&[
            ("abcd", 1),
            ("abcx", 2),
            ("abxy", 3),
            ("wxyz", 4),
        ]);
        let suggestions = recommend("abc", &words, &freqs, 2);
        assert_eq!(suggestions.len(), 2);
        // 距离最小的两个保留，wxyz 被淘汰
        assert!(suggestions.iter().all(|s| s.word != "wxyz"));
    }

    #[test]
    fn test_empty_input() {
        let (words, freqs) = dict(&[("中国", 1)]);
        assert!(recommend("", &words, &freqs, 5).is_empty());
        assert!(recommend("中", &[], &[], 5).is_empty());
        assert!(recommend("中", &words, &freqs, 0).is_empty());
    }
}
