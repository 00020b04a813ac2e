//! Local LRU tier / 本地 LRU 缓存层
//!
//! LRU 本体与统计计数器放在同一把互斥锁下，保证
//! "访问即更新位置" 与计数的原子性。

use lru::LruCache;
use std::num::NonZeroUsize;

use crate::engine::SearchResult;

/// Tier-1 state guarded by the cache mutex / 一级缓存状态
pub(crate) struct LocalTier {
    lru: LruCache<String, Vec<SearchResult>>,
    pub local_hits: u64,
    pub remote_hits: u64,
    pub misses: u64,
}

impl LocalTier {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity >= 1");
        Self {
            lru: LruCache::new(capacity),
            local_hits: 0,
            remote_hits: 0,
            misses: 0,
        }
    }

    /// 命中时条目移动到 MRU
    pub fn get(&mut self, key: &str) -> Option<Vec<SearchResult>> {
        self.lru.get(key).cloned()
    }

    /// 已存在则更新并移动到 MRU，超容量淘汰 LRU
    pub fn put(&mut self, key: &str, results: Vec<SearchResult>) {
        self.lru.put(key.to_string(), results);
    }

    pub fn len(&self) -> usize {
        self.lru.len()
    }

    pub fn clear(&mut self) {
        self.lru.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(docid: i32) -> Vec<SearchResult> {
        vec![SearchResult {
            docid,
            score: 1.0,
            title: format!("doc {}", docid),
            link: String::new(),
            summary: String::new(),
        }]
    }

    #[test]
    fn test_put_get() {
        let mut tier = LocalTier::new(4);
        tier.put("k1", result(1));
        assert_eq!(tier.get("k1").unwrap()[0].docid, 1);
        assert!(tier.get("k2").is_none());
    }

    #[test]
    fn test_lru_eviction() {
        let mut tier = LocalTier::new(2);
        tier.put("a", result(1));
        tier.put("b", result(2));
        // 访问 a，b 成为最久未使用
        tier.get("a");
        tier.put("c", result(3));
        assert!(tier.get("a").is_some());
        assert!(tier.get("b").is_none());
        assert!(tier.get("c").is_some());
        assert_eq!(tier.len(), 2);
    }

    #[test]
    fn test_update_existing_key() {
        let mut tier = LocalTier::new(2);
        tier.put("a", result(1));
        tier.put("a", result(9));
        assert_eq!(tier.get("a").unwrap()[0].docid, 9);
        assert_eq!(tier.len(), 1);
    }
}
