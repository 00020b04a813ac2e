//! Two-tier result cache: local LRU + remote key-value / 双层结果缓存
//!
//! 查找顺序：本地 LRU → 远端 → 未命中。远端命中会回填本地。
//! 远端调用前必须先释放本地锁，传输失败只影响缓存，不影响请求。

mod local;
mod remote;

use parking_lot::Mutex;
use serde::Serialize;

use crate::engine::SearchResult;
use local::LocalTier;
use remote::RemoteTier;

/// Which tier produced a hit / 命中的缓存层
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Local,
    Remote,
}

/// Cache statistics / 缓存统计
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub local_hits: u64,
    pub remote_hits: u64,
    pub misses: u64,
    pub local_size: usize,
}

/// 双层缓存：本地 LRU + 远端 KV
pub struct SearchCache {
    local: Mutex<LocalTier>,
    remote: RemoteTier,
}

impl SearchCache {
    pub fn new(redis_host: &str, redis_port: u16, local_capacity: usize, cache_ttl: u64) -> Self {
        Self {
            local: Mutex::new(LocalTier::new(local_capacity)),
            remote: RemoteTier::new(redis_host, redis_port, cache_ttl),
        }
    }

    /// 查询缓存；返回结果与命中的层级
    pub fn get(&self, key: &str) -> Option<(Vec<SearchResult>, CacheTier)> {
        // 1. 本地 LRU
        {
            let mut local = self.local.lock();
            if let Some(results) = local.get(key) {
                local.local_hits += 1;
                return Some((results, CacheTier::Local));
            }
        }

        // 2. 远端（本地锁已释放）
        if let Some(results) = self.remote.get(key) {
            let mut local = self.local.lock();
            local.put(key, results.clone());
            local.remote_hits += 1;
            return Some((results, CacheTier::Remote));
        }

        // 3. 未命中
        self.local.lock().misses += 1;
        None
    }

    /// 同时写入两层
    pub fn put(&self, key: &str, results: &[SearchResult]) {
        self.local.lock().put(key, results.to_vec());
        self.remote.put(key, results);
    }

    /// 统计信息
    pub fn stats(&self) -> CacheStats {
        let local = self.local.lock();
        CacheStats {
            local_hits: local.local_hits,
            remote_hits: local.remote_hits,
            misses: local.misses,
            local_size: local.len(),
        }
    }

    /// 清空本地后删除远端 `search:` 键
    pub fn clear(&self) {
        self.local.lock().clear();
        self.remote.clear();
    }
}
