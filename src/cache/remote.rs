//! Remote key-value tier / 远端键值缓存层
//!
//! 通过 redis 访问，键统一加 `search:` 前缀，条目带 TTL。
//! 连接失败静默降级，下次访问时惰性重连。

use parking_lot::Mutex;
use redis::{Client, Commands, Connection};
use std::time::Duration;

use crate::engine::SearchResult;

const KEY_PREFIX: &str = "search:";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) struct RemoteTier {
    host: String,
    port: u16,
    ttl: u64,
    conn: Mutex<Option<Connection>>,
}

impl RemoteTier {
    pub fn new(host: &str, port: u16, ttl: u64) -> Self {
        let tier = Self {
            host: host.to_string(),
            port,
            ttl,
            conn: Mutex::new(None),
        };
        // 启动时尝试连接一次，失败不阻塞
        let mut guard = tier.conn.lock();
        *guard = tier.connect();
        drop(guard);
        tier
    }

    fn connect(&self) -> Option<Connection> {
        let url = format!("redis://{}:{}/", self.host, self.port);
        let client = match Client::open(url) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Remote cache client error: {}", e);
                return None;
            }
        };
        match client.get_connection_with_timeout(CONNECT_TIMEOUT) {
            Ok(mut conn) => {
                // 测试连接
                match redis::cmd("PING").query::<String>(&mut conn) {
                    Ok(_) => {
                        tracing::info!(
                            "Connected to remote cache at {}:{}",
                            self.host,
                            self.port
                        );
                        Some(conn)
                    }
                    Err(e) => {
                        tracing::warn!("Remote cache ping failed: {}", e);
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Remote cache connection to {}:{} failed: {}",
                    self.host,
                    self.port,
                    e
                );
                None
            }
        }
    }

    /// 读取并反序列化；传输错误丢弃连接，下次访问重连
    pub fn get(&self, key: &str) -> Option<Vec<SearchResult>> {
        let mut guard = self.conn.lock();
        if guard.is_none() {
            *guard = self.connect();
        }
        let conn = guard.as_mut()?;

        let cache_key = format!("{}{}", KEY_PREFIX, key);
        match conn.get::<_, Option<String>>(&cache_key) {
            Ok(Some(payload)) => serde_json::from_str(&payload).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Remote cache get failed: {}", e);
                *guard = None;
                None
            }
        }
    }

    /// 序列化失败跳过写入；传输错误丢弃连接
    pub fn put(&self, key: &str, results: &[SearchResult]) {
        let payload = match serde_json::to_string(results) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Skip caching, serialization failed: {}", e);
                return;
            }
        };

        let mut guard = self.conn.lock();
        if guard.is_none() {
            *guard = self.connect();
        }
        let Some(conn) = guard.as_mut() else {
            return;
        };

        let cache_key = format!("{}{}", KEY_PREFIX, key);
        let outcome = redis::cmd("SET")
            .arg(&cache_key)
            .arg(payload)
            .arg("EX")
            .arg(self.ttl)
            .query::<()>(conn);
        if let Err(e) = outcome {
            tracing::warn!("Remote cache put failed: {}", e);
            *guard = None;
        }
    }

    /// 删除所有 `search:` 前缀的键
    pub fn clear(&self) {
        let mut guard = self.conn.lock();
        if guard.is_none() {
            *guard = self.connect();
        }
        let Some(conn) = guard.as_mut() else {
            return;
        };

        match conn.keys::<_, Vec<String>>(format!("{}*", KEY_PREFIX)) {
            Ok(keys) => {
                for key in keys {
                    if let Err(e) = conn.del::<_, ()>(&key) {
                        tracing::warn!("Remote cache del failed: {}", e);
                        *guard = None;
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Remote cache clear failed: {}", e);
                *guard = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 远端不可达时的静默降级（无 redis 服务的环境下恒为未命中）
    #[test]
    fn test_degrades_without_server() {
        let tier = RemoteTier::new("127.0.0.1", 1, 60);
        assert!(tier.get("anything").is_none());
        tier.put("anything", &[]);
        tier.clear();
    }
}
