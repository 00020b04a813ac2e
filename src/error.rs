//! Unified error type / 统一错误类型
//!
//! Recoverable conditions (cache transport, per-file parse failures) are
//! handled as local fallbacks at the call site; this enum covers the cases
//! that callers need to tell apart.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZhisouError {
    /// XML feed malformed or unreadable / XML 解析失败
    #[error("parse error: {0}")]
    Parse(String),

    /// IO errors / IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache transport errors (degrade silently at call site) / 缓存传输错误
    #[error("cache transport error: {0}")]
    CacheTransport(String),

    /// Serialization errors / 序列化错误
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Dynamic index not available / 动态索引不可用
    #[error("dynamic index not available")]
    DynamicIndexUnavailable,
}

pub type Result<T> = std::result::Result<T, ZhisouError>;
