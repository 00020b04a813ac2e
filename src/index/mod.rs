//! Inverted index module / 倒排索引模块
//!
//! - `weighted`: TF-IDF weighted index built offline, read-only online
//! - `dynamic`: real-time index with tombstone deletion and compaction

pub mod dynamic;
pub mod weighted;

pub use dynamic::{DocumentMeta, DynamicIndexStats, DynamicInvertedIndex};
pub use weighted::WeightedInvertedIndex;
