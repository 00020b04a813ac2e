//! Keyword dictionary and suggestion module / 关键词字典与推荐模块
//!
//! - `dict`: 离线构建词频字典与字符索引
//! - `recommend`: 前缀优先、编辑距离兜底的联想推荐

pub mod dict;
pub mod recommend;

pub use dict::{build_keyword_dict, load_keyword_dict, write_keyword_files, KeywordDict};
pub use recommend::{recommend, KeywordSuggestion};
