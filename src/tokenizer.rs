//! Chinese tokenizer - uses jieba-rs for Chinese word segmentation / 中文分词器
//!
//! Supports / 支持：
//! - Chinese word segmentation (jieba, search mode) / 中文分词（搜索引擎模式）
//! - ASCII letters lowercased inside tokens, Chinese kept verbatim / 英文转小写，中文保持不变
//! - Optional user dictionary loaded from a configured directory / 可选用户词典

use jieba_rs::Jieba;
use once_cell::sync::OnceCell;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Global jieba tokenizer instance / 全局 jieba 分词器实例
static JIEBA: OnceCell<Jieba> = OnceCell::new();

/// Initialize the tokenizer with an optional dictionary directory.
/// Looks for `user.dict.utf8` in the directory (cppjieba layout); falls back
/// to the embedded dictionary. Safe to call more than once, the first call
/// wins / 首次调用生效.
pub fn init(dict_dir: &str) {
    if JIEBA.get().is_some() {
        return;
    }
    let mut jieba = Jieba::new();
    if !dict_dir.is_empty() {
        let user_dict = Path::new(dict_dir).join("user.dict.utf8");
        match File::open(&user_dict) {
            Ok(f) => {
                let mut reader = BufReader::new(f);
                if let Err(e) = jieba.load_dict(&mut reader) {
                    tracing::warn!("Failed to load user dict {:?}: {}", user_dict, e);
                } else {
                    tracing::info!("Loaded user dict from {:?}", user_dict);
                }
            }
            Err(_) => {
                tracing::warn!("User dict not found in {:?}, using embedded dict", dict_dir);
            }
        }
    }
    let _ = JIEBA.set(jieba);
}

/// Tokenize text / 对文本进行分词
///
/// Uses jieba search mode for finer granularity / 使用搜索引擎模式，粒度更细
pub fn tokenize(text: &str) -> Vec<String> {
    let jieba = JIEBA.get_or_init(Jieba::new);

    let mut tokens = Vec::new();
    for word in jieba.cut_for_search(text, true) {
        let word = word.trim();
        if word.is_empty() {
            continue;
        }

        // 英文转小写；中文保持不变
        let normalized: String = word
            .chars()
            .map(|c| {
                if c.is_ascii_alphabetic() {
                    c.to_ascii_lowercase()
                } else {
                    c
                }
            })
            .collect();
        tokens.push(normalized);
    }

    tokens
}

/// Tokenize a search query (kept consistent with index tokenization) / 查询分词与索引分词保持一致
pub fn tokenize_query(query: &str) -> Vec<String> {
    tokenize(query)
}
