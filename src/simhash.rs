//! SimHash (64-bit) for near-duplicate detection / SimHash 网页去重
//!
//! 1) 对每个 token 进行 64 位哈希
//! 2) 对每一位累加权重（命中 +1，未命中 -1）
//! 3) 正值置 1，其余置 0，得到 simhash

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

fn hash_token(token: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    hasher.finish()
}

/// Compute the 64-bit SimHash signature of a token sequence / 计算 64 位 SimHash 签名
pub fn simhash64(tokens: &[String]) -> u64 {
    let mut bits = [0i64; 64];
    for token in tokens {
        let h = hash_token(token);
        for (i, slot) in bits.iter_mut().enumerate() {
            if h & (1u64 << i) != 0 {
                *slot += 1;
            } else {
                *slot -= 1;
            }
        }
    }

    let mut out = 0u64;
    for (i, slot) in bits.iter().enumerate() {
        if *slot > 0 {
            out |= 1u64 << i;
        }
    }
    out
}

/// Hamming distance between two signatures / 两个签名的汉明距离
pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}
