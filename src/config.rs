//! Application configuration module / 应用配置模块
//!
//! Loads `key=value` config files (`#` comments and blank lines ignored).
//! Malformed integers silently keep their defaults / 非法整数静默保留默认值.

use std::path::Path;

/// Application configuration / 应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Jieba user dictionary directory (empty = embedded dict) / 结巴词典目录
    pub jieba_dict_dir: String,

    /// XML input directory for offline builds / 离线构建的 XML 输入目录
    pub input_dir: String,
    /// Index output directory / 索引输出目录
    pub output_dir: String,
    /// SimHash dedup threshold in bits / SimHash 去重阈值
    pub simhash_threshold: u32,

    /// Candidate word file or directory / 候选词文件或目录
    pub candidates_file: String,
    /// Keyword dictionary output directory / 关键词字典输出目录
    pub keyword_output_dir: String,

    /// Index file directory for queries / 查询使用的索引目录
    pub index_dir: String,
    /// Default number of results / 默认返回结果数
    pub default_topk: usize,

    /// Keyword dictionary directory / 关键词字典目录
    pub keyword_dict_dir: String,
    /// Default number of suggestions / 默认推荐数量
    pub recommend_topk: usize,

    /// Server host / 服务器监听地址
    pub web_host: String,
    /// Server port / 服务器端口
    pub web_port: u16,

    /// Enable the result cache / 是否启用结果缓存
    pub enable_cache: bool,
    /// Redis host / Redis 地址
    pub redis_host: String,
    /// Redis port / Redis 端口
    pub redis_port: u16,
    /// Local LRU capacity / 本地 LRU 容量
    pub cache_capacity: usize,
    /// Remote cache TTL in seconds / 远端缓存过期时间（秒）
    pub cache_ttl: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jieba_dict_dir: String::new(),
            input_dir: "./input".to_string(),
            output_dir: "./output".to_string(),
            simhash_threshold: 3,
            candidates_file: String::new(),
            keyword_output_dir: "./docs".to_string(),
            index_dir: "./output".to_string(),
            default_topk: 20,
            keyword_dict_dir: "./docs".to_string(),
            recommend_topk: 5,
            web_host: "0.0.0.0".to_string(),
            web_port: 8080,
            enable_cache: true,
            redis_host: "127.0.0.1".to_string(),
            redis_port: 6379,
            cache_capacity: 1000,
            cache_ttl: 3600,
        }
    }
}

impl AppConfig {
    /// Get the server bind address / 获取服务器绑定地址
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.web_host, self.web_port)
    }

    fn apply(&mut self, key: &str, val: &str) {
        match key {
            "JIEBA_DICT_DIR" => self.jieba_dict_dir = val.to_string(),
            "INPUT_DIR" => self.input_dir = val.to_string(),
            "OUTPUT_DIR" => self.output_dir = val.to_string(),
            "SIMHASH_THRESHOLD" => {
                if let Ok(v) = val.parse() {
                    self.simhash_threshold = v;
                }
            }
            "CANDIDATES_FILE" => self.candidates_file = val.to_string(),
            "KEYWORD_OUTPUT_DIR" => self.keyword_output_dir = val.to_string(),
            "INDEX_DIR" => self.index_dir = val.to_string(),
            "DEFAULT_TOPK" => {
                if let Ok(v) = val.parse() {
                    self.default_topk = v;
                }
            }
            "KEYWORD_DICT_DIR" => self.keyword_dict_dir = val.to_string(),
            "RECOMMEND_TOPK" => {
                if let Ok(v) = val.parse() {
                    self.recommend_topk = v;
                }
            }
            "WEB_HOST" => self.web_host = val.to_string(),
            "WEB_PORT" => {
                if let Ok(v) = val.parse() {
                    self.web_port = v;
                }
            }
            "ENABLE_CACHE" => {
                self.enable_cache = matches!(val, "true" | "1" | "yes");
            }
            "REDIS_HOST" => self.redis_host = val.to_string(),
            "REDIS_PORT" => {
                if let Ok(v) = val.parse() {
                    self.redis_port = v;
                }
            }
            "CACHE_CAPACITY" => {
                if let Ok(v) = val.parse() {
                    self.cache_capacity = v;
                }
            }
            "CACHE_TTL" => {
                if let Ok(v) = val.parse() {
                    self.cache_ttl = v;
                }
            }
            _ => {}
        }
    }
}

/// Load configuration from a `key=value` file / 从配置文件加载应用配置
pub fn load_app_config(path: &Path) -> std::io::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;

    let mut config = AppConfig::default();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, val)) = line.split_once('=') else {
            continue;
        };
        config.apply(key.trim(), val.trim());
    }

    tracing::info!("Loaded configuration from {:?}", path);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.conf");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "# 注释行").unwrap();
        writeln!(f, "INPUT_DIR = ./xml").unwrap();
        writeln!(f, "SIMHASH_THRESHOLD=5").unwrap();
        writeln!(f, "DEFAULT_TOPK=abc").unwrap();
        writeln!(f, "ENABLE_CACHE=yes").unwrap();
        writeln!(f, "WEB_PORT=9090").unwrap();
        writeln!(f).unwrap();

        let cfg = load_app_config(&path).unwrap();
        assert_eq!(cfg.input_dir, "./xml");
        assert_eq!(cfg.simhash_threshold, 5);
        // 非法整数保留默认值
        assert_eq!(cfg.default_topk, 20);
        assert!(cfg.enable_cache);
        assert_eq!(cfg.web_port, 9090);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_app_config(Path::new("/no/such/app.conf")).is_err());
    }

    #[test]
    fn test_cache_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.conf");
        std::fs::write(&path, "ENABLE_CACHE=false\n").unwrap();
        let cfg = load_app_config(&path).unwrap();
        assert!(!cfg.enable_cache);
    }
}
