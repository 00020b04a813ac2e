//! zhisou 命令行入口 / CLI entry
//!
//! 命令：--build-index --build-keywords --query --recommend --serve
//! 查询与推荐在 stdout 输出 JSON 数组，退出码 0 成功 / 1 失败。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use zhisou::config::{load_app_config, AppConfig};
use zhisou::engine::SearchEngine;
use zhisou::index::WeightedInvertedIndex;
use zhisou::keyword;
use zhisou::pipeline;
use zhisou::server;
use zhisou::store::PageStore;
use zhisou::tokenizer;

const DEFAULT_CONFIG_PATH: &str = "./conf/app.conf";

fn print_usage(prog: &str) {
    println!(
        "Usage:\n\
         \x20 {prog} --build-index [config]\n\
         \x20     Build search index from XML files\n\n\
         \x20 {prog} --build-keywords [config]\n\
         \x20     Build keyword dictionary from corpus\n\n\
         \x20 {prog} --query [config] <term1> <term2> ... [topK]\n\
         \x20     Search documents by keywords\n\n\
         \x20 {prog} --recommend [config] <query> [topK]\n\
         \x20     Get keyword recommendations\n\n\
         \x20 {prog} --serve [config]\n\
         \x20     Run the search HTTP service\n\n\
         Config file (optional): defaults to {DEFAULT_CONFIG_PATH}"
    );
}

/// 配置文件参数的启发式判断（含 .conf 或路径分隔符）
fn looks_like_config(arg: &str) -> bool {
    !arg.starts_with('-') && (arg.contains(".conf") || arg.contains('/'))
}

fn load_config(path: &str) -> AppConfig {
    match load_app_config(Path::new(path)) {
        Ok(cfg) => cfg,
        Err(_) => {
            eprintln!("Warning: Could not load config from {}, using defaults", path);
            AppConfig::default()
        }
    }
}

/// 弹出末尾的正整数作为 topK
fn parse_topk(args: &mut Vec<String>, default: usize) -> usize {
    if let Some(last) = args.last() {
        if let Ok(v) = last.parse::<usize>() {
            if v > 0 {
                args.pop();
                return v;
            }
        }
    }
    default
}

fn cmd_build_index(config: &AppConfig) -> i32 {
    tokenizer::init(&config.jieba_dict_dir);

    let xml_files = pipeline::collect_xml_files(Path::new(&config.input_dir));
    if xml_files.is_empty() {
        println!("No XML files found in {}", config.input_dir);
        return 1;
    }

    match pipeline::run(
        &xml_files,
        Path::new(&config.output_dir),
        config.simhash_threshold,
    ) {
        Ok(()) => {
            println!("Index build completed successfully");
            0
        }
        Err(e) => {
            println!("Index build failed: {}", e);
            1
        }
    }
}

fn cmd_build_keywords(config: &AppConfig) -> i32 {
    tokenizer::init(&config.jieba_dict_dir);

    if config.candidates_file.is_empty() {
        println!("CANDIDATES_FILE not configured");
        return 1;
    }

    let dict = match keyword::build_keyword_dict(Path::new(&config.candidates_file)) {
        Ok(dict) => dict,
        Err(e) => {
            println!("Failed to build keyword dictionary: {}", e);
            return 1;
        }
    };

    match keyword::write_keyword_files(&dict, Path::new(&config.keyword_output_dir)) {
        Ok((dict_path, index_path)) => {
            println!("Keyword dictionary built successfully:");
            println!("  Dictionary: {}", dict_path.display());
            println!("  Index:      {}", index_path.display());
            0
        }
        Err(e) => {
            println!("Failed to write keyword files: {}", e);
            1
        }
    }
}

fn cmd_query(config: &AppConfig, terms: Vec<String>, top_k: usize) -> i32 {
    if terms.is_empty() {
        println!("[]");
        return 0;
    }
    tokenizer::init(&config.jieba_dict_dir);

    let index_dir = Path::new(&config.index_dir);
    let index_path = index_dir.join("index.txt");
    let pages_path = index_dir.join("pages.bin");
    let offsets_path = index_dir.join("offsets.bin");

    // 偏移库统计文档总数；缺失时按空结果处理
    let Ok(store) = PageStore::open(&pages_path, &offsets_path) else {
        println!("[]");
        return 0;
    };
    let total_docs = store.len();
    if total_docs == 0 {
        println!("[]");
        return 0;
    }

    let mut index = WeightedInvertedIndex::new();
    if index.load(&index_path, total_docs).is_err() {
        println!("[]");
        return 0;
    }

    let mut engine = match SearchEngine::new(Arc::new(index), &pages_path, &offsets_path) {
        Ok(engine) => engine,
        Err(_) => {
            println!("[]");
            return 0;
        }
    };
    if config.enable_cache {
        engine.enable_cache(
            &config.redis_host,
            config.redis_port,
            config.cache_capacity,
            config.cache_ttl,
        );
    }

    let results = engine.query_ranked(&terms, top_k);
    match serde_json::to_string(&results) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_recommend(config: &AppConfig, input: String, top_k: usize) -> i32 {
    if input.is_empty() {
        println!("[]");
        return 0;
    }

    let mut dict_path = PathBuf::from(&config.keyword_dict_dir);
    if dict_path.is_dir() {
        dict_path = dict_path.join("keyword_dict.txt");
    }

    let Ok(dict) = keyword::load_keyword_dict(&dict_path) else {
        println!("[]");
        return 0;
    };

    let suggestions = keyword::recommend(&input, &dict.words, &dict.frequencies, top_k);
    match serde_json::to_string(&suggestions) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }
    let command = args[1].as_str();

    // 可选的配置文件参数紧跟在命令后
    let mut rest: Vec<String> = args[2..].to_vec();
    let config = if rest.first().map(|a| looks_like_config(a)).unwrap_or(false) {
        let path = rest.remove(0);
        match load_app_config(Path::new(&path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load config from {}: {}", path, e);
                std::process::exit(1);
            }
        }
    } else {
        load_config(DEFAULT_CONFIG_PATH)
    };

    let code = match command {
        "--build-index" => cmd_build_index(&config),
        "--build-keywords" => cmd_build_keywords(&config),
        "--query" => {
            let top_k = parse_topk(&mut rest, config.default_topk);
            cmd_query(&config, rest, top_k)
        }
        "--recommend" => {
            let top_k = parse_topk(&mut rest, config.recommend_topk);
            cmd_recommend(&config, rest.join(" "), top_k)
        }
        "--serve" => match server::run_server(config).await {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        _ => {
            eprintln!("Unknown command: {}\n", command);
            print_usage(&args[0]);
            1
        }
    };
    std::process::exit(code);
}
