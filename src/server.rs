//! Search HTTP service / 搜索 HTTP 服务
//!
//! 端点：
//! - GET  /health /search /recommend /cache/stats /index/stats
//! - POST /cache/clear /index/add /index/batch/add /index/compact /index/save
//! - PUT  /index/:docid   DELETE /index/:docid
//!
//! /search 合并静态索引与动态索引结果，docid 冲突时动态索引优先。

use axum::extract::{Extension, Path as UrlPath, Query};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::engine::{SearchEngine, SearchResult};
use crate::error::ZhisouError;
use crate::index::{DocumentMeta, DynamicInvertedIndex, WeightedInvertedIndex};
use crate::keyword::{self, KeywordDict};
use crate::store::clean_utf8;
use crate::tokenizer;

/// Shared service state / 服务共享状态
pub struct ServerState {
    pub engine: SearchEngine,
    pub dynamic: Option<DynamicInvertedIndex>,
    pub keywords: Option<KeywordDict>,
    pub config: AppConfig,
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    topk: Option<usize>,
}

#[derive(Deserialize)]
struct AddDocRequest {
    docid: i32,
    text: String,
    title: Option<String>,
    link: Option<String>,
    summary: Option<String>,
}

#[derive(Deserialize)]
struct BatchAddRequest {
    documents: Vec<AddDocRequest>,
}

#[derive(Deserialize)]
struct UpdateDocRequest {
    text: String,
}

fn dynamic_unavailable() -> Json<Value> {
    Json(json!({
        "success": false,
        "error": ZhisouError::DynamicIndexUnavailable.to_string(),
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "zhisou" }))
}

/// 搜索端点：静态 + 动态索引合并
async fn search(
    Extension(state): Extension<Arc<ServerState>>,
    Query(params): Query<SearchParams>,
) -> Json<Value> {
    let query = params.q.unwrap_or_default();
    let top_k = params.topk.unwrap_or(20).clamp(1, 100);

    if query.is_empty() {
        return Json(json!({ "error": "Query is empty", "results": [] }));
    }

    let terms = tokenizer::tokenize_query(&query);
    if terms.is_empty() {
        return Json(json!({ "query": query, "results": [] }));
    }

    // 1) 静态索引结果（取 2 倍候选，合并后再截断）
    let mut all_results: Vec<SearchResult> = Vec::new();
    let mut dynamic_ids: HashSet<i32> = HashSet::new();

    // 2) 动态索引结果；docid 冲突时动态优先
    if let Some(dynamic) = &state.dynamic {
        for (docid, score) in dynamic.search_and_cosine_ranked(&terms) {
            dynamic_ids.insert(docid);
            let meta = dynamic.get_meta(docid).unwrap_or_default();
            all_results.push(SearchResult {
                docid,
                score,
                title: if meta.title.is_empty() {
                    format!("[动态索引] Doc {}", docid)
                } else {
                    meta.title
                },
                link: if meta.link.is_empty() {
                    format!("#/doc/{}", docid)
                } else {
                    meta.link
                },
                summary: if meta.summary.is_empty() {
                    "通过API动态添加的文档".to_string()
                } else {
                    meta.summary
                },
            });
        }
    }

    for result in state.engine.query_ranked(&terms, top_k * 2) {
        if !dynamic_ids.contains(&result.docid) {
            all_results.push(result);
        }
    }

    // 3) 按分数排序取 topK
    all_results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.docid.cmp(&b.docid))
    });
    all_results.truncate(top_k);

    let results: Vec<Value> = all_results
        .iter()
        .map(|r| {
            json!({
                "docid": r.docid,
                "score": r.score,
                "title": clean_utf8(r.title.as_bytes()),
                "link": clean_utf8(r.link.as_bytes()),
                "summary": clean_utf8(r.summary.as_bytes()),
            })
        })
        .collect();

    Json(json!({
        "query": query,
        "count": results.len(),
        "results": results,
        "sources": {
            "static_index": true,
            "dynamic_index": state.dynamic.is_some(),
        },
    }))
}

/// 关键词推荐端点
async fn recommend(
    Extension(state): Extension<Arc<ServerState>>,
    Query(params): Query<SearchParams>,
) -> Json<Value> {
    let Some(dict) = &state.keywords else {
        return Json(json!({ "error": "Keyword dictionary not loaded", "suggestions": [] }));
    };

    let query = params.q.unwrap_or_default();
    let top_k = params
        .topk
        .unwrap_or(state.config.recommend_topk)
        .clamp(1, 20);
    if query.is_empty() {
        return Json(json!({ "query": "", "suggestions": [] }));
    }

    let suggestions = keyword::recommend(&query, &dict.words, &dict.frequencies, top_k);
    Json(json!({ "query": query, "suggestions": suggestions }))
}

async fn cache_stats(Extension(state): Extension<Arc<ServerState>>) -> Json<Value> {
    let Some(stats) = state.engine.cache_stats() else {
        return Json(json!({ "enabled": false }));
    };
    let total = stats.local_hits + stats.remote_hits + stats.misses;
    let hit_rate = if total > 0 {
        (stats.local_hits + stats.remote_hits) as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    Json(json!({
        "enabled": true,
        "local_hits": stats.local_hits,
        "remote_hits": stats.remote_hits,
        "misses": stats.misses,
        "total_requests": total,
        "hit_rate": hit_rate,
        "local_cache_size": stats.local_size,
    }))
}

async fn cache_clear(Extension(state): Extension<Arc<ServerState>>) -> Json<Value> {
    state.engine.clear_cache();
    Json(json!({ "success": true, "message": "Cache cleared" }))
}

async fn index_add(
    Extension(state): Extension<Arc<ServerState>>,
    Json(body): Json<AddDocRequest>,
) -> Json<Value> {
    let Some(dynamic) = &state.dynamic else {
        return dynamic_unavailable();
    };

    add_one(dynamic, body.docid, body);
    Json(json!({ "success": true, "message": "Document added to index" }))
}

fn add_one(dynamic: &DynamicInvertedIndex, docid: i32, doc: AddDocRequest) {
    if doc.title.is_some() || doc.link.is_some() {
        dynamic.add_with_meta(
            docid,
            DocumentMeta {
                title: doc.title.unwrap_or_default(),
                link: doc.link.unwrap_or_default(),
                summary: doc.summary.unwrap_or_default(),
                text: doc.text,
            },
        );
    } else {
        dynamic.add(docid, &doc.text);
    }
}

async fn index_batch_add(
    Extension(state): Extension<Arc<ServerState>>,
    Json(body): Json<BatchAddRequest>,
) -> Json<Value> {
    let Some(dynamic) = &state.dynamic else {
        return dynamic_unavailable();
    };

    let mut added = 0usize;
    for doc in body.documents {
        let docid = doc.docid;
        add_one(dynamic, docid, doc);
        added += 1;
    }
    Json(json!({ "success": true, "count": added }))
}

async fn index_update(
    Extension(state): Extension<Arc<ServerState>>,
    UrlPath(docid): UrlPath<i32>,
    Json(body): Json<UpdateDocRequest>,
) -> Json<Value> {
    let Some(dynamic) = &state.dynamic else {
        return dynamic_unavailable();
    };
    dynamic.update(docid, &body.text);
    Json(json!({ "success": true, "docid": docid }))
}

async fn index_remove(
    Extension(state): Extension<Arc<ServerState>>,
    UrlPath(docid): UrlPath<i32>,
) -> Json<Value> {
    let Some(dynamic) = &state.dynamic else {
        return dynamic_unavailable();
    };
    dynamic.remove(docid);
    Json(json!({ "success": true, "docid": docid }))
}

async fn index_stats(Extension(state): Extension<Arc<ServerState>>) -> Json<Value> {
    let Some(dynamic) = &state.dynamic else {
        return Json(json!({ "available": false }));
    };
    let stats = dynamic.stats();
    Json(json!({
        "available": true,
        "total_docs": stats.total_docs,
        "active_docs": stats.active_docs,
        "deleted_docs": stats.deleted_docs,
        "total_terms": stats.total_terms,
        "needs_compaction": dynamic.needs_compaction(),
    }))
}

async fn index_compact(Extension(state): Extension<Arc<ServerState>>) -> Json<Value> {
    let Some(dynamic) = &state.dynamic else {
        return dynamic_unavailable();
    };
    let before = dynamic.stats();
    dynamic.compact();
    let after = dynamic.stats();
    Json(json!({
        "success": true,
        "docs_removed": before.deleted_docs,
        "active_docs": after.active_docs,
    }))
}

async fn index_save(Extension(state): Extension<Arc<ServerState>>) -> Json<Value> {
    let Some(dynamic) = &state.dynamic else {
        return dynamic_unavailable();
    };
    let save_path = Path::new(&state.config.index_dir).join("index_updated.txt");
    match dynamic.save(&save_path) {
        Ok(()) => Json(json!({
            "success": true,
            "path": save_path.to_string_lossy(),
        })),
        Err(e) => Json(json!({ "success": false, "error": e.to_string() })),
    }
}

/// Build the router / 构建路由
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/search", get(search))
        .route("/recommend", get(recommend))
        .route("/cache/stats", get(cache_stats))
        .route("/cache/clear", post(cache_clear))
        .route("/index/add", post(index_add))
        .route("/index/batch/add", post(index_batch_add))
        .route("/index/:docid", put(index_update).delete(index_remove))
        .route("/index/stats", get(index_stats))
        .route("/index/compact", post(index_compact))
        .route("/index/save", post(index_save))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

/// Load indexes and run the service / 加载索引并启动服务
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    tokenizer::init(&config.jieba_dict_dir);

    let index_dir = Path::new(&config.index_dir);
    let index_path = index_dir.join("index.txt");
    let pages_path = index_dir.join("pages.bin");
    let offsets_path = index_dir.join("offsets.bin");

    // 静态索引：文档数来自偏移库
    let mut index = WeightedInvertedIndex::new();
    let mut engine = {
        let probe = crate::store::PageStore::open(&pages_path, &offsets_path)
            .map_err(|e| anyhow::anyhow!("search index not found: {}", e))?;
        let total_docs = probe.len();
        if total_docs == 0 {
            anyhow::bail!("search index not found or empty");
        }
        index.load(&index_path, total_docs)?;
        tracing::info!("Search index loaded: {} documents", total_docs);
        SearchEngine::new(Arc::new(index), &pages_path, &offsets_path)?
    };

    if config.enable_cache {
        engine.enable_cache(
            &config.redis_host,
            config.redis_port,
            config.cache_capacity,
            config.cache_ttl,
        );
        tracing::info!(
            "Cache enabled: remote={}:{}, capacity={}, ttl={}s",
            config.redis_host,
            config.redis_port,
            config.cache_capacity,
            config.cache_ttl
        );
    }

    // 动态索引：加载失败只禁用更新，不影响静态检索
    let dynamic = {
        let idx = DynamicInvertedIndex::new();
        match idx.load(&index_path, engine.doc_count()) {
            Ok(()) => {
                tracing::info!("Dynamic index initialized");
                Some(idx)
            }
            Err(e) => {
                tracing::warn!("Dynamic index initialization failed, updates disabled: {}", e);
                None
            }
        }
    };

    // 关键词字典：可选
    let keywords = {
        let mut dict_path = std::path::PathBuf::from(&config.keyword_dict_dir);
        if dict_path.is_dir() {
            dict_path = dict_path.join("keyword_dict.txt");
        }
        match keyword::load_keyword_dict(&dict_path) {
            Ok(dict) => {
                tracing::info!("Keyword dictionary loaded: {} words", dict.len());
                Some(dict)
            }
            Err(e) => {
                tracing::warn!("Keyword dictionary not loaded: {}", e);
                None
            }
        }
    };

    let state = Arc::new(ServerState {
        engine,
        dynamic,
        keywords,
        config: config.clone(),
    });
    let app = build_router(state);

    let addr = config.bind_address();
    tracing::info!("zhisou service (built {}) listening on {}", env!("BUILD_TIME"), addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
