//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::cache::{Cache, CacheOptions, Ttl};
use crate::config::Config;
use crate::error::Result;
use crate::models::{
    DeleteResponse, ErrorResponse, GetResponse, HealthResponse, KeysRequest, KeysResponse,
    MgetResponse, MsetRequest, SetRequest, SetResponse, StatsResponse, TtlResponse,
};
use crate::store::MemoryStore;

/// Application state shared across all handlers.
///
/// The facade owns the store through a trait object; `memory` keeps the
/// concrete handle for statistics and the cleanup task.
#[derive(Clone)]
pub struct AppState {
    pub cache: Cache,
    pub memory: Arc<MemoryStore>,
}

impl AppState {
    pub fn new(store: MemoryStore, options: CacheOptions) -> Self {
        let memory = Arc::new(store);
        Self {
            cache: Cache::with_store(memory.clone(), options),
            memory,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            MemoryStore::from_config(config),
            CacheOptions::from_config(config),
        )
    }
}

/// Handler for PUT /set
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    req.validate()?;

    state
        .cache
        .set(&req.key, req.value, req.ttl.map(Ttl::Fixed))
        .await?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// Answers 404 when the key is absent or expired.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response> {
    let response = match state.cache.get(&key).await? {
        Some(value) => Json(GetResponse::new(key, value)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Key not found: {}", key))),
        )
            .into_response(),
    };

    Ok(response)
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.cache.del(&key).await?;
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /mget
pub async fn mget_handler(
    State(state): State<AppState>,
    Json(req): Json<KeysRequest>,
) -> Result<Json<MgetResponse>> {
    let values = state.cache.mget(&req.key_refs()).await?;
    Ok(Json(MgetResponse { values }))
}

/// Handler for PUT /mset
pub async fn mset_handler(
    State(state): State<AppState>,
    Json(req): Json<MsetRequest>,
) -> Result<StatusCode> {
    req.validate()?;

    state.cache.mset(req.pairs, req.ttl).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /mdel
pub async fn mdel_handler(
    State(state): State<AppState>,
    Json(req): Json<KeysRequest>,
) -> Result<StatusCode> {
    state.cache.mdel(&req.key_refs()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /keys
pub async fn keys_handler(State(state): State<AppState>) -> Result<Json<KeysResponse>> {
    let mut keys = state.cache.keys().await?;
    keys.sort();
    Ok(Json(KeysResponse { keys }))
}

/// Handler for GET /ttl/:key
pub async fn ttl_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<TtlResponse>> {
    let ttl = state.cache.ttl(&key).await?;
    Ok(Json(TtlResponse { key, ttl }))
}

/// Handler for DELETE /reset
pub async fn reset_handler(State(state): State<AppState>) -> Result<StatusCode> {
    state.cache.reset().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.memory.stats().await;
    Json(StatsResponse::new(&stats, state.cache.in_flight()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
