//! API Handlers
//!
//! HTTP request handlers for the admin endpoints. Every cache-specific handler
//! resolves the cache by name from the registry first.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::info;

use crate::error::{CacheError, Result};
use crate::models::{
    ActionResponse, CacheListResponse, CacheSummary, EntriesQuery, EntriesResponse,
    HealthResponse, InvalidateRequest, LoadResponse, SaveResponse, StatsResponse,
};
use crate::registry::{CacheRegistry, ManagedCache};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CacheRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<CacheRegistry>) -> Self {
        Self { registry }
    }
}

/// Runs a file operation off the async worker threads.
async fn blocking<T, F>(cache: Arc<dyn ManagedCache>, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn ManagedCache) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(cache.as_ref()))
        .await
        .map_err(|e| CacheError::Internal(format!("file task failed: {}", e)))?
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.registry.len()))
}

/// Handler for GET /caches
pub async fn list_caches_handler(State(state): State<AppState>) -> Json<CacheListResponse> {
    let caches = state
        .registry
        .names()
        .into_iter()
        .filter_map(|name| {
            let cache = state.registry.get(&name)?;
            Some(CacheSummary {
                entries: cache.len(),
                settings: cache.settings(),
                name,
            })
        })
        .collect();

    Json(CacheListResponse { caches })
}

/// Handler for GET /caches/:name/stats
pub async fn stats_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StatsResponse>> {
    let cache = state.registry.require(&name)?;
    Ok(Json(StatsResponse::new(name, cache.stats())))
}

/// Handler for GET /caches/:name/entries
pub async fn entries_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<EntriesQuery>,
) -> Result<Json<EntriesResponse>> {
    let cache = state.registry.require(&name)?;
    let mut entries = cache.list_entries();
    let total = entries.len();
    if let Some(limit) = query.limit {
        entries.truncate(limit);
    }

    Ok(Json(EntriesResponse {
        name,
        total,
        entries,
    }))
}

/// Handler for POST /caches/:name/clear
pub async fn clear_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ActionResponse>> {
    let cache = state.registry.require(&name)?;
    cache.clear();
    info!("Cache '{}' cleared via admin API", name);
    Ok(Json(ActionResponse::cleared(name)))
}

/// Handler for POST /caches/:name/cleanup
pub async fn cleanup_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ActionResponse>> {
    let cache = state.registry.require(&name)?;
    let removed = cache.cleanup_expired();
    Ok(Json(ActionResponse::removed(name, "Cleanup", removed)))
}

/// Handler for POST /caches/:name/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<ActionResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let cache = state.registry.require(&name)?;
    let removed = cache.invalidate_by_tags(&req.tags, req.all_must_match)?;
    info!(
        "Invalidated {} entries in '{}' by tags {:?} (all_must_match={})",
        removed, name, req.tags, req.all_must_match
    );
    Ok(Json(ActionResponse::removed(name, "Invalidation", removed)))
}

/// Handler for POST /caches/:name/save
pub async fn save_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SaveResponse>> {
    let cache = state.registry.require(&name)?;
    let outcome = blocking(cache, |c| c.save()).await?;
    Ok(Json(SaveResponse { name, outcome }))
}

/// Handler for POST /caches/:name/load
pub async fn load_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<LoadResponse>> {
    let cache = state.registry.require(&name)?;
    let outcome = blocking(cache, |c| c.load()).await?;
    Ok(Json(LoadResponse { name, outcome }))
}
