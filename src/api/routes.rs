//! API Routes
//!
//! Configures the Axum router with the admin endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cleanup_handler, clear_handler, entries_handler, health_handler, invalidate_handler,
    list_caches_handler, load_handler, save_handler, stats_handler, AppState,
};

/// Creates the admin router.
///
/// # Endpoints
/// - `GET /health`
/// - `GET /caches`
/// - `GET /caches/:name/stats`
/// - `GET /caches/:name/entries?limit=N`
/// - `POST /caches/:name/clear`
/// - `POST /caches/:name/cleanup`
/// - `POST /caches/:name/invalidate`
/// - `POST /caches/:name/save`
/// - `POST /caches/:name/load`
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/caches", get(list_caches_handler))
        .route("/caches/:name/stats", get(stats_handler))
        .route("/caches/:name/entries", get(entries_handler))
        .route("/caches/:name/clear", post(clear_handler))
        .route("/caches/:name/cleanup", post(cleanup_handler))
        .route("/caches/:name/invalidate", post(invalidate_handler))
        .route("/caches/:name/save", post(save_handler))
        .route("/caches/:name/load", post(load_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
