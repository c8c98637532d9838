//! API Module
//!
//! HTTP handlers and routing for the cache admin API. Every route except
//! `/health` and `/caches` addresses one registered cache by name.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
