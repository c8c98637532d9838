//! Mini Memo - an embeddable memoization cache
//!
//! Get-or-compute caching with TTL and sliding TTL, LRU/LFU/FIFO eviction,
//! tag-based invalidation, single-flight deduplication of async computations
//! and crash-safe JSON persistence. An axum admin API operates on named
//! caches through the registry.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod persist;
pub mod registry;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{
    CacheConfig, CacheEntry, CacheInstance, CacheStats, EvictionStrategy, PutOutcome,
    RemovalCause, StaleReason,
};
pub use config::Config;
pub use error::{CacheError, Result};
pub use persist::{LoadOutcome, SaveOutcome, SaveReport, ValidationError};
pub use registry::{CacheRegistry, EntryInfo, ManagedCache};
pub use tasks::spawn_cleanup_task;
