//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::persist::{LoadOutcome, SaveOutcome};
use crate::registry::{CacheSettings, EntryInfo};

/// One registered cache, as listed by GET /caches
#[derive(Debug, Clone, Serialize)]
pub struct CacheSummary {
    pub name: String,
    pub entries: usize,
    pub settings: CacheSettings,
}

/// Response body for GET /caches
#[derive(Debug, Clone, Serialize)]
pub struct CacheListResponse {
    pub caches: Vec<CacheSummary>,
}

/// Response body for GET /caches/:name/stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub name: String,
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(name: impl Into<String>, stats: CacheStats) -> Self {
        Self {
            name: name.into(),
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for GET /caches/:name/entries
#[derive(Debug, Clone, Serialize)]
pub struct EntriesResponse {
    pub name: String,
    /// Entries in the cache, before any limit
    pub total: usize,
    pub entries: Vec<EntryInfo>,
}

/// Response body for clear, cleanup and invalidate
#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
}

impl ActionResponse {
    pub fn cleared(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            message: format!("Cache '{}' cleared", name),
            name,
            removed: None,
        }
    }

    pub fn removed(name: impl Into<String>, action: &str, removed: usize) -> Self {
        let name = name.into();
        Self {
            message: format!("{} removed {} entries from '{}'", action, removed, name),
            name,
            removed: Some(removed),
        }
    }
}

/// Response body for POST /caches/:name/save
#[derive(Debug, Clone, Serialize)]
pub struct SaveResponse {
    pub name: String,
    pub outcome: SaveOutcome,
}

/// Response body for POST /caches/:name/load
#[derive(Debug, Clone, Serialize)]
pub struct LoadResponse {
    pub name: String,
    pub outcome: LoadOutcome,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// Number of registered caches
    pub caches: usize,
}

impl HealthResponse {
    pub fn healthy(caches: usize) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            caches,
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
