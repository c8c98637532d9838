//! Configuration Module
//!
//! Loads the admin server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::cache::{CacheConfig, EvictionStrategy};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Registry name of the served cache
    pub cache_name: String,
    /// Persistence file; memory only when unset
    pub cache_file: Option<PathBuf>,
    /// Maximum entries; unbounded when unset
    pub cache_capacity: Option<usize>,
    /// Entry lifetime in seconds; no expiry when unset
    pub cache_ttl: Option<u64>,
    pub cache_eviction: EvictionStrategy,
    /// Functional version token
    pub cache_version: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `CACHE_NAME` - Name of the served cache (default: "default")
    /// - `CACHE_FILE` - Persistence file path (default: unset)
    /// - `CACHE_CAPACITY` - Maximum entries (default: unset)
    /// - `CACHE_TTL` - Entry lifetime in seconds (default: unset)
    /// - `CACHE_EVICTION` - lru, lfu, fifo or none (default: lru)
    /// - `CACHE_VERSION` - Functional version token (default: unset)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            server_port: parse_or(&text, "SERVER_PORT", defaults.server_port),
            cleanup_interval: parse_or(&text, "CLEANUP_INTERVAL", defaults.cleanup_interval),
            cache_name: text("CACHE_NAME").unwrap_or(defaults.cache_name),
            cache_file: text("CACHE_FILE").map(PathBuf::from),
            cache_capacity: parse_opt(&text, "CACHE_CAPACITY"),
            cache_ttl: parse_opt(&text, "CACHE_TTL"),
            cache_eviction: parse_or(&text, "CACHE_EVICTION", defaults.cache_eviction),
            cache_version: text("CACHE_VERSION"),
        }
    }

    /// Cache settings described by this configuration.
    pub fn cache_config<K, V>(&self) -> CacheConfig<K, V> {
        let mut config = CacheConfig::default().with_eviction_strategy(self.cache_eviction);
        if let Some(capacity) = self.cache_capacity {
            config = config.with_capacity(capacity);
        }
        if let Some(ttl) = self.cache_ttl {
            config = config.with_ttl(Duration::from_secs(ttl));
        }
        if let Some(version) = &self.cache_version {
            config = config.with_version(version.clone());
        }
        if let Some(path) = &self.cache_file {
            config = config.with_file_path(path.clone());
        }
        config
    }
}

fn parse_opt<T: FromStr>(text: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = text(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {}={:?}", name, raw);
            None
        }
    }
}

fn parse_or<T: FromStr>(text: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    parse_opt(text, name).unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cleanup_interval: 1,
            cache_name: "default".to_string(),
            cache_file: None,
            cache_capacity: None,
            cache_ttl: None,
            cache_eviction: EvictionStrategy::Lru,
            cache_version: None,
        }
    }
}
