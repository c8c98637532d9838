//! Cache Registry
//!
//! Named, type-erased handles to cache instances so background tasks and the
//! admin API can operate on caches without knowing their key or value types.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{CacheInstance, CacheKey, CacheStats, CacheValue, EvictionStrategy, Fields};
use crate::error::{CacheError, Result};
use crate::persist::{stringify_key, LoadOutcome, SaveOutcome};

// == Entry Info ==
/// JSON-friendly view of one entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub key: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub age_ms: u64,
    pub entry_version: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Fields::is_empty")]
    pub fields: Fields,
}

/// Static settings of a registered cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSettings {
    pub eviction_strategy: EvictionStrategy,
    pub capacity: Option<usize>,
    pub ttl_ms: Option<u64>,
    pub refresh_ttl_on_access: bool,
    pub functional_version: Option<String>,
    pub file_backed: bool,
}

// == Managed Cache ==
/// Operations available on any registered cache.
pub trait ManagedCache: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> CacheStats;
    fn settings(&self) -> CacheSettings;
    fn clear(&self);
    fn save(&self) -> Result<SaveOutcome>;
    fn load(&self) -> Result<LoadOutcome>;
    fn cleanup_expired(&self) -> usize;
    fn invalidate_by_tags(&self, tags: &[String], all_must_match: bool) -> Result<usize>;

    /// Entries oldest first.
    fn list_entries(&self) -> Vec<EntryInfo>;
}

impl<K, V> ManagedCache for CacheInstance<K, V>
where
    K: CacheKey + Serialize + DeserializeOwned,
    V: CacheValue + Serialize + DeserializeOwned,
{
    fn len(&self) -> usize {
        CacheInstance::len(self)
    }

    fn stats(&self) -> CacheStats {
        CacheInstance::stats(self)
    }

    fn settings(&self) -> CacheSettings {
        let config = self.config();
        CacheSettings {
            eviction_strategy: config.eviction_strategy,
            capacity: config.capacity,
            ttl_ms: config.ttl.map(|t| t.as_millis() as u64),
            refresh_ttl_on_access: config.refresh_ttl_on_access,
            functional_version: config.current_version(),
            file_backed: config.file_path.is_some(),
        }
    }

    fn clear(&self) {
        CacheInstance::clear(self)
    }

    fn save(&self) -> Result<SaveOutcome> {
        CacheInstance::save(self)
    }

    fn load(&self) -> Result<LoadOutcome> {
        CacheInstance::load(self)
    }

    fn cleanup_expired(&self) -> usize {
        CacheInstance::cleanup_expired(self)
    }

    fn invalidate_by_tags(&self, tags: &[String], all_must_match: bool) -> Result<usize> {
        CacheInstance::invalidate_by_tags(self, tags, all_must_match)
    }

    fn list_entries(&self) -> Vec<EntryInfo> {
        let now = Utc::now();
        CacheInstance::list_entries(self)
            .into_iter()
            .map(|entry| EntryInfo {
                key: stringify_key(&entry.key),
                data: serde_json::to_value(&entry.data).unwrap_or(serde_json::Value::Null),
                created_at: entry.created_at,
                age_ms: entry.age_at(now).as_millis() as u64,
                tags: self
                    .tags_of(&entry.key)
                    .map(|tags| tags.into_iter().collect())
                    .unwrap_or_default(),
                entry_version: entry.entry_version,
                fields: entry.extra_fields,
            })
            .collect()
    }
}

// == Registry ==
/// Name to cache map shared by the server components.
#[derive(Default)]
pub struct CacheRegistry {
    caches: RwLock<BTreeMap<String, Arc<dyn ManagedCache>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `cache` under `name`. Names must be unique and non-empty.
    pub fn register(&self, name: impl Into<String>, cache: impl ManagedCache + 'static) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CacheError::Config("cache name cannot be empty".to_string()));
        }

        let mut caches = self.caches.write();
        if caches.contains_key(&name) {
            return Err(CacheError::Config(format!(
                "cache '{}' is already registered",
                name
            )));
        }
        caches.insert(name.clone(), Arc::new(cache));
        info!("Registered cache '{}'", name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ManagedCache>> {
        self.caches.read().get(name).cloned()
    }

    /// Like [`get`](Self::get), but a missing name is an error.
    pub fn require(&self, name: &str) -> Result<Arc<dyn ManagedCache>> {
        self.get(name)
            .ok_or_else(|| CacheError::NotFound(format!("cache '{}' not found", name)))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.caches.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.caches.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.read().is_empty()
    }

    fn snapshot(&self) -> Vec<(String, Arc<dyn ManagedCache>)> {
        self.caches
            .read()
            .iter()
            .map(|(name, cache)| (name.clone(), Arc::clone(cache)))
            .collect()
    }

    /// Runs a cleanup sweep on every cache. Returns the total removed.
    pub fn cleanup_all(&self) -> usize {
        self.snapshot()
            .into_iter()
            .map(|(_, cache)| cache.cleanup_expired())
            .sum()
    }

    /// Saves every file-backed cache. Failures are logged and returned per cache.
    pub fn save_all(&self) -> Vec<(String, Result<SaveOutcome>)> {
        self.snapshot()
            .into_iter()
            .filter(|(_, cache)| cache.settings().file_backed)
            .map(|(name, cache)| {
                let result = cache.save();
                if let Err(e) = &result {
                    warn!("Failed to save cache '{}': {}", name, e);
                }
                (name, result)
            })
            .collect()
    }

    /// Loads every file-backed cache. Failures are logged and returned per cache.
    pub fn load_all(&self) -> Vec<(String, Result<LoadOutcome>)> {
        self.snapshot()
            .into_iter()
            .filter(|(_, cache)| cache.settings().file_backed)
            .map(|(name, cache)| {
                let result = cache.load();
                if let Err(e) = &result {
                    warn!("Failed to load cache '{}': {}", name, e);
                }
                (name, result)
            })
            .collect()
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("caches", &self.names())
            .finish()
    }
}
