//! Cache Configuration Module
//!
//! Per-instance configuration: expiry, capacity, eviction policy, versioning
//! and the user hooks that customize caching decisions.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheEntry, Fields, RemovalCause, TagSet};
use crate::error::{CacheError, Result};

// == Hook Types ==
/// Gate on what is cacheable. Returning `false` skips storing the value.
pub type Predicate<V> = Arc<dyn Fn(&V) -> bool + Send + Sync>;
/// Custom staleness check. Returning `true` marks the entry stale.
///
/// Runs while the instance lock is held and must not call back into the cache.
pub type DirtyPredicate<K, V> = Arc<dyn Fn(&K, &CacheEntry<K, V>) -> bool + Send + Sync>;
/// Derives invalidation tags for a freshly computed value.
pub type TagsFn<K, V> = Arc<dyn Fn(&K, &V) -> TagSet + Send + Sync>;
/// Derives custom entry fields for a freshly computed value.
pub type MetaFn<K, V> = Arc<dyn Fn(&K, &V) -> Fields + Send + Sync>;
/// Called for every entry removed by expiry, eviction or invalidation.
pub type ExpirationHook<K, V> = Arc<dyn Fn(&K, &CacheEntry<K, V>, RemovalCause) + Send + Sync>;
/// Called once after the cache has been cleared.
pub type ClearHook = Arc<dyn Fn() + Send + Sync>;
/// Receives compute failures and persistence problems.
pub type ErrorHandler = Arc<dyn Fn(&anyhow::Error) + Send + Sync>;

// == Eviction Strategy ==
/// Policy used to pick a victim when a bounded cache is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Least recently used
    #[default]
    Lru,
    /// Least frequently used
    Lfu,
    /// First in, first out
    Fifo,
    /// Never evict for size reasons
    None,
}

impl EvictionStrategy {
    /// Lowercase name as used in persisted files and env configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionStrategy::Lru => "lru",
            EvictionStrategy::Lfu => "lfu",
            EvictionStrategy::Fifo => "fifo",
            EvictionStrategy::None => "none",
        }
    }
}

impl fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EvictionStrategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionStrategy::Lru),
            "lfu" => Ok(EvictionStrategy::Lfu),
            "fifo" => Ok(EvictionStrategy::Fifo),
            "none" => Ok(EvictionStrategy::None),
            other => Err(CacheError::Config(format!(
                "unknown eviction strategy '{}'",
                other
            ))),
        }
    }
}

// == Functional Version ==
/// Caller-supplied version token. Entries created under another version are stale.
#[derive(Clone)]
pub enum FunctionalVersion {
    /// A fixed token
    Fixed(String),
    /// Evaluated on every staleness check
    Supplier(Arc<dyn Fn() -> String + Send + Sync>),
}

impl FunctionalVersion {
    /// Returns the version that is current right now.
    pub fn current(&self) -> String {
        match self {
            FunctionalVersion::Fixed(v) => v.clone(),
            FunctionalVersion::Supplier(f) => f(),
        }
    }
}

impl fmt::Debug for FunctionalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionalVersion::Fixed(v) => f.debug_tuple("Fixed").field(v).finish(),
            FunctionalVersion::Supplier(_) => f.write_str("Supplier(..)"),
        }
    }
}

// == Cache Config ==
/// Immutable configuration for one cache instance.
///
/// Built from `Default` with the consuming `with_*` setters:
///
/// ```
/// use std::time::Duration;
/// use mini_memo::cache::{CacheConfig, EvictionStrategy};
///
/// let config: CacheConfig<String, u64> = CacheConfig::default()
///     .with_ttl(Duration::from_secs(60))
///     .with_capacity(1000)
///     .with_eviction_strategy(EvictionStrategy::Lfu);
/// assert_eq!(config.capacity, Some(1000));
/// ```
pub struct CacheConfig<K, V> {
    pub ttl: Option<Duration>,
    pub refresh_ttl_on_access: bool,
    pub capacity: Option<usize>,
    pub eviction_strategy: EvictionStrategy,
    pub version: Option<FunctionalVersion>,
    pub predicate: Option<Predicate<V>>,
    pub dirty_predicate: Option<DirtyPredicate<K, V>>,
    pub tags_fn: Option<TagsFn<K, V>>,
    pub meta_fn: Option<MetaFn<K, V>>,
    pub expiration_hook: Option<ExpirationHook<K, V>>,
    pub clear_hook: Option<ClearHook>,
    pub error_handler: Option<ErrorHandler>,
    pub file_path: Option<PathBuf>,
    /// Deduplicate concurrent async misses through single-flight
    pub async_mode: bool,
    /// Entry shape identifier written to persisted files
    pub shape_id: String,
}

impl<K, V> Default for CacheConfig<K, V> {
    fn default() -> Self {
        Self {
            ttl: None,
            refresh_ttl_on_access: false,
            capacity: None,
            eviction_strategy: EvictionStrategy::default(),
            version: None,
            predicate: None,
            dirty_predicate: None,
            tags_fn: None,
            meta_fn: None,
            expiration_hook: None,
            clear_hook: None,
            error_handler: None,
            file_path: None,
            async_mode: true,
            shape_id: std::any::type_name::<V>().to_string(),
        }
    }
}

impl<K, V> CacheConfig<K, V> {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_refresh_ttl_on_access(mut self, refresh: bool) -> Self {
        self.refresh_ttl_on_access = refresh;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_eviction_strategy(mut self, strategy: EvictionStrategy) -> Self {
        self.eviction_strategy = strategy;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(FunctionalVersion::Fixed(version.into()));
        self
    }

    pub fn with_version_supplier(
        mut self,
        supplier: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.version = Some(FunctionalVersion::Supplier(Arc::new(supplier)));
        self
    }

    pub fn with_predicate(mut self, predicate: impl Fn(&V) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn with_dirty_predicate(
        mut self,
        dirty: impl Fn(&K, &CacheEntry<K, V>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.dirty_predicate = Some(Arc::new(dirty));
        self
    }

    pub fn with_tags_fn(mut self, tags: impl Fn(&K, &V) -> TagSet + Send + Sync + 'static) -> Self {
        self.tags_fn = Some(Arc::new(tags));
        self
    }

    pub fn with_meta_fn(mut self, meta: impl Fn(&K, &V) -> Fields + Send + Sync + 'static) -> Self {
        self.meta_fn = Some(Arc::new(meta));
        self
    }

    pub fn with_expiration_hook(
        mut self,
        hook: impl Fn(&K, &CacheEntry<K, V>, RemovalCause) + Send + Sync + 'static,
    ) -> Self {
        self.expiration_hook = Some(Arc::new(hook));
        self
    }

    pub fn with_clear_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.clear_hook = Some(Arc::new(hook));
        self
    }

    pub fn with_error_handler(
        mut self,
        handler: impl Fn(&anyhow::Error) + Send + Sync + 'static,
    ) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_async_mode(mut self, async_mode: bool) -> Self {
        self.async_mode = async_mode;
        self
    }

    pub fn with_shape_id(mut self, shape_id: impl Into<String>) -> Self {
        self.shape_id = shape_id.into();
        self
    }

    // == Derived Settings ==
    /// Current functional version, if one is configured.
    pub fn current_version(&self) -> Option<String> {
        self.version.as_ref().map(FunctionalVersion::current)
    }

    /// True when the eviction policy has a capacity to enforce.
    pub fn is_bounded(&self) -> bool {
        self.capacity.is_some() && self.eviction_strategy != EvictionStrategy::None
    }

    // == Validate ==
    /// Rejects invalid option combinations.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == Some(0) {
            return Err(CacheError::Config(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if self.ttl == Some(Duration::ZERO) {
            return Err(CacheError::Config("ttl must be greater than zero".to_string()));
        }
        if self.refresh_ttl_on_access && self.ttl.is_none() {
            return Err(CacheError::Config(
                "refresh_ttl_on_access requires a ttl".to_string(),
            ));
        }
        Ok(())
    }
}

impl<K, V> fmt::Debug for CacheConfig<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("ttl", &self.ttl)
            .field("refresh_ttl_on_access", &self.refresh_ttl_on_access)
            .field("capacity", &self.capacity)
            .field("eviction_strategy", &self.eviction_strategy)
            .field("version", &self.version)
            .field("predicate", &self.predicate.is_some())
            .field("dirty_predicate", &self.dirty_predicate.is_some())
            .field("tags_fn", &self.tags_fn.is_some())
            .field("meta_fn", &self.meta_fn.is_some())
            .field("expiration_hook", &self.expiration_hook.is_some())
            .field("clear_hook", &self.clear_hook.is_some())
            .field("error_handler", &self.error_handler.is_some())
            .field("file_path", &self.file_path)
            .field("async_mode", &self.async_mode)
            .field("shape_id", &self.shape_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    type Config = CacheConfig<String, u32>;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.ttl.is_none());
        assert!(config.capacity.is_none());
        assert_eq!(config.eviction_strategy, EvictionStrategy::Lru);
        assert!(config.async_mode);
        assert_eq!(config.shape_id, "u32");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = Config::default().with_capacity(0);
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let config = Config::default().with_ttl(Duration::ZERO);
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));
    }

    #[test]
    fn test_refresh_without_ttl_rejected() {
        let config = Config::default().with_refresh_ttl_on_access(true);
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));
    }

    #[test]
    fn test_strategy_without_capacity_is_unbounded() {
        let config = Config::default().with_eviction_strategy(EvictionStrategy::Lfu);
        assert!(config.validate().is_ok());
        assert!(!config.is_bounded());

        let config = Config::default()
            .with_capacity(10)
            .with_eviction_strategy(EvictionStrategy::None);
        assert!(!config.is_bounded());
    }

    #[test]
    fn test_version_supplier_evaluated_per_call() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let config = Config::default()
            .with_version_supplier(move || format!("v{}", c.fetch_add(1, Ordering::SeqCst)));

        assert_eq!(config.current_version().as_deref(), Some("v0"));
        assert_eq!(config.current_version().as_deref(), Some("v1"));
    }

    #[test]
    fn test_strategy_parse_and_display() {
        assert_eq!("LRU".parse::<EvictionStrategy>().unwrap(), EvictionStrategy::Lru);
        assert_eq!("fifo".parse::<EvictionStrategy>().unwrap(), EvictionStrategy::Fifo);
        assert!("random".parse::<EvictionStrategy>().is_err());
        assert_eq!(EvictionStrategy::Lfu.to_string(), "lfu");
        assert_eq!(
            serde_json::to_string(&EvictionStrategy::None).unwrap(),
            "\"none\""
        );
    }
}
