//! Cache Instance Module
//!
//! The get-or-compute orchestrator. Composes the store, staleness evaluator,
//! eviction manager, tag index and single-flight coordinator into the public
//! cache contract.
//!
//! Locking discipline: the store lock is held only for lookup and write-back,
//! never while user compute code runs. User hooks (expiration, clear, error)
//! run after the lock is released.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures_util::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::cache::singleflight::panic_message;
use crate::cache::{
    is_stale, CacheConfig, CacheEntry, CacheKey, CacheStats, CacheStore, CacheValue,
    EvictionStrategy, RemovalCause, SingleFlight, TagSet,
};
use crate::error::{CacheError, Result};

// == Put Outcome ==
/// Result of offering a value to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The value was stored
    Stored,
    /// The predicate refused the value; nothing was stored
    Rejected,
}

/// An entry that left the cache, pending hook notification.
struct Removal<K, V> {
    entry: CacheEntry<K, V>,
    cause: RemovalCause,
}

/// How a write-back treats a fresh entry that appeared concurrently.
#[derive(Clone, Copy, PartialEq, Eq)]
enum WritePolicy {
    /// Keep the existing fresh entry and return its data
    KeepFresh,
    /// Replace whatever is stored
    Overwrite,
}

struct Inner<K, V> {
    config: CacheConfig<K, V>,
    store: Mutex<CacheStore<K, V>>,
    flights: SingleFlight<K, V>,
}

// == Cache Instance ==
/// Handle to one configured cache. Clones share the same runtime data.
pub struct CacheInstance<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for CacheInstance<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: CacheKey, V: CacheValue> CacheInstance<K, V> {
    // == Constructor ==
    /// Validates `config` and allocates the runtime data.
    pub fn new(config: CacheConfig<K, V>) -> Result<Self> {
        config.validate()?;
        if config.capacity.is_some() && !config.is_bounded() {
            debug!("Capacity set with eviction strategy 'none'; size will not be enforced");
        }
        if config.capacity.is_none() && config.eviction_strategy != EvictionStrategy::None {
            debug!(
                "Eviction strategy '{}' without capacity never evicts",
                config.eviction_strategy
            );
        }

        let store = CacheStore::from_config(&config);
        info!(
            "Cache instance created: strategy={}, capacity={:?}, ttl={:?}, file={:?}",
            config.eviction_strategy, config.capacity, config.ttl, config.file_path
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                store: Mutex::new(store),
                flights: SingleFlight::new(),
            }),
        })
    }

    /// The configuration this instance was built with.
    pub fn config(&self) -> &CacheConfig<K, V> {
        &self.inner.config
    }

    // == Get Or Compute ==
    /// Returns the cached value for `key`, or computes, stores and returns it.
    ///
    /// `compute` runs without holding the cache lock. Its failure is routed to
    /// the error handler and returned; nothing is cached.
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> Result<V>
    where
        F: FnOnce() -> anyhow::Result<V>,
    {
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        match compute() {
            Ok(value) => Ok(self.write_back(key, value, WritePolicy::KeepFresh).0),
            Err(err) => {
                self.report_error(&err);
                Err(CacheError::compute(err))
            }
        }
    }

    /// Async variant of [`get_or_compute`](Self::get_or_compute).
    ///
    /// With `async_mode` on, concurrent misses for the same key share a single
    /// computation that runs to completion even if every caller gives up.
    /// Requires a Tokio runtime.
    pub async fn get_or_compute_async<F, Fut>(&self, key: K, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        if !self.inner.config.async_mode {
            return self.compute_and_store(key, compute).await;
        }

        let this = self.clone();
        let flight_key = key.clone();
        let flight = self.inner.flights.get_or_start(key, move || async move {
            // A previous flight may have stored the value after our lookup.
            if let Some(value) = this.peek_fresh(&flight_key) {
                return Ok(value);
            }
            this.compute_and_store(flight_key, compute).await
        });
        flight.await
    }

    async fn compute_and_store<F, Fut>(&self, key: K, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        let outcome = AssertUnwindSafe(compute())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(anyhow::anyhow!(
                    "computation panicked: {}",
                    panic_message(panic.as_ref())
                ))
            });

        match outcome {
            Ok(value) => Ok(self.write_back(key, value, WritePolicy::KeepFresh).0),
            Err(err) => {
                self.report_error(&err);
                debug!("Computation for {:?} failed, nothing stored", key);
                Err(CacheError::compute(err))
            }
        }
    }

    // == Get ==
    /// Returns the cached value without computing. Stale entries are evicted.
    pub fn get(&self, key: &K) -> Option<V> {
        self.lookup(key)
    }

    /// Returns a copy of the stored entry without touching any bookkeeping.
    pub fn peek(&self, key: &K) -> Option<CacheEntry<K, V>> {
        self.inner.store.lock().get(key).cloned()
    }

    // == Put ==
    /// Stores `value` under `key`, replacing any existing entry.
    pub fn put(&self, key: K, value: V) -> PutOutcome {
        self.write_back(key, value, WritePolicy::Overwrite).1
    }

    // == Invalidate ==
    /// Removes `key`. Returns whether an entry was present.
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = {
            let mut store = self.inner.store.lock();
            let removed = store.remove(key);
            if removed.is_some() {
                store.stats_mut().record_invalidation();
            }
            removed
        };

        match removed {
            Some(entry) => {
                self.notify(vec![Removal {
                    entry,
                    cause: RemovalCause::Invalidated,
                }]);
                true
            }
            None => false,
        }
    }

    /// Removes every entry carrying any of `tags` (or all of them when
    /// `all_must_match` is set). Returns the number of entries removed.
    pub fn invalidate_by_tags<S: AsRef<str>>(&self, tags: &[S], all_must_match: bool) -> Result<usize> {
        let removals: Vec<Removal<K, V>> = {
            let mut store = self.inner.store.lock();
            let keys = store.find_by_tags(tags, all_must_match)?;
            let mut removals = Vec::with_capacity(keys.len());
            for key in keys {
                if let Some(entry) = store.remove(&key) {
                    store.stats_mut().record_invalidation();
                    removals.push(Removal {
                        entry,
                        cause: RemovalCause::TagInvalidated,
                    });
                }
            }
            removals
        };

        let count = removals.len();
        debug!("Tag invalidation removed {} entries", count);

        self.notify(removals);
        Ok(count)
    }

    /// Keys carrying any (or all) of `tags`.
    pub fn keys_by_tags<S: AsRef<str>>(&self, tags: &[S], all_must_match: bool) -> Result<Vec<K>> {
        self.inner.store.lock().find_by_tags(tags, all_must_match)
    }

    /// Tags attached to `key`.
    pub fn tags_of(&self, key: &K) -> Option<TagSet> {
        self.inner.store.lock().tags_of(key).cloned()
    }

    // == Cleanup Expired ==
    /// Removes every stale entry. Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let removals: Vec<Removal<K, V>> = {
            let mut store = self.inner.store.lock();
            let stale: Vec<(K, RemovalCause)> = store
                .entries()
                .filter_map(|entry| {
                    is_stale(
                        &entry.key,
                        entry,
                        &self.inner.config,
                        store.last_access(&entry.key),
                        now,
                    )
                    .map(|reason| (entry.key.clone(), RemovalCause::Expired(reason)))
                })
                .collect();

            let mut removals = Vec::with_capacity(stale.len());
            for (key, cause) in stale {
                if let Some(entry) = store.remove(&key) {
                    store.stats_mut().record_expiration();
                    removals.push(Removal { entry, cause });
                }
            }
            removals
        };

        let count = removals.len();
        self.notify(removals);
        count
    }

    // == Clear ==
    /// Drops every entry and fires the clear hook.
    pub fn clear(&self) {
        self.inner.store.lock().clear();
        info!("Cache cleared");
        if let Some(hook) = &self.inner.config.clear_hook {
            hook();
        }
    }

    // == Inspection ==
    /// Snapshot of every stored entry, oldest first.
    pub fn list_entries(&self) -> Vec<CacheEntry<K, V>> {
        let mut entries: Vec<_> = self.inner.store.lock().entries().cloned().collect();
        entries.sort_by_key(|e| e.created_at);
        entries
    }

    /// Every stored key, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        self.inner.store.lock().keys().cloned().collect()
    }

    /// True if an entry is stored under `key`, stale or not.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.store.lock().contains_key(key)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.store.lock().len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.store.lock().is_empty()
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.store.lock().stats()
    }

    /// True while a computation for `key` is in flight.
    pub fn is_computing(&self, key: &K) -> bool {
        self.inner.flights.is_inflight(key)
    }

    /// Runs `f` with exclusive access to the runtime data.
    pub(crate) fn with_store<R>(&self, f: impl FnOnce(&mut CacheStore<K, V>) -> R) -> R {
        f(&mut self.inner.store.lock())
    }

    // == Internals ==
    /// Hit path: returns fresh data and records the hit; evicts stale data.
    fn lookup(&self, key: &K) -> Option<V> {
        let now = Utc::now();
        let (value, removal) = {
            let mut store = self.inner.store.lock();
            if !store.contains_key(key) {
                store.record_miss();
                return None;
            }
            let stale = store.get(key).and_then(|entry| {
                is_stale(key, entry, &self.inner.config, store.last_access(key), now)
            });

            match stale {
                None => {
                    let value = store.get(key).map(|e| e.data.clone());
                    store.touch(key, now);
                    (value, None)
                }
                Some(reason) => {
                    store.record_miss();
                    let removal = store.remove(key).map(|entry| {
                        store.stats_mut().record_expiration();
                        Removal {
                            entry,
                            cause: RemovalCause::Expired(reason),
                        }
                    });
                    (None, removal)
                }
            }
        };

        if let Some(removal) = removal {
            debug!("Entry {:?} was stale: {}", key, removal.cause);
            self.notify(vec![removal]);
        }
        value
    }

    /// Fresh data for `key` without recording anything.
    fn peek_fresh(&self, key: &K) -> Option<V> {
        let store = self.inner.store.lock();
        let entry = store.get(key)?;
        is_stale(key, entry, &self.inner.config, store.last_access(key), Utc::now())
            .is_none()
            .then(|| entry.data.clone())
    }

    /// Applies predicate, tags and metadata, then stores the value.
    fn write_back(&self, key: K, value: V, policy: WritePolicy) -> (V, PutOutcome) {
        let config = &self.inner.config;
        if let Some(predicate) = &config.predicate {
            if !predicate(&value) {
                self.inner.store.lock().stats_mut().record_rejection();
                debug!("Predicate rejected value for {:?}", key);
                return (value, PutOutcome::Rejected);
            }
        }

        let tags = config
            .tags_fn
            .as_ref()
            .map(|f| f(&key, &value))
            .unwrap_or_default();
        let fields = config
            .meta_fn
            .as_ref()
            .map(|f| f(&key, &value))
            .unwrap_or_default();
        let entry = CacheEntry::new(key, value, config.current_version(), fields);

        let now = Utc::now();
        let mut removals = Vec::new();
        let result = {
            let mut store = self.inner.store.lock();
            let existing = store
                .get(&entry.key)
                .map(|e| is_stale(&entry.key, e, config, store.last_access(&entry.key), now));

            let kept = match existing {
                Some(None) if policy == WritePolicy::KeepFresh => {
                    // Another writer stored a fresh value while we computed.
                    store.get(&entry.key).map(|e| e.data.clone())
                }
                Some(Some(reason)) => {
                    if let Some(old) = store.remove(&entry.key) {
                        store.stats_mut().record_expiration();
                        removals.push(Removal {
                            entry: old,
                            cause: RemovalCause::Expired(reason),
                        });
                    }
                    None
                }
                _ => None,
            };

            match kept {
                Some(value) => value,
                None => {
                    let value = entry.data.clone();
                    if let Some(victim) = store.insert(entry, tags) {
                        removals.push(Removal {
                            entry: victim,
                            cause: RemovalCause::Evicted,
                        });
                    }
                    value
                }
            }
        };

        self.notify(removals);
        (result, PutOutcome::Stored)
    }

    fn notify(&self, removals: Vec<Removal<K, V>>) {
        if let Some(hook) = &self.inner.config.expiration_hook {
            for removal in &removals {
                hook(&removal.entry.key, &removal.entry, removal.cause);
            }
        }
    }

    pub(crate) fn report_error(&self, err: &anyhow::Error) {
        debug!("Cache error reported: {:#}", err);
        if let Some(handler) = &self.inner.config.error_handler {
            handler(err);
        }
    }
}

impl<K, V> std::fmt::Debug for CacheInstance<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInstance")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
