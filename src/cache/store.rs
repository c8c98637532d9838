//! Cache Store Module
//!
//! Runtime data of one cache instance: the entry map, access timestamps,
//! eviction bookkeeping, the tag index and statistics. Every mutator keeps
//! all of these structures in agreement, so a caller holding `&mut` applies
//! each change as a single atomic step.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::{
    CacheConfig, CacheEntry, CacheStats, EvictionManager, EvictionStrategy, TagIndex, TagSet,
};
use crate::error::Result;

// == Cache Store ==
/// Entry storage combined with eviction and tag tracking.
#[derive(Debug)]
pub struct CacheStore<K, V> {
    /// Key-entry storage
    entries: HashMap<K, CacheEntry<K, V>>,
    /// Last access per key, kept only when accesses refresh the TTL
    access_ts: Option<HashMap<K, DateTime<Utc>>>,
    /// Eviction policy bookkeeping
    eviction: EvictionManager<K>,
    /// Key/tag mapping
    tags: TagIndex<K>,
    /// Performance statistics
    stats: CacheStats,
}

impl<K: Eq + Hash + Clone, V> CacheStore<K, V> {
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// # Arguments
    /// * `strategy` - Eviction policy
    /// * `capacity` - Maximum number of entries, None = unbounded
    /// * `track_access` - Whether to record access timestamps
    pub fn new(strategy: EvictionStrategy, capacity: Option<usize>, track_access: bool) -> Self {
        Self {
            entries: HashMap::new(),
            access_ts: track_access.then(HashMap::new),
            eviction: EvictionManager::new(strategy, capacity),
            tags: TagIndex::new(),
            stats: CacheStats::new(),
        }
    }

    /// Creates an empty store shaped by an instance configuration.
    pub fn from_config(config: &CacheConfig<K, V>) -> Self {
        Self::new(
            config.eviction_strategy,
            config.capacity,
            config.refresh_ttl_on_access,
        )
    }

    // == Lookup ==
    pub fn get(&self, key: &K) -> Option<&CacheEntry<K, V>> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Last recorded access of `key`, if accesses are tracked.
    pub fn last_access(&self, key: &K) -> Option<DateTime<Utc>> {
        self.access_ts.as_ref()?.get(key).copied()
    }

    // == Touch ==
    /// Records a hit on `key`: policy bookkeeping, access time and stats.
    pub fn touch(&mut self, key: &K, now: DateTime<Utc>) {
        self.eviction.record_hit(key);
        if let Some(access) = self.access_ts.as_mut() {
            access.insert(key.clone(), now);
        }
        self.stats.record_hit();
    }

    /// Sets the access time of `key` without counting a hit.
    pub(crate) fn restore_access(&mut self, key: &K, at: DateTime<Utc>) {
        if let Some(access) = self.access_ts.as_mut() {
            access.insert(key.clone(), at);
        }
    }

    pub fn record_miss(&mut self) {
        self.stats.record_miss();
    }

    // == Insert ==
    /// Stores an entry with its tags, replacing any entry under the same key.
    ///
    /// If the store is full and the key is new, the policy's victim is
    /// removed first and returned.
    pub fn insert(&mut self, entry: CacheEntry<K, V>, tags: TagSet) -> Option<CacheEntry<K, V>> {
        let key = entry.key.clone();
        let exists = self.entries.contains_key(&key);

        let entries = &self.entries;
        let victim = self.eviction.prepare_for_insert(
            &key,
            exists,
            entries.len(),
            |k| entries.contains_key(k),
        );
        let evicted = victim.and_then(|v| self.remove(&v));
        if evicted.is_some() {
            self.stats.record_eviction();
            debug!("Evicted entry to make room ({})", self.eviction.strategy());
        }

        self.entries.insert(key.clone(), entry);
        if !exists {
            self.eviction.record_insert(&key);
        }
        self.tags.attach(&key, tags);
        if let Some(access) = self.access_ts.as_mut() {
            access.remove(&key);
        }
        self.stats.set_total_entries(self.entries.len());

        evicted
    }

    // == Remove ==
    /// Removes `key` from every structure.
    pub fn remove(&mut self, key: &K) -> Option<CacheEntry<K, V>> {
        let entry = self.entries.remove(key)?;
        if let Some(access) = self.access_ts.as_mut() {
            access.remove(key);
        }
        self.eviction.remove(key);
        self.tags.detach(key);
        self.stats.set_total_entries(self.entries.len());
        Some(entry)
    }

    // == Clear ==
    /// Drops every entry. Statistics counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        if let Some(access) = self.access_ts.as_mut() {
            access.clear();
        }
        self.eviction.clear();
        self.tags.clear();
        self.stats.set_total_entries(0);
    }

    // == Tags ==
    pub fn tags_of(&self, key: &K) -> Option<&TagSet> {
        self.tags.tags_of(key)
    }

    /// Keys matching any (or all) of `tags`.
    pub fn find_by_tags<S: AsRef<str>>(&self, tags: &[S], match_all: bool) -> Result<Vec<K>> {
        Ok(self
            .tags
            .find_by_tags(tags, match_all)?
            .into_iter()
            .collect())
    }

    // == Inspection ==
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry<K, V>> {
        self.entries.values()
    }

    pub fn eviction(&self) -> &EvictionManager<K> {
        &self.eviction
    }

    pub(crate) fn eviction_mut(&mut self) -> &mut EvictionManager<K> {
        &mut self.eviction
    }

    #[cfg(test)]
    pub(crate) fn tag_index(&self) -> &TagIndex<K> {
        &self.tags
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut CacheStats {
        &mut self.stats
    }
}
