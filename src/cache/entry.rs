//! Cache Entry Module
//!
//! Defines the structure for individual cache entries.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Custom per-entry fields, populated by a configured `meta_fn`.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// Set of invalidation tags attached to an entry.
pub type TagSet = BTreeSet<String>;

// == Cache Entry ==
/// A single cached value with its creation metadata.
///
/// Entries are immutable once built. Access timestamps and frequency counts
/// live in the owning store, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<K, V> {
    /// The key this entry is stored under
    pub key: K,
    /// The cached value
    pub data: V,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Functional version that was current when the entry was created
    pub entry_version: Option<String>,
    /// Custom fields
    pub extra_fields: Fields,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(key: K, data: V, entry_version: Option<String>, extra_fields: Fields) -> Self {
        Self::created_at(key, data, Utc::now(), entry_version, extra_fields)
    }

    /// Creates an entry with an explicit creation time (used when restoring from disk).
    pub fn created_at(
        key: K,
        data: V,
        created_at: DateTime<Utc>,
        entry_version: Option<String>,
        extra_fields: Fields,
    ) -> Self {
        Self {
            key,
            data,
            created_at,
            entry_version,
            extra_fields,
        }
    }

    // == Age ==
    /// Time elapsed between creation and `now`.
    ///
    /// Timestamps in the future count as zero elapsed time.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        elapsed_between(self.created_at, now)
    }

    /// Looks up a custom field by name.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.extra_fields.get(name)
    }
}

// == Utility Functions ==
/// Elapsed wall time from `since` to `now`, clamped at zero.
pub(crate) fn elapsed_between(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(since)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
