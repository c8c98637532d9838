//! Persistence Module
//!
//! Saves a cache instance to a JSON file and restores it on startup. Writes
//! are atomic. Loads validate the metadata block before touching the cache,
//! skip records that cannot be decoded and drop entries that are already
//! stale.

mod document;
mod file;
mod key;

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{is_stale, CacheEntry, CacheInstance, CacheKey, CacheValue, EvictionStrategy};
use crate::error::{CacheError, Result};

pub use document::{
    functional_version_label, persistable_fields, validate, EntryRecord, Metadata, OrNa,
    PersistedDocument, RawDocument, ValidationError, FILE_FORMAT_VERSION, NOT_APPLICABLE,
    RESERVED_FIELDS,
};
pub use file::{read_if_exists, write_atomic};
pub use key::{parse_key, stringify_key};

// == Outcomes ==
/// A record left out of a save or load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEntry {
    pub key: String,
    pub reason: String,
}

/// Summary of a completed save.
#[derive(Debug, Clone, Serialize)]
pub struct SaveReport {
    pub path: PathBuf,
    pub entries: usize,
    pub skipped: Vec<SkippedEntry>,
}

/// Result of [`CacheInstance::save`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SaveOutcome {
    /// No file path is configured
    Disabled,
    Saved(SaveReport),
}

/// Result of [`CacheInstance::load`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum LoadOutcome {
    /// No file path is configured
    Disabled,
    /// The file does not exist yet
    Missing,
    /// The file failed validation; the cache was left untouched
    Rejected { reason: ValidationError },
    Loaded {
        entries: usize,
        expired: usize,
        skipped: Vec<SkippedEntry>,
    },
}

type Decoded<K, V> = (K, EntryRecord<V>);

impl<K, V> CacheInstance<K, V>
where
    K: CacheKey + Serialize + DeserializeOwned,
    V: CacheValue + Serialize + DeserializeOwned,
{
    // == Save ==
    /// Writes every entry to the configured file.
    ///
    /// Entries whose data cannot be encoded are skipped and reported to the
    /// error handler. I/O failures are returned.
    pub fn save(&self) -> Result<SaveOutcome> {
        let config = self.config();
        let Some(path) = config.file_path.clone() else {
            return Ok(SaveOutcome::Disabled);
        };

        let (entries, order, skipped) = self.with_store(|store| {
            let mut entries = serde_json::Map::new();
            let mut skipped = Vec::new();

            for entry in store.entries() {
                let name = stringify_key(&entry.key);
                if entries.contains_key(&name) {
                    skipped.push(SkippedEntry {
                        key: name,
                        reason: "another key has the same encoding".to_string(),
                    });
                    continue;
                }

                let record = EntryRecord {
                    data: &entry.data,
                    timestamp: entry.created_at,
                    entry_version: entry.entry_version.clone(),
                    frequency: store.eviction().frequency_of(&entry.key),
                    last_access: store.last_access(&entry.key),
                    tags: store.tags_of(&entry.key).cloned().unwrap_or_default(),
                    extra_fields: persistable_fields(&entry.extra_fields),
                };
                match serde_json::to_value(&record) {
                    Ok(value) => {
                        entries.insert(name, value);
                    }
                    Err(e) => skipped.push(SkippedEntry {
                        key: name,
                        reason: e.to_string(),
                    }),
                }
            }

            let order: Vec<String> = store
                .eviction()
                .order_snapshot()
                .iter()
                .map(stringify_key)
                .filter(|name| entries.contains_key(name))
                .collect();
            (entries, order, skipped)
        });

        let count = entries.len();
        let document = PersistedDocument {
            metadata: Metadata::describe(config),
            entries,
            order,
        };
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| CacheError::persistence("encode cache file", e))?;

        if let Err(err) = write_atomic(&path, &bytes) {
            self.report_error(&anyhow::anyhow!("saving {}: {}", path.display(), err));
            return Err(err);
        }

        for skip in &skipped {
            warn!("Entry '{}' was not saved: {}", skip.key, skip.reason);
            self.report_error(&anyhow::anyhow!(
                "entry '{}' was not saved: {}",
                skip.key,
                skip.reason
            ));
        }
        info!("Saved {} entries to {}", count, path.display());

        Ok(SaveOutcome::Saved(SaveReport {
            path,
            entries: count,
            skipped,
        }))
    }

    // == Load ==
    /// Replaces the cache contents with the entries in the configured file.
    ///
    /// A file that fails validation is rejected without modifying the cache.
    /// Unreadable or unparseable files are returned as errors.
    pub fn load(&self) -> Result<LoadOutcome> {
        let config = self.config();
        let Some(path) = config.file_path.clone() else {
            return Ok(LoadOutcome::Disabled);
        };
        let Some(bytes) = read_if_exists(&path)? else {
            debug!("No cache file at {}", path.display());
            return Ok(LoadOutcome::Missing);
        };

        let raw: RawDocument = match serde_json::from_slice(&bytes) {
            Ok(raw) => raw,
            Err(e) => {
                let err = CacheError::persistence("parse cache file", e);
                self.report_error(&anyhow::anyhow!("loading {}: {}", path.display(), err));
                return Err(err);
            }
        };

        let metadata = match validate(raw.metadata, &functional_version_label(config)) {
            Ok(metadata) => metadata,
            Err(reason) => {
                warn!("Rejected cache file {}: {}", path.display(), reason);
                self.report_error(&anyhow::anyhow!("rejected {}: {}", path.display(), reason));
                return Ok(LoadOutcome::Rejected { reason });
            }
        };

        let mut skipped = Vec::new();
        let mut decoded: HashMap<String, Decoded<K, V>> = HashMap::with_capacity(raw.entries.len());
        for (name, value) in raw.entries {
            let key = match parse_key::<K>(&name) {
                Ok(key) => key,
                Err(e) => {
                    skipped.push(SkippedEntry {
                        key: name,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            match serde_json::from_value::<EntryRecord<V>>(value) {
                Ok(record) => {
                    decoded.insert(name, (key, record));
                }
                Err(e) => skipped.push(SkippedEntry {
                    key: name,
                    reason: e.to_string(),
                }),
            }
        }

        let follow_order = metadata.eviction_strategy == config.eviction_strategy
            && matches!(
                config.eviction_strategy,
                EvictionStrategy::Lru | EvictionStrategy::Fifo
            );
        let replay = replay_order(decoded, &raw.order, follow_order);

        let now = Utc::now();
        let (entries, expired) = self.with_store(|store| {
            store.clear();
            let mut expired = 0;
            for (key, record) in replay {
                let entry = CacheEntry::created_at(
                    key,
                    record.data,
                    record.timestamp,
                    record.entry_version,
                    record.extra_fields,
                );
                let last_access = record.last_access.filter(|_| config.refresh_ttl_on_access);
                if let Some(reason) = is_stale(&entry.key, &entry, config, last_access, now) {
                    debug!("Dropping persisted entry {:?}: {}", entry.key, reason);
                    expired += 1;
                    continue;
                }

                let key = entry.key.clone();
                store.insert(entry, record.tags);
                if let Some(frequency) = record.frequency {
                    store.eviction_mut().set_frequency(&key, frequency);
                }
                if let Some(accessed) = last_access {
                    store.restore_access(&key, accessed);
                }
            }
            (store.len(), expired)
        });

        for skip in &skipped {
            warn!("Entry '{}' was not loaded: {}", skip.key, skip.reason);
            self.report_error(&anyhow::anyhow!(
                "entry '{}' was not loaded: {}",
                skip.key,
                skip.reason
            ));
        }
        info!(
            "Loaded {} entries from {} ({} expired, {} skipped)",
            entries,
            path.display(),
            expired,
            skipped.len()
        );

        Ok(LoadOutcome::Loaded {
            entries,
            expired,
            skipped,
        })
    }
}

/// Sequences decoded records oldest first.
///
/// Records outside the saved order go first, sorted by timestamp, followed by
/// the saved order from least to most recently used.
fn replay_order<K, V>(
    mut decoded: HashMap<String, Decoded<K, V>>,
    order: &[String],
    follow_order: bool,
) -> Vec<Decoded<K, V>> {
    let mut ordered = Vec::new();
    if follow_order {
        for name in order.iter().rev() {
            if let Some(item) = decoded.remove(name) {
                ordered.push(item);
            }
        }
    }

    let mut replay: Vec<Decoded<K, V>> = decoded.into_values().collect();
    replay.sort_by_key(|(_, record)| record.timestamp);
    replay.extend(ordered);
    replay
}
