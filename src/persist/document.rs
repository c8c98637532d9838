//! Persisted Document Model
//!
//! The on-disk JSON shape: a metadata block, one record per entry and a
//! snapshot of the eviction order.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{CacheConfig, EvictionStrategy, Fields};

/// Identifier of the file layout written by this engine.
pub const FILE_FORMAT_VERSION: &str = "mini-memo/1";

/// Placeholder for settings that do not apply.
pub const NOT_APPLICABLE: &str = "N/A";

/// Record keys that custom fields may not shadow.
pub const RESERVED_FIELDS: [&str; 6] = [
    "data",
    "timestamp",
    "entryVersion",
    "frequency",
    "lastAccess",
    "tags",
];

// == Or N/A ==
/// A setting value, or the `"N/A"` marker when it is not configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrNa<T> {
    Value(T),
    NotApplicable(String),
}

impl<T> OrNa<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            OrNa::Value(v) => Some(v),
            OrNa::NotApplicable(_) => None,
        }
    }
}

impl<T> From<Option<T>> for OrNa<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => OrNa::Value(v),
            None => OrNa::NotApplicable(NOT_APPLICABLE.to_string()),
        }
    }
}

// == Metadata ==
/// Describes the cache that wrote the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub file_format_version: String,
    pub persisted_at: DateTime<Utc>,
    pub cache_functional_version: String,
    pub eviction_strategy: EvictionStrategy,
    pub capacity: OrNa<usize>,
    /// Seconds
    pub ttl: OrNa<f64>,
    pub refresh_ttl_on_access: OrNa<bool>,
    pub struct_name: String,
}

impl Metadata {
    /// Metadata describing `config` as of now.
    pub fn describe<K, V>(config: &CacheConfig<K, V>) -> Self {
        Self {
            file_format_version: FILE_FORMAT_VERSION.to_string(),
            persisted_at: Utc::now(),
            cache_functional_version: functional_version_label(config),
            eviction_strategy: config.eviction_strategy,
            capacity: config.capacity.into(),
            ttl: config.ttl.map(|t| t.as_secs_f64()).into(),
            refresh_ttl_on_access: config.ttl.map(|_| config.refresh_ttl_on_access).into(),
            struct_name: config.shape_id.clone(),
        }
    }
}

/// Current functional version, or `"N/A"`.
pub fn functional_version_label<K, V>(config: &CacheConfig<K, V>) -> String {
    config
        .current_version()
        .unwrap_or_else(|| NOT_APPLICABLE.to_string())
}

// == Entry Record ==
/// One persisted entry. `D` is `&V` when writing and `V` when reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord<D> {
    pub data: D,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub entry_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u64>,
    /// Only written when access times are tracked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_access: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(flatten)]
    pub extra_fields: Fields,
}

/// Custom fields that can be written without clashing with record keys.
pub fn persistable_fields(fields: &Fields) -> Fields {
    fields
        .iter()
        .filter(|(name, _)| !RESERVED_FIELDS.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

// == Documents ==
/// Document as written.
#[derive(Debug, Serialize)]
pub struct PersistedDocument {
    pub metadata: Metadata,
    pub entries: serde_json::Map<String, serde_json::Value>,
    pub order: Vec<String>,
}

/// Document as read. Metadata and entries stay untyped until validated,
/// so one bad record cannot fail the whole file.
#[derive(Debug, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub entries: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub order: Vec<String>,
}

// == Validation ==
/// Why a persisted file was not loaded.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ValidationError {
    #[error("metadata block is missing")]
    MissingMetadata,

    #[error("metadata block is malformed: {detail}")]
    MalformedMetadata { detail: String },

    #[error("file format version '{found}' does not match '{expected}'")]
    FormatVersionMismatch { expected: String, found: String },

    #[error("functional version '{found}' does not match current version '{expected}'")]
    FunctionalVersionMismatch { expected: String, found: String },
}

/// Checks the metadata block against the format and the current functional version.
pub fn validate(
    metadata: Option<serde_json::Value>,
    expected_version: &str,
) -> std::result::Result<Metadata, ValidationError> {
    let raw = metadata.ok_or(ValidationError::MissingMetadata)?;
    let metadata: Metadata =
        serde_json::from_value(raw).map_err(|e| ValidationError::MalformedMetadata {
            detail: e.to_string(),
        })?;

    if metadata.file_format_version != FILE_FORMAT_VERSION {
        return Err(ValidationError::FormatVersionMismatch {
            expected: FILE_FORMAT_VERSION.to_string(),
            found: metadata.file_format_version,
        });
    }
    if metadata.cache_functional_version != expected_version {
        return Err(ValidationError::FunctionalVersionMismatch {
            expected: expected_version.to_string(),
            found: metadata.cache_functional_version,
        });
    }
    Ok(metadata)
}
