//! Key Encoding
//!
//! Turns cache keys into the strings used as record names in persisted files.
//! Keys whose serde form is a string are written verbatim; numbers and
//! composite keys are written as compact JSON. Keys serde cannot encode fall
//! back to their `Debug` text, which is readable but not parsed back.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{CacheError, Result};

/// Encodes `key` as a record name.
pub fn stringify_key<K: Serialize + Debug>(key: &K) -> String {
    match serde_json::to_value(key) {
        Ok(Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(err) => {
            debug!("Key {:?} has no serde encoding ({}), using debug text", key, err);
            format!("{:?}", key)
        }
    }
}

/// Decodes a record name produced by [`stringify_key`].
pub fn parse_key<K: DeserializeOwned>(text: &str) -> Result<K> {
    if let Ok(key) = serde_json::from_value::<K>(Value::String(text.to_string())) {
        return Ok(key);
    }
    serde_json::from_str::<K>(text)
        .map_err(|e| CacheError::persistence(&format!("cannot parse key '{}'", text), e))
}
