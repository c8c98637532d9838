//! Request DTOs for the admin API
//!
//! Defines the structure of incoming request bodies and query strings.

use serde::Deserialize;

/// Maximum number of tags accepted in one invalidation request.
pub const MAX_TAGS_PER_REQUEST: usize = 256;

/// Request body for POST /caches/:name/invalidate
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    /// Tags to match
    pub tags: Vec<String>,
    /// Require every tag instead of any
    #[serde(default)]
    pub all_must_match: bool,
}

impl InvalidateRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.tags.is_empty() {
            return Some("At least one tag is required".to_string());
        }
        if self.tags.len() > MAX_TAGS_PER_REQUEST {
            return Some(format!(
                "Too many tags: at most {} per request",
                MAX_TAGS_PER_REQUEST
            ));
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Some("Tags cannot be empty".to_string());
        }
        None
    }
}

/// Query string for GET /caches/:name/entries
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntriesQuery {
    /// Return at most this many entries, oldest first
    #[serde(default)]
    pub limit: Option<usize>,
}
