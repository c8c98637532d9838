//! Staleness Evaluator
//!
//! Decides whether a stored entry may still be served.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::entry::elapsed_between;
use crate::cache::{CacheConfig, CacheEntry};

// == Stale Reason ==
/// Why an entry is no longer fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
    /// Older than the TTL, and not kept alive by a recent access
    TtlExpired,
    /// Created under a different functional version
    VersionMismatch,
    /// The configured dirty predicate flagged it
    CustomDirty,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StaleReason::TtlExpired => "ttl expired",
            StaleReason::VersionMismatch => "version mismatch",
            StaleReason::CustomDirty => "marked dirty",
        };
        f.write_str(s)
    }
}

// == Is Stale ==
/// Evaluates an entry against the configuration, returning the first reason it is stale.
///
/// Checks run in a fixed order: TTL, then functional version, then the dirty
/// predicate. With a TTL, an entry older than the TTL is still fresh while its
/// last recorded access (`access_ts`) is within the TTL.
pub fn is_stale<K, V>(
    key: &K,
    entry: &CacheEntry<K, V>,
    config: &CacheConfig<K, V>,
    access_ts: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<StaleReason> {
    if let Some(ttl) = config.ttl {
        let created_expired = entry.age_at(now) > ttl;
        let access_expired = access_ts.map_or(true, |ts| elapsed_between(ts, now) > ttl);
        if created_expired && access_expired {
            return Some(StaleReason::TtlExpired);
        }
    }

    if let (Some(current), Some(stored)) = (config.current_version(), entry.entry_version.as_ref())
    {
        if &current != stored {
            return Some(StaleReason::VersionMismatch);
        }
    }

    if let Some(dirty) = &config.dirty_predicate {
        if dirty(key, entry) {
            return Some(StaleReason::CustomDirty);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Fields;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    type Config = CacheConfig<&'static str, u32>;

    fn entry_aged(ms: i64, version: Option<&str>) -> CacheEntry<&'static str, u32> {
        CacheEntry::created_at(
            "k",
            7,
            Utc::now() - ChronoDuration::milliseconds(ms),
            version.map(str::to_string),
            Fields::new(),
        )
    }

    #[test]
    fn test_fresh_without_constraints() {
        let config = Config::default();
        let entry = entry_aged(10_000, None);
        assert_eq!(is_stale(&"k", &entry, &config, None, Utc::now()), None);
    }

    #[test]
    fn test_ttl_expired() {
        let config = Config::default().with_ttl(Duration::from_millis(100));
        let entry = entry_aged(200, None);
        assert_eq!(
            is_stale(&"k", &entry, &config, None, Utc::now()),
            Some(StaleReason::TtlExpired)
        );
    }

    #[test]
    fn test_ttl_not_yet_expired() {
        let config = Config::default().with_ttl(Duration::from_secs(10));
        let entry = entry_aged(200, None);
        assert_eq!(is_stale(&"k", &entry, &config, None, Utc::now()), None);
    }

    #[test]
    fn test_recent_access_extends_ttl() {
        let config = Config::default()
            .with_ttl(Duration::from_millis(200))
            .with_refresh_ttl_on_access(true);
        let entry = entry_aged(450, None);
        let now = Utc::now();

        let recent = Some(now - ChronoDuration::milliseconds(150));
        assert_eq!(is_stale(&"k", &entry, &config, recent, now), None);

        let old = Some(now - ChronoDuration::milliseconds(300));
        assert_eq!(
            is_stale(&"k", &entry, &config, old, now),
            Some(StaleReason::TtlExpired)
        );
    }

    #[test]
    fn test_version_mismatch() {
        let config = Config::default().with_version("v2");
        let entry = entry_aged(0, Some("v1"));
        assert_eq!(
            is_stale(&"k", &entry, &config, None, Utc::now()),
            Some(StaleReason::VersionMismatch)
        );

        let entry = entry_aged(0, Some("v2"));
        assert_eq!(is_stale(&"k", &entry, &config, None, Utc::now()), None);
    }

    #[test]
    fn test_version_ignored_when_entry_unversioned() {
        let config = Config::default().with_version("v2");
        let entry = entry_aged(0, None);
        assert_eq!(is_stale(&"k", &entry, &config, None, Utc::now()), None);
    }

    #[test]
    fn test_custom_dirty() {
        let config = Config::default().with_dirty_predicate(|_, entry| entry.data > 5);
        let entry = entry_aged(0, None);
        assert_eq!(
            is_stale(&"k", &entry, &config, None, Utc::now()),
            Some(StaleReason::CustomDirty)
        );
    }

    #[test]
    fn test_ttl_checked_before_version() {
        let config = Config::default()
            .with_ttl(Duration::from_millis(50))
            .with_version("v2");
        let entry = entry_aged(500, Some("v1"));
        assert_eq!(
            is_stale(&"k", &entry, &config, None, Utc::now()),
            Some(StaleReason::TtlExpired)
        );
    }
}
