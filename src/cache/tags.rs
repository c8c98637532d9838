//! Tag Index Module
//!
//! Bidirectional mapping between entry keys and their invalidation tags.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::cache::TagSet;
use crate::error::{CacheError, Result};

// == Tag Index ==
/// Keeps `entry_tags` (key → tags) and `tag_index` (tag → keys) in agreement.
#[derive(Debug)]
pub struct TagIndex<K> {
    entry_tags: HashMap<K, TagSet>,
    tag_index: HashMap<String, HashSet<K>>,
}

impl<K> Default for TagIndex<K> {
    fn default() -> Self {
        Self {
            entry_tags: HashMap::new(),
            tag_index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> TagIndex<K> {
    pub fn new() -> Self {
        Self::default()
    }

    // == Attach ==
    /// Replaces the tag set of `key`. An empty set simply detaches the key.
    pub fn attach(&mut self, key: &K, tags: TagSet) {
        self.detach(key);
        if tags.is_empty() {
            return;
        }
        for tag in &tags {
            self.tag_index
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
        self.entry_tags.insert(key.clone(), tags);
    }

    // == Detach ==
    /// Removes `key` from every tag it carries, dropping tags left without keys.
    pub fn detach(&mut self, key: &K) {
        let Some(tags) = self.entry_tags.remove(key) else {
            return;
        };
        for tag in tags {
            if let Some(keys) = self.tag_index.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_index.remove(&tag);
                }
            }
        }
    }

    // == Find By Tags ==
    /// Keys carrying any of `tags`, or all of them when `match_all` is set.
    ///
    /// An empty tag list is rejected.
    pub fn find_by_tags<S: AsRef<str>>(&self, tags: &[S], match_all: bool) -> Result<HashSet<K>> {
        if tags.is_empty() {
            return Err(CacheError::InvalidRequest(
                "at least one tag is required".to_string(),
            ));
        }

        if !match_all {
            let mut found = HashSet::new();
            for tag in tags {
                if let Some(keys) = self.tag_index.get(tag.as_ref()) {
                    found.extend(keys.iter().cloned());
                }
            }
            return Ok(found);
        }

        let mut found: Option<HashSet<K>> = None;
        for tag in tags {
            let Some(keys) = self.tag_index.get(tag.as_ref()) else {
                return Ok(HashSet::new());
            };
            let next = match found {
                None => keys.clone(),
                Some(acc) => acc.intersection(keys).cloned().collect(),
            };
            if next.is_empty() {
                return Ok(next);
            }
            found = Some(next);
        }
        Ok(found.unwrap_or_default())
    }

    /// Tags currently attached to `key`.
    pub fn tags_of(&self, key: &K) -> Option<&TagSet> {
        self.entry_tags.get(key)
    }

    /// Number of keys carrying `tag`.
    #[cfg(test)]
    pub(crate) fn tag_len(&self, tag: &str) -> usize {
        self.tag_index.get(tag).map_or(0, HashSet::len)
    }

    pub fn clear(&mut self) {
        self.entry_tags.clear();
        self.tag_index.clear();
    }

    /// Checks that both directions agree.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let forward = self.entry_tags.iter().all(|(key, tags)| {
            !tags.is_empty()
                && tags
                    .iter()
                    .all(|t| self.tag_index.get(t).is_some_and(|keys| keys.contains(key)))
        });
        let backward = self.tag_index.iter().all(|(tag, keys)| {
            !keys.is_empty()
                && keys
                    .iter()
                    .all(|k| self.entry_tags.get(k).is_some_and(|tags| tags.contains(tag)))
        });
        forward && backward
    }
}
