//! Eviction Manager Module
//!
//! Keeps per-policy bookkeeping (recency ring, insertion ring or frequency
//! counts) and picks a victim when a bounded cache is full.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::Serialize;

use crate::cache::{EvictionStrategy, OrderRing, StaleReason};

// == Removal Cause ==
/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "cause", content = "reason")]
pub enum RemovalCause {
    /// Found stale on access or during a sweep
    Expired(StaleReason),
    /// Chosen as victim to make room
    Evicted,
    /// Removed by an explicit invalidate
    Invalidated,
    /// Removed by tag invalidation
    TagInvalidated,
}

impl fmt::Display for RemovalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalCause::Expired(reason) => write!(f, "expired ({})", reason),
            RemovalCause::Evicted => f.write_str("evicted"),
            RemovalCause::Invalidated => f.write_str("invalidated"),
            RemovalCause::TagInvalidated => f.write_str("tag invalidated"),
        }
    }
}

// == Eviction Manager ==
/// Policy state machine keyed by `(strategy, capacity)`.
///
/// Without a capacity, or with [`EvictionStrategy::None`], no bookkeeping is
/// kept and no victim is ever chosen.
#[derive(Debug)]
pub struct EvictionManager<K> {
    strategy: EvictionStrategy,
    capacity: Option<usize>,
    /// Present for LRU and FIFO with a capacity
    order: Option<OrderRing<K>>,
    /// Present for LFU with a capacity
    frequency: Option<HashMap<K, u64>>,
    /// Insertion sequence per key, the LFU tie-break
    inserted: HashMap<K, u64>,
    next_seq: u64,
}

impl<K: Eq + Hash + Clone> EvictionManager<K> {
    // == Constructor ==
    pub fn new(strategy: EvictionStrategy, capacity: Option<usize>) -> Self {
        let bounded = capacity.is_some();
        let order = match strategy {
            EvictionStrategy::Lru | EvictionStrategy::Fifo if bounded => {
                Some(OrderRing::with_capacity(capacity.unwrap_or_default()))
            }
            _ => None,
        };
        let frequency = match strategy {
            EvictionStrategy::Lfu if bounded => Some(HashMap::new()),
            _ => None,
        };

        Self {
            strategy,
            capacity,
            order,
            frequency,
            inserted: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn strategy(&self) -> EvictionStrategy {
        self.strategy
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// True when a capacity is enforced.
    pub fn is_bounded(&self) -> bool {
        self.order.is_some() || self.frequency.is_some()
    }

    // == Record Hit ==
    /// Updates bookkeeping for a read of `key`.
    pub fn record_hit(&mut self, key: &K) {
        match self.strategy {
            EvictionStrategy::Lru => {
                if let Some(order) = self.order.as_mut() {
                    order.push_front(key);
                }
            }
            EvictionStrategy::Lfu => {
                if let Some(freq) = self.frequency.as_mut() {
                    *freq.entry(key.clone()).or_insert(0) += 1;
                }
            }
            EvictionStrategy::Fifo | EvictionStrategy::None => {}
        }
    }

    // == Prepare For Insert ==
    /// Called before storing `key`. Returns the victim the caller must evict, if any.
    ///
    /// Overwriting an existing key counts as a hit and never evicts another key.
    /// `contains` reports whether a key is still present in the store.
    pub fn prepare_for_insert(
        &mut self,
        key: &K,
        exists: bool,
        store_len: usize,
        contains: impl Fn(&K) -> bool,
    ) -> Option<K> {
        if exists {
            self.record_hit(key);
            return None;
        }

        let capacity = self.capacity?;
        if !self.is_bounded() || store_len < capacity {
            return None;
        }

        self.choose_victim(contains)
    }

    fn choose_victim(&self, contains: impl Fn(&K) -> bool) -> Option<K> {
        if let Some(order) = &self.order {
            return order.iter().rev().find(|k| contains(*k)).cloned();
        }

        // Least frequent wins; among equals, the oldest insertion.
        let freq = self.frequency.as_ref()?;
        freq.iter()
            .filter(|(k, _)| contains(*k))
            .min_by_key(|(k, count)| (**count, self.inserted.get(*k).copied().unwrap_or(0)))
            .map(|(k, _)| k.clone())
    }

    // == Record Insert ==
    /// Registers a newly stored key.
    pub fn record_insert(&mut self, key: &K) {
        if let Some(order) = self.order.as_mut() {
            order.push_front(key);
        }
        if let Some(freq) = self.frequency.as_mut() {
            freq.insert(key.clone(), 1);
            self.inserted.insert(key.clone(), self.next_seq);
            self.next_seq += 1;
        }
    }

    // == Remove ==
    /// Drops all bookkeeping for `key`.
    pub fn remove(&mut self, key: &K) {
        if let Some(order) = self.order.as_mut() {
            order.remove(key);
        }
        if let Some(freq) = self.frequency.as_mut() {
            freq.remove(key);
        }
        self.inserted.remove(key);
    }

    pub fn clear(&mut self) {
        if let Some(order) = self.order.as_mut() {
            order.clear();
        }
        if let Some(freq) = self.frequency.as_mut() {
            freq.clear();
        }
        self.inserted.clear();
        self.next_seq = 0;
    }

    // == Snapshots ==
    /// Keys in eviction order, newest first. Empty unless LRU or FIFO is bounded.
    pub fn order_snapshot(&self) -> Vec<K> {
        self.order
            .as_ref()
            .map(|o| o.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Access frequency of `key` when LFU is bounded.
    pub fn frequency_of(&self, key: &K) -> Option<u64> {
        self.frequency.as_ref()?.get(key).copied()
    }

    /// Overrides the frequency of a tracked key (used when restoring from disk).
    pub fn set_frequency(&mut self, key: &K, count: u64) {
        if let Some(freq) = self.frequency.as_mut() {
            if let Some(slot) = freq.get_mut(key) {
                *slot = count;
            }
        }
    }
}
