//! Order Ring Module
//!
//! Recency / insertion order tracking shared by the LRU and FIFO policies.

use std::collections::VecDeque;

// == Order Ring ==
/// Ordered set of keys backed by a VecDeque where:
/// - Front = most recently inserted (or used, for LRU)
/// - Back = next eviction candidate
#[derive(Debug, Clone)]
pub struct OrderRing<K> {
    order: VecDeque<K>,
}

impl<K: PartialEq + Clone> OrderRing<K> {
    // == Constructor ==
    /// Creates an empty ring with room for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
        }
    }

    // == Push Front ==
    /// Moves `key` to the front, inserting it if absent.
    pub fn push_front(&mut self, key: &K) {
        self.remove(key);
        self.order.push_front(key.clone());
    }

    // == Remove ==
    /// Removes a key from the ring.
    pub fn remove(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }

    /// The oldest key, without removing it.
    #[cfg(test)]
    pub(crate) fn back(&self) -> Option<&K> {
        self.order.back()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.order.iter().any(|k| k == key)
    }

    /// Keys from front (newest) to back (oldest).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &K> {
        self.order.iter()
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }
}
