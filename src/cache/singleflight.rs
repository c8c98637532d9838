//! Single-Flight Module
//!
//! Deduplicates concurrent computations for the same key. The first caller
//! starts the computation on a spawned task; later callers attach to the same
//! shared future. The task always runs to completion, even if every caller
//! stops waiting, and removes its in-flight slot when it settles.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::CacheError;

/// Result delivered to every waiter of a flight.
pub type FlightResult<V> = std::result::Result<V, CacheError>;

/// Cloneable handle to an in-flight computation.
pub type SharedFlight<V> = Shared<BoxFuture<'static, FlightResult<V>>>;

struct Flight<V> {
    id: u64,
    future: SharedFlight<V>,
}

// == Single Flight ==
/// Map of in-flight computations keyed by cache key.
pub struct SingleFlight<K, V> {
    inflight: Arc<Mutex<HashMap<K, Flight<V>>>>,
    next_id: AtomicU64,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    // == Get Or Start ==
    /// Returns the flight for `key`, starting `producer` if none is running.
    ///
    /// `producer` is only invoked when a new flight starts. Must be called
    /// from within a Tokio runtime.
    pub fn get_or_start<F, Fut>(&self, key: K, producer: F) -> SharedFlight<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FlightResult<V>> + Send + 'static,
    {
        let mut inflight = self.inflight.lock();
        if let Some(flight) = inflight.get(&key) {
            return flight.future.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let work = producer();
        let slots = Arc::clone(&self.inflight);
        let slot_key = key.clone();

        let handle = tokio::spawn(async move {
            let result = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    warn!("In-flight computation panicked");
                    Err(CacheError::compute(anyhow::anyhow!(
                        "computation panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                }
            };

            let mut slots = slots.lock();
            if slots.get(&slot_key).is_some_and(|f| f.id == id) {
                slots.remove(&slot_key);
            }
            result
        });

        let future = handle
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(CacheError::Internal(format!("computation task failed: {}", e)))
                })
            })
            .boxed()
            .shared();

        debug!("Started in-flight computation #{}", id);
        inflight.insert(
            key,
            Flight {
                id,
                future: future.clone(),
            },
        );
        future
    }

    /// True while a computation for `key` has not settled.
    pub fn is_inflight(&self, key: &K) -> bool {
        self.inflight.lock().contains_key(key)
    }

    /// Number of computations currently running.
    pub fn len(&self) -> usize {
        self.inflight.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.lock().is_empty()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
