//! Cache Module
//!
//! The cache instance runtime: entry storage, staleness evaluation, eviction
//! policies, the tag index, single-flight coordination and the
//! get-or-compute orchestrator that ties them together.

mod config;
mod entry;
mod eviction;
mod instance;
mod order;
mod singleflight;
mod staleness;
mod stats;
mod store;
mod tags;


use std::fmt::Debug;
use std::hash::Hash;

// Re-export public types
pub use config::{
    CacheConfig, ClearHook, DirtyPredicate, ErrorHandler, EvictionStrategy, ExpirationHook,
    FunctionalVersion, MetaFn, Predicate, TagsFn,
};
pub use entry::{CacheEntry, Fields, TagSet};
pub use eviction::{EvictionManager, RemovalCause};
pub use instance::{CacheInstance, PutOutcome};
pub use order::OrderRing;
pub use singleflight::{FlightResult, SharedFlight, SingleFlight};
pub use staleness::{is_stale, StaleReason};
pub use stats::CacheStats;
pub use store::CacheStore;
pub use tags::TagIndex;

// == Bounds ==
/// Requirements on cache keys. Implemented for every type that qualifies.
pub trait CacheKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

/// Requirements on cached values. Implemented for every type that qualifies.
pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Send + Sync + 'static {}
