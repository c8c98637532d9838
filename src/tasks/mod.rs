//! Background Tasks Module
//!
//! Tasks that run periodically while the admin server is up.
//!
//! # Tasks
//! - TTL Cleanup: sweeps stale entries out of every registered cache

mod cleanup;

pub use cleanup::spawn_cleanup_task;
