//! Request and Response models for the admin API
//!
//! DTOs used for serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

pub use requests::{EntriesQuery, InvalidateRequest};
pub use responses::{
    ActionResponse, CacheListResponse, CacheSummary, EntriesResponse, ErrorResponse,
    HealthResponse, LoadResponse, SaveResponse, StatsResponse,
};
