//! Models Module
//!
//! Request and response DTOs for the cache sidecar API.

mod requests;
mod responses;

pub use requests::{ImageQuery, SetRequest, MAX_KEY_LENGTH};
pub use responses::{
    CacheStatsBody, DeleteResponse, GetResponse, HealthResponse, MessageResponse, SetResponse,
    StatsResponse,
};
