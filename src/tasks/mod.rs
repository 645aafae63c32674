//! Background Tasks Module
//!
//! Contains background tasks that run periodically during sidecar operation.
//!
//! # Tasks
//! - TTL Sweep: Removes expired in-memory cache entries every tenth of the TTL

mod sweep;

pub use sweep::spawn_sweep_task;
