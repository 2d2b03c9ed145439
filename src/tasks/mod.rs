//! Background Tasks Module
//!
//! Contains background tasks that run periodically inside the engine process.
//!
//! # Tasks
//! - TTL Cleanup: Removes expired cache entries at configured intervals

mod cleanup;

pub use cleanup::spawn_cleanup_task;
