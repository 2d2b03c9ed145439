//! Pipecache - An embedded TTL key-value cache behind a binary pipe protocol
//!
//! An engine process owns an in-memory store and answers fixed-width 128-byte
//! request frames on stdin with 128-byte response frames on stdout. A
//! [`CacheSession`] spawns the engine and drives it one request at a time.

pub mod cache;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod tasks;

pub use client::CacheSession;
pub use config::{Config, SessionConfig};
pub use engine::Dispatcher;
pub use error::{CacheError, Result};
pub use tasks::spawn_cleanup_task;
