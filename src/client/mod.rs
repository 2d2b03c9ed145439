//! Client Module
//!
//! Application-facing handle to an engine process.
//!
//! # Operations
//! - `insert(key, value, ttl_seconds)` - Store a value with a lifetime
//! - `get(key)` - Look up a live value, `None` on miss
//! - `remove(key)` - Delete a key, idempotent
//! - `close()` - Terminate the engine and fail any pending call

mod session;

pub use session::CacheSession;
