//! Engine Module
//!
//! The long-lived side of the channel: owns the cache store and answers
//! request frames one at a time.

mod dispatcher;

pub use dispatcher::{Dispatcher, ServeSummary};
