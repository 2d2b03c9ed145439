//! Configuration Module
//!
//! Handles loading engine and session configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

// == Engine Config ==
/// Engine process configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Background cleanup task interval in seconds, `0` disables the sweep
    pub cleanup_interval: u64,
    /// Log every request and response frame at debug level
    pub log_frames: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds, 0 disables it (default: 1)
    /// - `LOG_FRAMES` - Log raw frame traffic (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            log_frames: flag_var("LOG_FRAMES").unwrap_or(defaults.log_frames),
        }
    }

    /// Sweep interval, or `None` when the sweep is disabled.
    pub fn cleanup_period(&self) -> Option<Duration> {
        (self.cleanup_interval > 0).then(|| Duration::from_secs(self.cleanup_interval))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cleanup_interval: 1,
            log_frames: false,
        }
    }
}

// == Session Config ==
/// Client session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Engine binary spawned by `CacheSession::start`
    pub engine_path: PathBuf,
    /// Maximum wait for one response frame
    pub request_timeout: Duration,
    /// Log raw frame traffic and lifecycle problems at debug level
    pub debug: bool,
}

impl SessionConfig {
    /// Creates a new SessionConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_ENGINE_PATH` - Engine binary to spawn (default: `pipecache`)
    /// - `CACHE_REQUEST_TIMEOUT_MS` - Response timeout in milliseconds (default: 5000)
    /// - `CACHE_DEBUG` - Enable debug frame logging (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            engine_path: env::var_os("CACHE_ENGINE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.engine_path),
            request_timeout: parse_var("CACHE_REQUEST_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            debug: flag_var("CACHE_DEBUG").unwrap_or(defaults.debug),
        }
    }

    /// Same configuration with a different engine binary.
    pub fn with_engine_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.engine_path = path.into();
        self
    }

    /// Same configuration with a different response timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            engine_path: PathBuf::from("pipecache"),
            request_timeout: Duration::from_millis(5000),
            debug: false,
        }
    }
}

// == Helpers ==
fn parse_var(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn flag_var(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}
