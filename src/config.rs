//! Configuration Module
//!
//! Handles loading and managing cache and server configuration from environment variables.

use std::env;
use std::str::FromStr;

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the memory store can hold
    pub max_entries: usize,
    /// Default TTL in milliseconds for writes without explicit TTL (0 = no expiry)
    pub default_ttl_ms: u64,
    /// Remaining-TTL cutoff enabling background refresh in `wrap` (unused by the HTTP routes)
    pub refresh_threshold_ms: Option<u64>,
    /// Deadline for wrapped computations (unused by the HTTP routes)
    pub compute_timeout_ms: Option<u64>,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum store entries (default: 1000)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `CACHE_REFRESH_THRESHOLD_MS` - Background refresh threshold (default: unset)
    /// - `CACHE_COMPUTE_TIMEOUT_MS` - Computation deadline (default: unset)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    ///
    /// Values that fail to parse fall back to their defaults.
    ///
    /// The refresh threshold and compute timeout only affect
    /// [`Cache::wrap`](crate::cache::Cache::wrap). The HTTP routes never call
    /// `wrap`, so in the server binary these two settings have no effect.
    /// They are read so that embedders building a facade through
    /// [`CacheOptions::from_config`](crate::cache::CacheOptions::from_config)
    /// share the same environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: parse_var("CACHE_MAX_ENTRIES").unwrap_or(defaults.max_entries),
            default_ttl_ms: parse_var("CACHE_DEFAULT_TTL_MS").unwrap_or(defaults.default_ttl_ms),
            refresh_threshold_ms: parse_var("CACHE_REFRESH_THRESHOLD_MS"),
            compute_timeout_ms: parse_var("CACHE_COMPUTE_TIMEOUT_MS"),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl_ms: 300_000,
            refresh_threshold_ms: None,
            compute_timeout_ms: None,
            server_port: 3000,
            cleanup_interval: 1,
        }
    }
}
