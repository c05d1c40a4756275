//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::store::validate_key;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value except `null`
/// - `ttl`: Optional TTL in milliseconds (uses default if not specified, 0 = no expiry)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Validates the request data before it reaches the store.
    pub fn validate(&self) -> Result<()> {
        validate_key(&self.key)
    }
}

/// Request body for PUT /mset
#[derive(Debug, Clone, Deserialize)]
pub struct MsetRequest {
    /// `[key, value]` pairs
    pub pairs: Vec<(String, Value)>,
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl MsetRequest {
    pub fn validate(&self) -> Result<()> {
        self.pairs.iter().try_for_each(|(key, _)| validate_key(key))
    }
}

/// Request body for POST /mget and POST /mdel
#[derive(Debug, Clone, Deserialize)]
pub struct KeysRequest {
    pub keys: Vec<String>,
}

impl KeysRequest {
    pub fn key_refs(&self) -> Vec<&str> {
        self.keys.iter().map(String::as_str).collect()
    }
}
