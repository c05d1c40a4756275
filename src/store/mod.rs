//! Store Module
//!
//! The contract every backing store fulfils, plus the bundled implementations:
//! an in-memory LRU store with TTL expiry and a fan-out store over several others.

mod entry;
mod lru;
mod memory;
mod multi;
mod stats;


use async_trait::async_trait;
use serde_json::Value;

use crate::error::{CacheError, Result};

// Re-export public types
pub use entry::{current_timestamp_ms, StoreEntry};
pub use lru::LruTracker;
pub use memory::MemoryStore;
pub use multi::MultiStore;
pub use stats::StoreStats;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

// == Store Trait ==
/// A key/value container with TTL-aware expiry.
///
/// TTLs are milliseconds. On writes, `None` applies the store's default TTL
/// and `Some(0)` stores the value without expiry.
///
/// Implementations must reject `Value::Null` on every write path with
/// [`CacheError::NotCacheable`], and must validate a whole batch before
/// writing any of it.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// TTL applied when a write does not carry one. `None` means no expiry.
    fn default_ttl(&self) -> Option<u64>;

    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value, ttl: Option<u64>) -> Result<()>;

    /// Returns one slot per requested key, in request order.
    async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Value>>>;

    async fn mset(&self, pairs: Vec<(String, Value)>, ttl: Option<u64>) -> Result<()>;

    /// Deleting an absent key is a no-op.
    async fn del(&self, key: &str) -> Result<()>;

    async fn mdel(&self, keys: &[&str]) -> Result<()>;

    /// Snapshot of all live keys, in no particular order.
    async fn keys(&self) -> Result<Vec<String>>;

    async fn reset(&self) -> Result<()>;

    /// Remaining lifetime of `key` in milliseconds.
    ///
    /// Returns `None` when the key is absent or stored without expiry.
    async fn ttl(&self, key: &str) -> Result<Option<u64>>;
}

// == Key Validation ==
/// Rejects empty keys and keys longer than [`MAX_KEY_LENGTH`] bytes.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

// == Cacheability ==
/// Whether `value` may be written to a store. `null` is the absent sentinel.
pub fn is_cacheable(value: &Value) -> bool {
    !value.is_null()
}

/// Fails with [`CacheError::NotCacheable`] if `value` is the absent sentinel.
pub fn ensure_cacheable(key: &str, value: &Value) -> Result<()> {
    if is_cacheable(value) {
        Ok(())
    } else {
        Err(CacheError::not_cacheable(key))
    }
}

/// Validates every pair of a batch before any of it is written.
pub fn ensure_batch_cacheable(pairs: &[(String, Value)]) -> Result<()> {
    pairs
        .iter()
        .try_for_each(|(key, value)| ensure_cacheable(key, value))
}
