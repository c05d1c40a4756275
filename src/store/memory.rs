//! Memory Store Module
//!
//! In-memory store combining HashMap storage with LRU tracking and TTL expiration.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::store::{
    current_timestamp_ms, ensure_batch_cacheable, ensure_cacheable, validate_key, LruTracker,
    Store, StoreEntry, StoreStats,
};

// == Memory State ==
/// Everything guarded by the store lock.
#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, StoreEntry>,
    lru: LruTracker,
    stats: StoreStats,
}

impl MemoryState {
    fn lookup(&mut self, key: &str) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.remove(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        self.lru.touch(key);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    fn insert(&mut self, key: String, entry: StoreEntry, max_entries: usize) {
        // Only a new key can push the store over capacity
        if !self.entries.contains_key(&key) && self.entries.len() >= max_entries {
            if let Some(evicted) = self.lru.evict_oldest() {
                self.entries.remove(&evicted);
                self.stats.record_eviction();
                debug!(key = %evicted, "evicted least recently used entry");
            }
        }

        self.lru.touch(&key);
        self.entries.insert(key, entry);
        self.stats.set_total_entries(self.entries.len());
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.lru.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
    }
}

// == Memory Store ==
/// Bounded in-memory store with LRU eviction and TTL support.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Default TTL in milliseconds, 0 = no expiry
    default_ttl: u64,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a new MemoryStore with specified capacity and default TTL.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of entries, at least 1
    /// * `default_ttl` - Default TTL in milliseconds for writes without one (0 = no expiry)
    pub fn new(max_entries: usize, default_ttl: u64) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            max_entries: max_entries.max(1),
            default_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_entries, config.default_ttl_ms)
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn make_entry(&self, value: Value, ttl: Option<u64>) -> StoreEntry {
        StoreEntry::new(value, ttl.unwrap_or(self.default_ttl))
    }

    // == Stats ==
    /// Returns current store statistics.
    pub async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        stats
    }

    // == Purge Expired ==
    /// Removes all expired entries and returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let mut state = self.state.write().await;
        let now = current_timestamp_ms();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.remove(key);
        }
        state.stats.record_expirations(expired.len());
        expired.len()
    }

    /// Number of entries held, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn default_ttl(&self) -> Option<u64> {
        (self.default_ttl > 0).then_some(self.default_ttl)
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.state.write().await.lookup(key))
    }

    // == Set ==
    /// Stores a value, overwriting any previous value and resetting its TTL.
    ///
    /// If the store is at capacity, the least recently used entry is evicted.
    async fn set(&self, key: &str, value: Value, ttl: Option<u64>) -> Result<()> {
        validate_key(key)?;
        ensure_cacheable(key, &value)?;

        let entry = self.make_entry(value, ttl);
        self.state
            .write()
            .await
            .insert(key.to_string(), entry, self.max_entries);
        Ok(())
    }

    async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Value>>> {
        let mut state = self.state.write().await;
        Ok(keys.iter().map(|key| state.lookup(key)).collect())
    }

    async fn mset(&self, pairs: Vec<(String, Value)>, ttl: Option<u64>) -> Result<()> {
        ensure_batch_cacheable(&pairs)?;
        pairs
            .iter()
            .try_for_each(|(key, _)| validate_key(key))?;

        let mut state = self.state.write().await;
        for (key, value) in pairs {
            let entry = self.make_entry(value, ttl);
            state.insert(key, entry, self.max_entries);
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.state.write().await.remove(key);
        Ok(())
    }

    async fn mdel(&self, keys: &[&str]) -> Result<()> {
        let mut state = self.state.write().await;
        for key in keys {
            state.remove(key);
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let now = current_timestamp_ms();
        Ok(state
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.lru.clear();
        state.stats.set_total_entries(0);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .and_then(StoreEntry::ttl_remaining_ms))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::store::MAX_KEY_LENGTH;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_store_new() {
        let store = MemoryStore::new(100, 300_000);
        assert_eq!(store.len().await, 0);
        assert!(store.is_empty().await);
        assert_eq!(store.default_ttl(), Some(300_000));
    }

    #[tokio::test]
    async fn test_store_zero_capacity_is_clamped() {
        let store = MemoryStore::new(0, 0);
        assert_eq!(store.max_entries(), 1);
        assert_eq!(store.default_ttl(), None);
    }

    #[tokio::test]
    async fn test_store_set_and_get() {
        let store = MemoryStore::new(100, 300_000);

        store.set("key1", json!("value1"), None).await.unwrap();
        let value = store.get("key1").await.unwrap();

        assert_eq!(value, Some(json!("value1")));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_get_nonexistent() {
        let store = MemoryStore::new(100, 300_000);
        assert_eq!(store.get("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_rejects_null() {
        let store = MemoryStore::new(100, 300_000);

        let result = store.set("key1", Value::Null, None).await;
        assert!(matches!(result, Err(CacheError::NotCacheable { .. })));
        assert_eq!(store.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_delete_is_idempotent() {
        let store = MemoryStore::new(100, 300_000);

        store.set("key1", json!(1), None).await.unwrap();
        store.del("key1").await.unwrap();
        store.del("key1").await.unwrap();
        store.del("never_set").await.unwrap();

        assert!(store.is_empty().await);
        assert_eq!(store.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_overwrite() {
        let store = MemoryStore::new(100, 300_000);

        store.set("key1", json!("value1"), None).await.unwrap();
        store.set("key1", json!("value2"), None).await.unwrap();

        assert_eq!(store.get("key1").await.unwrap(), Some(json!("value2")));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_ttl_expiration() {
        let store = MemoryStore::new(100, 300_000);

        store.set("a", json!("x"), Some(100)).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(json!("x")));

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.stats().await.expirations, 1);
    }

    #[tokio::test]
    async fn test_store_zero_ttl_never_expires() {
        let store = MemoryStore::new(100, 50);

        store.set("forever", json!(true), Some(0)).await.unwrap();
        store.set("default", json!(true), None).await.unwrap();
        assert_eq!(store.ttl("forever").await.unwrap(), None);

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(store.get("forever").await.unwrap(), Some(json!(true)));
        assert_eq!(store.get("default").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_ttl_remaining() {
        let store = MemoryStore::new(100, 0);

        store.set("k", json!(1), Some(10_000)).await.unwrap();

        let remaining = store.ttl("k").await.unwrap().unwrap();
        assert!(remaining <= 10_000);
        assert!(remaining >= 9_000);
        assert_eq!(store.ttl("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_lru_eviction() {
        let store = MemoryStore::new(3, 300_000);

        store.set("key1", json!(1), None).await.unwrap();
        store.set("key2", json!(2), None).await.unwrap();
        store.set("key3", json!(3), None).await.unwrap();

        // key1 is least recently used
        store.set("key4", json!(4), None).await.unwrap();

        assert_eq!(store.len().await, 3);
        assert_eq!(store.get("key1").await.unwrap(), None);
        assert!(store.get("key2").await.unwrap().is_some());
        assert!(store.get("key4").await.unwrap().is_some());
        assert_eq!(store.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn test_store_lru_touch_on_get() {
        let store = MemoryStore::new(3, 300_000);

        store.set("key1", json!(1), None).await.unwrap();
        store.set("key2", json!(2), None).await.unwrap();
        store.set("key3", json!(3), None).await.unwrap();

        store.get("key1").await.unwrap();
        store.set("key4", json!(4), None).await.unwrap();

        assert!(store.get("key1").await.unwrap().is_some());
        assert_eq!(store.get("key2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_mget_preserves_order() {
        let store = MemoryStore::new(100, 0);

        store.set("a", json!("A"), None).await.unwrap();
        store.set("c", json!("C"), None).await.unwrap();

        let values = store.mget(&["c", "b", "a"]).await.unwrap();
        assert_eq!(values, vec![Some(json!("C")), None, Some(json!("A"))]);
    }

    #[tokio::test]
    async fn test_store_mset_rejects_whole_batch() {
        let store = MemoryStore::new(100, 0);

        let pairs = vec![
            ("k1".to_string(), json!("v1")),
            ("k2".to_string(), Value::Null),
        ];
        let result = store.mset(pairs, None).await;

        assert!(matches!(result, Err(CacheError::NotCacheable { .. })));
        assert_eq!(store.get("k1").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_mset_and_mdel() {
        let store = MemoryStore::new(100, 0);

        let pairs = vec![
            ("k1".to_string(), json!(1)),
            ("k2".to_string(), json!(2)),
            ("k3".to_string(), json!(3)),
        ];
        store.mset(pairs, Some(60_000)).await.unwrap();
        store.mdel(&["k1", "k3", "missing"]).await.unwrap();

        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["k2".to_string()]);
    }

    #[tokio::test]
    async fn test_store_keys_skip_expired() {
        let store = MemoryStore::new(100, 0);

        store.set("short", json!(1), Some(20)).await.unwrap();
        store.set("long", json!(2), Some(60_000)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.keys().await.unwrap(), vec!["long".to_string()]);
    }

    #[tokio::test]
    async fn test_store_reset() {
        let store = MemoryStore::new(100, 0);

        store.set("a", json!(1), None).await.unwrap();
        store.set("b", json!(2), None).await.unwrap();
        store.reset().await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get("b").await.unwrap(), None);
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_stats() {
        let store = MemoryStore::new(100, 300_000);

        store.set("key1", json!("value1"), None).await.unwrap();
        store.get("key1").await.unwrap();
        store.get("nonexistent").await.unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }

    #[tokio::test]
    async fn test_store_purge_expired() {
        let store = MemoryStore::new(100, 300_000);

        store.set("key1", json!(1), Some(20)).await.unwrap();
        store.set("key2", json!(2), Some(60_000)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get("key2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_store_invalid_keys() {
        let store = MemoryStore::new(100, 300_000);
        let long_key = "x".repeat(MAX_KEY_LENGTH + 1);

        let result = store.set(&long_key, json!(1), None).await;
        assert!(matches!(result, Err(CacheError::InvalidKey(_))));

        let result = store.set("", json!(1), None).await;
        assert!(matches!(result, Err(CacheError::InvalidKey(_))));
    }
}
