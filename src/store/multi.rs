//! Multi Store Module
//!
//! Fans a single store contract out over an ordered list of stores, e.g. a
//! small memory tier in front of a larger remote one.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;

use crate::error::{CacheError, Result};
use crate::store::{ensure_batch_cacheable, ensure_cacheable, Store};

/// Reads from the first store holding a key, writes to all of them.
#[derive(Clone)]
pub struct MultiStore {
    stores: Vec<Arc<dyn Store>>,
}

impl MultiStore {
    pub fn new(stores: Vec<Arc<dyn Store>>) -> Result<Self> {
        if stores.is_empty() {
            return Err(CacheError::InvalidConfig(
                "MultiStore needs at least one store".to_string(),
            ));
        }
        Ok(Self { stores })
    }

    pub fn stores(&self) -> &[Arc<dyn Store>] {
        &self.stores
    }
}

impl std::fmt::Debug for MultiStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stores.iter().map(|store| store.name()).collect();
        f.debug_struct("MultiStore").field("stores", &names).finish()
    }
}

#[async_trait]
impl Store for MultiStore {
    fn name(&self) -> &str {
        "multi"
    }

    fn default_ttl(&self) -> Option<u64> {
        None
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        for store in &self.stores {
            if let Some(value) = store.get(key).await? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<u64>) -> Result<()> {
        ensure_cacheable(key, &value)?;
        try_join_all(
            self.stores
                .iter()
                .map(|store| store.set(key, value.clone(), ttl)),
        )
        .await?;
        Ok(())
    }

    async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Value>>> {
        let mut values: Vec<Option<Value>> = vec![None; keys.len()];

        for store in &self.stores {
            let missing: Vec<usize> = (0..keys.len()).filter(|&i| values[i].is_none()).collect();
            if missing.is_empty() {
                break;
            }

            let lookup: Vec<&str> = missing.iter().map(|&i| keys[i]).collect();
            let found = store.mget(&lookup).await?;
            for (i, value) in missing.into_iter().zip(found) {
                values[i] = value;
            }
        }

        Ok(values)
    }

    async fn mset(&self, pairs: Vec<(String, Value)>, ttl: Option<u64>) -> Result<()> {
        ensure_batch_cacheable(&pairs)?;
        try_join_all(
            self.stores
                .iter()
                .map(|store| store.mset(pairs.clone(), ttl)),
        )
        .await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        try_join_all(self.stores.iter().map(|store| store.del(key))).await?;
        Ok(())
    }

    async fn mdel(&self, keys: &[&str]) -> Result<()> {
        try_join_all(self.stores.iter().map(|store| store.mdel(keys))).await?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let per_store = try_join_all(self.stores.iter().map(|store| store.keys())).await?;

        let mut seen = HashSet::new();
        Ok(per_store
            .into_iter()
            .flatten()
            .filter(|key| seen.insert(key.clone()))
            .collect())
    }

    async fn reset(&self) -> Result<()> {
        try_join_all(self.stores.iter().map(|store| store.reset())).await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        for store in &self.stores {
            if store.get(key).await?.is_some() {
                return store.ttl(key).await;
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn two_tiers() -> (Arc<MemoryStore>, Arc<MemoryStore>, MultiStore) {
        let fast = Arc::new(MemoryStore::new(10, 0));
        let slow = Arc::new(MemoryStore::new(100, 0));
        let stores: Vec<Arc<dyn Store>> = vec![fast.clone(), slow.clone()];
        let multi = MultiStore::new(stores).unwrap();
        (fast, slow, multi)
    }

    #[test]
    fn test_empty_multi_store_is_rejected() {
        assert!(matches!(
            MultiStore::new(Vec::new()),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_set_writes_every_tier() {
        let (fast, slow, multi) = two_tiers();

        multi.set("k", json!("v"), None).await.unwrap();

        assert_eq!(fast.get("k").await.unwrap(), Some(json!("v")));
        assert_eq!(slow.get("k").await.unwrap(), Some(json!("v")));
    }

    #[tokio::test]
    async fn test_get_prefers_first_tier() {
        let (fast, slow, multi) = two_tiers();

        slow.set("k", json!("slow"), None).await.unwrap();
        assert_eq!(multi.get("k").await.unwrap(), Some(json!("slow")));

        fast.set("k", json!("fast"), None).await.unwrap();
        assert_eq!(multi.get("k").await.unwrap(), Some(json!("fast")));
    }

    #[tokio::test]
    async fn test_mget_merges_tiers() {
        let (fast, slow, multi) = two_tiers();

        fast.set("a", json!(1), None).await.unwrap();
        slow.set("b", json!(2), None).await.unwrap();

        let values = multi.mget(&["a", "b", "c"]).await.unwrap();
        assert_eq!(values, vec![Some(json!(1)), Some(json!(2)), None]);
    }

    #[tokio::test]
    async fn test_mset_null_touches_no_tier() {
        let (fast, slow, multi) = two_tiers();

        let pairs = vec![("a".to_string(), json!(1)), ("b".to_string(), Value::Null)];
        let result = multi.mset(pairs, None).await;

        assert!(matches!(result, Err(CacheError::NotCacheable { .. })));
        assert!(fast.is_empty().await);
        assert!(slow.is_empty().await);
    }

    #[tokio::test]
    async fn test_keys_are_deduplicated() {
        let (fast, slow, multi) = two_tiers();

        fast.set("a", json!(1), None).await.unwrap();
        slow.set("a", json!(1), None).await.unwrap();
        slow.set("b", json!(2), None).await.unwrap();

        let mut keys = multi.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_del_and_reset_fan_out() {
        let (fast, slow, multi) = two_tiers();

        multi.set("a", json!(1), None).await.unwrap();
        multi.set("b", json!(2), None).await.unwrap();

        multi.del("a").await.unwrap();
        assert_eq!(fast.get("a").await.unwrap(), None);
        assert_eq!(slow.get("a").await.unwrap(), None);

        multi.reset().await.unwrap();
        assert!(slow.keys().await.unwrap().is_empty());
    }
}
