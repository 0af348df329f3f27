//! Process-local store backend

use crate::error::{RelayError, RelayResult};
use crate::store::{validate_store_name, CacheKey, CacheStorage, Entry};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// In-memory stores, lost when the process exits
#[derive(Default)]
pub struct MemoryStorage {
    stores: RwLock<BTreeMap<String, HashMap<CacheKey, Entry>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, store: &str) -> RelayResult<()> {
        validate_store_name(store)?;
        self.stores
            .write()
            .await
            .entry(store.to_string())
            .or_default();
        Ok(())
    }

    async fn get(&self, store: &str, key: &CacheKey) -> RelayResult<Option<Entry>> {
        let stores = self.stores.read().await;
        Ok(stores.get(store).and_then(|entries| entries.get(key)).cloned())
    }

    async fn put(&self, store: &str, key: &CacheKey, entry: Entry) -> RelayResult<()> {
        validate_store_name(store)?;
        self.stores
            .write()
            .await
            .entry(store.to_string())
            .or_default()
            .insert(key.clone(), entry);
        Ok(())
    }

    async fn delete_store(&self, store: &str) -> RelayResult<bool> {
        Ok(self.stores.write().await.remove(store).is_some())
    }

    async fn list_names(&self) -> RelayResult<Vec<String>> {
        Ok(self.stores.read().await.keys().cloned().collect())
    }

    async fn keys(&self, store: &str) -> RelayResult<Vec<CacheKey>> {
        let stores = self.stores.read().await;
        let entries = stores
            .get(store)
            .ok_or_else(|| RelayError::StoreNotFound(store.to_string()))?;
        let mut keys: Vec<CacheKey> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
