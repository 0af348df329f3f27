//! Named response stores
//!
//! A store is an independent namespace mapping request identity to a
//! captured response. Stores are only ever removed whole; there is no
//! per-entry expiry.
//!
//! `CacheRegistry` is what strategy executors use. Its `get` and `put`
//! never fail: a storage fault is logged and treated as a miss or a skipped
//! write, so a broken disk can never keep a network response from reaching
//! the caller.

mod disk;
pub mod entry;
pub mod key;
mod memory;

pub use disk::DiskStorage;
pub use entry::Entry;
pub use key::CacheKey;
pub use memory::MemoryStorage;

use crate::config::{BackendKind, Config, ConfigManager};
use crate::error::{RelayError, RelayResult};
use crate::fetch::{RequestDescriptor, Response};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Abstract store backend
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the store if it does not exist
    async fn open(&self, store: &str) -> RelayResult<()>;

    /// Look up an entry; a missing store is a miss
    async fn get(&self, store: &str, key: &CacheKey) -> RelayResult<Option<Entry>>;

    /// Insert or overwrite an entry, creating the store lazily
    async fn put(&self, store: &str, key: &CacheKey, entry: Entry) -> RelayResult<()>;

    /// Remove a whole store; `false` if it did not exist
    async fn delete_store(&self, store: &str) -> RelayResult<bool>;

    /// Names of all existing stores, sorted
    async fn list_names(&self) -> RelayResult<Vec<String>>;

    /// Keys held by a store, sorted
    async fn keys(&self, store: &str) -> RelayResult<Vec<CacheKey>>;

    /// Backend name for display
    fn backend_name(&self) -> &'static str;
}

/// Reject names that could escape the backend root
pub fn validate_store_name(name: &str) -> RelayResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(RelayError::StoreNameInvalid(name.to_string()))
    }
}

/// Entry point to every store
#[derive(Clone)]
pub struct CacheRegistry {
    storage: Arc<dyn CacheStorage>,
    vary_headers: Arc<[String]>,
}

impl CacheRegistry {
    pub fn new(storage: Arc<dyn CacheStorage>, vary_headers: Vec<String>) -> Self {
        Self {
            storage,
            vary_headers: vary_headers.into(),
        }
    }

    /// Registry over the backend selected in configuration
    pub fn from_config(config: &Config) -> Self {
        let storage: Arc<dyn CacheStorage> = match config.stores.backend {
            BackendKind::Disk => Arc::new(DiskStorage::new(ConfigManager::stores_dir(config))),
            BackendKind::Memory => Arc::new(MemoryStorage::new()),
        };
        Self::new(storage, config.stores.vary_headers.clone())
    }

    /// Identity of a request under the configured vary headers
    pub fn key_for(&self, request: &RequestDescriptor) -> CacheKey {
        CacheKey::for_request(request, &self.vary_headers)
    }

    /// Open (creating if needed) a named store
    pub async fn open(&self, name: &str) -> RelayResult<Store> {
        self.storage.open(name).await?;
        debug!("Opened store {}", name);
        Ok(Store {
            name: name.to_string(),
            registry: self.clone(),
        })
    }

    /// Look up a response; faults count as a miss
    pub async fn get(&self, store: &str, key: &CacheKey) -> Option<Response> {
        match self.storage.get(store, key).await {
            Ok(Some(entry)) => {
                debug!("Cache hit in {}: {}", store, key);
                Some(entry.into_response(store))
            }
            Ok(None) => {
                debug!("Cache miss in {}: {}", store, key);
                None
            }
            Err(e) => {
                warn!("Cache read from {} failed, treating as miss: {}", store, e);
                None
            }
        }
    }

    /// Persist a response; faults are logged and the write skipped.
    ///
    /// Takes the store's own copy of the response. Returns whether the
    /// write landed.
    pub async fn put(&self, store: &str, key: &CacheKey, response: Response) -> bool {
        match self
            .storage
            .put(store, key, Entry::from_response(response))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Cache write to {} failed for {}: {}", store, key, e);
                false
            }
        }
    }

    /// Raw entry lookup that surfaces faults
    pub async fn entry(&self, store: &str, key: &CacheKey) -> RelayResult<Option<Entry>> {
        self.storage.get(store, key).await
    }

    /// Delete a whole store
    pub async fn delete_store(&self, name: &str) -> RelayResult<bool> {
        self.storage.delete_store(name).await
    }

    /// Names of all existing stores
    pub async fn list_names(&self) -> RelayResult<Vec<String>> {
        self.storage.list_names().await
    }

    /// Keys held by a store
    pub async fn keys(&self, store: &str) -> RelayResult<Vec<CacheKey>> {
        self.storage.keys(store).await
    }

    pub fn backend_name(&self) -> &'static str {
        self.storage.backend_name()
    }
}

/// Handle on one opened store
#[derive(Clone)]
pub struct Store {
    name: String,
    registry: CacheRegistry,
}

impl Store {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Response> {
        self.registry.get(&self.name, key).await
    }

    pub async fn put(&self, key: &CacheKey, response: Response) -> bool {
        self.registry.put(&self.name, key, response).await
    }

    pub async fn keys(&self) -> RelayResult<Vec<CacheKey>> {
        self.registry.keys(&self.name).await
    }
}
