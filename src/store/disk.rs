//! On-disk store backend
//!
//! Layout: `<root>/<store>/<sha256(key)>.json`, one file per entry holding
//! both the key and the captured response. Writes go to a temp file in the
//! same directory and are renamed into place, so a put is atomic per key and
//! concurrent writers resolve last-write-wins.

use crate::error::{RelayError, RelayResult};
use crate::store::{validate_store_name, CacheKey, CacheStorage, Entry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Entry file contents
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: CacheKey,
    #[serde(flatten)]
    entry: Entry,
}

/// Directory-per-store backend
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    /// Create a backend rooted at `root` (created lazily)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, store: &str) -> RelayResult<PathBuf> {
        validate_store_name(store)?;
        Ok(self.root.join(store))
    }

    fn entry_path(dir: &Path, key: &CacheKey) -> PathBuf {
        dir.join(format!("{}.json", key.digest()))
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, store: &str) -> RelayResult<()> {
        let dir = self.store_dir(store)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| RelayError::io(format!("creating store {}", dir.display()), e))
    }

    async fn get(&self, store: &str, key: &CacheKey) -> RelayResult<Option<Entry>> {
        let path = Self::entry_path(&self.store_dir(store)?, key);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RelayError::io(
                    format!("reading entry {}", path.display()),
                    e,
                ))
            }
        };

        let stored: StoredEntry = serde_json::from_str(&content)
            .map_err(|e| RelayError::storage(store, format!("corrupt entry {}: {}", path.display(), e)))?;

        // Digest collision or a hand-edited file
        if &stored.key != key {
            warn!("Entry {} holds key {}, expected {}", path.display(), stored.key, key);
            return Ok(None);
        }

        Ok(Some(stored.entry))
    }

    async fn put(&self, store: &str, key: &CacheKey, entry: Entry) -> RelayResult<()> {
        let dir = self.store_dir(store)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| RelayError::io(format!("creating store {}", dir.display()), e))?;

        let path = Self::entry_path(&dir, key);
        let tmp = dir.join(format!(".{}.{}.tmp", key.digest(), Uuid::new_v4()));
        let content = serde_json::to_string(&StoredEntry {
            key: key.clone(),
            entry,
        })?;

        fs::write(&tmp, content)
            .await
            .map_err(|e| RelayError::io(format!("writing entry {}", tmp.display()), e))?;

        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(RelayError::io(format!("committing entry {}", path.display()), e));
        }

        debug!("Stored {} in {}", key, store);
        Ok(())
    }

    async fn delete_store(&self, store: &str) -> RelayResult<bool> {
        let dir = self.store_dir(store)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RelayError::io(format!("deleting store {}", dir.display()), e)),
        }
    }

    async fn list_names(&self) -> RelayResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(RelayError::io("reading stores directory", e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RelayError::io("reading stores directory entry", e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_store_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn keys(&self, store: &str) -> RelayResult<Vec<CacheKey>> {
        let dir = self.store_dir(store)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RelayError::StoreNotFound(store.to_string()))
            }
            Err(e) => return Err(RelayError::io(format!("reading store {}", dir.display()), e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RelayError::io("reading store entry", e))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Ok(content) = fs::read_to_string(&path).await else {
                continue;
            };
            match serde_json::from_str::<StoredEntry>(&content) {
                Ok(stored) => keys.push(stored.key),
                Err(e) => warn!("Skipping unreadable entry {}: {}", path.display(), e),
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}
