//! Cache backing stores.
//!
//! A [`CacheStore`] is a flat key/value map shared by every scope carved out
//! of it. Keys are full, prefix-qualified strings; the scoping logic lives in
//! [`crate::ScopedCache`], not here.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use graphloom_shared::{GraphloomError, Result};
use serde_json::Value;
use tokio::sync::RwLock;

/// Flat, concurrently accessible key/value store backing one or more scopes.
///
/// Values are opaque JSON blobs; equality or identity of cached objects is the
/// caller's concern. Implementations must be safe to share across independent
/// pipeline runs (no lost updates, no torn reads).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the value for a key, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Set a key, silently overwriting any existing value.
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Whether a key is present.
    async fn has(&self, key: &str) -> Result<bool>;

    /// Remove a single key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove every key starting with `prefix`. An empty prefix clears all.
    async fn clear_prefix(&self, prefix: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryCacheStore
// ---------------------------------------------------------------------------

/// In-memory store for tests and single-process runs.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCacheStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor returning the store ready for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileCacheStore
// ---------------------------------------------------------------------------

/// On-disk store: one JSON file per entry under a root directory.
///
/// `/`-separated key segments become subdirectories, so scope prefixes map
/// onto directory subtrees and `clear_prefix` can prune whole scopes.
pub struct FileCacheStore {
    root: PathBuf,
}

impl FileCacheStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a cache key to its file path, rejecting traversal segments.
    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return Err(GraphloomError::Cache(format!("invalid cache key '{key}'")));
        }
        Ok(self.root.join(format!("{key}.json")))
    }

    /// Map a scope prefix to the directory subtree holding its entries.
    fn prefix_path(&self, prefix: &str) -> PathBuf {
        let trimmed = prefix.trim_end_matches('/');
        if trimmed.is_empty() {
            self.root.clone()
        } else {
            self.root.join(trimmed)
        }
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.entry_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|e| {
                    GraphloomError::Cache(format!("corrupt entry at {}: {e}", path.display()))
                })?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GraphloomError::Cache(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.entry_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GraphloomError::Cache(format!("mkdir {}: {e}", parent.display())))?;
        }
        let bytes = serde_json::to_vec(&value)
            .map_err(|e| GraphloomError::Cache(format!("serialize '{key}': {e}")))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| GraphloomError::Cache(format!("write {}: {e}", path.display())))
    }

    async fn has(&self, key: &str) -> Result<bool> {
        let path = self.entry_path(key)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GraphloomError::Cache(format!(
                "remove {}: {e}",
                path.display()
            ))),
        }
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<()> {
        let dir = self.prefix_path(prefix);
        // Guard against escaping the cache root via a crafted prefix.
        if !dir.starts_with(&self.root) {
            return Err(GraphloomError::Cache(format!(
                "prefix '{prefix}' escapes cache root"
            )));
        }
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GraphloomError::Cache(format!(
                "clear {}: {e}",
                dir.display()
            ))),
        }
    }
}
