//! Storage collaborators for pipeline input, output, and previous-run data.
//!
//! The pipeline core only needs four operations — get, set, has, delete — over
//! opaque byte payloads at string paths. Format and location are the
//! adapter's concern. [`MemoryStorage`] backs tests and embedded use;
//! [`FileStorage`] roots paths at a directory on disk.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use graphloom_shared::{GraphloomError, Result};
use tokio::sync::RwLock;

/// Byte-oriented key/value storage used by pipeline steps.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the payload at `path`, or `None` if absent.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Write `bytes` at `path`, overwriting any existing payload.
    async fn set(&self, path: &str, bytes: Vec<u8>) -> Result<()>;

    /// Whether a payload exists at `path`.
    async fn has(&self, path: &str) -> Result<bool>;

    /// Delete the payload at `path`. Deleting an absent path is not an error.
    async fn delete(&self, path: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// In-memory storage adapter.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Create an empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor returning the adapter ready for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(path).cloned())
    }

    async fn set(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        self.entries.write().await.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn has(&self, path: &str) -> Result<bool> {
        Ok(self.entries.read().await.contains_key(path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.entries.write().await.remove(path);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStorage
// ---------------------------------------------------------------------------

/// Filesystem storage adapter rooted at a directory.
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Create an adapter rooted at `root`. Directories are created on write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a storage path below the root, rejecting traversal segments.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.is_empty() || path.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return Err(GraphloomError::Storage(format!(
                "invalid storage path '{path}'"
            )));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GraphloomError::Storage(format!(
                "read {}: {e}",
                full.display()
            ))),
        }
    }

    async fn set(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GraphloomError::Storage(format!("mkdir {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| GraphloomError::Storage(format!("write {}: {e}", full.display())))?;
        tracing::debug!(path = %full.display(), "payload written");
        Ok(())
    }

    async fn has(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&full).await.unwrap_or(false))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GraphloomError::Storage(format!(
                "delete {}: {e}",
                full.display()
            ))),
        }
    }
}
