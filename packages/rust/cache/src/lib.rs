//! Hierarchical scoped cache for pipeline memoization.
//!
//! A [`ScopedCache`] is a namespaced view over a shared [`CacheStore`]. Child
//! scopes (`parent_prefix + name + "/"`) are isolated from parents and
//! siblings: writes in one scope are never visible in another, and clearing a
//! scope only prunes its own subtree.
//!
//! **Failure policy:** a correctness-preserving cache may always be
//! legitimately empty, so backing-store and serialization failures degrade to
//! a miss (logged at `warn`) instead of propagating. Only the raw
//! [`CacheStore`] layer surfaces errors.

mod store;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

pub use store::{CacheStore, FileCacheStore, MemoryCacheStore};

/// A namespaced cache handle bound to a key prefix of a shared store.
#[derive(Clone)]
pub struct ScopedCache {
    store: Arc<dyn CacheStore>,
    prefix: String,
}

impl ScopedCache {
    /// Create a root scope (empty prefix) over `store`.
    pub fn root(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            prefix: String::new(),
        }
    }

    /// Create a child scope named `name`, sharing the same underlying store.
    ///
    /// Two children with different names never collide; operations on a child
    /// never observe or mutate keys outside its own subtree.
    pub fn child(&self, name: &str) -> Self {
        Self {
            store: Arc::clone(&self.store),
            prefix: format!("{}{}/", self.prefix, name),
        }
    }

    /// This scope's key prefix (`""` for the root).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn qualified(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Get the raw value for `key`, or `None` on a miss.
    ///
    /// Store failures degrade to a miss.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let full = self.qualified(key);
        match self.store.get(&full).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %full, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Set `key` to `value`, silently overwriting. Store failures are absorbed.
    pub async fn set(&self, key: &str, value: Value) {
        let full = self.qualified(key);
        if let Err(e) = self.store.set(&full, value).await {
            warn!(key = %full, error = %e, "cache write failed, entry dropped");
        }
    }

    /// Whether `key` is present in this scope. Store failures read as absent.
    pub async fn has(&self, key: &str) -> bool {
        let full = self.qualified(key);
        match self.store.has(&full).await {
            Ok(present) => present,
            Err(e) => {
                warn!(key = %full, error = %e, "cache probe failed, treating as miss");
                false
            }
        }
    }

    /// Remove `key` from this scope.
    pub async fn remove(&self, key: &str) {
        let full = self.qualified(key);
        if let Err(e) = self.store.remove(&full).await {
            warn!(key = %full, error = %e, "cache remove failed");
        }
    }

    /// Clear this scope's subtree. Ancestors and siblings are untouched;
    /// clearing the root clears everything.
    pub async fn clear(&self) {
        if let Err(e) = self.store.clear_prefix(&self.prefix).await {
            warn!(prefix = %self.prefix, error = %e, "cache clear failed");
        }
    }

    /// Typed read: deserialize the cached value, treating shape mismatches as
    /// a miss (a stale entry written by an older version must not fail a run).
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(key = %self.qualified(key), error = %e, "cached value has unexpected shape");
                None
            }
        }
    }

    /// Typed write: serialize `value` and store it under `key`.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(json) => self.set(key, json).await,
            Err(e) => {
                warn!(key = %self.qualified(key), error = %e, "cache value serialization failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_root() -> ScopedCache {
        ScopedCache::root(MemoryCacheStore::shared())
    }

    fn file_root() -> (ScopedCache, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("graphloom_cache_{}", uuid::Uuid::now_v7()));
        let cache = ScopedCache::root(Arc::new(FileCacheStore::new(&dir)));
        (cache, dir)
    }

    #[tokio::test]
    async fn set_get_roundtrip() {
        let cache = memory_root();
        cache.set("alpha", json!({"n": 1})).await;
        assert_eq!(cache.get("alpha").await, Some(json!({"n": 1})));
        assert!(cache.has("alpha").await);
    }

    #[tokio::test]
    async fn miss_is_none_not_error() {
        let cache = memory_root();
        assert_eq!(cache.get("never-set").await, None);
        assert!(!cache.has("never-set").await);
    }

    #[tokio::test]
    async fn set_overwrites_silently() {
        let cache = memory_root();
        cache.set("k", json!(1)).await;
        cache.set("k", json!(2)).await;
        assert_eq!(cache.get("k").await, Some(json!(2)));
    }

    #[tokio::test]
    async fn child_scopes_are_isolated() {
        let root = memory_root();
        let left = root.child("left");
        let right = root.child("right");

        left.set("key", json!("left-value")).await;

        assert!(!root.has("key").await);
        assert!(!right.has("key").await);
        assert_eq!(left.get("key").await, Some(json!("left-value")));
    }

    #[tokio::test]
    async fn clearing_child_spares_parent_and_sibling() {
        let root = memory_root();
        let left = root.child("left");
        let right = root.child("right");

        root.set("root-key", json!(0)).await;
        left.set("k", json!(1)).await;
        right.set("k", json!(2)).await;

        left.clear().await;

        assert!(!left.has("k").await);
        assert!(root.has("root-key").await);
        assert!(right.has("k").await);
    }

    #[tokio::test]
    async fn clearing_root_clears_descendants() {
        let root = memory_root();
        let child = root.child("run-1");
        let grandchild = child.child("extract");

        root.set("a", json!(1)).await;
        child.set("b", json!(2)).await;
        grandchild.set("c", json!(3)).await;

        root.clear().await;

        assert!(!root.has("a").await);
        assert!(!child.has("b").await);
        assert!(!grandchild.has("c").await);
    }

    #[tokio::test]
    async fn sibling_name_prefixes_do_not_collide() {
        let root = memory_root();
        let ab = root.child("ab");
        let abc = root.child("abc");

        abc.set("x", json!(true)).await;
        ab.clear().await;

        assert!(abc.has("x").await);
    }

    #[tokio::test]
    async fn typed_roundtrip_and_shape_mismatch() {
        let cache = memory_root();
        cache.set_json("ids", &vec![1u32, 2, 3]).await;
        assert_eq!(cache.get_json::<Vec<u32>>("ids").await, Some(vec![1, 2, 3]));

        // Wrong shape degrades to a miss rather than erroring.
        assert_eq!(cache.get_json::<String>("ids").await, None);
    }

    #[tokio::test]
    async fn file_store_roundtrip_and_scope_clear() {
        let (root, dir) = file_root();
        let child = root.child("scoped");

        root.set("top", json!("root")).await;
        child.set("inner", json!({"deep": [1, 2]})).await;

        assert_eq!(child.get("inner").await, Some(json!({"deep": [1, 2]})));

        child.clear().await;
        assert!(!child.has("inner").await);
        assert_eq!(root.get("top").await, Some(json!("root")));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let (root, dir) = file_root();
        root.set("persisted", json!(42)).await;
        drop(root);

        let reopened = ScopedCache::root(Arc::new(FileCacheStore::new(&dir)));
        assert_eq!(reopened.get("persisted").await, Some(json!(42)));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn corrupt_file_entry_degrades_to_miss() {
        let (root, dir) = file_root();
        root.set("entry", json!(1)).await;
        std::fs::write(dir.join("entry.json"), b"{not json").expect("corrupt entry");

        assert_eq!(root.get("entry").await, None);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn concurrent_scopes_share_one_store() {
        let store = MemoryCacheStore::shared();
        let run_a = ScopedCache::root(store.clone()).child("run-a");
        let run_b = ScopedCache::root(store).child("run-b");

        let (a, b) = tokio::join!(
            async {
                for i in 0..50 {
                    run_a.set(&format!("k{i}"), json!(i)).await;
                }
                run_a.get("k49").await
            },
            async {
                for i in 0..50 {
                    run_b.set(&format!("k{i}"), json!(i * 2)).await;
                }
                run_b.get("k49").await
            }
        );

        assert_eq!(a, Some(json!(49)));
        assert_eq!(b, Some(json!(98)));
    }
}
