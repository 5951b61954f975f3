//! In-memory store

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::{check_key, ByteStore, StoreError, StoreResult};

/// Process-local store backed by a concurrent map.
///
/// Data is lost when the last handle is dropped, so it is reported as
/// non-persistent.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Bytes>,
    read_only: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject all further mutations
    pub fn enable_readonly(&self) {
        self.read_only.store(true, Ordering::Release);
    }

    /// Allow mutations again
    pub fn disable_readonly(&self) {
        self.read_only.store(false, Ordering::Release);
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_writable(&self, key: &str) -> StoreResult<()> {
        if self.is_read_only() {
            return Err(StoreError::ReadOnly(key.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ByteStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        self.entries
            .get(key)
            .map(|v| v.value().clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()> {
        check_key(key)?;
        self.check_writable(key)?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.check_writable(key)?;
        self.entries
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn clear(&self) -> StoreResult<()> {
        self.check_writable("*")?;
        self.entries.clear();
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        store.set("t/chunks/a", Bytes::from_static(b"xyz")).await.unwrap();
        assert_eq!(store.get("t/chunks/a").await.unwrap(), Bytes::from_static(b"xyz"));
        assert_eq!(store.len(), 1);

        store.delete("t/chunks/a").await.unwrap();
        assert!(matches!(store.get("t/chunks/a").await, Err(StoreError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_list_prefix_sorted() {
        let store = MemoryStore::new();
        for key in ["t/chunks/b", "t/chunks/a", "u/chunks/a", "t/tensor_meta.json"] {
            store.set(key, Bytes::new()).await.unwrap();
        }

        let keys = store.list("t/chunks/").await.unwrap();
        assert_eq!(keys, vec!["t/chunks/a".to_string(), "t/chunks/b".to_string()]);
    }

    #[tokio::test]
    async fn test_readonly_rejects_writes() {
        let store = MemoryStore::new();
        store.set("k", Bytes::from_static(b"v")).await.unwrap();
        store.enable_readonly();

        assert!(store.is_read_only());
        assert!(matches!(store.set("k", Bytes::new()).await, Err(StoreError::ReadOnly(_))));
        assert!(matches!(store.delete("k").await, Err(StoreError::ReadOnly(_))));
        assert!(matches!(store.clear().await, Err(StoreError::ReadOnly(_))));
        assert_eq!(store.get("k").await.unwrap(), Bytes::from_static(b"v"));

        store.disable_readonly();
        store.clear().await.unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_not_persistent() {
        assert!(!MemoryStore::new().is_persistent());
    }
}
