//! Read-only view over another store

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{ByteStore, StoreError, StoreResult};

/// Read-only handle onto a shared store.
///
/// Dataloader workers each get one of these so nothing on the read path can
/// mutate the dataset.
#[derive(Debug, Clone)]
pub struct ReadOnlyStore {
    inner: Arc<dyn ByteStore>,
}

impl ReadOnlyStore {
    /// Wrap `inner`
    pub fn new(inner: Arc<dyn ByteStore>) -> Self {
        Self { inner }
    }

    /// Wrap `inner` and return it as a trait object
    pub fn shared(inner: Arc<dyn ByteStore>) -> Arc<dyn ByteStore> {
        Arc::new(Self::new(inner))
    }
}

#[async_trait]
impl ByteStore for ReadOnlyStore {
    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        self.inner.get(key).await
    }

    async fn get_many(&self, keys: &[String]) -> StoreResult<Vec<Bytes>> {
        self.inner.get_many(keys).await
    }

    async fn set(&self, key: &str, _value: Bytes) -> StoreResult<()> {
        Err(StoreError::ReadOnly(key.to_string()))
    }

    async fn append(&self, key: &str, _value: Bytes) -> StoreResult<()> {
        Err(StoreError::ReadOnly(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        Err(StoreError::ReadOnly(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    async fn contains(&self, key: &str) -> StoreResult<bool> {
        self.inner.contains(key).await
    }

    async fn clear(&self) -> StoreResult<()> {
        Err(StoreError::ReadOnly("*".to_string()))
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn is_persistent(&self) -> bool {
        self.inner.is_persistent()
    }
}
