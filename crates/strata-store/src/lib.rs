//! strata-store: byte-oriented key/value storage
//!
//! The chunk engine and the dataloader only ever talk to storage through the
//! [`ByteStore`] trait: a flat `key -> bytes` map with get/set/append/list and
//! a read-only flag. Keys are `/`-separated relative paths.
//!
//! Backends shipped here:
//! - [`MemoryStore`]: non-persistent, process-local map
//! - [`LocalStore`]: files under a root directory
//! - [`ReadOnlyStore`]: wrapper handed to dataloader workers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use strata_store::{ByteStore, MemoryStore};
//!
//! # async fn example() -> strata_store::StoreResult<()> {
//! let store: Arc<dyn ByteStore> = Arc::new(MemoryStore::new());
//! store.set("images/chunks/0001", Bytes::from_static(b"abc")).await?;
//! assert_eq!(store.get("images/chunks/0001").await?, Bytes::from_static(b"abc"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod local;
pub mod memory;
pub mod read_only;

pub use error::{StoreError, StoreResult};
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use read_only::ReadOnlyStore;

use std::fmt;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

/// Byte-oriented key/value store consumed by the chunk engine
#[async_trait]
pub trait ByteStore: Send + Sync + fmt::Debug {
    /// Get the value stored under `key`
    async fn get(&self, key: &str) -> StoreResult<Bytes>;

    /// Get several values in one request, in the order of `keys`
    async fn get_many(&self, keys: &[String]) -> StoreResult<Vec<Bytes>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()>;

    /// Append `value` to whatever is stored under `key`
    async fn append(&self, key: &str, value: Bytes) -> StoreResult<()> {
        let current = match self.get(key).await {
            Ok(current) => current,
            Err(StoreError::NotFound(_)) => Bytes::new(),
            Err(e) => return Err(e),
        };
        let mut joined = BytesMut::with_capacity(current.len() + value.len());
        joined.extend_from_slice(&current);
        joined.extend_from_slice(&value);
        self.set(key, joined.freeze()).await
    }

    /// Delete `key`
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// List every key starting with `prefix`, sorted
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Check whether `key` exists
    async fn contains(&self, key: &str) -> StoreResult<bool> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Remove every key
    async fn clear(&self) -> StoreResult<()>;

    /// Whether mutations are rejected
    fn is_read_only(&self) -> bool;

    /// Whether the data outlives the process
    fn is_persistent(&self) -> bool;
}

/// Reject keys that are empty or would escape a store root
pub(crate) fn check_key(key: &str) -> StoreResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
