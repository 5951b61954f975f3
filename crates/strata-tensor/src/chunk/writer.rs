//! Write side of the chunk engine

use std::sync::Arc;

use bytes::Bytes;
use strata_compress::{Codec, Compression};
use strata_store::{ByteStore, StoreError};
use tracing::{debug, trace};

use super::{new_chunk_name, ChunkIndex, IndexEntry, TensorReader};
use crate::meta::{chunk_key, chunks_index_key, tensor_meta_key};
use crate::{TensorError, TensorMeta, TensorResult};

/// The chunk currently accepting bytes
#[derive(Debug)]
struct OpenChunk {
    name: String,
    data: Vec<u8>,
    dirty: bool,
}

impl OpenChunk {
    fn fresh() -> Self {
        let name = new_chunk_name();
        debug!(chunk = %name, "opened chunk");
        Self {
            name,
            data: Vec::new(),
            dirty: false,
        }
    }
}

async fn persist_chunk(
    store: &dyn ByteStore,
    key: &str,
    codec: Codec,
    chunk: &OpenChunk,
) -> TensorResult<()> {
    let blob = codec.encode_bytes(&chunk.data)?;
    store.set(&chunk_key(key, &chunk.name), Bytes::from(blob)).await?;
    Ok(())
}

/// Single writer of one tensor: owns its metadata, index and open chunk.
///
/// Closed chunks are written to the store as soon as they close. The open
/// chunk, index and metadata reach the store on [`TensorWriter::flush`].
#[derive(Debug)]
pub struct TensorWriter {
    key: String,
    meta: Arc<TensorMeta>,
    index: Arc<ChunkIndex>,
    open: Option<OpenChunk>,
    dirty: bool,
}

impl TensorWriter {
    /// Writer for a new tensor stored under `key`
    pub fn create(key: impl Into<String>, meta: TensorMeta) -> Self {
        Self {
            key: key.into(),
            meta: Arc::new(meta),
            index: Arc::new(ChunkIndex::new()),
            open: None,
            dirty: true,
        }
    }

    /// Load an existing tensor. A partially filled last chunk is reopened
    /// so appends continue in it.
    pub async fn load(store: &dyn ByteStore, key: &str) -> TensorResult<Self> {
        let meta = TensorMeta::from_bytes(&store.get(&tensor_meta_key(key)).await?)?;
        let index = match store.get(&chunks_index_key(key)).await {
            Ok(bytes) => ChunkIndex::from_bytes(&bytes)?,
            Err(StoreError::NotFound(_)) => ChunkIndex::new(),
            Err(e) => return Err(e.into()),
        };
        if index.len() != meta.length {
            return Err(TensorError::Corrupted(format!(
                "tensor {key}: metadata length {} but {} index entries",
                meta.length,
                index.len()
            )));
        }

        let mut open = None;
        if let Some(name) = index.last_written().and_then(|e| e.chunks.last()) {
            let blob = store.get(&chunk_key(key, name)).await?;
            let data = meta.chunk_codec().decode_bytes(&blob)?;
            if data.len() < meta.max_chunk_size {
                debug!(tensor = key, chunk = %name, len = data.len(), "reopened chunk");
                open = Some(OpenChunk {
                    name: name.clone(),
                    data,
                    dirty: false,
                });
            }
        }

        Ok(Self {
            key: key.to_string(),
            meta: Arc::new(meta),
            index: Arc::new(index),
            open,
            dirty: false,
        })
    }

    /// Storage key prefix
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current metadata
    pub fn meta(&self) -> &TensorMeta {
        &self.meta
    }

    pub(crate) fn meta_mut(&mut self) -> &mut TensorMeta {
        self.dirty = true;
        Arc::make_mut(&mut self.meta)
    }

    /// Current index
    pub fn index(&self) -> &ChunkIndex {
        &self.index
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Snapshot reader over what has been written so far
    pub fn reader(&self, name: &str, store: Arc<dyn ByteStore>) -> TensorReader {
        TensorReader::new(
            name,
            self.key.clone(),
            Arc::clone(&self.meta),
            Arc::clone(&self.index),
            store,
        )
    }

    fn push_entry(&mut self, entry: IndexEntry) {
        Arc::make_mut(&mut self.index).push(entry);
        Arc::make_mut(&mut self.meta).length += 1;
        self.dirty = true;
    }

    async fn close_open(&mut self, store: &dyn ByteStore) -> TensorResult<()> {
        if let Some(chunk) = self.open.take() {
            if chunk.dirty {
                persist_chunk(store, &self.key, self.meta.chunk_codec(), &chunk).await?;
            }
            debug!(tensor = %self.key, chunk = %chunk.name, len = chunk.data.len(), "closed chunk");
        }
        Ok(())
    }

    /// Append one encoded sample
    pub async fn write(
        &mut self,
        store: &dyn ByteStore,
        payload: &[u8],
        shape: Option<Vec<usize>>,
        compression: Option<Compression>,
    ) -> TensorResult<()> {
        let len = payload.len();
        if len == 0 {
            self.push_entry(IndexEntry {
                chunks: Vec::new(),
                shape,
                start_byte: 0,
                end_byte: 0,
                compression,
            });
            return Ok(());
        }

        let max = self.meta.max_chunk_size;
        let open_len = self.open.as_ref().map_or(0, |c| c.data.len());
        if self.open.is_some() && (open_len >= max || (len <= max && open_len + len > max)) {
            self.close_open(store).await?;
        }

        let start = self.open.as_ref().map_or(0, |c| c.data.len());
        let mut chunks = Vec::new();
        let mut rest = payload;
        loop {
            let chunk = self.open.get_or_insert_with(OpenChunk::fresh);
            let take = (max - chunk.data.len()).min(rest.len());
            chunk.data.extend_from_slice(&rest[..take]);
            chunk.dirty = true;
            chunks.push(chunk.name.clone());
            rest = &rest[take..];
            if rest.is_empty() {
                break;
            }
            self.close_open(store).await?;
        }

        trace!(tensor = %self.key, bytes = len, chunks = chunks.len(), "wrote sample");
        self.push_entry(IndexEntry {
            chunks,
            shape,
            start_byte: start as u64,
            end_byte: (start + len) as u64,
            compression,
        });
        Ok(())
    }

    /// Append a declared but unwritten sample of `shape`
    pub fn write_unwritten(&mut self, shape: Vec<usize>) {
        self.push_entry(IndexEntry::empty(shape));
    }

    /// Persist the open chunk, index and metadata if they changed
    pub async fn flush(&mut self, store: &dyn ByteStore) -> TensorResult<()> {
        let codec = self.meta.chunk_codec();
        if let Some(chunk) = self.open.as_mut() {
            if chunk.dirty {
                persist_chunk(store, &self.key, codec, chunk).await?;
                chunk.dirty = false;
            }
        }
        if self.dirty {
            store
                .set(&chunks_index_key(&self.key), Bytes::from(self.index.to_bytes()?))
                .await?;
            store
                .set(&tensor_meta_key(&self.key), Bytes::from(self.meta.to_bytes()?))
                .await?;
            self.dirty = false;
            debug!(tensor = %self.key, samples = self.index.len(), "flushed tensor");
        }
        Ok(())
    }

    /// Remove every key of this tensor from the store
    pub async fn delete(self, store: &dyn ByteStore) -> TensorResult<()> {
        let keys = store.list(&format!("{}/", self.key)).await?;
        for key in &keys {
            store.delete(key).await?;
        }
        debug!(tensor = %self.key, keys = keys.len(), "deleted tensor");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TensorOptions;
    use strata_store::MemoryStore;

    fn writer(max_chunk_size: usize) -> TensorWriter {
        let meta =
            TensorMeta::new(TensorOptions::default().with_max_chunk_size(max_chunk_size)).unwrap();
        TensorWriter::create("t", meta)
    }

    #[tokio::test]
    async fn test_small_samples_share_chunk() {
        let store = MemoryStore::new();
        let mut w = writer(10);
        w.write(&store, &[1, 2, 3], Some(vec![3]), None).await.unwrap();
        w.write(&store, &[4, 5, 6], Some(vec![3]), None).await.unwrap();

        let a = w.index().get(0).unwrap().clone();
        let b = w.index().get(1).unwrap().clone();
        assert_eq!(a.chunks, b.chunks);
        assert_eq!((a.start_byte, a.end_byte), (0, 3));
        assert_eq!((b.start_byte, b.end_byte), (3, 6));
        // nothing but closed chunks reach the store before a flush
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_chunk_closes_when_full() {
        let store = MemoryStore::new();
        let mut w = writer(10);
        w.write(&store, &[0; 6], None, None).await.unwrap();
        w.write(&store, &[0; 6], None, None).await.unwrap();

        let a = w.index().get(0).unwrap();
        let b = w.index().get(1).unwrap();
        assert_ne!(a.chunks, b.chunks);
        assert_eq!(b.start_byte, 0);
        assert_eq!(store.list("t/chunks/").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_sample_spans_chunks() {
        let store = MemoryStore::new();
        let mut w = writer(4);
        w.write(&store, &[9; 3], None, None).await.unwrap();
        w.write(&store, &[7; 10], None, None).await.unwrap();

        let big = w.index().get(1).unwrap();
        // tail of the first chunk, one full chunk, remainder in the open one
        assert_eq!(big.chunks.len(), 4);
        assert_eq!(big.chunks[0], w.index().get(0).unwrap().chunks[0]);
        assert_eq!((big.start_byte, big.end_byte), (3, 13));
    }

    #[tokio::test]
    async fn test_flush_and_reload() {
        let store = MemoryStore::new();
        let mut w = writer(8);
        w.write(&store, &[1, 2], Some(vec![2]), None).await.unwrap();
        w.flush(&store).await.unwrap();

        let mut reloaded = TensorWriter::load(&store, "t").await.unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.meta().length, 1);

        reloaded.write(&store, &[3, 4], Some(vec![2]), None).await.unwrap();
        let first = reloaded.index().get(0).unwrap().chunks.clone();
        let second = reloaded.index().get(1).unwrap();
        assert_eq!(first, second.chunks);
        assert_eq!(second.start_byte, 2);
    }

    #[tokio::test]
    async fn test_empty_payload_and_unwritten() {
        let store = MemoryStore::new();
        let mut w = writer(8);
        w.write(&store, &[], Some(vec![0]), None).await.unwrap();
        w.write_unwritten(vec![2, 2]);
        assert_eq!(w.len(), 2);
        assert!(w.index().iter().all(IndexEntry::is_unwritten));
    }

    #[tokio::test]
    async fn test_delete_removes_keys() {
        let store = MemoryStore::new();
        store.set("other/x", Bytes::from_static(b"keep")).await.unwrap();
        let mut w = writer(4);
        w.write(&store, &[1; 9], None, None).await.unwrap();
        w.flush(&store).await.unwrap();
        assert!(store.len() > 3);

        w.delete(&store).await.unwrap();
        assert_eq!(store.list("").await.unwrap(), vec!["other/x".to_string()]);
    }
}
