//! Read side of the chunk engine

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use strata_compress::{Codec, ImageKind};
use strata_store::ByteStore;
use tracing::trace;

use super::{ChunkIndex, IndexEntry};
use crate::meta::chunk_key;
use crate::{Array, Dtype, Sample, TensorError, TensorMeta, TensorResult};

/// Immutable snapshot of one tensor for reading.
///
/// Keeps the last fetched chunk so consecutive small samples stored in the
/// same chunk cost one fetch. Clones start with an empty cache.
#[derive(Debug)]
pub struct TensorReader {
    name: String,
    key: String,
    meta: Arc<TensorMeta>,
    index: Arc<ChunkIndex>,
    store: Arc<dyn ByteStore>,
    cache: Mutex<Option<(String, Bytes)>>,
}

impl Clone for TensorReader {
    fn clone(&self) -> Self {
        self.with_store(Arc::clone(&self.store))
    }
}

impl TensorReader {
    /// Reader over `index` of the tensor stored under `key`
    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        meta: Arc<TensorMeta>,
        index: Arc<ChunkIndex>,
        store: Arc<dyn ByteStore>,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            meta,
            index,
            store,
            cache: Mutex::new(None),
        }
    }

    /// Same snapshot read through another store handle
    pub fn with_store(&self, store: Arc<dyn ByteStore>) -> Self {
        Self::new(
            self.name.clone(),
            self.key.clone(),
            Arc::clone(&self.meta),
            Arc::clone(&self.index),
            store,
        )
    }

    /// Same snapshot under another display name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        let mut reader = self.clone();
        reader.name = name.into();
        reader
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage key prefix
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Tensor metadata
    pub fn meta(&self) -> &TensorMeta {
        &self.meta
    }

    /// Image codec of the samples, if any
    pub fn image_kind(&self) -> Option<ImageKind> {
        match self.meta.sample_codec() {
            Codec::SampleLevelImage(kind) => Some(kind),
            _ => None,
        }
    }

    /// Number of samples in the snapshot
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Index entry at `position`
    pub fn entry(&self, position: usize) -> TensorResult<&IndexEntry> {
        self.index
            .get(position)
            .ok_or(TensorError::IndexOutOfRange {
                index: position as i64,
                length: self.index.len(),
            })
    }

    /// Fetch and decompress `chunks` in one multi-get
    async fn fetch(&self, chunks: &[String]) -> TensorResult<Vec<Bytes>> {
        if let [only] = chunks {
            let hit = self
                .cache
                .lock()
                .as_ref()
                .filter(|(name, _)| name == only)
                .map(|(_, data)| data.clone());
            if let Some(data) = hit {
                return Ok(vec![data]);
            }
        }

        let keys: Vec<String> = chunks.iter().map(|c| chunk_key(&self.key, c)).collect();
        let blobs = self.store.get_many(&keys).await?;
        let codec = self.meta.chunk_codec();
        let decoded = blobs
            .into_iter()
            .map(|blob| match codec {
                Codec::Identity => Ok(blob),
                _ => codec.decode_bytes(&blob).map(Bytes::from),
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let (Some(name), Some(data)) = (chunks.last(), decoded.last()) {
            *self.cache.lock() = Some((name.clone(), data.clone()));
        }
        Ok(decoded)
    }

    /// Stored bytes of one sample, still in the sample codec's encoding
    pub async fn read_bytes(&self, position: usize) -> TensorResult<Bytes> {
        let entry = self.entry(position)?;
        if entry.is_unwritten() {
            return Ok(Bytes::new());
        }

        let parts = self.fetch(&entry.chunks).await?;
        let joined = match <[Bytes; 1]>::try_from(parts) {
            Ok([one]) => one,
            Err(parts) => {
                let mut buf = BytesMut::with_capacity(parts.iter().map(Bytes::len).sum());
                for part in &parts {
                    buf.extend_from_slice(part);
                }
                buf.freeze()
            }
        };

        let (start, end) = (entry.start_byte as usize, entry.end_byte as usize);
        if start > end || end > joined.len() {
            return Err(TensorError::Corrupted(format!(
                "sample {position} of {}: range {start}..{end} outside {} chunk bytes",
                self.name,
                joined.len()
            )));
        }
        trace!(tensor = %self.name, position, bytes = end - start, "read sample");
        Ok(joined.slice(start..end))
    }

    fn array_dtype(&self) -> TensorResult<Dtype> {
        match self.meta.dtype {
            Some(dtype) if dtype.is_numeric() => Ok(dtype),
            Some(dtype) => Err(TensorError::InvalidArgument(format!(
                "{} holds {dtype} samples, not arrays",
                self.name
            ))),
            None => Err(TensorError::Corrupted(format!(
                "{} has samples but no dtype",
                self.name
            ))),
        }
    }

    /// Decode one sample into an array
    pub async fn read(&self, position: usize) -> TensorResult<Array> {
        let entry = self.entry(position)?;
        let dtype = self.array_dtype()?;
        let missing_shape = || TensorError::ArrayShapeInfoNotFound {
            tensor: self.name.clone(),
            position,
        };

        if entry.is_unwritten() {
            let shape = entry.shape.clone().ok_or_else(missing_shape)?;
            return Array::zeros(dtype, shape);
        }

        let bytes = self.read_bytes(position).await?;
        let (data, codec_shape) = match Codec::from_compression(entry.compression) {
            Codec::Identity => (bytes, None),
            codec => {
                let decoded = codec.decode_sample(&bytes)?;
                (Bytes::from(decoded.data), decoded.shape)
            }
        };
        let shape = entry.shape.clone().or(codec_shape).ok_or_else(missing_shape)?;
        Array::from_bytes(dtype, shape, data)
    }

    /// Decode one sample according to the tensor's dtype
    pub async fn read_sample(&self, position: usize) -> TensorResult<Sample> {
        match self.meta.dtype {
            Some(Dtype::Str) => {
                let bytes = self.read_bytes(position).await?;
                String::from_utf8(bytes.to_vec())
                    .map(Sample::Text)
                    .map_err(|e| TensorError::Corrupted(e.to_string()))
            }
            Some(Dtype::Json) => {
                let bytes = self.read_bytes(position).await?;
                if bytes.is_empty() {
                    return Ok(Sample::Json(serde_json::Value::Null));
                }
                serde_json::from_slice(&bytes)
                    .map(Sample::Json)
                    .map_err(|e| TensorError::Serialization(e.to_string()))
            }
            _ => self.read(position).await.map(Sample::Array),
        }
    }
}
