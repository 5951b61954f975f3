//! Chunk engine
//!
//! Samples are packed in write order into append-only byte chunks bounded by
//! the tensor's `max_chunk_size`. Each sample gets an [`IndexEntry`] naming the
//! chunks it lives in and its byte range within their concatenation:
//!
//! ```text
//!  chunk 3f2a..          chunk 9c01..          chunk 07be..
//! [ s0 | s1 | s2 head ] [ s2 middle        ] [ s2 tail | s3 ]
//!                  ^ start_byte(s2)                   ^ end_byte(s2)
//! ```
//!
//! Small samples co-reside in one chunk; a sample larger than the bound
//! fills the tail of the open chunk and continues in fresh chunks.

mod reader;
mod writer;

pub use reader::TensorReader;
pub use writer::TensorWriter;

use serde::{Deserialize, Serialize};
use strata_compress::Compression;

use crate::{TensorError, TensorResult};

/// Location and encoding of one sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Chunks holding the sample, in order. Empty for unwritten samples.
    pub chunks: Vec<String>,
    /// Sample shape, if known at write time
    pub shape: Option<Vec<usize>>,
    /// Offset of the first byte in the concatenation of `chunks`
    pub start_byte: u64,
    /// Offset one past the last byte
    pub end_byte: u64,
    /// Sample codec the bytes are encoded with
    pub compression: Option<Compression>,
}

impl IndexEntry {
    /// Entry for a declared but unwritten sample
    pub fn empty(shape: Vec<usize>) -> Self {
        Self {
            chunks: Vec::new(),
            shape: Some(shape),
            start_byte: 0,
            end_byte: 0,
            compression: None,
        }
    }

    /// Encoded size in bytes
    pub fn byte_len(&self) -> u64 {
        self.end_byte - self.start_byte
    }

    /// Whether the sample has no stored bytes
    pub fn is_unwritten(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Ordered index entries of one tensor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkIndex {
    entries: Vec<IndexEntry>,
}

impl ChunkIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn push(&mut self, entry: IndexEntry) {
        self.entries.push(entry);
    }

    /// Entry at `position`
    pub fn get(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.get(position)
    }

    /// Last entry that references a chunk
    pub fn last_written(&self) -> Option<&IndexEntry> {
        self.entries.iter().rev().find(|e| !e.is_unwritten())
    }

    /// Iterate over entries
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to bytes using MessagePack
    pub fn to_bytes(&self) -> TensorResult<Vec<u8>> {
        rmp_serde::to_vec(&self.entries).map_err(|e| TensorError::Serialization(e.to_string()))
    }

    /// Deserialize from bytes using MessagePack
    pub fn from_bytes(bytes: &[u8]) -> TensorResult<Self> {
        let entries =
            rmp_serde::from_slice(bytes).map_err(|e| TensorError::Serialization(e.to_string()))?;
        Ok(Self { entries })
    }
}

/// Fresh random chunk name: 16 hex digits
pub(crate) fn new_chunk_name() -> String {
    format!("{:016x}", rand::random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(chunks: &[&str], start: u64, end: u64) -> IndexEntry {
        IndexEntry {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            shape: Some(vec![end as usize - start as usize]),
            start_byte: start,
            end_byte: end,
            compression: None,
        }
    }

    #[test]
    fn test_index_empty() {
        let index = ChunkIndex::new();
        assert!(index.is_empty());
        assert!(index.get(0).is_none());
        assert!(index.last_written().is_none());
    }

    #[test]
    fn test_index_roundtrip() {
        let mut index = ChunkIndex::new();
        index.push(entry(&["a"], 0, 10));
        index.push(IndexEntry {
            compression: Some(Compression::Png),
            shape: None,
            ..entry(&["a", "b", "c"], 10, 70)
        });
        index.push(IndexEntry::empty(vec![2, 2]));

        let decoded = ChunkIndex::from_bytes(&index.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, index);
        assert_eq!(decoded.get(1).unwrap().byte_len(), 60);
        assert!(decoded.get(2).unwrap().is_unwritten());
        assert_eq!(decoded.last_written().unwrap().chunks.len(), 3);
    }

    #[test]
    fn test_chunk_names() {
        let a = new_chunk_name();
        let b = new_chunk_name();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
