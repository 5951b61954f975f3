//! strata-compress: sample and chunk codecs
//!
//! Every tensor names its compression through a [`Compression`] tag stored in
//! its metadata. The tag maps onto a closed set of [`Codec`] variants:
//! - [`Codec::Identity`]: bytes stored as-is
//! - [`Codec::ChunkLevel`]: generic byte codecs (lz4, zstd) applied to whole chunks
//! - [`Codec::SampleLevelImage`]: image codecs (png, jpeg) applied to single samples
//!
//! The codec set is versioned together with stored data, so dispatch is a
//! `match` over the enum rather than a registry of trait objects.

#![warn(missing_docs)]

pub mod codec;
pub mod raster;

pub use codec::{Codec, Compression, Decoded, GenericKind, ImageKind, ZSTD_LEVEL};

/// Compression error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Compression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Decompression failed
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// The sample cannot be represented by the codec
    #[error("Unsupported shape for {codec}: {shape:?}")]
    UnsupportedShape {
        /// Codec name
        codec: &'static str,
        /// Offending shape
        shape: Vec<usize>,
    },

    /// Unknown compression tag
    #[error("Unknown compression: {0}")]
    UnknownCompression(String),
}

/// Result type for compression operations
pub type Result<T> = std::result::Result<T, Error>;
