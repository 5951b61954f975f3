//! Compression tags and the closed codec set

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{raster, Error, Result};

/// Zstandard level used for chunks
pub const ZSTD_LEVEL: i32 = 3;

/// Compression tag persisted in tensor metadata and chunk index entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// LZ4 frame with size prefix
    Lz4,
    /// Zstandard
    Zstd,
    /// Lossless PNG
    Png,
    /// Lossy JPEG
    Jpeg,
}

impl Compression {
    /// Tag name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Lz4 => "lz4",
            Compression::Zstd => "zstd",
            Compression::Png => "png",
            Compression::Jpeg => "jpeg",
        }
    }

    /// Whether this tag names an image codec
    pub fn is_image(&self) -> bool {
        matches!(self, Compression::Png | Compression::Jpeg)
    }

    /// Parse an optional tag where `"none"` and the empty string mean no compression
    pub fn parse_optional(s: &str) -> Result<Option<Self>> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(None),
            other => other.parse().map(Some),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lz4" => Ok(Compression::Lz4),
            "zstd" | "zst" => Ok(Compression::Zstd),
            "png" => Ok(Compression::Png),
            "jpeg" | "jpg" => Ok(Compression::Jpeg),
            _ => Err(Error::UnknownCompression(s.to_string())),
        }
    }
}

/// Generic byte codecs usable at chunk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericKind {
    /// LZ4
    Lz4,
    /// Zstandard at the default level
    Zstd,
}

impl GenericKind {
    /// Codec name
    pub fn name(&self) -> &'static str {
        match self {
            GenericKind::Lz4 => "lz4",
            GenericKind::Zstd => "zstd",
        }
    }

    /// Compress the raw bytes of one chunk.
    ///
    /// Both formats record the raw length, so a blob can be decompressed
    /// without knowing the chunk bound it was written under.
    pub fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        match self {
            GenericKind::Lz4 => Ok(lz4_flex::compress_prepend_size(raw)),
            GenericKind::Zstd => zstd::bulk::compress(raw, ZSTD_LEVEL)
                .map_err(|e| Error::Compression(format!("zstd chunk: {e}"))),
        }
    }

    /// Restore the raw bytes of one chunk blob
    pub fn decompress(&self, blob: &[u8]) -> Result<Vec<u8>> {
        match self {
            GenericKind::Lz4 => lz4_flex::decompress_size_prepended(blob)
                .map_err(|e| Error::Decompression(format!("lz4 chunk: {e}"))),
            GenericKind::Zstd => zstd::stream::decode_all(blob)
                .map_err(|e| Error::Decompression(format!("zstd chunk: {e}"))),
        }
    }
}

/// Image codecs usable at sample level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// PNG
    Png,
    /// JPEG
    Jpeg,
}

impl ImageKind {
    /// Codec name
    pub fn name(&self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpeg",
        }
    }
}

/// Output of [`Codec::decode_sample`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Raw little-endian element bytes
    pub data: Vec<u8>,
    /// Shape carried by the encoded payload, if the codec records one
    pub shape: Option<Vec<usize>>,
}

/// Closed set of codecs a tensor can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Codec {
    /// No compression
    #[default]
    Identity,
    /// Whole chunks are compressed with a generic codec
    ChunkLevel(GenericKind),
    /// Each sample is encoded individually as an image
    SampleLevelImage(ImageKind),
}

impl Codec {
    /// Codec for an optional tag
    pub fn from_compression(tag: Option<Compression>) -> Self {
        match tag {
            None => Codec::Identity,
            Some(Compression::Lz4) => Codec::ChunkLevel(GenericKind::Lz4),
            Some(Compression::Zstd) => Codec::ChunkLevel(GenericKind::Zstd),
            Some(Compression::Png) => Codec::SampleLevelImage(ImageKind::Png),
            Some(Compression::Jpeg) => Codec::SampleLevelImage(ImageKind::Jpeg),
        }
    }

    /// Tag this codec is stored under
    pub fn compression(&self) -> Option<Compression> {
        match self {
            Codec::Identity => None,
            Codec::ChunkLevel(GenericKind::Lz4) => Some(Compression::Lz4),
            Codec::ChunkLevel(GenericKind::Zstd) => Some(Compression::Zstd),
            Codec::SampleLevelImage(ImageKind::Png) => Some(Compression::Png),
            Codec::SampleLevelImage(ImageKind::Jpeg) => Some(Compression::Jpeg),
        }
    }

    /// Whether each sample is encoded on its own
    pub fn is_sample_level(&self) -> bool {
        matches!(self, Codec::SampleLevelImage(_))
    }

    /// Whether whole chunks are compressed
    pub fn is_chunk_level(&self) -> bool {
        matches!(self, Codec::ChunkLevel(_))
    }

    /// Encode an opaque byte buffer (a whole chunk for chunk-level codecs)
    ///
    /// Image codecs need a shape, so they reject this call.
    pub fn encode_bytes(&self, raw: &[u8]) -> Result<Vec<u8>> {
        match self {
            Codec::Identity => Ok(raw.to_vec()),
            Codec::ChunkLevel(kind) => kind.compress(raw),
            Codec::SampleLevelImage(kind) => Err(Error::Compression(format!(
                "{} needs a sample shape",
                kind.name()
            ))),
        }
    }

    /// Inverse of [`Codec::encode_bytes`]
    pub fn decode_bytes(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        match self {
            Codec::Identity => Ok(encoded.to_vec()),
            Codec::ChunkLevel(kind) => kind.decompress(encoded),
            Codec::SampleLevelImage(_) => self.decode_sample(encoded).map(|d| d.data),
        }
    }

    /// Encode one sample's element bytes with its shape
    pub fn encode_sample(&self, raw: &[u8], shape: &[usize]) -> Result<Vec<u8>> {
        match self {
            Codec::SampleLevelImage(kind) => raster::encode(*kind, raw, shape),
            _ => self.encode_bytes(raw),
        }
    }

    /// Decode one sample payload
    pub fn decode_sample(&self, encoded: &[u8]) -> Result<Decoded> {
        match self {
            Codec::SampleLevelImage(kind) => {
                let (data, shape) = raster::decode(*kind, encoded)?;
                Ok(Decoded {
                    data,
                    shape: Some(shape),
                })
            }
            _ => Ok(Decoded {
                data: self.decode_bytes(encoded)?,
                shape: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_parsing() {
        assert_eq!("jpg".parse::<Compression>().unwrap(), Compression::Jpeg);
        assert_eq!("JPEG".parse::<Compression>().unwrap(), Compression::Jpeg);
        assert_eq!("lz4".parse::<Compression>().unwrap(), Compression::Lz4);
        assert!(matches!(
            "bmp".parse::<Compression>(),
            Err(Error::UnknownCompression(_))
        ));
        assert_eq!(Compression::parse_optional("none").unwrap(), None);
        assert_eq!(
            Compression::parse_optional("png").unwrap(),
            Some(Compression::Png)
        );
    }

    #[test]
    fn test_tag_serde() {
        let json = serde_json::to_string(&Compression::Zstd).unwrap();
        assert_eq!(json, "\"zstd\"");
        let back: Option<Compression> = serde_json::from_str("null").unwrap();
        assert_eq!(back, None);
    }

    #[test]
    fn test_codec_mapping() {
        for tag in [
            None,
            Some(Compression::Lz4),
            Some(Compression::Zstd),
            Some(Compression::Png),
            Some(Compression::Jpeg),
        ] {
            assert_eq!(Codec::from_compression(tag).compression(), tag);
        }
        assert!(Codec::from_compression(Some(Compression::Png)).is_sample_level());
        assert!(Codec::from_compression(Some(Compression::Zstd)).is_chunk_level());
        assert!(!Codec::Identity.is_chunk_level());
    }

    #[test]
    fn test_chunk_level_bytes() {
        let raw: Vec<u8> = (0..4096u32).map(|i| (i % 7) as u8).collect();
        for codec in [
            Codec::Identity,
            Codec::ChunkLevel(GenericKind::Lz4),
            Codec::ChunkLevel(GenericKind::Zstd),
        ] {
            let encoded = codec.encode_bytes(&raw).unwrap();
            assert_eq!(codec.decode_bytes(&encoded).unwrap(), raw);
            let decoded = codec.decode_sample(&encoded).unwrap();
            assert_eq!(decoded.shape, None);
        }
    }

    #[test]
    fn test_chunk_blobs() {
        for kind in [GenericKind::Lz4, GenericKind::Zstd] {
            assert_eq!(kind.decompress(&kind.compress(&[]).unwrap()).unwrap(), Vec::<u8>::new());

            // a chunk of repeated small samples compresses well
            let raw = b"sample sample sample sample sample sample".repeat(64);
            let blob = kind.compress(&raw).unwrap();
            assert!(blob.len() < raw.len(), "{}", kind.name());
            assert_eq!(kind.decompress(&blob).unwrap(), raw);

            assert!(matches!(
                kind.decompress(&[8, 0, 0, 0, 0xff, 0xff, 0xff]),
                Err(Error::Decompression(_))
            ));
        }
    }

    #[test]
    fn test_image_codec_needs_shape() {
        let codec = Codec::SampleLevelImage(ImageKind::Png);
        assert!(matches!(codec.encode_bytes(&[0; 4]), Err(Error::Compression(_))));

        let encoded = codec.encode_sample(&[1, 2, 3, 4], &[2, 2]).unwrap();
        let decoded = codec.decode_sample(&encoded).unwrap();
        assert_eq!(decoded.shape, Some(vec![2, 2, 1]));
        assert_eq!(decoded.data, vec![1, 2, 3, 4]);
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn chunk_codecs_roundtrip(raw in prop::collection::vec(any::<u8>(), 0..8192)) {
            for codec in [Codec::ChunkLevel(GenericKind::Lz4), Codec::ChunkLevel(GenericKind::Zstd)] {
                let blob = codec.encode_bytes(&raw).unwrap();
                prop_assert_eq!(codec.decode_bytes(&blob).unwrap(), raw.clone());
            }
        }
    }
}
