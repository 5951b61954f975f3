//! Tensor creation options

use serde::{Deserialize, Serialize};
use strata_compress::Compression;

use crate::{Dtype, Htype, TensorError, TensorResult};

/// Default upper bound on a chunk's raw size
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024; // 16 MB

/// Options for [`crate::Dataset::create_tensor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorOptions {
    /// Semantic type
    pub htype: Htype,
    /// Element type; inferred from the first sample when unset
    pub dtype: Option<Dtype>,
    /// Per-sample image codec
    pub sample_compression: Option<Compression>,
    /// Whole-chunk byte codec
    pub chunk_compression: Option<Compression>,
    /// Upper bound on a chunk's raw size in bytes
    pub max_chunk_size: usize,
    /// Initial class names (class_label only)
    pub class_names: Vec<String>,
}

impl Default for TensorOptions {
    fn default() -> Self {
        Self {
            htype: Htype::Generic,
            dtype: None,
            sample_compression: None,
            chunk_compression: None,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            class_names: Vec::new(),
        }
    }
}

impl TensorOptions {
    /// Options for the given htype
    pub fn new(htype: Htype) -> Self {
        Self {
            htype,
            ..Default::default()
        }
    }

    /// Set the dtype
    pub fn with_dtype(mut self, dtype: Dtype) -> Self {
        self.dtype = Some(dtype);
        self
    }

    /// Set the sample compression
    pub fn with_sample_compression(mut self, compression: Compression) -> Self {
        self.sample_compression = Some(compression);
        self
    }

    /// Set the chunk compression
    pub fn with_chunk_compression(mut self, compression: Compression) -> Self {
        self.chunk_compression = Some(compression);
        self
    }

    /// Set the chunk size bound
    pub fn with_max_chunk_size(mut self, bytes: usize) -> Self {
        self.max_chunk_size = bytes;
        self
    }

    /// Set the initial class names
    pub fn with_class_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.class_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Fill htype defaults. Explicit settings win; a chunk codec suppresses
    /// the htype's default sample codec.
    pub fn resolved(mut self) -> TensorResult<Self> {
        self.dtype = self.dtype.or(self.htype.default_dtype());
        if self.sample_compression.is_none() && self.chunk_compression.is_none() {
            self.sample_compression = self.htype.default_sample_compression();
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate the options
    pub fn validate(&self) -> TensorResult<()> {
        let invalid = |msg: String| Err(TensorError::InvalidArgument(msg));

        if self.max_chunk_size == 0 {
            return invalid("max_chunk_size must be > 0".to_string());
        }
        if self.sample_compression.is_some() && self.chunk_compression.is_some() {
            return invalid("sample_compression and chunk_compression are mutually exclusive".to_string());
        }
        if let Some(c) = self.sample_compression {
            if !c.is_image() {
                return invalid(format!("{c} is a chunk codec; use chunk_compression"));
            }
            if self.htype.is_textual() {
                return invalid(format!("{} tensors cannot use {c}", self.htype));
            }
            if let Some(dtype) = self.dtype.filter(|d| *d != Dtype::Uint8) {
                return invalid(format!("{c} requires uint8 samples, not {dtype}"));
            }
        }
        if let Some(c) = self.chunk_compression {
            if c.is_image() {
                return invalid(format!("{c} is a sample codec; use sample_compression"));
            }
        }
        if let (Some(expected), Some(dtype)) = (self.htype.default_dtype(), self.dtype) {
            let fixed = self.htype.is_textual();
            if fixed && dtype != expected {
                return invalid(format!("{} tensors hold {expected}, not {dtype}", self.htype));
            }
        }
        if let Some(dtype) = self.dtype {
            if !self.htype.is_textual() && !dtype.is_numeric() {
                return invalid(format!("{} tensors cannot hold {dtype}", self.htype));
            }
        }
        if self.htype == Htype::ClassLabel {
            if let Some(dtype) = self.dtype.filter(|d| !d.is_integer()) {
                return invalid(format!("class labels must be integers, not {dtype}"));
            }
        }
        if !self.class_names.is_empty() && self.htype != Htype::ClassLabel {
            return invalid("class_names require the class_label htype".to_string());
        }
        Ok(())
    }
}
