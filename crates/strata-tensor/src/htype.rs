//! High-level tensor types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strata_compress::Compression;

use crate::{Dtype, TensorError, TensorResult};

/// Semantic type of a tensor. Decides defaults and how samples are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Htype {
    /// Plain numeric arrays
    #[default]
    Generic,
    /// `u8` pixel arrays `(h, w)` or `(h, w, c)`
    Image,
    /// Integer labels with optional class names
    ClassLabel,
    /// UTF-8 strings
    Text,
    /// Arbitrary JSON documents
    Json,
    /// JSON arrays
    List,
}

impl Htype {
    /// Dtype implied by the htype
    pub fn default_dtype(&self) -> Option<Dtype> {
        match self {
            Htype::Generic => None,
            Htype::Image => Some(Dtype::Uint8),
            Htype::ClassLabel => Some(Dtype::Uint32),
            Htype::Text => Some(Dtype::Str),
            Htype::Json | Htype::List => Some(Dtype::Json),
        }
    }

    /// Sample compression used when none is requested
    pub fn default_sample_compression(&self) -> Option<Compression> {
        match self {
            Htype::Image => Some(Compression::Png),
            _ => None,
        }
    }

    /// Whether samples are stored as serialized text rather than arrays
    pub fn is_textual(&self) -> bool {
        matches!(self, Htype::Text | Htype::Json | Htype::List)
    }

    /// Name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            Htype::Generic => "generic",
            Htype::Image => "image",
            Htype::ClassLabel => "class_label",
            Htype::Text => "text",
            Htype::Json => "json",
            Htype::List => "list",
        }
    }
}

impl fmt::Display for Htype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Htype {
    type Err = TensorError;

    fn from_str(s: &str) -> TensorResult<Self> {
        match s {
            "generic" => Ok(Htype::Generic),
            "image" => Ok(Htype::Image),
            "class_label" => Ok(Htype::ClassLabel),
            "text" => Ok(Htype::Text),
            "json" => Ok(Htype::Json),
            "list" => Ok(Htype::List),
            other => Err(TensorError::InvalidArgument(format!("unknown htype: {other}"))),
        }
    }
}
