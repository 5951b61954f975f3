//! Logical samples read from and written to tensors

use bytes::Bytes;
use strata_compress::Compression;

use crate::Array;

/// One element of a tensor
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// Numeric array
    Array(Array),
    /// Text (text htype, or a class name for class_label tensors)
    Text(String),
    /// JSON value (json and list htypes)
    Json(serde_json::Value),
    /// Declared but unwritten sample, read back as zeros
    Empty {
        /// Shape of the zero array
        shape: Vec<usize>,
    },
    /// Payload already encoded with `compression`, such as the bytes of an image file
    Compressed {
        /// Encoded bytes
        bytes: Bytes,
        /// Codec the bytes are encoded with
        compression: Compression,
    },
}

impl Sample {
    /// Encoded image file bytes
    pub fn compressed(bytes: impl Into<Bytes>, compression: Compression) -> Self {
        Sample::Compressed {
            bytes: bytes.into(),
            compression,
        }
    }

    /// Array payload, if any
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Sample::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Text payload, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Sample::Text(text) => Some(text),
            _ => None,
        }
    }

    /// JSON payload, if any
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Sample::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Take the array payload
    pub fn into_array(self) -> Option<Array> {
        match self {
            Sample::Array(array) => Some(array),
            _ => None,
        }
    }
}

impl From<Array> for Sample {
    fn from(array: Array) -> Self {
        Sample::Array(array)
    }
}

impl From<String> for Sample {
    fn from(text: String) -> Self {
        Sample::Text(text)
    }
}

impl From<&str> for Sample {
    fn from(text: &str) -> Self {
        Sample::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Sample {
    fn from(value: serde_json::Value) -> Self {
        Sample::Json(value)
    }
}
