//! Element types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{TensorError, TensorResult};

/// Data type of a tensor's samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    /// Boolean, one byte per element
    Bool,
    /// 8-bit unsigned integer
    Uint8,
    /// 16-bit unsigned integer
    Uint16,
    /// 32-bit unsigned integer
    Uint32,
    /// 64-bit unsigned integer
    Uint64,
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// UTF-8 text, one string per sample
    Str,
    /// JSON document, one value per sample
    Json,
}

impl Dtype {
    /// Bytes per element; `None` for text and JSON
    pub fn item_size(&self) -> Option<usize> {
        match self {
            Dtype::Bool | Dtype::Uint8 | Dtype::Int8 => Some(1),
            Dtype::Uint16 | Dtype::Int16 => Some(2),
            Dtype::Uint32 | Dtype::Int32 | Dtype::Float32 => Some(4),
            Dtype::Uint64 | Dtype::Int64 | Dtype::Float64 => Some(8),
            Dtype::Str | Dtype::Json => None,
        }
    }

    /// Whether samples are fixed-size numeric arrays
    pub fn is_numeric(&self) -> bool {
        self.item_size().is_some()
    }

    /// Signed or unsigned integer
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Dtype::Uint8
                | Dtype::Uint16
                | Dtype::Uint32
                | Dtype::Uint64
                | Dtype::Int8
                | Dtype::Int16
                | Dtype::Int32
                | Dtype::Int64
        )
    }

    /// Name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            Dtype::Bool => "bool",
            Dtype::Uint8 => "uint8",
            Dtype::Uint16 => "uint16",
            Dtype::Uint32 => "uint32",
            Dtype::Uint64 => "uint64",
            Dtype::Int8 => "int8",
            Dtype::Int16 => "int16",
            Dtype::Int32 => "int32",
            Dtype::Int64 => "int64",
            Dtype::Float32 => "float32",
            Dtype::Float64 => "float64",
            Dtype::Str => "str",
            Dtype::Json => "json",
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dtype {
    type Err = TensorError;

    fn from_str(s: &str) -> TensorResult<Self> {
        let dtype = match s {
            "bool" => Dtype::Bool,
            "uint8" | "u8" => Dtype::Uint8,
            "uint16" | "u16" => Dtype::Uint16,
            "uint32" | "u32" => Dtype::Uint32,
            "uint64" | "u64" => Dtype::Uint64,
            "int8" | "i8" => Dtype::Int8,
            "int16" | "i16" => Dtype::Int16,
            "int32" | "i32" => Dtype::Int32,
            "int64" | "i64" => Dtype::Int64,
            "float32" | "f32" => Dtype::Float32,
            "float64" | "f64" => Dtype::Float64,
            "str" => Dtype::Str,
            "json" => Dtype::Json,
            other => {
                return Err(TensorError::InvalidArgument(format!(
                    "unknown dtype: {other}"
                )))
            }
        };
        Ok(dtype)
    }
}

/// Rust scalar types that can be stored as array elements
pub trait Element: Copy + Send + Sync + 'static {
    /// Matching dtype
    const DTYPE: Dtype;

    /// Append the little-endian encoding to `out`
    fn write_le(self, out: &mut Vec<u8>);

    /// Decode from exactly `item_size` little-endian bytes
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: Dtype = Dtype::$dtype;

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_element! {
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
}

impl Element for bool {
    const DTYPE: Dtype = Dtype::Bool;

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}
