//! Error types for tensor storage

use thiserror::Error;

use crate::Dtype;

/// Tensor storage errors
#[derive(Debug, Error)]
pub enum TensorError {
    /// One or more tensors are not registered
    #[error("tensor(s) do not exist: {}", names.join(", "))]
    TensorDoesNotExist {
        /// Every missing name
        names: Vec<String>,
    },

    /// A tensor with this name is already registered
    #[error("tensor already exists: {0}")]
    TensorAlreadyExists(String),

    /// Tensor has no samples
    #[error("tensor is empty: {0}")]
    EmptyTensor(String),

    /// Neither the index entry nor the codec recorded a shape
    #[error("no shape recorded for sample {position} of tensor {tensor}")]
    ArrayShapeInfoNotFound {
        /// Tensor name
        tensor: String,
        /// Sample position
        position: usize,
    },

    /// Position outside the addressable range
    #[error("index {index} out of range for length {length}")]
    IndexOutOfRange {
        /// Requested index, before wrapping
        index: i64,
        /// Length it was resolved against
        length: usize,
    },

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Sample dtype does not match the tensor
    #[error("dtype mismatch: expected {expected}, got {actual}")]
    DtypeMismatch {
        /// Tensor dtype
        expected: Dtype,
        /// Sample dtype
        actual: Dtype,
    },

    /// Element count does not match a shape
    #[error("invalid shape: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        actual: Vec<usize>,
    },

    /// Stored data is inconsistent
    #[error("data corrupted: {0}")]
    Corrupted(String),

    /// Codec failure
    #[error("codec error: {0}")]
    Codec(#[from] strata_compress::Error),

    /// Storage backend error
    #[error("storage error: {0}")]
    Storage(#[from] strata_store::StoreError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TensorError {
    /// Shorthand for a single missing tensor
    pub fn missing(name: impl Into<String>) -> Self {
        TensorError::TensorDoesNotExist {
            names: vec![name.into()],
        }
    }
}

/// Result type for tensor operations
pub type TensorResult<T> = Result<T, TensorError>;
