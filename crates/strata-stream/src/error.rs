//! Error types for the dataloader

use strata_tensor::TensorError;
use thiserror::Error;

/// Dataloader errors
#[derive(Debug, Error)]
pub enum StreamError {
    /// Error from the tensor layer, raised while configuring the loader
    #[error(transparent)]
    Tensor(#[from] TensorError),

    /// The backing store cannot feed worker tasks
    #[error("dataset unsupported for streaming: {0}")]
    DatasetUnsupportedForStreaming(String),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading or decoding one sample failed
    #[error("failed to decode sample {position} of tensor {tensor}: {source}")]
    Decode {
        /// Tensor name
        tensor: String,
        /// Sample position in the tensor
        position: usize,
        /// Underlying failure
        #[source]
        source: TensorError,
    },

    /// User transform failed
    #[error("transform error: {0}")]
    Transform(String),

    /// Batch assembly failed
    #[error("collate error: {0}")]
    Collate(String),

    /// A worker task ended without reporting its positions
    #[error("worker failed: {0}")]
    WorkerFailed(String),
}

impl StreamError {
    /// Whether the error comes from unreadable sample data
    pub fn is_corrupt_sample(&self) -> bool {
        matches!(self, StreamError::Decode { .. })
    }
}

/// Result type for dataloader operations
pub type Result<T> = std::result::Result<T, StreamError>;
