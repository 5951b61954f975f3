//! Configuration for the dataloader
//!
//! Numeric and policy options only; tensor selection, decode modes,
//! transforms and collate functions are set on the
//! [`DataLoaderBuilder`](crate::DataLoaderBuilder).

use serde::{Deserialize, Serialize};

use crate::{Result, StreamError};

/// Records each worker may stage ahead of the consumer
pub const PREFETCH_DEPTH: usize = 8;

/// Default shuffle buffer budget (2 GiB)
pub const DEFAULT_BUFFER_SIZE: usize = 2048 * 1024 * 1024;

/// What a worker does when a sample cannot be decoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Forward the error and stop iterating
    #[default]
    Propagate,
    /// Log and count the position, then continue with the next one
    SkipCorrupt,
}

/// Dataloader options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Records per batch; `None` yields single records without collating
    pub batch_size: Option<usize>,

    /// Randomize order through the shuffle buffer
    pub shuffle: bool,

    /// Shuffle buffer budget in bytes
    pub buffer_size: usize,

    /// Worker tasks; 0 reads inline in the consumer
    pub num_workers: usize,

    /// Discard a final batch smaller than `batch_size`
    pub drop_last: bool,

    /// Add an `index` field holding each record's position
    pub return_index: bool,

    /// Seed for reproducible shuffles
    pub seed: Option<u64>,

    /// Per-sample failure handling
    pub failure_policy: FailurePolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: Some(1),
            shuffle: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            num_workers: 1,
            drop_last: false,
            return_index: true,
            seed: None,
            failure_policy: FailurePolicy::Propagate,
        }
    }
}

impl LoaderConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set batch size
    pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable or disable shuffling
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set shuffle buffer budget in bytes
    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes;
        self
    }

    /// Set worker count
    pub fn with_num_workers(mut self, workers: usize) -> Self {
        self.num_workers = workers;
        self
    }

    /// Drop or keep the last undersized batch
    pub fn with_drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// Add or omit the `index` field
    pub fn with_return_index(mut self, return_index: bool) -> Self {
        self.return_index = return_index;
        self
    }

    /// Set shuffle seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == Some(0) {
            return Err(StreamError::InvalidConfig(
                "batch_size must be > 0".to_string(),
            ));
        }

        if self.shuffle && self.buffer_size == 0 {
            return Err(StreamError::InvalidArgument(
                "buffer_size must be > 0 when shuffle is enabled".to_string(),
            ));
        }

        Ok(())
    }
}
