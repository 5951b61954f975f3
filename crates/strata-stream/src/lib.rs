//! Streaming dataloader over strata datasets
//!
//! Reads a [`DatasetView`](strata_tensor::DatasetView) through a pool of
//! Tokio worker tasks, decodes and transforms each position into a
//! [`Record`], optionally randomizes order through a byte-bounded
//! [`ShuffleBuffer`], then batches and collates on the consumer side.
//!
//! - **Deterministic dealing**: positions go round-robin to workers and are
//!   merged back in the same order, so unshuffled output follows the view
//! - **Backpressure**: each worker stages at most
//!   [`PREFETCH_DEPTH`](config::PREFETCH_DEPTH) records
//! - **Read-only workers**: every worker reads through its own
//!   [`ReadOnlyStore`](strata_store::ReadOnlyStore) handle
//! - **Failure policy**: propagate the first decode error, or skip and
//!   count corrupt samples
//! - **Statistics**: per-stage latency and counters in [`LoaderStats`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strata_store::LocalStore;
//! use strata_stream::{DataLoaderExt, Value};
//! use strata_tensor::Dataset;
//!
//! # async fn example() -> strata_stream::Result<()> {
//! let store = LocalStore::open("/data/cats").await.map_err(strata_tensor::TensorError::from)?;
//! let ds = Dataset::open(Arc::new(store)).await?;
//!
//! let loader = ds
//!     .dataloader()
//!     .tensors(["images", "labels"])
//!     .batch_size(Some(32))
//!     .shuffle(true)
//!     .num_workers(4)
//!     .build()?;
//!
//! let mut batches = loader.iter()?;
//! while let Some(batch) = batches.next().await {
//!     let batch = batch?;
//!     let images = batch.get("images").and_then(Value::as_array);
//!     println!("{:?}", images.map(|a| a.shape().to_vec()));
//! }
//! println!("{}", loader.stats().summary());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collate;
pub mod config;
pub mod decode;
pub mod error;
pub mod loader;
pub mod shuffle;
pub mod stats;
pub mod transform;
pub mod value;

pub use collate::{default_collate, CollateFn};
pub use config::{FailurePolicy, LoaderConfig, DEFAULT_BUFFER_SIZE, PREFETCH_DEPTH};
pub use decode::DecodeMethod;
pub use error::{Result, StreamError};
pub use loader::{DataLoader, DataLoaderBuilder, DataLoaderExt, LoaderIter, LoaderState, INDEX_FIELD};
pub use shuffle::{ByteSize, ShuffleBuffer};
pub use stats::{LoaderStats, SharedStats, StageStats, StatsSummary};
pub use transform::{RecordFn, Transform, ValueFn};
pub use value::{Record, Value};
