//! Chunked, append-only tensor storage
//!
//! A [`Dataset`] is an ordered registry of named tensors over a
//! [`strata_store::ByteStore`]. Each tensor is an append-only sequence of
//! samples (arrays, text or JSON) packed into bounded chunks by the chunk
//! engine, with one index entry per sample.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                           Dataset                             │
//! │   DatasetMeta (names -> keys, groups)    TensorMeta per key   │
//! │  ┌──────────────────────┐          ┌───────────────────────┐  │
//! │  │ TensorWriter         │ snapshot │ TensorReader          │  │
//! │  │  open chunk + index  ├─────────►│  index + chunk cache  │  │
//! │  └──────────┬───────────┘          └───────────┬───────────┘  │
//! │             │          DatasetView = readers + View           │
//! └─────────────┼──────────────────────────────────┼──────────────┘
//!               │ set                              │ get_many
//! ┌─────────────▼──────────────────────────────────▼──────────────┐
//! │                      strata-store ByteStore                   │
//! │   dataset_meta.json  <key>/tensor_meta.json                   │
//! │   <key>/chunks_index  <key>/chunks/<name>                     │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strata_store::MemoryStore;
//! use strata_tensor::{Array, Dataset, Htype, Selector, TensorOptions};
//!
//! # async fn example() -> strata_tensor::TensorResult<()> {
//! let mut ds = Dataset::open(Arc::new(MemoryStore::new())).await?;
//! ds.create_tensor("images", TensorOptions::new(Htype::Image)).await?;
//! ds.append("images", Array::full(vec![32, 32, 3], 7u8)).await?;
//!
//! let view = ds.view().index(Selector::range(0, 1))?;
//! let first = ds.read("images", view.positions()?[0]).await?;
//! assert_eq!(first.shape(), &[32, 32, 3]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod array;
pub mod chunk;
pub mod config;
pub mod dataset;
pub mod dtype;
pub mod error;
pub mod htype;
pub mod meta;
pub mod sample;
pub mod view;

pub use array::Array;
pub use chunk::{ChunkIndex, IndexEntry, TensorReader, TensorWriter};
pub use config::{TensorOptions, DEFAULT_MAX_CHUNK_SIZE};
pub use dataset::{Dataset, DatasetView};
pub use dtype::{Dtype, Element};
pub use error::{TensorError, TensorResult};
pub use htype::Htype;
pub use meta::{DatasetMeta, TensorEntry, TensorMeta};
pub use sample::Sample;
pub use view::{Selector, View};
