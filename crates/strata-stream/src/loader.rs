//! Multi-worker streaming dataloader
//!
//! # Architecture
//!
//! ```text
//!             positions dealt round-robin
//!        ┌──────────────┬──────────────┬──────────────┐
//!        ▼              ▼              ▼              │
//!   ┌─────────┐    ┌─────────┐    ┌─────────┐         │
//!   │ worker0 │    │ worker1 │    │ workerN │  read + decode + transform
//!   └────┬────┘    └────┬────┘    └────┬────┘  (own ReadOnlyStore each)
//!        │ mpsc         │ mpsc         │ mpsc  (PREFETCH_DEPTH each)
//!        └──────────────┼──────────────┘
//!                       ▼
//!             merge in dealing order
//!                       ▼
//!                shuffle buffer (optional)
//!                       ▼
//!              batch + collate ──► consumer
//! ```
//!
//! Every position dealt to a worker produces exactly one message (a record,
//! a skip marker or an error), so the merge can pull from the workers in
//! the order the positions were dealt and reproduce view order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use strata_store::ReadOnlyStore;
use strata_tensor::{Array, Dataset, DatasetView, TensorError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::collate::{default_collate, CollateFn};
use crate::decode::{self, DecodeMethod};
use crate::shuffle::{ByteSize, ShuffleBuffer};
use crate::stats::{LoaderStats, SharedStats, WorkerGuard};
use crate::{
    FailurePolicy, LoaderConfig, Record, Result, StreamError, Transform, ValueFn, PREFETCH_DEPTH,
};

/// Name of the field holding each record's position
pub const INDEX_FIELD: &str = "index";

/// Builder for configuring and constructing dataloaders.
///
/// Every option is checked in [`build`](Self::build); iteration never fails
/// because of configuration.
pub struct DataLoaderBuilder {
    view: DatasetView,
    config: LoaderConfig,
    tensors: Option<Vec<String>>,
    decode: HashMap<String, DecodeMethod>,
    transform: Option<Transform>,
    collate: Option<CollateFn>,
}

impl DataLoaderBuilder {
    /// Loader over every tensor of `view`, default config
    pub fn new(view: DatasetView) -> Self {
        Self {
            view,
            config: LoaderConfig::default(),
            tensors: None,
            decode: HashMap::new(),
            transform: None,
            collate: None,
        }
    }

    /// Use custom configuration
    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Load only `names`, in that order
    pub fn tensors<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tensors = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Records per batch; `None` for single records
    pub fn batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Enable or disable shuffling
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    /// Shuffle buffer budget in bytes
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.config.buffer_size = bytes;
        self
    }

    /// Worker tasks; 0 reads inline
    pub fn num_workers(mut self, workers: usize) -> Self {
        self.config.num_workers = workers;
        self
    }

    /// Decode mode for tensor `name`
    pub fn decode_method(mut self, name: impl Into<String>, method: DecodeMethod) -> Self {
        self.decode.insert(name.into(), method);
        self
    }

    /// Transform applied to every record
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Per-field transform; `None` passes a field through, unlisted fields are dropped
    pub fn transform_fields<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<ValueFn>)>,
        S: Into<String>,
    {
        let fields = fields.into_iter().map(|(name, f)| (name.into(), f)).collect();
        self.transform(Transform::Fields(fields))
    }

    /// Custom batch assembly
    pub fn collate<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<Record>) -> Result<Record> + Send + Sync + 'static,
    {
        self.collate = Some(Arc::new(f));
        self
    }

    /// Add or omit the `index` field
    pub fn return_index(mut self, return_index: bool) -> Self {
        self.config.return_index = return_index;
        self
    }

    /// Drop or keep the last undersized batch
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.config.drop_last = drop_last;
        self
    }

    /// Seed for reproducible shuffles
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Per-sample failure handling
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Validate everything and build the loader
    pub fn build(self) -> Result<DataLoader> {
        self.config.validate()?;

        let view = match &self.tensors {
            Some(names) => self.view.select(names)?,
            None => self.view,
        };
        let names: Vec<String> = view.tensor_names().into_iter().map(str::to_string).collect();

        if self.config.return_index && names.iter().any(|n| n == INDEX_FIELD) {
            return Err(StreamError::InvalidArgument(format!(
                "a tensor named {INDEX_FIELD:?} cannot be loaded with return_index enabled"
            )));
        }

        for reader in view.tensors() {
            if reader.is_empty() {
                return Err(TensorError::EmptyTensor(reader.name().to_string()).into());
            }
        }

        for (name, method) in &self.decode {
            let reader = view.tensor(name).map_err(|_| {
                StreamError::InvalidArgument(format!(
                    "decode method given for {name}, which is not loaded"
                ))
            })?;
            if *method == DecodeMethod::Pil && reader.image_kind().is_none() {
                return Err(StreamError::InvalidArgument(format!(
                    "pil decoding needs an image codec, but {name} has none"
                )));
            }
        }

        if let Some(transform) = &self.transform {
            for field in transform.field_names() {
                let known = names.iter().any(|n| n == field)
                    || (self.config.return_index && field == INDEX_FIELD);
                if !known {
                    return Err(StreamError::InvalidArgument(format!(
                        "transform given for {field}, which is not loaded"
                    )));
                }
            }
        }

        if self.config.num_workers > 0 && !view.store().is_persistent() {
            return Err(StreamError::DatasetUnsupportedForStreaming(
                "in-memory stores cannot be shared with worker tasks; use num_workers = 0".to_string(),
            ));
        }

        let len = view.num_samples()?;
        info!(
            "Dataloader over {:?}: {} samples, {} workers, batch size {:?}, shuffle {}",
            names, len, self.config.num_workers, self.config.batch_size, self.config.shuffle
        );

        Ok(DataLoader {
            view,
            config: self.config,
            decode: self.decode,
            transform: self.transform,
            collate: self.collate,
            len,
            stats: Arc::new(LoaderStats::new()),
        })
    }
}

/// Entry points onto the dataloader
pub trait DataLoaderExt {
    /// Builder for a loader over this snapshot
    fn dataloader(&self) -> DataLoaderBuilder;
}

impl DataLoaderExt for DatasetView {
    fn dataloader(&self) -> DataLoaderBuilder {
        DataLoaderBuilder::new(self.clone())
    }
}

impl DataLoaderExt for Dataset {
    fn dataloader(&self) -> DataLoaderBuilder {
        DataLoaderBuilder::new(self.view())
    }
}

/// Configured loader. Each [`iter`](Self::iter) call is one epoch.
pub struct DataLoader {
    view: DatasetView,
    config: LoaderConfig,
    decode: HashMap<String, DecodeMethod>,
    transform: Option<Transform>,
    collate: Option<CollateFn>,
    len: usize,
    stats: SharedStats,
}

impl DataLoader {
    /// Create a loader builder over `view`
    pub fn builder(view: DatasetView) -> DataLoaderBuilder {
        DataLoaderBuilder::new(view)
    }

    /// Loader configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Loaded tensors, in record order
    pub fn tensor_names(&self) -> Vec<&str> {
        self.view.tensor_names()
    }

    /// Samples per epoch, before any are skipped
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Batches per epoch, before any samples are skipped
    pub fn num_batches(&self) -> usize {
        match self.config.batch_size {
            None => self.len,
            Some(size) if self.config.drop_last => self.len / size,
            Some(size) => self.len.div_ceil(size),
        }
    }

    /// Get shared statistics handle
    pub fn stats(&self) -> SharedStats {
        Arc::clone(&self.stats)
    }

    /// Start an epoch.
    ///
    /// With `num_workers > 0` the workers are spawned on the current Tokio
    /// runtime right away and start prefetching.
    pub fn iter(&self) -> Result<LoaderIter> {
        let positions: Arc<[usize]> = self.view.positions()?.into();
        let stop = Arc::new(AtomicBool::new(false));
        let ctx = Arc::new(WorkerContext {
            decode: self.decode.clone(),
            transform: self.transform.clone(),
            return_index: self.config.return_index,
            policy: self.config.failure_policy,
            stats: Arc::clone(&self.stats),
            stop: Arc::clone(&stop),
        });

        let source = if self.config.num_workers == 0 {
            Source::Inline {
                view: self.view.with_store(ReadOnlyStore::shared(Arc::clone(self.view.store()))),
                ctx,
                positions: Arc::clone(&positions),
                cursor: 0,
            }
        } else {
            self.spawn_workers(&positions, &ctx)?
        };

        let shuffle = if self.config.shuffle {
            Some(ShuffleBuffer::with_seed(self.config.buffer_size, self.config.seed)?)
        } else {
            None
        };

        debug!("Starting epoch over {} positions", positions.len());
        Ok(LoaderIter {
            source,
            shuffle,
            batch_size: self.config.batch_size,
            drop_last: self.config.drop_last,
            collate: self.collate.clone(),
            stats: Arc::clone(&self.stats),
            stop,
            state: LoaderState::Idle,
            started: Instant::now(),
        })
    }

    fn spawn_workers(&self, positions: &Arc<[usize]>, ctx: &Arc<WorkerContext>) -> Result<Source> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            StreamError::InvalidConfig(format!("num_workers > 0 needs a Tokio runtime: {e}"))
        })?;

        let workers = self.config.num_workers.min(positions.len());
        let mut receivers = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let (sender, receiver) = mpsc::channel(PREFETCH_DEPTH);
            let store = ReadOnlyStore::shared(Arc::clone(self.view.store()));
            let task = run_worker(
                worker,
                workers,
                Arc::clone(positions),
                self.view.with_store(store),
                Arc::clone(ctx),
                sender,
                WorkerGuard::new(Arc::clone(&self.stats)),
            );
            handles.push(runtime.spawn(task));
            receivers.push(receiver);
        }

        Ok(Source::Workers {
            receivers,
            handles,
            next: 0,
            total: positions.len(),
        })
    }
}

/// Lifecycle of one epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    /// Built, nothing pulled yet
    Idle,
    /// Pulling records from the workers
    Running,
    /// Workers done; emptying the shuffle buffer and the last batch
    Draining,
    /// Every record delivered, or stopped by the consumer
    Done,
    /// A record failed; the error has been delivered
    Failed,
}

/// What a worker reports for one position
enum Produced {
    Record(Record),
    Skipped,
    Failed(StreamError),
}

/// Read-side state shared by the workers of one epoch
struct WorkerContext {
    decode: HashMap<String, DecodeMethod>,
    transform: Option<Transform>,
    return_index: bool,
    policy: FailurePolicy,
    stats: SharedStats,
    stop: Arc<AtomicBool>,
}

impl WorkerContext {
    async fn produce(&self, view: &DatasetView, position: usize) -> Produced {
        match self.load(view, position).await {
            Ok(record) => Produced::Record(record),
            Err(e) if e.is_corrupt_sample() && self.policy == FailurePolicy::SkipCorrupt => {
                warn!("Skipping position {}: {}", position, e);
                self.stats.record_skipped();
                Produced::Skipped
            }
            Err(e) => Produced::Failed(e),
        }
    }

    async fn load(&self, view: &DatasetView, position: usize) -> Result<Record> {
        let start = Instant::now();
        let mut record = Record::with_capacity(view.tensors().len() + 1);
        for reader in view.tensors() {
            let method = self.decode.get(reader.name()).copied().unwrap_or_default();
            let value = decode::decode(reader, position, method)
                .await
                .map_err(|source| StreamError::Decode {
                    tensor: reader.name().to_string(),
                    position,
                    source,
                })?;
            record.insert(reader.name(), value);
        }
        if self.return_index {
            record.insert(INDEX_FIELD, Array::scalar(position as u64));
        }
        self.stats.read.record(record.byte_size(), start.elapsed());
        trace!("Read position {} ({} fields)", position, record.len());

        let Some(transform) = &self.transform else {
            return Ok(record);
        };
        let start = Instant::now();
        let record = transform.apply(record)?;
        self.stats.transform.record(record.byte_size(), start.elapsed());
        Ok(record)
    }
}

/// Worker task: every `workers`-th position starting at `worker`
async fn run_worker(
    worker: usize,
    workers: usize,
    positions: Arc<[usize]>,
    view: DatasetView,
    ctx: Arc<WorkerContext>,
    sender: mpsc::Sender<Produced>,
    _guard: WorkerGuard,
) {
    debug!("Worker {} started", worker);
    for &position in positions.iter().skip(worker).step_by(workers) {
        if ctx.stop.load(Ordering::Acquire) {
            debug!("Worker {}: stop requested", worker);
            break;
        }

        let produced = ctx.produce(&view, position).await;
        let failed = matches!(produced, Produced::Failed(_));
        if sender.send(produced).await.is_err() {
            debug!("Worker {}: channel closed", worker);
            break;
        }
        if failed {
            break;
        }
    }
    debug!("Worker {} finished", worker);
}

enum Source {
    Inline {
        ctx: Arc<WorkerContext>,
        view: DatasetView,
        positions: Arc<[usize]>,
        cursor: usize,
    },
    Workers {
        receivers: Vec<mpsc::Receiver<Produced>>,
        handles: Vec<JoinHandle<()>>,
        next: usize,
        total: usize,
    },
    Closed,
}

impl Source {
    /// Next report in view order, `None` once every position is accounted for
    async fn next(&mut self) -> Option<Produced> {
        match self {
            Source::Inline {
                ctx,
                view,
                positions,
                cursor,
            } => {
                let position = *positions.get(*cursor)?;
                *cursor += 1;
                Some(ctx.produce(view, position).await)
            }
            Source::Workers {
                receivers,
                next,
                total,
                ..
            } => {
                if *next >= *total {
                    return None;
                }
                let worker = *next % receivers.len();
                let produced = match receivers[worker].recv().await {
                    Some(produced) => produced,
                    None => Produced::Failed(StreamError::WorkerFailed(format!(
                        "worker {worker} exited before delivering record {next}"
                    ))),
                };
                *next += 1;
                Some(produced)
            }
            Source::Closed => None,
        }
    }
}

/// One epoch of records or batches.
///
/// Dropping the iterator stops the workers: they finish the read in hand
/// and start no new one.
pub struct LoaderIter {
    source: Source,
    shuffle: Option<ShuffleBuffer<Record>>,
    batch_size: Option<usize>,
    drop_last: bool,
    collate: Option<CollateFn>,
    stats: SharedStats,
    stop: Arc<AtomicBool>,
    state: LoaderState,
    started: Instant,
}

impl LoaderIter {
    /// Current state
    pub fn state(&self) -> LoaderState {
        self.state
    }

    /// Get shared statistics handle
    pub fn stats(&self) -> SharedStats {
        Arc::clone(&self.stats)
    }

    /// Next record (unbatched) or collated batch.
    ///
    /// After an error is returned the iterator is [`LoaderState::Failed`]
    /// and yields nothing more.
    pub async fn next(&mut self) -> Option<Result<Record>> {
        match self.state {
            LoaderState::Done | LoaderState::Failed => return None,
            LoaderState::Idle => self.state = LoaderState::Running,
            LoaderState::Running | LoaderState::Draining => {}
        }

        let item = match self.batch_size {
            None => self.next_record().await,
            Some(size) => self.next_batch(size).await,
        };
        match item {
            Some(Ok(record)) => Some(Ok(record)),
            Some(Err(e)) => {
                self.fail(&e);
                Some(Err(e))
            }
            None => {
                self.finish();
                None
            }
        }
    }

    /// Drain the epoch, stopping at the first error
    pub async fn try_collect(mut self) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await {
            out.push(item?);
        }
        Ok(out)
    }

    async fn next_record(&mut self) -> Option<Result<Record>> {
        while self.state == LoaderState::Running {
            match self.source.next().await {
                Some(Produced::Record(record)) => {
                    let out = match &mut self.shuffle {
                        Some(buffer) => buffer.exchange(Some(record)),
                        None => Some(record),
                    };
                    if let Some(record) = out {
                        self.stats.record_emitted();
                        return Some(Ok(record));
                    }
                }
                Some(Produced::Skipped) => {}
                Some(Produced::Failed(e)) => return Some(Err(e)),
                None => {
                    self.state = LoaderState::Draining;
                    debug!(
                        "All positions read; draining {} buffered records",
                        self.shuffle.as_ref().map_or(0, ShuffleBuffer::len)
                    );
                }
            }
        }

        let record = self.shuffle.as_mut()?.drain()?;
        self.stats.record_emitted();
        Some(Ok(record))
    }

    async fn next_batch(&mut self, size: usize) -> Option<Result<Record>> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            match self.next_record().await {
                Some(Ok(record)) => batch.push(record),
                Some(Err(e)) => return Some(Err(e)),
                None => break,
            }
        }
        if batch.is_empty() {
            return None;
        }
        if batch.len() < size && self.drop_last {
            debug!("Dropping last batch of {} records", batch.len());
            return None;
        }

        let start = Instant::now();
        let records = batch.len();
        let collated = match &self.collate {
            Some(collate) => collate(batch),
            None => default_collate(batch),
        };
        if let Ok(batch) = &collated {
            self.stats.collate.record(batch.byte_size(), start.elapsed());
            self.stats.record_batch();
            trace!("Collated batch of {} records", records);
        }
        Some(collated)
    }

    fn finish(&mut self) {
        self.close();
        self.state = LoaderState::Done;
        info!(
            "Epoch finished in {:?}: {} records emitted, {} skipped",
            self.started.elapsed(),
            self.stats.records(),
            self.stats.skipped()
        );
    }

    fn fail(&mut self, e: &StreamError) {
        self.close();
        self.state = LoaderState::Failed;
        error!("Epoch failed: {}", e);
    }

    /// Raise the stop flag and release the worker channels
    fn close(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.source = Source::Closed;
    }

    /// Stop the workers and wait for them to exit
    pub async fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        let source = std::mem::replace(&mut self.source, Source::Closed);
        if let Source::Workers {
            receivers, handles, ..
        } = source
        {
            drop(receivers);
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("Worker task ended abnormally: {}", e);
                }
            }
        }
        if self.state != LoaderState::Failed {
            self.state = LoaderState::Done;
        }
        debug!("Epoch shut down");
    }
}

impl Drop for LoaderIter {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;
    use strata_store::MemoryStore;
    use strata_tensor::{Htype, TensorOptions};

    async fn memory_dataset() -> Dataset {
        let mut ds = Dataset::open(Arc::new(MemoryStore::new())).await.unwrap();
        ds.create_tensor("a", TensorOptions::default()).await.unwrap();
        ds.create_tensor("b", TensorOptions::default()).await.unwrap();
        for i in 0..10u32 {
            ds.append("b", Array::scalar(i)).await.unwrap();
            if i < 5 {
                ds.append("a", Array::scalar(i)).await.unwrap();
            }
        }
        ds
    }

    #[tokio::test]
    async fn test_build_validation() {
        let ds = memory_dataset().await;
        let inline = || ds.dataloader().num_workers(0);

        match inline().tensors(["a", "x", "y"]).build() {
            Err(StreamError::Tensor(TensorError::TensorDoesNotExist { names })) => {
                assert_eq!(names, vec!["x", "y"]);
            }
            other => panic!("unexpected: {:?}", other.err()),
        }
        assert!(matches!(
            inline().shuffle(true).buffer_size(0).build(),
            Err(StreamError::InvalidArgument(_))
        ));
        assert!(matches!(
            inline().decode_method("a", DecodeMethod::Pil).build(),
            Err(StreamError::InvalidArgument(_))
        ));
        assert!(matches!(
            inline().tensors(["a"]).decode_method("b", DecodeMethod::Bytes).build(),
            Err(StreamError::InvalidArgument(_))
        ));
        assert!(matches!(
            inline().transform(Transform::fields().keep("c")).build(),
            Err(StreamError::InvalidArgument(_))
        ));
        assert!(matches!(
            ds.dataloader().num_workers(2).build(),
            Err(StreamError::DatasetUnsupportedForStreaming(_))
        ));
        assert!(inline().build().is_ok());
    }

    #[tokio::test]
    async fn test_empty_and_index_conflicts() {
        let mut ds = memory_dataset().await;
        ds.create_tensor("empty", TensorOptions::default()).await.unwrap();
        assert!(matches!(
            ds.dataloader().num_workers(0).build(),
            Err(StreamError::Tensor(TensorError::EmptyTensor(name))) if name == "empty"
        ));

        ds.create_tensor("index", TensorOptions::default()).await.unwrap();
        ds.append("index", Array::scalar(1u8)).await.unwrap();
        let loader = || ds.dataloader().num_workers(0).tensors(["a", "index"]);
        assert!(matches!(
            loader().build(),
            Err(StreamError::InvalidArgument(_))
        ));
        assert!(loader().return_index(false).build().is_ok());
    }

    #[tokio::test]
    async fn test_min_length_inline() {
        let ds = memory_dataset().await;
        let loader = ds
            .dataloader()
            .num_workers(0)
            .batch_size(None)
            .build()
            .unwrap();
        assert_eq!(loader.len(), 5);

        let records = loader.iter().unwrap().try_collect().await.unwrap();
        assert_eq!(records.len(), 5);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "b", INDEX_FIELD]);
            let b = record.get("b").and_then(Value::as_array).unwrap();
            assert_eq!(b.to_vec::<u32>().unwrap(), vec![i as u32]);
            let index = record.get(INDEX_FIELD).and_then(Value::as_array).unwrap();
            assert_eq!(index.to_vec::<u64>().unwrap(), vec![i as u64]);
        }
        assert_eq!(loader.stats().records(), 5);
    }

    #[tokio::test]
    async fn test_states_and_num_batches() {
        let ds = memory_dataset().await;
        let loader = ds
            .dataloader()
            .num_workers(0)
            .batch_size(Some(2))
            .build()
            .unwrap();
        assert_eq!(loader.num_batches(), 3);

        let mut iter = loader.iter().unwrap();
        assert_eq!(iter.state(), LoaderState::Idle);
        let first = iter.next().await.unwrap().unwrap();
        assert_eq!(iter.state(), LoaderState::Running);
        assert_eq!(first.get("a").and_then(Value::as_array).unwrap().shape(), &[2]);

        assert!(iter.next().await.is_some());
        let last = iter.next().await.unwrap().unwrap();
        assert_eq!(last.get("a").and_then(Value::as_array).unwrap().shape(), &[1]);
        assert!(iter.next().await.is_none());
        assert_eq!(iter.state(), LoaderState::Done);
        assert!(iter.next().await.is_none());

        let dropped = ds
            .dataloader()
            .num_workers(0)
            .batch_size(Some(2))
            .drop_last(true)
            .build()
            .unwrap();
        assert_eq!(dropped.num_batches(), 2);
        assert_eq!(dropped.iter().unwrap().try_collect().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_transform_error_fails_epoch() {
        let ds = memory_dataset().await;
        let loader = ds
            .dataloader()
            .num_workers(0)
            .transform(Transform::record(|_| {
                Err(StreamError::Transform("nope".to_string()))
            }))
            .failure_policy(FailurePolicy::SkipCorrupt)
            .build()
            .unwrap();

        let mut iter = loader.iter().unwrap();
        assert!(matches!(iter.next().await, Some(Err(StreamError::Transform(_)))));
        assert_eq!(iter.state(), LoaderState::Failed);
        assert!(iter.next().await.is_none());
    }

    #[tokio::test]
    async fn test_custom_collate() {
        let ds = memory_dataset().await;
        let loader = ds
            .dataloader()
            .num_workers(0)
            .tensors(["b"])
            .return_index(false)
            .batch_size(Some(5))
            .collate(|records: Vec<Record>| {
                let mut out = Record::new();
                out.insert("count", Array::scalar(records.len() as u32));
                Ok(out)
            })
            .build()
            .unwrap();

        let batches = loader.iter().unwrap().try_collect().await.unwrap();
        assert_eq!(batches.len(), 2);
        let count = batches[0].get("count").and_then(Value::as_array).unwrap();
        assert_eq!(count.to_vec::<u32>().unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn test_view_selection_drives_positions() {
        let ds = memory_dataset().await;
        let view = ds
            .view()
            .index(strata_tensor::Selector::List(vec![4, 1]))
            .unwrap();
        let loader = view.dataloader().num_workers(0).batch_size(None).build().unwrap();
        let records = loader.iter().unwrap().try_collect().await.unwrap();
        let indices: Vec<u64> = records
            .iter()
            .map(|r| r.get(INDEX_FIELD).and_then(Value::as_array).unwrap().to_vec::<u64>().unwrap()[0])
            .collect();
        assert_eq!(indices, vec![4, 1]);
    }

    #[tokio::test]
    async fn test_textual_tensors() {
        let mut ds = Dataset::open(Arc::new(MemoryStore::new())).await.unwrap();
        ds.create_tensor("text", TensorOptions::new(Htype::Text)).await.unwrap();
        for word in ["x", "yy", "zzz"] {
            ds.append("text", word).await.unwrap();
        }
        let loader = ds.dataloader().num_workers(0).batch_size(Some(3)).build().unwrap();
        let batches = loader.iter().unwrap().try_collect().await.unwrap();
        assert_eq!(
            batches[0].get("text"),
            Some(&Value::List(vec![Value::from("x"), Value::from("yy"), Value::from("zzz")]))
        );
    }

    #[tokio::test]
    async fn test_transform_fields() {
        let ds = memory_dataset().await;
        let to_text: ValueFn = Arc::new(|value: Value| {
            let n = value.as_array().map_or(0, |a| a.to_vec::<u32>().map_or(0, |v| v[0]));
            Ok(Value::from(n.to_string()))
        });
        let loader = ds
            .dataloader()
            .num_workers(0)
            .batch_size(None)
            .transform_fields([("b", Some(to_text)), (INDEX_FIELD, None)])
            .build()
            .unwrap();

        let records = loader.iter().unwrap().try_collect().await.unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[3].keys().collect::<Vec<_>>(), vec!["b", INDEX_FIELD]);
        assert_eq!(records[3].get("b"), Some(&Value::from("3")));
    }
}
