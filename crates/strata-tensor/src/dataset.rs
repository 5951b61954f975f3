//! Dataset handle and read-only dataset views

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use strata_compress::{raster, Codec};
use strata_store::{ByteStore, StoreError};
use tracing::{debug, info};

use crate::chunk::{TensorReader, TensorWriter};
use crate::meta::{validate_name, DATASET_META_KEY};
use crate::{
    Array, DatasetMeta, Dtype, Element, Htype, Sample, Selector, TensorError, TensorMeta, TensorOptions,
    TensorResult, View,
};

/// A named collection of tensors over one [`ByteStore`].
///
/// The handle is the single writer of the dataset: every mutating method takes
/// `&mut self` and leaves the store consistent when it returns. Metadata and
/// chunk indexes are cached on the handle; [`Dataset::reload`] drops the caches
/// and reads everything back from storage.
#[derive(Debug)]
pub struct Dataset {
    store: Arc<dyn ByteStore>,
    meta: DatasetMeta,
    tensors: HashMap<String, TensorWriter>,
}

impl Dataset {
    /// Open the dataset stored in `store`, or an empty one if there is none
    pub async fn open(store: Arc<dyn ByteStore>) -> TensorResult<Self> {
        let meta = match store.get(DATASET_META_KEY).await {
            Ok(bytes) => DatasetMeta::from_bytes(&bytes)?,
            Err(StoreError::NotFound(_)) => DatasetMeta::new(),
            Err(e) => return Err(e.into()),
        };

        let mut tensors = HashMap::with_capacity(meta.tensors().len());
        for entry in meta.tensors() {
            let writer = TensorWriter::load(store.as_ref(), &entry.key).await?;
            tensors.insert(entry.key.clone(), writer);
        }

        info!(
            tensors = tensors.len(),
            persistent = store.is_persistent(),
            read_only = store.is_read_only(),
            "opened dataset"
        );
        Ok(Self {
            store,
            meta,
            tensors,
        })
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn ByteStore> {
        &self.store
    }

    /// Tensor registry
    pub fn meta(&self) -> &DatasetMeta {
        &self.meta
    }

    /// Tensor names in creation order
    pub fn tensor_names(&self) -> Vec<String> {
        self.meta.names().map(str::to_string).collect()
    }

    /// Whether a tensor called `name` exists
    pub fn contains(&self, name: &str) -> bool {
        self.meta.contains(name)
    }

    /// Minimum length across tensors
    pub fn len(&self) -> usize {
        self.tensors.values().map(TensorWriter::len).min().unwrap_or(0)
    }

    /// Whether no tensor has samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key_of(&self, name: &str) -> TensorResult<String> {
        self.meta
            .key_of(name)
            .map(str::to_string)
            .ok_or_else(|| TensorError::missing(name))
    }

    fn writer(&self, name: &str) -> TensorResult<&TensorWriter> {
        let key = self.key_of(name)?;
        self.tensors
            .get(&key)
            .ok_or_else(|| TensorError::missing(name))
    }

    fn check_writable(&self, target: &str) -> TensorResult<()> {
        if self.store.is_read_only() {
            return Err(StoreError::ReadOnly(target.to_string()).into());
        }
        Ok(())
    }

    async fn persist_meta(&self) -> TensorResult<()> {
        self.store
            .set(DATASET_META_KEY, Bytes::from(self.meta.to_bytes()?))
            .await?;
        Ok(())
    }

    /// Metadata of tensor `name`
    pub fn tensor_meta(&self, name: &str) -> TensorResult<&TensorMeta> {
        self.writer(name).map(TensorWriter::meta)
    }

    /// Number of samples in tensor `name`
    pub fn tensor_len(&self, name: &str) -> TensorResult<usize> {
        self.writer(name).map(TensorWriter::len)
    }

    /// Snapshot reader of tensor `name`
    pub fn reader(&self, name: &str) -> TensorResult<TensorReader> {
        Ok(self.writer(name)?.reader(name, Arc::clone(&self.store)))
    }

    /// Create an empty tensor
    pub async fn create_tensor(&mut self, name: &str, options: TensorOptions) -> TensorResult<()> {
        self.check_writable(name)?;
        let meta = TensorMeta::new(options)?;

        let key = loop {
            let key = format!("tensors/{:016x}", rand::random::<u64>());
            if !self.tensors.contains_key(&key) {
                break key;
            }
        };
        self.meta.add_tensor(name, &key)?;

        let mut writer = TensorWriter::create(key.clone(), meta);
        writer.flush(self.store.as_ref()).await?;
        self.tensors.insert(key.clone(), writer);
        self.persist_meta().await?;
        debug!(tensor = name, key = %key, "created tensor");
        Ok(())
    }

    /// Append one sample to tensor `name`
    pub async fn append(&mut self, name: &str, sample: impl Into<Sample>) -> TensorResult<()> {
        self.extend(name, std::iter::once(sample.into())).await
    }

    /// Append samples to tensor `name`.
    ///
    /// Samples written before a failing one stay appended.
    pub async fn extend<I, S>(&mut self, name: &str, samples: I) -> TensorResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<Sample>,
    {
        self.check_writable(name)?;
        let key = self.key_of(name)?;
        let store = Arc::clone(&self.store);
        let writer = self
            .tensors
            .get_mut(&key)
            .ok_or_else(|| TensorError::missing(name))?;

        let mut result = Ok(());
        for sample in samples {
            if let Err(e) = write_sample(writer, store.as_ref(), name, sample.into()).await {
                result = Err(e);
                break;
            }
        }
        writer.flush(store.as_ref()).await?;
        result
    }

    /// Append a declared but unwritten sample that reads back as zeros
    pub async fn append_empty(&mut self, name: &str, shape: Vec<usize>) -> TensorResult<()> {
        self.append(name, Sample::Empty { shape }).await
    }

    /// Read sample `position` of tensor `name` as an array
    pub async fn read(&self, name: &str, position: usize) -> TensorResult<Array> {
        self.reader(name)?.read(position).await
    }

    /// Read sample `position` of tensor `name` as a typed sample
    pub async fn read_sample(&self, name: &str, position: usize) -> TensorResult<Sample> {
        self.reader(name)?.read_sample(position).await
    }

    /// Rename a tensor. Chunk data is not touched.
    pub async fn rename_tensor(&mut self, name: &str, new_name: &str) -> TensorResult<()> {
        self.check_writable(name)?;
        self.meta.rename_tensor(name, new_name)?;
        self.persist_meta().await?;
        debug!(from = name, to = new_name, "renamed tensor");
        Ok(())
    }

    /// Rename a group and every tensor below it
    pub async fn rename_group(&mut self, name: &str, new_name: &str) -> TensorResult<()> {
        self.check_writable(name)?;
        self.meta.rename_group(name, new_name)?;
        self.persist_meta().await?;
        debug!(from = name, to = new_name, "renamed group");
        Ok(())
    }

    /// Delete a tensor and its stored data
    pub async fn delete_tensor(&mut self, name: &str) -> TensorResult<()> {
        self.check_writable(name)?;
        let key = self.meta.remove_tensor(name)?;
        self.persist_meta().await?;
        if let Some(writer) = self.tensors.remove(&key) {
            writer.delete(self.store.as_ref()).await?;
        }
        Ok(())
    }

    /// Persist any pending tensor state
    pub async fn flush(&mut self) -> TensorResult<()> {
        let store = Arc::clone(&self.store);
        for writer in self.tensors.values_mut() {
            writer.flush(store.as_ref()).await?;
        }
        Ok(())
    }

    /// Drop every cached meta and index and reload them from storage
    pub async fn reload(&mut self) -> TensorResult<()> {
        *self = Self::open(Arc::clone(&self.store)).await?;
        Ok(())
    }

    /// Snapshot of every tensor
    pub fn view(&self) -> DatasetView {
        let readers = self
            .meta
            .names()
            .filter_map(|name| self.reader(name).ok())
            .collect();
        DatasetView::new(Arc::clone(&self.store), readers)
    }

    /// Snapshot of the tensors below group `prefix`, named relative to it
    pub fn group(&self, prefix: &str) -> TensorResult<DatasetView> {
        validate_name(prefix)?;
        if !self.meta.is_group(prefix) {
            return Err(TensorError::missing(prefix));
        }
        let inner = format!("{prefix}/");
        let mut readers = Vec::new();
        for name in self.meta.names() {
            if let Some(relative) = name.strip_prefix(&inner) {
                readers.push(self.reader(name)?.renamed(relative));
            }
        }
        Ok(DatasetView::new(Arc::clone(&self.store), readers))
    }
}

async fn write_array(
    writer: &mut TensorWriter,
    store: &dyn ByteStore,
    name: &str,
    array: Array,
) -> TensorResult<()> {
    let meta = writer.meta();
    if meta.htype.is_textual() {
        return Err(TensorError::InvalidArgument(format!(
            "{} tensor {name} cannot hold arrays",
            meta.htype
        )));
    }
    if meta.dtype != Some(array.dtype()) {
        writer.meta_mut().check_dtype(array.dtype())?;
    }

    let codec = writer.meta().sample_codec();
    let compression = writer.meta().sample_compression;
    let shape = array.shape().to_vec();
    let encoded;
    let payload: &[u8] = if codec.is_sample_level() {
        encoded = codec.encode_sample(array.as_bytes(), &shape)?;
        &encoded
    } else {
        array.as_bytes()
    };
    writer.write(store, payload, Some(shape), compression).await
}

/// One-element label array in the tensor's integer dtype
fn label_array(dtype: Dtype, label: usize) -> TensorResult<Array> {
    fn one<T: Element + TryFrom<usize>>(dtype: Dtype, label: usize) -> TensorResult<Array> {
        T::try_from(label).map(|v| Array::from_slice(&[v])).map_err(|_| {
            TensorError::InvalidArgument(format!("class label {label} does not fit in {dtype}"))
        })
    }

    match dtype {
        Dtype::Uint8 => one::<u8>(dtype, label),
        Dtype::Uint16 => one::<u16>(dtype, label),
        Dtype::Uint32 => one::<u32>(dtype, label),
        Dtype::Uint64 => one::<u64>(dtype, label),
        Dtype::Int8 => one::<i8>(dtype, label),
        Dtype::Int16 => one::<i16>(dtype, label),
        Dtype::Int32 => one::<i32>(dtype, label),
        Dtype::Int64 => one::<i64>(dtype, label),
        _ => Err(TensorError::InvalidArgument(format!(
            "{dtype} tensors cannot hold class labels"
        ))),
    }
}

async fn write_sample(
    writer: &mut TensorWriter,
    store: &dyn ByteStore,
    name: &str,
    sample: Sample,
) -> TensorResult<()> {
    let htype = writer.meta().htype;
    let refuse = |what: &str| {
        Err(TensorError::InvalidArgument(format!(
            "{htype} tensor {name} cannot hold {what}"
        )))
    };

    match sample {
        Sample::Array(array) => write_array(writer, store, name, array).await,
        Sample::Text(text) => match htype {
            Htype::Text => writer.write(store, text.as_bytes(), Some(vec![1]), None).await,
            Htype::ClassLabel => {
                let meta = writer.meta();
                let known = meta.class_position(&text);
                let label = known.unwrap_or(meta.class_names.len());
                let array = label_array(meta.dtype.unwrap_or(Dtype::Uint32), label)?;
                write_array(writer, store, name, array).await?;
                if known.is_none() {
                    writer.meta_mut().class_names.push(text);
                }
                Ok(())
            }
            _ => refuse("text"),
        },
        Sample::Json(value) => {
            match htype {
                Htype::Json => {}
                Htype::List if value.is_array() => {}
                Htype::List => return refuse("a non-list JSON value"),
                _ => return refuse("JSON"),
            }
            let bytes =
                serde_json::to_vec(&value).map_err(|e| TensorError::Serialization(e.to_string()))?;
            writer.write(store, &bytes, Some(vec![1]), None).await
        }
        Sample::Empty { shape } => {
            if htype.is_textual() {
                return refuse("empty samples");
            }
            if writer.meta().dtype.is_none() {
                return Err(TensorError::InvalidArgument(format!(
                    "dtype of {name} is unknown; write a sample or declare it first"
                )));
            }
            writer.write_unwritten(shape);
            Ok(())
        }
        Sample::Compressed { bytes, compression } => {
            if htype.is_textual() {
                return refuse("encoded images");
            }
            let Codec::SampleLevelImage(kind) = Codec::from_compression(Some(compression)) else {
                return Err(TensorError::InvalidArgument(format!(
                    "only image payloads can be appended pre-encoded, not {compression}"
                )));
            };
            if writer.meta().sample_compression == Some(compression) {
                writer.meta_mut().check_dtype(Dtype::Uint8)?;
                let shape = raster::probe_shape(kind, &bytes)?;
                writer
                    .write(store, &bytes, Some(shape), Some(compression))
                    .await
            } else {
                let (pixels, shape) = raster::decode(kind, &bytes)?;
                let array = Array::from_bytes(Dtype::Uint8, shape, pixels)?;
                write_array(writer, store, name, array).await
            }
        }
    }
}

/// Immutable snapshot of a set of tensors composed with a [`View`].
///
/// Cloning is cheap: readers share their metadata and index snapshots.
#[derive(Debug, Clone)]
pub struct DatasetView {
    store: Arc<dyn ByteStore>,
    tensors: Vec<TensorReader>,
    view: View,
}

impl DatasetView {
    /// View over `tensors` selecting every sample
    pub fn new(store: Arc<dyn ByteStore>, tensors: Vec<TensorReader>) -> Self {
        Self {
            store,
            tensors,
            view: View::new(),
        }
    }

    /// Store the readers read from
    pub fn store(&self) -> &Arc<dyn ByteStore> {
        &self.store
    }

    /// Selectors applied so far
    pub fn view(&self) -> &View {
        &self.view
    }

    /// Readers in registry order
    pub fn tensors(&self) -> &[TensorReader] {
        &self.tensors
    }

    /// Tensor names in registry order
    pub fn tensor_names(&self) -> Vec<&str> {
        self.tensors.iter().map(TensorReader::name).collect()
    }

    /// Reader of tensor `name`
    pub fn tensor(&self, name: &str) -> TensorResult<&TensorReader> {
        self.tensors
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| TensorError::missing(name))
    }

    /// This view further narrowed by `selector`
    pub fn index(&self, selector: Selector) -> TensorResult<Self> {
        let view = self.view.then(selector);
        view.resolve(self.base_len())?;
        Ok(Self {
            view,
            ..self.clone()
        })
    }

    /// The same view restricted to `names`, in that order
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> TensorResult<Self> {
        let mut tensors = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.tensor(name.as_ref()) {
                Ok(reader) => tensors.push(reader.clone()),
                Err(_) => missing.push(name.as_ref().to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(TensorError::TensorDoesNotExist { names: missing });
        }
        Ok(Self {
            store: Arc::clone(&self.store),
            tensors,
            view: self.view.clone(),
        })
    }

    /// The same snapshot read through `store`. Readers start with empty caches.
    pub fn with_store(&self, store: Arc<dyn ByteStore>) -> Self {
        Self {
            tensors: self
                .tensors
                .iter()
                .map(|t| t.with_store(Arc::clone(&store)))
                .collect(),
            store,
            view: self.view.clone(),
        }
    }

    fn base_len(&self) -> usize {
        self.tensors.iter().map(TensorReader::len).min().unwrap_or(0)
    }

    /// Positions selected by the view, resolved against the shortest tensor
    pub fn positions(&self) -> TensorResult<Vec<usize>> {
        self.view.resolve(self.base_len())
    }

    /// Number of samples the view selects
    pub fn num_samples(&self) -> TensorResult<usize> {
        self.positions().map(|p| p.len())
    }

    /// Read the `i`-th sample of the view from tensor `name`
    pub async fn read(&self, name: &str, i: usize) -> TensorResult<Sample> {
        let positions = self.positions()?;
        let position = *positions.get(i).ok_or(TensorError::IndexOutOfRange {
            index: i as i64,
            length: positions.len(),
        })?;
        self.tensor(name)?.read_sample(position).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_compress::Compression;
    use strata_store::{MemoryStore, ReadOnlyStore};

    async fn memory_dataset() -> Dataset {
        Dataset::open(Arc::new(MemoryStore::new())).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_empty() {
        let ds = memory_dataset().await;
        assert!(ds.tensor_names().is_empty());
        assert!(ds.is_empty());
    }

    #[tokio::test]
    async fn test_create_and_append() {
        let mut ds = memory_dataset().await;
        ds.create_tensor("x", TensorOptions::default()).await.unwrap();
        ds.append("x", Array::full(vec![2, 2], 1.5f32)).await.unwrap();
        ds.append("x", Array::full(vec![3], 2.5f32)).await.unwrap();

        assert_eq!(ds.tensor_len("x").unwrap(), 2);
        assert_eq!(ds.tensor_meta("x").unwrap().dtype, Some(Dtype::Float32));
        let second = ds.read("x", 1).await.unwrap();
        assert_eq!(second.shape(), &[3]);
        assert_eq!(second.to_vec::<f32>().unwrap(), vec![2.5; 3]);

        assert!(matches!(
            ds.append("x", Array::full(vec![1], 1u8)).await,
            Err(TensorError::DtypeMismatch { .. })
        ));
        assert!(matches!(
            ds.create_tensor("x", TensorOptions::default()).await,
            Err(TensorError::TensorAlreadyExists(_))
        ));
        assert!(matches!(
            ds.append("nope", Array::scalar(1u8)).await,
            Err(TensorError::TensorDoesNotExist { .. })
        ));
    }

    #[tokio::test]
    async fn test_textual_tensors() {
        let mut ds = memory_dataset().await;
        ds.create_tensor("strings", TensorOptions::new(Htype::Text)).await.unwrap();
        ds.create_tensor("meta", TensorOptions::new(Htype::Json)).await.unwrap();
        ds.create_tensor("tags", TensorOptions::new(Htype::List)).await.unwrap();

        ds.extend("strings", ["hello", "", "world"]).await.unwrap();
        ds.append("meta", serde_json::json!({"a": 1})).await.unwrap();
        ds.append("tags", serde_json::json!(["x", "y"])).await.unwrap();

        assert_eq!(
            ds.read_sample("strings", 1).await.unwrap(),
            Sample::Text(String::new())
        );
        assert_eq!(
            ds.read_sample("strings", 2).await.unwrap(),
            Sample::Text("world".to_string())
        );
        assert_eq!(
            ds.read_sample("meta", 0).await.unwrap(),
            Sample::Json(serde_json::json!({"a": 1}))
        );
        assert!(ds.append("tags", serde_json::json!({"a": 1})).await.is_err());
        assert!(ds.append("strings", Array::scalar(1u8)).await.is_err());
        assert!(ds.read("strings", 0).await.is_err());
    }

    #[tokio::test]
    async fn test_class_labels() {
        let mut ds = memory_dataset().await;
        ds.create_tensor(
            "labels",
            TensorOptions::new(Htype::ClassLabel).with_class_names(["cat"]),
        )
        .await
        .unwrap();
        ds.extend("labels", ["dog", "cat", "dog"]).await.unwrap();
        ds.append("labels", Array::from_slice(&[0u32])).await.unwrap();

        let meta = ds.tensor_meta("labels").unwrap();
        assert_eq!(meta.class_names, vec!["cat", "dog"]);
        let mut labels = Vec::new();
        for i in 0..4 {
            labels.extend(ds.read("labels", i).await.unwrap().to_vec::<u32>().unwrap());
        }
        assert_eq!(labels, vec![1, 0, 1, 0]);
        assert_eq!(ds.read("labels", 0).await.unwrap().shape(), &[1]);
    }

    #[tokio::test]
    async fn test_image_roundtrip_and_reencode() {
        let mut ds = memory_dataset().await;
        ds.create_tensor("png", TensorOptions::new(Htype::Image)).await.unwrap();

        let pixels: Vec<u8> = (0..4 * 5 * 3).map(|i| i as u8).collect();
        let image = Array::from_vec(vec![4, 5, 3], pixels).unwrap();
        ds.append("png", image.clone()).await.unwrap();
        assert_eq!(ds.read("png", 0).await.unwrap(), image);

        // a pre-encoded jpeg is decoded and stored as png
        let jpeg = Codec::from_compression(Some(Compression::Jpeg))
            .encode_sample(&[200u8; 8 * 8 * 3], &[8, 8, 3])
            .unwrap();
        ds.append("png", Sample::compressed(jpeg, Compression::Jpeg))
            .await
            .unwrap();
        let reader = ds.reader("png").unwrap();
        assert_eq!(reader.entry(1).unwrap().compression, Some(Compression::Png));
        assert_eq!(reader.read(1).await.unwrap().shape(), &[8, 8, 3]);
    }

    #[tokio::test]
    async fn test_append_empty() {
        let mut ds = memory_dataset().await;
        ds.create_tensor("x", TensorOptions::default()).await.unwrap();
        assert!(ds.append_empty("x", vec![2]).await.is_err());

        ds.append("x", Array::from_slice(&[1i64, 2])).await.unwrap();
        ds.append_empty("x", vec![2, 2]).await.unwrap();
        let zeros = ds.read("x", 1).await.unwrap();
        assert_eq!(zeros.to_vec::<i64>().unwrap(), vec![0; 4]);
    }

    #[tokio::test]
    async fn test_read_only_store_rejects_writes() {
        let inner: Arc<dyn ByteStore> = Arc::new(MemoryStore::new());
        let mut ds = Dataset::open(Arc::clone(&inner)).await.unwrap();
        ds.create_tensor("x", TensorOptions::default()).await.unwrap();

        let mut ro = Dataset::open(ReadOnlyStore::shared(inner)).await.unwrap();
        assert_eq!(ro.tensor_names(), vec!["x"]);
        assert!(matches!(
            ro.append("x", Array::scalar(1u8)).await,
            Err(TensorError::Storage(StoreError::ReadOnly(_)))
        ));
        assert!(ro.create_tensor("y", TensorOptions::default()).await.is_err());
        assert!(ro.rename_tensor("x", "z").await.is_err());
    }

    #[tokio::test]
    async fn test_view_length_is_minimum() {
        let mut ds = memory_dataset().await;
        ds.create_tensor("a", TensorOptions::default()).await.unwrap();
        ds.create_tensor("b", TensorOptions::default()).await.unwrap();
        for i in 0..10u8 {
            ds.append("a", Array::scalar(i)).await.unwrap();
            if i < 5 {
                ds.append("b", Array::scalar(i)).await.unwrap();
            }
        }

        let view = ds.view();
        assert_eq!(view.num_samples().unwrap(), 5);
        assert_eq!(view.select(&["a"]).unwrap().num_samples().unwrap(), 10);
        assert!(matches!(
            view.select(&["a", "c", "d"]),
            Err(TensorError::TensorDoesNotExist { names }) if names == vec!["c", "d"]
        ));

        let reversed = view.index(Selector::slice(None, None, Some(-1))).unwrap();
        assert_eq!(reversed.positions().unwrap(), vec![4, 3, 2, 1, 0]);
        let sample = reversed.read("a", 0).await.unwrap();
        assert_eq!(sample.as_array().unwrap().to_vec::<u8>().unwrap(), vec![4]);
        assert!(view.index(Selector::Index(7)).is_err());
    }

    #[tokio::test]
    async fn test_group_view() {
        let mut ds = memory_dataset().await;
        ds.create_tensor("images/jpegs/cats", TensorOptions::default()).await.unwrap();
        ds.create_tensor("images/pngs/flowers", TensorOptions::default()).await.unwrap();
        ds.create_tensor("arrays/x", TensorOptions::default()).await.unwrap();

        let group = ds.group("images").unwrap();
        assert_eq!(group.tensor_names(), vec!["jpegs/cats", "pngs/flowers"]);
        assert!(ds.group("missing").is_err());
        assert!(ds.group("images/jpegs/cats").is_err());
    }
}
