//! Per-tensor decode modes
//!
//! | mode    | image tensors         | other tensors                     |
//! |---------|-----------------------|-----------------------------------|
//! | `numpy` | pixel array           | array, text or JSON               |
//! | `bytes` | encoded file bytes    | stored bytes                      |
//! | `pil`   | [`DynamicImage`]      | rejected when the loader is built |
//! | `data`  | `{value}`             | `{value}`, plus `text` for labels |
//!
//! [`DynamicImage`]: image::DynamicImage

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strata_compress::raster;
use strata_tensor::{Array, Dtype, Htype, Sample, TensorError, TensorReader, TensorResult};

use crate::{StreamError, Value};

/// How a tensor's samples are handed to the consumer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMethod {
    /// Fully decoded native values
    #[default]
    Numpy,
    /// Stored bytes without decoding
    Bytes,
    /// Decoded image object
    Pil,
    /// Value plus htype metadata
    Data,
}

impl DecodeMethod {
    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeMethod::Numpy => "numpy",
            DecodeMethod::Bytes => "bytes",
            DecodeMethod::Pil => "pil",
            DecodeMethod::Data => "data",
        }
    }
}

impl fmt::Display for DecodeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecodeMethod {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "numpy" => Ok(DecodeMethod::Numpy),
            "bytes" | "tobytes" => Ok(DecodeMethod::Bytes),
            "pil" => Ok(DecodeMethod::Pil),
            "data" => Ok(DecodeMethod::Data),
            other => Err(StreamError::InvalidArgument(format!(
                "unknown decode method: {other}"
            ))),
        }
    }
}

/// Read sample `position` of `reader` in the given mode
pub async fn decode(
    reader: &TensorReader,
    position: usize,
    method: DecodeMethod,
) -> TensorResult<Value> {
    match method {
        DecodeMethod::Numpy => native(reader, position).await,
        DecodeMethod::Bytes => reader.read_bytes(position).await.map(Value::Bytes),
        DecodeMethod::Pil => {
            let kind = reader.image_kind().ok_or_else(|| {
                TensorError::InvalidArgument(format!(
                    "{} does not hold encoded images",
                    reader.name()
                ))
            })?;
            let bytes = reader.read_bytes(position).await?;
            Ok(Value::Image(raster::decode_image(kind, &bytes)?))
        }
        DecodeMethod::Data => data(reader, position).await,
    }
}

async fn native(reader: &TensorReader, position: usize) -> TensorResult<Value> {
    match reader.read_sample(position).await? {
        Sample::Array(array) => Ok(Value::Array(array)),
        Sample::Text(text) => Ok(Value::Text(text)),
        Sample::Json(json) => Ok(Value::Json(json)),
        other => Err(TensorError::Corrupted(format!(
            "unexpected sample kind read from {}: {other:?}",
            reader.name()
        ))),
    }
}

async fn data(reader: &TensorReader, position: usize) -> TensorResult<Value> {
    let value = native(reader, position).await?;
    let mut data = BTreeMap::new();
    if reader.meta().htype == Htype::ClassLabel {
        if let Value::Array(labels) = &value {
            let names = label_indices(labels)?
                .into_iter()
                .map(|i| {
                    let name = usize::try_from(i)
                        .ok()
                        .and_then(|i| reader.meta().class_names.get(i).cloned());
                    Value::Text(name.unwrap_or_else(|| i.to_string()))
                })
                .collect();
            data.insert("text".to_string(), Value::List(names));
        }
    }
    data.insert("value".to_string(), value);
    Ok(Value::Data(data))
}

/// Label values as indices into the class names
fn label_indices(labels: &Array) -> TensorResult<Vec<i64>> {
    Ok(match labels.dtype() {
        Dtype::Uint8 => labels.to_vec::<u8>()?.into_iter().map(i64::from).collect(),
        Dtype::Uint16 => labels.to_vec::<u16>()?.into_iter().map(i64::from).collect(),
        Dtype::Uint32 => labels.to_vec::<u32>()?.into_iter().map(i64::from).collect(),
        Dtype::Uint64 => labels
            .to_vec::<u64>()?
            .into_iter()
            .map(|v| i64::try_from(v).unwrap_or(i64::MAX))
            .collect(),
        Dtype::Int8 => labels.to_vec::<i8>()?.into_iter().map(i64::from).collect(),
        Dtype::Int16 => labels.to_vec::<i16>()?.into_iter().map(i64::from).collect(),
        Dtype::Int32 => labels.to_vec::<i32>()?.into_iter().map(i64::from).collect(),
        Dtype::Int64 => labels.to_vec::<i64>()?,
        other => {
            return Err(TensorError::InvalidArgument(format!(
                "class labels must be integers, not {other}"
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strata_compress::Compression;
    use strata_store::MemoryStore;
    use strata_tensor::{Dataset, TensorOptions};

    #[test]
    fn test_parse() {
        assert_eq!("numpy".parse::<DecodeMethod>().unwrap(), DecodeMethod::Numpy);
        assert_eq!("tobytes".parse::<DecodeMethod>().unwrap(), DecodeMethod::Bytes);
        assert_eq!("PIL".parse::<DecodeMethod>().unwrap(), DecodeMethod::Pil);
        assert_eq!(DecodeMethod::Data.to_string(), "data");
        assert!("tensor".parse::<DecodeMethod>().is_err());
    }

    #[tokio::test]
    async fn test_modes_per_htype() {
        let mut ds = Dataset::open(Arc::new(MemoryStore::new())).await.unwrap();
        ds.create_tensor("image", TensorOptions::new(Htype::Image)).await.unwrap();
        ds.create_tensor("label", TensorOptions::new(Htype::ClassLabel)).await.unwrap();
        ds.create_tensor("text", TensorOptions::new(Htype::Text)).await.unwrap();
        ds.create_tensor("plain", TensorOptions::default()).await.unwrap();

        ds.append("image", Array::full(vec![4, 5, 3], 9u8)).await.unwrap();
        ds.append("label", "cat").await.unwrap();
        ds.append("label", "dog").await.unwrap();
        ds.append("text", "hello").await.unwrap();
        ds.append("plain", Array::scalar(3i32)).await.unwrap();

        let image = ds.reader("image").unwrap();
        let native = decode(&image, 0, DecodeMethod::Numpy).await.unwrap();
        assert_eq!(native, Value::Array(Array::full(vec![4, 5, 3], 9u8)));

        let encoded = decode(&image, 0, DecodeMethod::Bytes).await.unwrap();
        let encoded = encoded.as_bytes().unwrap();
        assert_eq!(encoded.as_ref(), image.read_bytes(0).await.unwrap().as_ref());
        assert_eq!(image.image_kind().map(|k| k.name()), Some(Compression::Png.as_str()));

        let pil = decode(&image, 0, DecodeMethod::Pil).await.unwrap();
        let pil = pil.as_image().unwrap();
        assert_eq!((pil.width(), pil.height()), (5, 4));

        let label = ds.reader("label").unwrap();
        let data = decode(&label, 1, DecodeMethod::Data).await.unwrap();
        let data = data.as_data().unwrap();
        assert_eq!(data["value"], Value::Array(Array::from_slice(&[1u32])));
        assert_eq!(data["text"], Value::List(vec![Value::from("dog")]));

        let text = ds.reader("text").unwrap();
        let data = decode(&text, 0, DecodeMethod::Data).await.unwrap();
        assert_eq!(data.as_data().unwrap()["value"], Value::from("hello"));
        assert!(!data.as_data().unwrap().contains_key("text"));

        let plain = ds.reader("plain").unwrap();
        assert!(matches!(
            decode(&plain, 0, DecodeMethod::Pil).await,
            Err(TensorError::InvalidArgument(_))
        ));
        let data = decode(&plain, 0, DecodeMethod::Data).await.unwrap();
        assert_eq!(data.as_data().unwrap()["value"], Value::Array(Array::scalar(3i32)));
    }

    #[tokio::test]
    async fn test_unnamed_labels_render_index() {
        let mut ds = Dataset::open(Arc::new(MemoryStore::new())).await.unwrap();
        ds.create_tensor("label", TensorOptions::new(Htype::ClassLabel)).await.unwrap();
        ds.append("label", Array::from_slice(&[4u32, 0])).await.unwrap();

        let reader = ds.reader("label").unwrap();
        let data = decode(&reader, 0, DecodeMethod::Data).await.unwrap();
        assert_eq!(
            data.as_data().unwrap()["text"],
            Value::List(vec![Value::from("4"), Value::from("0")])
        );
    }
}
