//! Decoded records flowing through the loader

use std::collections::BTreeMap;

use bytes::Bytes;
use image::DynamicImage;
use strata_tensor::Array;

use crate::shuffle::ByteSize;

/// One decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Numeric array; batches stack along a new leading axis
    Array(Array),
    /// Text sample
    Text(String),
    /// JSON sample
    Json(serde_json::Value),
    /// Stored bytes, still encoded
    Bytes(Bytes),
    /// Decoded image
    Image(DynamicImage),
    /// Structured payload (`value` plus htype-specific metadata)
    Data(BTreeMap<String, Value>),
    /// Values that could not be stacked
    List(Vec<Value>),
}

impl Value {
    /// Array payload, if any
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Text payload, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// JSON payload, if any
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(json) => Some(json),
            _ => None,
        }
    }

    /// Raw bytes, if any
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Decoded image, if any
    pub fn as_image(&self) -> Option<&DynamicImage> {
        match self {
            Value::Image(image) => Some(image),
            _ => None,
        }
    }

    /// Structured payload, if any
    pub fn as_data(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Data(data) => Some(data),
            _ => None,
        }
    }

    /// List items, if any
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Take the array payload
    pub fn into_array(self) -> Option<Array> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }
}

impl From<Array> for Value {
    fn from(array: Array) -> Self {
        Value::Array(array)
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl ByteSize for Value {
    fn byte_size(&self) -> usize {
        match self {
            Value::Array(array) => array.nbytes(),
            Value::Text(text) => text.len(),
            Value::Json(json) => json.to_string().len(),
            Value::Bytes(bytes) => bytes.len(),
            Value::Image(image) => image.as_bytes().len(),
            Value::Data(data) => data.values().map(ByteSize::byte_size).sum(),
            Value::List(items) => items.iter().map(ByteSize::byte_size).sum(),
        }
    }
}

/// Named fields of one record or batch, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty record with room for `n` fields
    pub fn with_capacity(n: usize) -> Self {
        Self {
            fields: Vec::with_capacity(n),
        }
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Value of field `name`
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Mutable value of field `name`
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.iter_mut().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Field at `position`
    pub fn field(&self, position: usize) -> Option<(&str, &Value)> {
        self.fields.get(position).map(|(n, v)| (n.as_str(), v))
    }

    /// Check whether field `name` exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set field `name`. A replaced field keeps its position; the old value is returned.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let value = value.into();
        match self.get_mut(&name) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((name, value));
                None
            }
        }
    }

    /// Remove field `name`
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let position = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(position).1)
    }

    /// Field names in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Field values in order
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, v)| v)
    }

    /// Fields in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

impl ByteSize for Record {
    fn byte_size(&self) -> usize {
        self.values().map(ByteSize::byte_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_order() {
        let mut record = Record::new();
        record.insert("c", Array::scalar(1u8));
        record.insert("a", "text");
        assert_eq!(record.insert("c", Array::scalar(2u8)), Some(Value::Array(Array::scalar(1u8))));

        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["c", "a"]);
        assert_eq!(record.field(0).unwrap().1, &Value::Array(Array::scalar(2u8)));
        assert_eq!(record.get("a").and_then(Value::as_text), Some("text"));
    }

    #[test]
    fn test_remove() {
        let mut record: Record = [
            ("x".to_string(), Value::from("1")),
            ("y".to_string(), Value::from("2")),
        ]
        .into_iter()
        .collect();
        assert_eq!(record.remove("x"), Some(Value::from("1")));
        assert_eq!(record.remove("x"), None);
        assert_eq!(record.len(), 1);
        assert!(record.contains("y"));
    }

    #[test]
    fn test_byte_size() {
        let mut record = Record::new();
        record.insert("a", Array::full(vec![2, 3], 0f32));
        record.insert("t", "abcd");
        record.insert("b", Value::Bytes(Bytes::from_static(b"xyz")));
        assert_eq!(record.byte_size(), 24 + 4 + 3);
    }
}
