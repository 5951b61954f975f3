//! Batch assembly
//!
//! The default collate stacks same-dtype, same-shape arrays along a new
//! leading axis, collates structured payloads key by key, and gathers
//! everything else into a [`Value::List`].

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_tensor::Array;

use crate::{Record, Result, StreamError, Value};

/// Custom batch assembly
pub type CollateFn = Arc<dyn Fn(Vec<Record>) -> Result<Record> + Send + Sync>;

/// Merge records into one batch record with the first record's fields
pub fn default_collate(records: Vec<Record>) -> Result<Record> {
    let Some(first) = records.first() else {
        return Err(StreamError::Collate("cannot collate an empty batch".to_string()));
    };
    let names: Vec<String> = first.keys().map(str::to_string).collect();
    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(records.len()); names.len()];

    for record in records {
        if record.len() != names.len() {
            return Err(StreamError::Collate(format!(
                "records disagree on fields: expected {names:?}, got {:?}",
                record.keys().collect::<Vec<_>>()
            )));
        }
        for (name, value) in record {
            let column = names
                .iter()
                .position(|n| *n == name)
                .ok_or_else(|| StreamError::Collate(format!("unexpected field {name}")))?;
            columns[column].push(value);
        }
    }

    names
        .into_iter()
        .zip(columns)
        .map(|(name, column)| Ok((name, collate_values(column)?)))
        .collect()
}

/// Collate one column of values
pub fn collate_values(values: Vec<Value>) -> Result<Value> {
    if values.iter().all(|v| matches!(v, Value::Array(_))) {
        let arrays: Vec<Array> = values.into_iter().filter_map(Value::into_array).collect();
        if stackable(&arrays) {
            return Ok(Value::Array(Array::stack(&arrays)?));
        }
        return Ok(Value::List(arrays.into_iter().map(Value::Array).collect()));
    }

    if let Some(Value::Data(first)) = values.first() {
        let keys: Vec<String> = first.keys().cloned().collect();
        let same_keys = values.iter().all(|v| match v {
            Value::Data(data) => data.keys().eq(keys.iter()),
            _ => false,
        });
        if same_keys {
            let mut columns: BTreeMap<String, Vec<Value>> =
                keys.iter().map(|k| (k.clone(), Vec::new())).collect();
            for value in values {
                if let Value::Data(data) = value {
                    for (key, item) in data {
                        columns.entry(key).or_default().push(item);
                    }
                }
            }
            return columns
                .into_iter()
                .map(|(key, column)| Ok((key, collate_values(column)?)))
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Value::Data);
        }
    }

    Ok(Value::List(values))
}

fn stackable(arrays: &[Array]) -> bool {
    match arrays.split_first() {
        Some((first, rest)) => rest
            .iter()
            .all(|a| a.dtype() == first.dtype() && a.shape() == first.shape()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(i: u8, side: usize) -> Record {
        let mut record = Record::new();
        record.insert("x", Array::full(vec![side, side], i));
        record.insert("index", Array::scalar(u64::from(i)));
        record.insert("name", format!("s{i}"));
        record
    }

    #[test]
    fn test_stacks_arrays() {
        let batch = default_collate(vec![record(1, 2), record(2, 2)]).unwrap();
        let x = batch.get("x").and_then(Value::as_array).unwrap();
        assert_eq!(x.shape(), &[2, 2, 2]);
        assert_eq!(x.index_axis0(1).unwrap(), Array::full(vec![2, 2], 2u8));

        let index = batch.get("index").and_then(Value::as_array).unwrap();
        assert_eq!(index.to_vec::<u64>().unwrap(), vec![1, 2]);
        assert_eq!(
            batch.get("name"),
            Some(&Value::List(vec![Value::from("s1"), Value::from("s2")]))
        );
    }

    #[test]
    fn test_ragged_arrays_become_list() {
        let batch = default_collate(vec![record(1, 1), record(2, 3)]).unwrap();
        let items = batch.get("x").and_then(Value::as_list).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_array().unwrap().shape(), &[3, 3]);
    }

    #[test]
    fn test_data_collates_per_key() {
        let data = |i: u32| {
            let mut map = BTreeMap::new();
            map.insert("value".to_string(), Value::Array(Array::from_slice(&[i])));
            map.insert("text".to_string(), Value::List(vec![Value::from("cat")]));
            Value::Data(map)
        };
        let value = collate_values(vec![data(1), data(2)]).unwrap();
        let map = value.as_data().unwrap();
        assert_eq!(map["value"].as_array().unwrap().shape(), &[2, 1]);
        assert_eq!(map["text"].as_list().unwrap().len(), 2);
    }

    #[test]
    fn test_mismatched_fields() {
        let mut short = record(1, 2);
        short.remove("name");
        assert!(matches!(
            default_collate(vec![record(0, 2), short]),
            Err(StreamError::Collate(_))
        ));
        assert!(default_collate(Vec::new()).is_err());
    }
}
