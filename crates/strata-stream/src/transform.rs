//! Record transforms applied inside workers

use std::fmt;
use std::sync::Arc;

use crate::{Record, Result, Value};

/// Function over a whole record
pub type RecordFn = Arc<dyn Fn(Record) -> Result<Record> + Send + Sync>;

/// Function over one field value
pub type ValueFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Transform run on every record after decoding
#[derive(Clone)]
pub enum Transform {
    /// One function over the whole record
    Record(RecordFn),
    /// Per-field functions. `None` passes the field through; fields not
    /// listed are dropped.
    Fields(Vec<(String, Option<ValueFn>)>),
}

impl Transform {
    /// Transform the whole record with `f`
    pub fn record<F>(f: F) -> Self
    where
        F: Fn(Record) -> Result<Record> + Send + Sync + 'static,
    {
        Transform::Record(Arc::new(f))
    }

    /// Empty field map; every field is dropped until mapped or kept
    pub fn fields() -> Self {
        Transform::Fields(Vec::new())
    }

    /// Apply `f` to field `name`
    pub fn map<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.with_field(name.into(), Some(Arc::new(f)))
    }

    /// Pass field `name` through unchanged
    pub fn keep(self, name: impl Into<String>) -> Self {
        self.with_field(name.into(), None)
    }

    fn with_field(self, name: String, f: Option<ValueFn>) -> Self {
        let mut fields = match self {
            Transform::Fields(fields) => fields,
            Transform::Record(_) => Vec::new(),
        };
        fields.retain(|(n, _)| *n != name);
        fields.push((name, f));
        Transform::Fields(fields)
    }

    /// Names a field map refers to
    pub fn field_names(&self) -> Vec<&str> {
        match self {
            Transform::Record(_) => Vec::new(),
            Transform::Fields(fields) => fields.iter().map(|(n, _)| n.as_str()).collect(),
        }
    }

    /// Run the transform
    pub fn apply(&self, record: Record) -> Result<Record> {
        match self {
            Transform::Record(f) => f(record),
            Transform::Fields(fields) => {
                let mut out = Record::with_capacity(fields.len());
                for (name, value) in record {
                    let Some((_, f)) = fields.iter().find(|(n, _)| *n == name) else {
                        continue;
                    };
                    let value = match f {
                        Some(f) => f(value)?,
                        None => value,
                    };
                    out.insert(name, value);
                }
                Ok(out)
            }
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Record(_) => f.write_str("Transform::Record(..)"),
            Transform::Fields(fields) => f
                .debug_map()
                .entries(fields.iter().map(|(n, t)| (n, if t.is_some() { "fn" } else { "keep" })))
                .finish(),
        }
    }
}
