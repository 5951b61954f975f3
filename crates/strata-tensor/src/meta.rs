//! Tensor and dataset metadata

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strata_compress::{Codec, Compression};

use crate::{Dtype, Htype, TensorError, TensorOptions, TensorResult};

/// Dataset registry key
pub const DATASET_META_KEY: &str = "dataset_meta.json";

/// Key of a tensor's metadata
pub fn tensor_meta_key(key: &str) -> String {
    format!("{key}/tensor_meta.json")
}

/// Key of a tensor's chunk index
pub fn chunks_index_key(key: &str) -> String {
    format!("{key}/chunks_index")
}

/// Key of one chunk blob
pub fn chunk_key(key: &str, chunk: &str) -> String {
    format!("{key}/chunks/{chunk}")
}

/// Per-tensor metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorMeta {
    /// Semantic type
    pub htype: Htype,
    /// Element type, frozen once the first sample is written
    pub dtype: Option<Dtype>,
    /// Per-sample image codec
    pub sample_compression: Option<Compression>,
    /// Whole-chunk byte codec
    pub chunk_compression: Option<Compression>,
    /// Upper bound on a chunk's raw size in bytes
    pub max_chunk_size: usize,
    /// Number of samples
    pub length: usize,
    /// Class names (class_label only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub class_names: Vec<String>,
}

impl TensorMeta {
    /// Metadata for a new, empty tensor
    pub fn new(options: TensorOptions) -> TensorResult<Self> {
        let options = options.resolved()?;
        Ok(Self {
            htype: options.htype,
            dtype: options.dtype,
            sample_compression: options.sample_compression,
            chunk_compression: options.chunk_compression,
            max_chunk_size: options.max_chunk_size,
            length: 0,
            class_names: options.class_names,
        })
    }

    /// Codec applied to each sample
    pub fn sample_codec(&self) -> Codec {
        Codec::from_compression(self.sample_compression)
    }

    /// Codec applied to each chunk blob
    pub fn chunk_codec(&self) -> Codec {
        Codec::from_compression(self.chunk_compression)
    }

    /// Accept `dtype` for the next sample, inferring it on first write
    pub fn check_dtype(&mut self, dtype: Dtype) -> TensorResult<()> {
        match self.dtype {
            Some(expected) if expected != dtype => Err(TensorError::DtypeMismatch {
                expected,
                actual: dtype,
            }),
            Some(_) => Ok(()),
            None => {
                self.dtype = Some(dtype);
                Ok(())
            }
        }
    }

    /// Index of `name` in the class list
    pub fn class_position(&self, name: &str) -> Option<usize> {
        self.class_names.iter().position(|c| c == name)
    }

    /// Serialize to JSON
    pub fn to_bytes(&self) -> TensorResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| TensorError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON
    pub fn from_bytes(bytes: &[u8]) -> TensorResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| TensorError::Serialization(e.to_string()))
    }
}

/// Registry entry mapping a tensor's name to its storage namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorEntry {
    /// Full slash-delimited name
    pub name: String,
    /// Storage key prefix, fixed at creation
    pub key: String,
}

/// Ordered tensor registry and group set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMeta {
    tensors: Vec<TensorEntry>,
    groups: BTreeSet<String>,
}

/// Check a tensor or group name: non-empty `/`-separated segments, none `.` or `..`
pub fn validate_name(name: &str) -> TensorResult<()> {
    let ok = !name.is_empty()
        && name
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if ok {
        Ok(())
    } else {
        Err(TensorError::InvalidArgument(format!("invalid name: {name:?}")))
    }
}

/// Every proper prefix group of `name`: `a/b/c` gives `a` and `a/b`
fn parent_groups(name: &str) -> impl Iterator<Item = &str> {
    name.match_indices('/').map(move |(i, _)| &name[..i])
}

impl DatasetMeta {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered tensors in creation order
    pub fn tensors(&self) -> &[TensorEntry] {
        &self.tensors
    }

    /// Tensor names in creation order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.iter().map(|t| t.name.as_str())
    }

    /// Group names, sorted
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }

    /// Storage key of `name`
    pub fn key_of(&self, name: &str) -> Option<&str> {
        self.tensors
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.key.as_str())
    }

    /// Whether a tensor called `name` exists
    pub fn contains(&self, name: &str) -> bool {
        self.key_of(name).is_some()
    }

    /// Whether a group called `name` exists
    pub fn is_group(&self, name: &str) -> bool {
        self.groups.contains(name)
    }

    fn check_free(&self, name: &str) -> TensorResult<()> {
        validate_name(name)?;
        if self.contains(name) {
            return Err(TensorError::TensorAlreadyExists(name.to_string()));
        }
        if self.is_group(name) {
            return Err(TensorError::InvalidArgument(format!(
                "{name} is a group"
            )));
        }
        if let Some(parent) = parent_groups(name).find(|g| self.contains(g)) {
            return Err(TensorError::InvalidArgument(format!(
                "{parent} is a tensor and cannot hold {name}"
            )));
        }
        Ok(())
    }

    /// Register a tensor and its parent groups
    pub fn add_tensor(&mut self, name: &str, key: &str) -> TensorResult<()> {
        self.check_free(name)?;
        self.groups
            .extend(parent_groups(name).map(str::to_string));
        self.tensors.push(TensorEntry {
            name: name.to_string(),
            key: key.to_string(),
        });
        Ok(())
    }

    /// Rename a tensor. The storage key is unchanged.
    pub fn rename_tensor(&mut self, name: &str, new_name: &str) -> TensorResult<()> {
        if !self.contains(name) {
            return Err(TensorError::missing(name));
        }
        self.check_free(new_name)?;
        self.groups
            .extend(parent_groups(new_name).map(str::to_string));
        if let Some(entry) = self.tensors.iter_mut().find(|t| t.name == name) {
            entry.name = new_name.to_string();
        }
        self.prune_groups();
        Ok(())
    }

    /// Rename a group and everything below it
    pub fn rename_group(&mut self, name: &str, new_name: &str) -> TensorResult<()> {
        if !self.is_group(name) {
            return Err(TensorError::InvalidArgument(format!("no such group: {name}")));
        }
        self.check_free(new_name)?;
        if new_name.starts_with(&format!("{name}/")) {
            return Err(TensorError::InvalidArgument(format!(
                "cannot move group {name} into itself"
            )));
        }

        let prefix = format!("{name}/");
        let moved = |path: &str| -> Option<String> {
            if path == name {
                Some(new_name.to_string())
            } else {
                path.strip_prefix(&prefix)
                    .map(|rest| format!("{new_name}/{rest}"))
            }
        };

        self.groups = self
            .groups
            .iter()
            .map(|g| moved(g).unwrap_or_else(|| g.clone()))
            .collect();
        self.groups
            .extend(parent_groups(new_name).map(str::to_string));
        for entry in &mut self.tensors {
            if let Some(renamed) = moved(&entry.name) {
                entry.name = renamed;
            }
        }
        self.prune_groups();
        Ok(())
    }

    /// Unregister a tensor, returning its storage key
    pub fn remove_tensor(&mut self, name: &str) -> TensorResult<String> {
        let pos = self
            .tensors
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| TensorError::missing(name))?;
        let key = self.tensors.remove(pos).key;
        self.prune_groups();
        Ok(key)
    }

    /// Drop groups that no tensor lives under
    fn prune_groups(&mut self) {
        let tensors = &self.tensors;
        self.groups.retain(|group| {
            tensors
                .iter()
                .any(|t| parent_groups(&t.name).any(|g| g == group.as_str()))
        });
    }

    /// Serialize to JSON
    pub fn to_bytes(&self) -> TensorResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| TensorError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON
    pub fn from_bytes(bytes: &[u8]) -> TensorResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| TensorError::Serialization(e.to_string()))
    }
}
