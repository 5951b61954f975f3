//! Dense n-dimensional arrays

use bytes::{Bytes, BytesMut};

use crate::{Dtype, Element, TensorError, TensorResult};

/// Dense row-major array with little-endian element bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Array {
    dtype: Dtype,
    shape: Vec<usize>,
    data: Bytes,
}

fn item_size(dtype: Dtype) -> TensorResult<usize> {
    dtype.item_size().ok_or_else(|| {
        TensorError::InvalidArgument(format!("{dtype} samples cannot be held in an array"))
    })
}

impl Array {
    /// Build from raw bytes, checking the length against `shape`
    pub fn from_bytes(dtype: Dtype, shape: Vec<usize>, data: impl Into<Bytes>) -> TensorResult<Self> {
        let data = data.into();
        let expected = shape.iter().product::<usize>() * item_size(dtype)?;
        if data.len() != expected {
            return Err(TensorError::Corrupted(format!(
                "{} bytes do not fill a {dtype} array of shape {shape:?} ({expected} bytes)",
                data.len()
            )));
        }
        Ok(Self { dtype, shape, data })
    }

    /// Build from typed values
    pub fn from_vec<T: Element>(shape: Vec<usize>, values: Vec<T>) -> TensorResult<Self> {
        if shape.iter().product::<usize>() != values.len() {
            return Err(TensorError::ShapeMismatch {
                expected: shape,
                actual: vec![values.len()],
            });
        }
        let mut data = Vec::with_capacity(values.len() * item_size(T::DTYPE)?);
        for value in values {
            value.write_le(&mut data);
        }
        Ok(Self {
            dtype: T::DTYPE,
            shape,
            data: data.into(),
        })
    }

    /// One-dimensional array
    pub fn from_slice<T: Element>(values: &[T]) -> Self {
        let mut data = Vec::with_capacity(std::mem::size_of_val(values));
        for value in values {
            value.write_le(&mut data);
        }
        Self {
            dtype: T::DTYPE,
            shape: vec![values.len()],
            data: data.into(),
        }
    }

    /// Zero-dimensional array
    pub fn scalar<T: Element>(value: T) -> Self {
        let mut data = Vec::new();
        value.write_le(&mut data);
        Self {
            dtype: T::DTYPE,
            shape: Vec::new(),
            data: data.into(),
        }
    }

    /// Array filled with `value`
    pub fn full<T: Element>(shape: Vec<usize>, value: T) -> Self {
        let count = shape.iter().product::<usize>();
        let mut data = Vec::new();
        for _ in 0..count {
            value.write_le(&mut data);
        }
        Self {
            dtype: T::DTYPE,
            shape,
            data: data.into(),
        }
    }

    /// Zero-filled array
    pub fn zeros(dtype: Dtype, shape: Vec<usize>) -> TensorResult<Self> {
        let len = shape.iter().product::<usize>() * item_size(dtype)?;
        Ok(Self {
            dtype,
            shape,
            data: BytesMut::zeroed(len).freeze(),
        })
    }

    /// Element type
    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Shape
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements
    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Size of the element buffer in bytes
    pub fn nbytes(&self) -> usize {
        self.data.len()
    }

    /// Element bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the element bytes
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Decode the elements
    pub fn to_vec<T: Element>(&self) -> TensorResult<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(TensorError::DtypeMismatch {
                expected: self.dtype,
                actual: T::DTYPE,
            });
        }
        let size = item_size(self.dtype)?;
        Ok(self.data.chunks_exact(size).map(T::read_le).collect())
    }

    /// Same elements under a new shape
    pub fn reshape(self, shape: Vec<usize>) -> TensorResult<Self> {
        if shape.iter().product::<usize>() != self.num_elements() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape,
                actual: shape,
            });
        }
        Ok(Self { shape, ..self })
    }

    /// Sub-array at `index` along the leading axis
    pub fn index_axis0(&self, index: usize) -> TensorResult<Self> {
        let Some((&rows, rest)) = self.shape.split_first() else {
            return Err(TensorError::InvalidArgument(
                "cannot index a zero-dimensional array".to_string(),
            ));
        };
        if index >= rows {
            return Err(TensorError::IndexOutOfRange {
                index: index as i64,
                length: rows,
            });
        }
        let stride = rest.iter().product::<usize>() * item_size(self.dtype)?;
        Ok(Self {
            dtype: self.dtype,
            shape: rest.to_vec(),
            data: self.data.slice(index * stride..(index + 1) * stride),
        })
    }

    /// Stack arrays of identical dtype and shape along a new leading axis
    pub fn stack(arrays: &[Array]) -> TensorResult<Self> {
        let Some(first) = arrays.first() else {
            return Err(TensorError::InvalidArgument(
                "cannot stack an empty list".to_string(),
            ));
        };
        let mut data = BytesMut::with_capacity(first.nbytes() * arrays.len());
        for array in arrays {
            if array.dtype != first.dtype {
                return Err(TensorError::DtypeMismatch {
                    expected: first.dtype,
                    actual: array.dtype,
                });
            }
            if array.shape != first.shape {
                return Err(TensorError::ShapeMismatch {
                    expected: first.shape.clone(),
                    actual: array.shape.clone(),
                });
            }
            data.extend_from_slice(&array.data);
        }
        let mut shape = Vec::with_capacity(first.ndim() + 1);
        shape.push(arrays.len());
        shape.extend_from_slice(&first.shape);
        Ok(Self {
            dtype: first.dtype,
            shape,
            data: data.freeze(),
        })
    }
}
