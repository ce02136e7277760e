use std::cmp::Ordering;

use cinder_error::{CinderError, Result};
use serde::{Deserialize, Serialize};

use super::datatype::DataType;
use super::scalar::ScalarValue;

/// Minimal concrete column buffer.
///
/// Stands in for the external in-memory array runtime: a typed vector that
/// knows its element type and length, nothing more. Kernels on the memory
/// backend compute directly over these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Vector {
    Boolean(Vec<bool>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Utf8(Vec<String>),
}

impl Vector {
    pub const fn datatype(&self) -> DataType {
        match self {
            Vector::Boolean(_) => DataType::Boolean,
            Vector::Int64(_) => DataType::Int64,
            Vector::Float64(_) => DataType::Float64,
            Vector::Utf8(_) => DataType::Utf8,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Vector::Boolean(v) => v.len(),
            Vector::Int64(v) => v.len(),
            Vector::Float64(v) => v.len(),
            Vector::Utf8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn try_bool(&self) -> Option<&[bool]> {
        match self {
            Vector::Boolean(v) => Some(v),
            _ => None,
        }
    }

    pub fn try_i64(&self) -> Option<&[i64]> {
        match self {
            Vector::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn try_f64(&self) -> Option<&[f64]> {
        match self {
            Vector::Float64(v) => Some(v),
            _ => None,
        }
    }

    pub fn try_utf8(&self) -> Option<&[String]> {
        match self {
            Vector::Utf8(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value at `idx`, None if out of bounds.
    pub fn value(&self, idx: usize) -> Option<ScalarValue> {
        match self {
            Vector::Boolean(v) => v.get(idx).map(|v| ScalarValue::Boolean(*v)),
            Vector::Int64(v) => v.get(idx).map(|v| ScalarValue::Int64(*v)),
            Vector::Float64(v) => v.get(idx).map(|v| ScalarValue::Float64(*v)),
            Vector::Utf8(v) => v.get(idx).map(|v| ScalarValue::Utf8(v.clone())),
        }
    }

    /// Build a one-element vector holding `value`.
    pub fn from_scalar(value: ScalarValue) -> Result<Vector> {
        match value {
            ScalarValue::Boolean(v) => Ok(Vector::Boolean(vec![v])),
            ScalarValue::Int64(v) => Ok(Vector::Int64(vec![v])),
            ScalarValue::Float64(v) => Ok(Vector::Float64(vec![v])),
            ScalarValue::Utf8(v) => Ok(Vector::Utf8(vec![v])),
            ScalarValue::Null => Err(CinderError::internal(
                "cannot build a typed buffer from a null scalar",
            )),
        }
    }

    /// Append a single value, failing if the value's type does not match the
    /// buffer's element type.
    pub fn push(&mut self, value: ScalarValue) -> Result<()> {
        match (self, &value) {
            (Vector::Boolean(v), ScalarValue::Boolean(val)) => v.push(*val),
            (Vector::Int64(v), ScalarValue::Int64(val)) => v.push(*val),
            (Vector::Float64(v), ScalarValue::Float64(val)) => v.push(*val),
            (Vector::Utf8(v), ScalarValue::Utf8(val)) => v.push(val.clone()),
            (buf, _) => {
                return Err(CinderError::unsupported(format!(
                    "cannot append {} value to {} buffer",
                    value
                        .datatype()
                        .map(|dt| dt.to_string())
                        .unwrap_or_else(|| "null".to_string()),
                    buf.datatype(),
                )));
            }
        }
        Ok(())
    }

    /// Keep only the elements whose mask entry is true. Mask length must
    /// equal the buffer length.
    pub fn filter(&self, mask: &[bool]) -> Result<Vector> {
        if mask.len() != self.len() {
            return Err(CinderError::internal(format!(
                "filter mask length {} does not match buffer length {}",
                mask.len(),
                self.len(),
            )));
        }

        fn keep<T: Clone>(vals: &[T], mask: &[bool]) -> Vec<T> {
            vals.iter()
                .zip(mask)
                .filter(|&(_, &keep)| keep)
                .map(|(v, _)| v.clone())
                .collect()
        }

        Ok(match self {
            Vector::Boolean(v) => Vector::Boolean(keep(v, mask)),
            Vector::Int64(v) => Vector::Int64(keep(v, mask)),
            Vector::Float64(v) => Vector::Float64(keep(v, mask)),
            Vector::Utf8(v) => Vector::Utf8(keep(v, mask)),
        })
    }

    /// Reorder elements by the given index permutation.
    pub fn take(&self, indices: &[usize]) -> Result<Vector> {
        fn gather<T: Clone>(vals: &[T], indices: &[usize]) -> Result<Vec<T>> {
            indices
                .iter()
                .map(|&idx| {
                    vals.get(idx).cloned().ok_or_else(|| {
                        CinderError::internal(format!("take index {idx} out of bounds"))
                    })
                })
                .collect()
        }

        Ok(match self {
            Vector::Boolean(v) => Vector::Boolean(gather(v, indices)?),
            Vector::Int64(v) => Vector::Int64(gather(v, indices)?),
            Vector::Float64(v) => Vector::Float64(gather(v, indices)?),
            Vector::Utf8(v) => Vector::Utf8(gather(v, indices)?),
        })
    }

    /// Total order between two elements of this buffer. Floats order by
    /// `total_cmp`.
    pub fn cmp_elements(&self, a: usize, b: usize) -> Ordering {
        match self {
            Vector::Boolean(v) => v[a].cmp(&v[b]),
            Vector::Int64(v) => v[a].cmp(&v[b]),
            Vector::Float64(v) => v[a].total_cmp(&v[b]),
            Vector::Utf8(v) => v[a].cmp(&v[b]),
        }
    }
}
