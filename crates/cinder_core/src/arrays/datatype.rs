use std::fmt;

use serde::{Deserialize, Serialize};

/// Concrete data type of a scalar value or column buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int64,
    Float64,
    Utf8,
}

impl DataType {
    pub const fn datatype_id(&self) -> DataTypeId {
        match self {
            DataType::Boolean => DataTypeId::Boolean,
            DataType::Int64 => DataTypeId::Int64,
            DataType::Float64 => DataTypeId::Float64,
            DataType::Utf8 => DataTypeId::Utf8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "boolean"),
            DataType::Int64 => write!(f, "int64"),
            DataType::Float64 => write!(f, "float64"),
            DataType::Utf8 => write!(f, "utf8"),
        }
    }
}

/// Data type identifier used in kernel signatures.
///
/// Unlike `DataType`, this includes `Any` for signature slots that match any
/// concrete type without binding a type variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataTypeId {
    Any,
    Boolean,
    Int64,
    Float64,
    Utf8,
}

impl DataTypeId {
    /// Get the concrete type for this id, if there is exactly one.
    pub const fn to_datatype(self) -> Option<DataType> {
        match self {
            DataTypeId::Any => None,
            DataTypeId::Boolean => Some(DataType::Boolean),
            DataTypeId::Int64 => Some(DataType::Int64),
            DataTypeId::Float64 => Some(DataType::Float64),
            DataTypeId::Utf8 => Some(DataType::Utf8),
        }
    }
}

impl fmt::Display for DataTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datatype() {
            Some(dt) => dt.fmt(f),
            None => write!(f, "any"),
        }
    }
}
