//! Core type definitions for the mapping.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar data types a persistent property can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// Date and time (microseconds since Unix epoch).
    DateTime,
    /// UUID (128-bit identifier).
    Uuid,
    /// UTF-8 string.
    String,
    /// Binary data.
    Bytes,
}

impl ScalarType {
    /// Value types are never null unless declared optional.
    pub fn is_value_type(self) -> bool {
        !matches!(self, ScalarType::String | ScalarType::Bytes)
    }

    /// Check if this type accepts a maximum length.
    pub fn is_string_like(self) -> bool {
        matches!(self, ScalarType::String | ScalarType::Bytes)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Bool => "Bool",
            ScalarType::Int32 => "Int32",
            ScalarType::Int64 => "Int64",
            ScalarType::Float64 => "Float64",
            ScalarType::DateTime => "DateTime",
            ScalarType::Uuid => "Uuid",
            ScalarType::String => "String",
            ScalarType::Bytes => "Bytes",
        };
        f.write_str(name)
    }
}

/// Declared type of a property definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    /// A scalar value.
    Scalar(ScalarType),
    /// An optional scalar value (nullable value type).
    OptionalScalar(ScalarType),
    /// A reference to another domain object; the foreign-key side of a relation.
    ObjectId,
}

impl PropertyType {
    /// Create a scalar property type.
    pub fn scalar(scalar: ScalarType) -> Self {
        PropertyType::Scalar(scalar)
    }

    /// Create an optional scalar property type.
    pub fn optional(scalar: ScalarType) -> Self {
        PropertyType::OptionalScalar(scalar)
    }

    /// The underlying scalar, if any.
    pub fn scalar_type(self) -> Option<ScalarType> {
        match self {
            PropertyType::Scalar(s) | PropertyType::OptionalScalar(s) => Some(s),
            PropertyType::ObjectId => None,
        }
    }

    /// Reference types carry their own nullability flag.
    pub fn is_reference_type(self) -> bool {
        match self {
            PropertyType::Scalar(s) => !s.is_value_type(),
            PropertyType::OptionalScalar(_) => false,
            PropertyType::ObjectId => true,
        }
    }

    /// Check if this type accepts a maximum length.
    pub fn is_string_like(self) -> bool {
        matches!(self, PropertyType::Scalar(s) if s.is_string_like())
    }

    /// Check if this is an object reference.
    pub fn is_object_id(self) -> bool {
        matches!(self, PropertyType::ObjectId)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Scalar(s) => write!(f, "{s}"),
            PropertyType::OptionalScalar(s) => write!(f, "Option<{s}>"),
            PropertyType::ObjectId => f.write_str("ObjectId"),
        }
    }
}

/// Where a property's value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StorageClass {
    /// Stored in a column of the class's table.
    #[default]
    Persistent,
    /// Kept for the lifetime of the owning transaction only.
    Transaction,
    /// Not managed by the mapping.
    None,
}
