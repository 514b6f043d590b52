//! Property definitions for mapped classes.

use super::error::MappingError;
use super::types::{PropertyType, StorageClass};

/// One persistable field or relation foreign key of a mapped class.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDefinition {
    class_id: String,
    name: String,
    column_name: String,
    property_type: PropertyType,
    is_nullable: bool,
    max_length: Option<u32>,
    storage_class: StorageClass,
}

impl PropertyDefinition {
    /// Create a property definition owned by `class_id`.
    ///
    /// `is_nullable` and `max_length` are overrides: nullability may only be
    /// supplied for reference types (value types express it through
    /// [`PropertyType::OptionalScalar`]) and a max length only for strings and
    /// byte arrays.
    pub fn new(
        class_id: impl Into<String>,
        name: impl Into<String>,
        column_name: impl Into<String>,
        property_type: PropertyType,
        is_nullable: Option<bool>,
        max_length: Option<u32>,
        storage_class: StorageClass,
    ) -> Result<Self, MappingError> {
        let name = name.into();

        if max_length.is_some() && !property_type.is_string_like() {
            return Err(MappingError::InvalidMaxLength {
                property: name,
                property_type: property_type.to_string(),
            });
        }

        let is_nullable = match (property_type, is_nullable) {
            (PropertyType::OptionalScalar(_), None) => true,
            (ty, Some(nullable)) if ty.is_reference_type() => nullable,
            (ty, None) if ty.is_reference_type() => true,
            (ty, Some(_)) => {
                return Err(MappingError::InvalidNullability {
                    property: name,
                    property_type: ty.to_string(),
                });
            }
            (_, None) => false,
        };

        Ok(Self {
            class_id: class_id.into(),
            name,
            column_name: column_name.into(),
            property_type,
            is_nullable,
            max_length,
            storage_class,
        })
    }

    /// ID of the class owning this property.
    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    /// Dotted logical name, e.g. `Order.OrderNo`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The part of the name after the declaring type.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Column name; only available for persistent properties.
    pub fn column_name(&self) -> Result<&str, MappingError> {
        if self.storage_class == StorageClass::Persistent {
            Ok(&self.column_name)
        } else {
            Err(MappingError::NonPersistentColumnAccess {
                property: self.name.clone(),
            })
        }
    }

    /// Declared property type.
    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    /// Check if the property accepts null.
    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    /// Maximum length of string and byte-array values.
    pub fn max_length(&self) -> Option<u32> {
        self.max_length
    }

    /// Storage class of the property.
    pub fn storage_class(&self) -> StorageClass {
        self.storage_class
    }

    /// Check if the property is stored in a column.
    pub fn is_persistent(&self) -> bool {
        self.storage_class == StorageClass::Persistent
    }

    /// Check if the property holds a reference to another object.
    pub fn is_object_id(&self) -> bool {
        self.property_type.is_object_id()
    }

    /// Companion column holding the referenced class ID.
    pub(crate) fn class_id_column_name(&self) -> Result<String, MappingError> {
        Ok(format!("{}ClassID", self.column_name()?))
    }
}
