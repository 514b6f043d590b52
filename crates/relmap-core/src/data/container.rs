//! In-memory row images.

use std::fmt;

use relmap_proto::{ObjectId, Timestamp, Value};

use crate::error::{Error, Result};
use crate::mapping::{MappingConfiguration, PropertyDefinition, PropertyType, ScalarType};

/// Lifecycle state of a [`DataContainer`]; decides which command a save
/// generates for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateType {
    /// Not persisted yet; saved with an insert.
    New,
    /// Loaded and not modified; not saved.
    Unchanged,
    /// Loaded and modified; saved with an update.
    Changed,
    /// Loaded and marked for removal; saved with a delete.
    Deleted,
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StateType::New => "New",
            StateType::Unchanged => "Unchanged",
            StateType::Changed => "Changed",
            StateType::Deleted => "Deleted",
        };
        f.write_str(name)
    }
}

/// Current and original value of one property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    name: String,
    value: Value,
    original_value: Value,
}

impl PropertyValue {
    /// Full property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Value as loaded (or last committed).
    pub fn original_value(&self) -> &Value {
        &self.original_value
    }

    /// Check if the current value differs from the original one.
    pub fn has_changed(&self) -> bool {
        self.value != self.original_value
    }
}

/// Identity, concurrency token and persistent values of one object.
#[derive(Debug, Clone, PartialEq)]
pub struct DataContainer {
    id: ObjectId,
    timestamp: Option<Timestamp>,
    state: StateType,
    values: Vec<PropertyValue>,
}

impl DataContainer {
    /// Create an empty container for an object that is not persisted yet.
    pub fn create_new(id: ObjectId) -> Self {
        Self {
            id,
            timestamp: None,
            state: StateType::New,
            values: Vec::new(),
        }
    }

    /// Create a new container holding a default for every persistent
    /// property of the object's class.
    pub fn create_new_for_class(id: ObjectId, config: &MappingConfiguration) -> Result<Self> {
        let mut container = Self::create_new(id);
        for property in config.persistent_properties(container.id.class_id())? {
            container.values.push(PropertyValue {
                name: property.name().to_string(),
                value: default_value(property),
                original_value: Value::Null,
            });
        }
        Ok(container)
    }

    /// Create a container for a loaded row.
    pub fn create_for_existing<I>(id: ObjectId, timestamp: Timestamp, values: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let values = values
            .into_iter()
            .map(|(name, value)| PropertyValue {
                name,
                original_value: value.clone(),
                value,
            })
            .collect();
        Self {
            id,
            timestamp: Some(timestamp),
            state: StateType::Unchanged,
            values,
        }
    }

    /// The object identity.
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// The concrete class of the object.
    pub fn class_id(&self) -> &str {
        self.id.class_id()
    }

    /// The concurrency token; `None` until the object is loaded or saved.
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    /// Replace the concurrency token.
    pub fn set_timestamp(&mut self, timestamp: Timestamp) {
        self.timestamp = Some(timestamp);
    }

    /// Current state.
    pub fn state(&self) -> StateType {
        self.state
    }

    /// All property values in load order.
    pub fn property_values(&self) -> &[PropertyValue] {
        &self.values
    }

    /// Property values that differ from their originals.
    pub fn changed_values(&self) -> impl Iterator<Item = &PropertyValue> {
        self.values.iter().filter(|v| v.has_changed())
    }

    /// Current value of `property_name`.
    pub fn value(&self, property_name: &str) -> Option<&Value> {
        self.entry(property_name).map(PropertyValue::value)
    }

    /// Original value of `property_name`.
    pub fn original_value(&self, property_name: &str) -> Option<&Value> {
        self.entry(property_name).map(PropertyValue::original_value)
    }

    /// Set a value without type checking.
    ///
    /// New containers accept any property name; loaded containers only the
    /// properties they were loaded with.
    pub fn set_value(&mut self, property_name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        match self.state {
            StateType::Deleted => {
                return Err(Error::usage(format!(
                    "Cannot set property '{property_name}' of object '{}', \
                     because the object is deleted.",
                    self.id
                )))
            }
            StateType::New => match self.values.iter_mut().find(|v| v.name == property_name) {
                Some(entry) => entry.value = value,
                None => self.values.push(PropertyValue {
                    name: property_name.to_string(),
                    value,
                    original_value: Value::Null,
                }),
            },
            StateType::Unchanged | StateType::Changed => {
                let id = &self.id;
                let entry = self
                    .values
                    .iter_mut()
                    .find(|v| v.name == property_name)
                    .ok_or_else(|| {
                        Error::usage(format!(
                            "Object '{id}' does not have a property '{property_name}'."
                        ))
                    })?;
                entry.value = value;
                self.state = if self.values.iter().any(PropertyValue::has_changed) {
                    StateType::Changed
                } else {
                    StateType::Unchanged
                };
            }
        }
        Ok(())
    }

    /// Set the value of `property` after checking it against the declared
    /// type and nullability.
    pub fn set_property_value(
        &mut self,
        property: &PropertyDefinition,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value = value.into();
        check_value(property, &value)?;
        self.set_value(property.name(), value)
    }

    /// Mark a loaded object for deletion.
    pub fn mark_as_deleted(&mut self) -> Result<()> {
        match self.state {
            StateType::New => Err(Error::usage(format!(
                "Object '{}' is new and cannot be deleted; discard it instead.",
                self.id
            ))),
            _ => {
                self.state = StateType::Deleted;
                Ok(())
            }
        }
    }

    /// Accept the current values after a successful save.
    pub fn commit_state(&mut self) {
        if self.state == StateType::Deleted {
            return;
        }
        for entry in &mut self.values {
            entry.original_value = entry.value.clone();
        }
        self.state = StateType::Unchanged;
    }

    fn entry(&self, property_name: &str) -> Option<&PropertyValue> {
        self.values.iter().find(|v| v.name == property_name)
    }
}

/// Check `value` against the declared type and nullability of `property`.
pub fn check_value(property: &PropertyDefinition, value: &Value) -> Result<()> {
    let valid = match (property.property_type(), value) {
        (_, Value::Null) => property.is_nullable(),
        (PropertyType::ObjectId, Value::ObjectId(_)) => true,
        (PropertyType::Scalar(scalar) | PropertyType::OptionalScalar(scalar), value) => {
            scalar_matches(scalar, value)
        }
        _ => false,
    };
    if valid {
        return Ok(());
    }
    Err(Error::InvalidValue {
        property: property.name().to_string(),
        expected: property.property_type().to_string(),
        actual: value.type_name().to_string(),
    })
}

fn scalar_matches(scalar: ScalarType, value: &Value) -> bool {
    matches!(
        (scalar, value),
        (ScalarType::Bool, Value::Bool(_))
            | (ScalarType::Int32, Value::Int32(_))
            | (ScalarType::Int64, Value::Int64(_))
            | (ScalarType::Float64, Value::Float64(_))
            | (ScalarType::DateTime, Value::DateTime(_))
            | (ScalarType::Uuid, Value::Uuid(_))
            | (ScalarType::String, Value::String(_))
            | (ScalarType::Bytes, Value::Bytes(_))
    )
}

fn default_value(property: &PropertyDefinition) -> Value {
    if property.is_nullable() {
        return Value::Null;
    }
    match property.property_type() {
        PropertyType::Scalar(ScalarType::Bool) => Value::Bool(false),
        PropertyType::Scalar(ScalarType::Int32) => Value::Int32(0),
        PropertyType::Scalar(ScalarType::Int64) => Value::Int64(0),
        PropertyType::Scalar(ScalarType::Float64) => Value::Float64(0.0),
        PropertyType::Scalar(ScalarType::DateTime) => Value::DateTime(0),
        PropertyType::Scalar(ScalarType::Uuid) => Value::Uuid(uuid::Uuid::nil()),
        PropertyType::Scalar(ScalarType::String) => Value::String(String::new()),
        PropertyType::Scalar(ScalarType::Bytes) => Value::Bytes(Vec::new()),
        PropertyType::OptionalScalar(_) | PropertyType::ObjectId => Value::Null,
    }
}
