//! Data container and identity readers.

use std::collections::HashSet;
use std::sync::Arc;

use relmap_proto::{ObjectId, Timestamp, Value};
use uuid::Uuid;

use super::row::Row;
use crate::data::DataContainer;
use crate::error::{Error, Result};
use crate::mapping::{
    ClassDefinition, MappingConfiguration, PropertyDefinition, PropertyType, ScalarType,
};
use crate::storage::{CLASS_ID_COLUMN, ID_COLUMN, TIMESTAMP_COLUMN};

/// Reads rows into [`DataContainer`]s.
///
/// The concrete class of each row is taken from its `ClassID` column, so a
/// reader created for a base class loads derived objects correctly.
#[derive(Debug, Clone)]
pub struct DataContainerReader {
    config: Arc<MappingConfiguration>,
    source: String,
    allow_nulls: bool,
}

impl DataContainerReader {
    /// Create a reader. `source` names the queried entity in error messages.
    pub fn new(config: Arc<MappingConfiguration>, source: impl Into<String>) -> Self {
        Self {
            config,
            source: source.into(),
            allow_nulls: false,
        }
    }

    /// Read rows with a NULL `ID` as empty slots.
    pub fn allowing_nulls(mut self) -> Self {
        self.allow_nulls = true;
        self
    }

    /// Whether NULL identities are allowed.
    pub fn allows_nulls(&self) -> bool {
        self.allow_nulls
    }

    /// Read one row. Returns `None` only for a NULL identity in allow-nulls
    /// mode.
    pub fn read(&self, row: &Row) -> Result<Option<DataContainer>> {
        let Some(id) = self.read_object_id(row)? else {
            return Ok(None);
        };
        let class = self.config.get_class(id.class_id())?;
        let entity = entity_label(&self.config, class);

        let timestamp = read_timestamp(row, &entity)?;

        let mut values = Vec::new();
        for property in self.config.persistent_properties(class.id())? {
            let value = if property.is_object_id() {
                self.read_relation_value(row, class, property, &entity)?
            } else {
                let column = property.column_name()?;
                let raw = required(row, column, &entity)?;
                convert(raw, property, &entity, column)?
            };
            values.push((property.name().to_string(), value));
        }

        Ok(Some(DataContainer::create_for_existing(id, timestamp, values)))
    }

    /// Read all rows, rejecting identities that occur more than once.
    pub fn read_sequence(&self, rows: &[Row]) -> Result<Vec<Option<DataContainer>>> {
        let mut seen = HashSet::new();
        let mut containers = Vec::with_capacity(rows.len());
        for row in rows {
            let container = self.read(row)?;
            if let Some(c) = &container {
                if !seen.insert(c.id().clone()) {
                    return Err(Error::DuplicateObject {
                        object_id: c.id().to_string(),
                    });
                }
            }
            containers.push(container);
        }
        Ok(containers)
    }

    fn read_object_id(&self, row: &Row) -> Result<Option<ObjectId>> {
        let id = match required(row, ID_COLUMN, &self.source)? {
            Value::Null if self.allow_nulls => return Ok(None),
            Value::Null => {
                return Err(Error::NullObjectId {
                    entity: self.source.clone(),
                })
            }
            raw => parse_uuid(raw, &self.source, ID_COLUMN)?,
        };
        let class_id = match required(row, CLASS_ID_COLUMN, &self.source)? {
            Value::String(s) => s,
            other => {
                return Err(Error::storage_format(
                    &self.source,
                    CLASS_ID_COLUMN,
                    format!("expected a class ID, found {}", other.type_name()),
                ))
            }
        };
        let class = self.config.find_class(class_id).ok_or_else(|| {
            Error::storage_format(
                &self.source,
                CLASS_ID_COLUMN,
                format!("the class ID '{class_id}' is not part of the mapping"),
            )
        })?;
        Ok(Some(ObjectId::new(class.storage_provider_id(), class.id(), id)))
    }

    fn read_relation_value(
        &self,
        row: &Row,
        class: &ClassDefinition,
        property: &PropertyDefinition,
        entity: &str,
    ) -> Result<Value> {
        let column = property.column_name()?;
        let class_id_column = format!("{column}ClassID");
        let opposite = self.config.opposite_class(class.id(), property.name()).ok_or_else(|| {
            Error::internal(format!(
                "relation property '{}' of class '{}' has no opposite class",
                property.name(),
                class.id()
            ))
        })?;

        let companion = row.get(&class_id_column);
        let has_companion = self.config.has_class_id_column(class.id(), property.name());
        if has_companion && companion.is_none() {
            return Err(Error::storage_format(
                entity,
                &class_id_column,
                format!(
                    "the column is required, because the opposite class '{}' \
                     is part of an inheritance hierarchy",
                    opposite.id()
                ),
            ));
        }
        if !has_companion && companion.is_some() {
            return Err(Error::storage_format(
                entity,
                &class_id_column,
                format!(
                    "the column is not allowed, because the opposite class '{}' \
                     is not part of an inheritance hierarchy",
                    opposite.id()
                ),
            ));
        }

        let raw = required(row, column, entity)?;
        if raw.is_null() {
            if let Some(class_id) = companion.filter(|v| !v.is_null()) {
                return Err(Error::storage_format(
                    entity,
                    &class_id_column,
                    format!("a class ID ('{class_id}') is set although '{column}' is NULL"),
                ));
            }
            return Ok(Value::Null);
        }
        let value = parse_uuid(raw, entity, column)?;

        let related_class = match companion {
            Some(Value::String(class_id)) => self.config.find_class(class_id).ok_or_else(|| {
                Error::storage_format(
                    entity,
                    &class_id_column,
                    format!("the class ID '{class_id}' is not part of the mapping"),
                )
            })?,
            Some(other) => {
                return Err(Error::storage_format(
                    entity,
                    &class_id_column,
                    format!("expected a class ID, found {}", other.type_name()),
                ))
            }
            None => opposite,
        };

        Ok(Value::ObjectId(ObjectId::new(
            related_class.storage_provider_id(),
            related_class.id(),
            value,
        )))
    }
}

/// Reads the `ID` and `ClassID` columns of identity-only scans.
#[derive(Debug, Clone)]
pub struct ObjectIdReader {
    config: Arc<MappingConfiguration>,
    source: String,
}

impl ObjectIdReader {
    /// Create a reader; `source` names the scanned entity in error messages.
    pub fn new(config: Arc<MappingConfiguration>, source: impl Into<String>) -> Self {
        Self {
            config,
            source: source.into(),
        }
    }

    /// Read one identity.
    pub fn read(&self, row: &Row) -> Result<ObjectId> {
        let reader = DataContainerReader::new(self.config.clone(), self.source.clone());
        reader
            .read_object_id(row)?
            .ok_or_else(|| Error::NullObjectId {
                entity: self.source.clone(),
            })
    }

    /// Read all identities in row order.
    pub fn read_sequence(&self, rows: &[Row]) -> Result<Vec<ObjectId>> {
        rows.iter().map(|row| self.read(row)).collect()
    }
}

/// Reads `ID`, `ClassID` and `Timestamp` for refreshing concurrency tokens.
#[derive(Debug, Clone)]
pub struct TimestampReader {
    ids: ObjectIdReader,
}

impl TimestampReader {
    /// Create a reader; `source` names the scanned entity in error messages.
    pub fn new(config: Arc<MappingConfiguration>, source: impl Into<String>) -> Self {
        Self {
            ids: ObjectIdReader::new(config, source),
        }
    }

    /// Read one identity and its row version.
    pub fn read(&self, row: &Row) -> Result<(ObjectId, Timestamp)> {
        let id = self.ids.read(row)?;
        Ok((id, read_timestamp(row, &self.ids.source)?))
    }

    /// Read all rows.
    pub fn read_sequence(&self, rows: &[Row]) -> Result<Vec<(ObjectId, Timestamp)>> {
        rows.iter().map(|row| self.read(row)).collect()
    }
}

fn entity_label(config: &MappingConfiguration, class: &ClassDefinition) -> String {
    config
        .storage_entity(class.id())
        .ok()
        .and_then(|e| e.physical_table())
        .map(|t| t.table_name.clone())
        .unwrap_or_else(|| class.id().to_string())
}

fn required<'r>(row: &'r Row, column: &str, entity: &str) -> Result<&'r Value> {
    row.get(column).ok_or_else(|| {
        Error::storage_format(entity, column, "the column is missing from the result set")
    })
}

fn read_timestamp(row: &Row, entity: &str) -> Result<Timestamp> {
    match required(row, TIMESTAMP_COLUMN, entity)? {
        Value::Int64(ts) => Ok(Timestamp(*ts)),
        Value::Int32(ts) => Ok(Timestamp(i64::from(*ts))),
        other => Err(Error::storage_format(
            entity,
            TIMESTAMP_COLUMN,
            format!("expected an integer row version, found {}", other.type_name()),
        )),
    }
}

fn parse_uuid(raw: &Value, entity: &str, column: &str) -> Result<Uuid> {
    match raw {
        Value::Uuid(u) => Ok(*u),
        Value::String(s) => Uuid::parse_str(s).map_err(|e| {
            Error::storage_format(entity, column, format!("'{s}' is not a valid identity: {e}"))
        }),
        Value::Bytes(b) => Uuid::from_slice(b).map_err(|e| {
            Error::storage_format(entity, column, format!("invalid binary identity: {e}"))
        }),
        other => Err(Error::storage_format(
            entity,
            column,
            format!("expected an identity, found {}", other.type_name()),
        )),
    }
}

/// Convert a raw column value to the declared type of `property`.
fn convert(
    raw: &Value,
    property: &PropertyDefinition,
    entity: &str,
    column: &str,
) -> Result<Value> {
    if raw.is_null() {
        if property.is_nullable() {
            return Ok(Value::Null);
        }
        return Err(Error::storage_format(
            entity,
            column,
            format!("NULL is not allowed for property '{}'", property.name()),
        ));
    }

    let scalar = match property.property_type() {
        PropertyType::Scalar(s) | PropertyType::OptionalScalar(s) => s,
        PropertyType::ObjectId => {
            return Err(Error::internal(format!(
                "relation property '{}' read as a scalar",
                property.name()
            )))
        }
    };

    let mismatch = || {
        Error::storage_format(
            entity,
            column,
            format!("cannot read a {} value as {scalar}", raw.type_name()),
        )
    };

    let value = match (scalar, raw) {
        (ScalarType::Bool, Value::Bool(b)) => Value::Bool(*b),
        (ScalarType::Bool, Value::Int64(i)) => Value::Bool(*i != 0),
        (ScalarType::Int32, Value::Int32(i)) => Value::Int32(*i),
        (ScalarType::Int32, Value::Int64(i)) => {
            Value::Int32(i32::try_from(*i).map_err(|_| mismatch())?)
        }
        (ScalarType::Int64, Value::Int64(i)) => Value::Int64(*i),
        (ScalarType::Int64, Value::Int32(i)) => Value::Int64(i64::from(*i)),
        (ScalarType::Float64, Value::Float64(f)) => Value::Float64(*f),
        (ScalarType::Float64, Value::Int64(i)) => Value::Float64(*i as f64),
        (ScalarType::DateTime, Value::DateTime(t) | Value::Int64(t)) => Value::DateTime(*t),
        (ScalarType::Uuid, raw) => Value::Uuid(parse_uuid(raw, entity, column)?),
        (ScalarType::String, Value::String(s)) => Value::String(s.clone()),
        (ScalarType::Bytes, Value::Bytes(b)) => Value::Bytes(b.clone()),
        _ => return Err(mismatch()),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{EntityDescriptor, MappingBuilder, MappingSchema, PropertyDescriptor};

    fn config() -> Arc<MappingConfiguration> {
        let schema = MappingSchema::new()
            .with_entity(
                EntityDescriptor::new("Order")
                    .with_table("Order")
                    .with_property(PropertyDescriptor::scalar("OrderNo", ScalarType::Int32))
                    .with_property(PropertyDescriptor::optional(
                        "DeliveryDate",
                        ScalarType::DateTime,
                    ))
                    .with_property(
                        PropertyDescriptor::reference("Customer", "Customer")
                            .with_opposite("Orders"),
                    )
                    .with_property(
                        PropertyDescriptor::collection("OrderItems", "OrderItem")
                            .with_opposite("Order"),
                    ),
            )
            .with_entity(
                EntityDescriptor::new("OrderItem")
                    .with_table("OrderItem")
                    .with_property(PropertyDescriptor::scalar("Position", ScalarType::Int32))
                    .with_property(
                        PropertyDescriptor::reference("Order", "Order").with_opposite("OrderItems"),
                    ),
            )
            .with_entity(
                EntityDescriptor::new("Company")
                    .with_table("Company")
                    .with_property(PropertyDescriptor::scalar("Name", ScalarType::String)),
            )
            .with_entity(
                EntityDescriptor::new("Customer")
                    .with_base("Company")
                    .with_property(
                        PropertyDescriptor::collection("Orders", "Order").with_opposite("Customer"),
                    ),
            );
        Arc::new(MappingBuilder::new(schema).build().unwrap())
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        let columns: Arc<[String]> = pairs
            .iter()
            .map(|(c, _)| c.to_string())
            .collect::<Vec<_>>()
            .into();
        Row::new(columns, pairs.iter().map(|(_, v)| v.clone()).collect())
    }

    fn order_row(id: Uuid, customer: Option<Uuid>, include_companion: bool) -> Row {
        let mut pairs = vec![
            ("ID", Value::String(id.to_string())),
            ("ClassID", Value::String("Order".into())),
            ("Timestamp", Value::Int64(3)),
            ("OrderNo", Value::Int64(12)),
            ("DeliveryDate", Value::Null),
            (
                "CustomerID",
                customer
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or(Value::Null),
            ),
        ];
        if include_companion {
            pairs.push((
                "CustomerIDClassID",
                if customer.is_some() {
                    Value::String("Customer".into())
                } else {
                    Value::Null
                },
            ));
        }
        row(&pairs)
    }

    #[test]
    fn test_read_order_row() {
        let reader = DataContainerReader::new(config(), "Order");
        let id = Uuid::new_v4();
        let customer = Uuid::new_v4();

        let container = reader
            .read(&order_row(id, Some(customer), true))
            .unwrap()
            .unwrap();
        assert_eq!(container.id(), &ObjectId::new("Default", "Order", id));
        assert_eq!(container.timestamp(), Some(Timestamp(3)));
        assert_eq!(container.value("Order.OrderNo"), Some(&Value::Int32(12)));
        assert_eq!(container.value("Order.DeliveryDate"), Some(&Value::Null));
        assert_eq!(
            container.value("Order.Customer"),
            Some(&Value::ObjectId(ObjectId::new("Default", "Customer", customer)))
        );
    }

    #[test]
    fn test_missing_companion_column() {
        let reader = DataContainerReader::new(config(), "Order");
        let err = reader.read(&order_row(Uuid::new_v4(), None, false)).unwrap_err();
        match err {
            Error::StorageFormat { entity, column, .. } => {
                assert_eq!(entity, "Order");
                assert_eq!(column, "CustomerIDClassID");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_disallowed_companion_column() {
        let reader = DataContainerReader::new(config(), "OrderItem");
        let row = row(&[
            ("ID", Value::String(Uuid::new_v4().to_string())),
            ("ClassID", Value::String("OrderItem".into())),
            ("Timestamp", Value::Int64(1)),
            ("Position", Value::Int64(1)),
            ("OrderID", Value::String(Uuid::new_v4().to_string())),
            ("OrderIDClassID", Value::String("Order".into())),
        ]);
        let err = reader.read(&row).unwrap_err();
        assert!(err.to_string().starts_with(
            "Incorrect database format encountered. \
             Entity: 'OrderItem', column: 'OrderIDClassID': the column is not allowed"
        ));
    }

    #[test]
    fn test_null_identity_policy() {
        let null_row = row(&[
            ("ID", Value::Null),
            ("ClassID", Value::Null),
            ("Timestamp", Value::Null),
        ]);

        let strict = DataContainerReader::new(config(), "Order");
        let err = strict.read(&null_row).unwrap_err();
        assert!(matches!(err, Error::NullObjectId { ref entity } if entity == "Order"));

        let lenient = DataContainerReader::new(config(), "Order").allowing_nulls();
        let rows = vec![order_row(Uuid::new_v4(), None, true), null_row];
        let read = lenient.read_sequence(&rows).unwrap();
        assert!(read[0].is_some());
        assert!(read[1].is_none());
    }

    #[test]
    fn test_duplicates_rejected() {
        let reader = DataContainerReader::new(config(), "Order");
        let id = Uuid::new_v4();
        let rows = vec![order_row(id, None, true), order_row(id, None, true)];
        let err = reader.read_sequence(&rows).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "A database query returned duplicates of the domain object 'Order|{id}', \
                 which is not supported."
            )
        );
    }

    #[test]
    fn test_concrete_class_from_class_id() {
        let reader = DataContainerReader::new(config(), "Company");
        let id = Uuid::new_v4();
        let row = row(&[
            ("ID", Value::String(id.to_string())),
            ("ClassID", Value::String("Customer".into())),
            ("Timestamp", Value::Int64(1)),
            ("Name", Value::String("Acme".into())),
        ]);
        let container = reader.read(&row).unwrap().unwrap();
        assert_eq!(container.class_id(), "Customer");
        assert_eq!(container.value("Company.Name"), Some(&Value::String("Acme".into())));

        let unknown = Row::new(row.columns().to_vec().into(), {
            let mut values = row.values().to_vec();
            values[1] = Value::String("Ghost".into());
            values
        });
        assert!(matches!(reader.read(&unknown), Err(Error::StorageFormat { .. })));
    }

    #[test]
    fn test_identity_and_timestamp_readers() {
        let id = Uuid::new_v4();
        let row = row(&[
            ("ID", Value::String(id.to_string())),
            ("ClassID", Value::String("Order".into())),
            ("Timestamp", Value::Int64(5)),
        ]);
        let ids = ObjectIdReader::new(config(), "Order")
            .read_sequence(std::slice::from_ref(&row))
            .unwrap();
        assert_eq!(ids, vec![ObjectId::new("Default", "Order", id)]);

        let (read_id, ts) = TimestampReader::new(config(), "Order").read(&row).unwrap();
        assert_eq!(read_id.value(), id);
        assert_eq!(ts, Timestamp(5));
    }

    #[test]
    fn test_timestamp_reader_accepts_narrow_integers() {
        let reader = TimestampReader::new(config(), "Order");
        let id = Uuid::new_v4();
        let narrow = row(&[
            ("ID", Value::String(id.to_string())),
            ("ClassID", Value::String("Order".into())),
            ("Timestamp", Value::Int32(7)),
        ]);
        let (read_id, ts) = reader.read(&narrow).unwrap();
        assert_eq!(read_id, ObjectId::new("Default", "Order", id));
        assert_eq!(ts, Timestamp(7));

        let text = row(&[
            ("ID", Value::String(id.to_string())),
            ("ClassID", Value::String("Order".into())),
            ("Timestamp", Value::String("7".into())),
        ]);
        match reader.read(&text).unwrap_err() {
            Error::StorageFormat { entity, column, .. } => {
                assert_eq!(entity, "Order");
                assert_eq!(column, "Timestamp");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
