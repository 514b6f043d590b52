//! Declarative schema descriptions consumed by the mapping builder.
//!
//! A [`MappingSchema`] enumerates the entity types of a domain, their
//! properties and relations, and the extension (mixin) types that contribute
//! properties to them. Schemas are plain data: they can be assembled in code
//! with the builder-style helpers or deserialized from JSON.

use serde::{Deserialize, Serialize};

use super::error::MappingError;
use super::relation::Cardinality;
use super::types::{ScalarType, StorageClass};

/// Storage provider ID used when a descriptor does not name one.
pub const DEFAULT_STORAGE_PROVIDER_ID: &str = "Default";

/// Complete declarative description of a domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingSchema {
    /// Mapped entity types, in declaration order.
    #[serde(default)]
    pub entities: Vec<EntityDescriptor>,
    /// Extension (mixin) types.
    #[serde(default)]
    pub extensions: Vec<ExtensionDescriptor>,
}

impl MappingSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a schema from JSON text.
    pub fn from_json(json: &str) -> Result<Self, MappingError> {
        serde_json::from_str(json).map_err(|e| MappingError::InvalidSchema(e.to_string()))
    }

    /// Add an entity descriptor.
    pub fn with_entity(mut self, entity: EntityDescriptor) -> Self {
        self.entities.push(entity);
        self
    }

    /// Add an extension descriptor.
    pub fn with_extension(mut self, extension: ExtensionDescriptor) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Look up an entity descriptor by type name.
    pub fn entity(&self, type_name: &str) -> Option<&EntityDescriptor> {
        self.entities.iter().find(|e| e.type_name == type_name)
    }

    /// Look up an extension descriptor by type name.
    pub fn extension(&self, type_name: &str) -> Option<&ExtensionDescriptor> {
        self.extensions.iter().find(|e| e.type_name == type_name)
    }

    /// Mutable access to an entity descriptor, used to describe schema drift.
    pub fn entity_mut(&mut self, type_name: &str) -> Option<&mut EntityDescriptor> {
        self.entities.iter_mut().find(|e| e.type_name == type_name)
    }
}

/// Description of one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Name of the entity type.
    pub type_name: String,
    /// Base entity type.
    #[serde(default)]
    pub base_type: Option<String>,
    /// Class ID; defaults to the type name.
    #[serde(default)]
    pub class_id: Option<String>,
    /// Table the type is stored in.
    #[serde(default)]
    pub entity_name: Option<String>,
    /// Storage provider; defaults to [`MappingOptions::default_storage_provider_id`].
    #[serde(default)]
    pub storage_provider: Option<String>,
    /// Abstract types cannot be instantiated.
    #[serde(default)]
    pub is_abstract: bool,
    /// Locally declared properties.
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
    /// Mixins applied to the type.
    #[serde(default)]
    pub mixins: Vec<MixinApplication>,
    /// Mixins inherited from base types that this type suppresses.
    #[serde(default)]
    pub suppressed_mixins: Vec<String>,
}

impl EntityDescriptor {
    /// Create a descriptor for `type_name` with no table.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            base_type: None,
            class_id: None,
            entity_name: None,
            storage_provider: None,
            is_abstract: false,
            properties: Vec::new(),
            mixins: Vec::new(),
            suppressed_mixins: Vec::new(),
        }
    }

    /// Set the base type.
    pub fn with_base(mut self, base_type: impl Into<String>) -> Self {
        self.base_type = Some(base_type.into());
        self
    }

    /// Set an explicit class ID.
    pub fn with_class_id(mut self, class_id: impl Into<String>) -> Self {
        self.class_id = Some(class_id.into());
        self
    }

    /// Store the type in `entity_name`.
    pub fn with_table(mut self, entity_name: impl Into<String>) -> Self {
        self.entity_name = Some(entity_name.into());
        self
    }

    /// Set the storage provider.
    pub fn with_storage_provider(mut self, provider: impl Into<String>) -> Self {
        self.storage_provider = Some(provider.into());
        self
    }

    /// Mark the type abstract.
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Add a property.
    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    /// Apply a mixin.
    pub fn with_mixin(mut self, mixin: impl Into<MixinApplication>) -> Self {
        self.mixins.push(mixin.into());
        self
    }

    /// Suppress an inherited mixin.
    pub fn suppressing(mut self, mixin: impl Into<String>) -> Self {
        self.suppressed_mixins.push(mixin.into());
        self
    }

    /// The effective class ID.
    pub fn class_id(&self) -> &str {
        self.class_id.as_deref().unwrap_or(&self.type_name)
    }
}

/// Description of an extension (mixin) type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionDescriptor {
    /// Name of the mixin type.
    pub type_name: String,
    /// Base extension type.
    #[serde(default)]
    pub base_type: Option<String>,
    /// Capability flag: the mixin contributes persistent state.
    #[serde(default)]
    pub persistent: bool,
    /// Generic type parameters the mixin declares.
    #[serde(default)]
    pub generic_parameters: Vec<String>,
    /// Properties contributed to target classes.
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
}

impl ExtensionDescriptor {
    /// Create a non-persistent extension descriptor.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            base_type: None,
            persistent: false,
            generic_parameters: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Mark the mixin as contributing persistent state.
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    /// Set the base extension type.
    pub fn with_base(mut self, base_type: impl Into<String>) -> Self {
        self.base_type = Some(base_type.into());
        self
    }

    /// Declare a generic type parameter.
    pub fn with_generic_parameter(mut self, name: impl Into<String>) -> Self {
        self.generic_parameters.push(name.into());
        self
    }

    /// Add a contributed property.
    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }
}

/// A mixin applied to an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixinApplication {
    /// Name of the mixin type.
    pub mixin_type: String,
    /// Closed generic arguments.
    #[serde(default)]
    pub generic_arguments: Vec<String>,
}

impl MixinApplication {
    /// Apply `mixin_type` without generic arguments.
    pub fn new(mixin_type: impl Into<String>) -> Self {
        Self {
            mixin_type: mixin_type.into(),
            generic_arguments: Vec::new(),
        }
    }

    /// Close a generic parameter.
    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.generic_arguments.push(argument.into());
        self
    }

    /// Display name including generic arguments, e.g. `Audit<Order>`.
    pub fn display_name(&self, parameters: &[String]) -> String {
        if parameters.is_empty() {
            return self.mixin_type.clone();
        }
        let args: Vec<&str> = parameters
            .iter()
            .enumerate()
            .map(|(i, p)| self.generic_arguments.get(i).map(String::as_str).unwrap_or(p))
            .collect();
        format!("{}<{}>", self.mixin_type, args.join(", "))
    }
}

impl From<&str> for MixinApplication {
    fn from(mixin_type: &str) -> Self {
        MixinApplication::new(mixin_type)
    }
}

impl From<String> for MixinApplication {
    fn from(mixin_type: String) -> Self {
        MixinApplication::new(mixin_type)
    }
}

/// What a property holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    /// A scalar value.
    Scalar(ScalarType),
    /// A nullable scalar value.
    OptionalScalar(ScalarType),
    /// A reference to one or many related objects.
    Relation(RelationDescriptor),
}

/// Relation metadata of a relation-shaped property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    /// Type of the related object (element type for collections).
    pub target_type: String,
    /// Single object or collection.
    pub cardinality: Cardinality,
    /// Name of the opposite property on the target type.
    #[serde(default)]
    pub opposite_property: Option<String>,
    /// Whether this side holds the foreign key. Single-valued properties
    /// hold it unless stated otherwise; collections never do.
    #[serde(default)]
    pub contains_foreign_key: Option<bool>,
    /// Whether a related object must always be set.
    #[serde(default)]
    pub is_mandatory: bool,
    /// Sort expression for collections.
    #[serde(default)]
    pub sort_expression: Option<String>,
}

impl RelationDescriptor {
    /// Check if this side holds no column.
    pub fn is_virtual(&self) -> bool {
        self.cardinality == Cardinality::Many || !self.contains_foreign_key.unwrap_or(true)
    }
}

/// Description of one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Short property name; the builder qualifies it with the declaring type.
    pub name: String,
    /// Scalar type or relation metadata.
    pub kind: PropertyKind,
    /// Where the value lives.
    #[serde(default)]
    pub storage_class: StorageClass,
    /// Column override.
    #[serde(default)]
    pub column_name: Option<String>,
    /// Nullability override for reference types.
    #[serde(default)]
    pub is_nullable: Option<bool>,
    /// Maximum length of strings and byte arrays.
    #[serde(default)]
    pub max_length: Option<u32>,
}

impl PropertyDescriptor {
    fn with_kind(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            storage_class: StorageClass::Persistent,
            column_name: None,
            is_nullable: None,
            max_length: None,
        }
    }

    /// A scalar property.
    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::with_kind(name, PropertyKind::Scalar(ty))
    }

    /// A nullable scalar property.
    pub fn optional(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::with_kind(name, PropertyKind::OptionalScalar(ty))
    }

    /// A reference to a single related object.
    pub fn reference(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self::relation(name, target_type, Cardinality::One)
    }

    /// A collection of related objects.
    pub fn collection(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self::relation(name, target_type, Cardinality::Many)
    }

    fn relation(
        name: impl Into<String>,
        target_type: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self::with_kind(
            name,
            PropertyKind::Relation(RelationDescriptor {
                target_type: target_type.into(),
                cardinality,
                opposite_property: None,
                contains_foreign_key: None,
                is_mandatory: false,
                sort_expression: None,
            }),
        )
    }

    /// Name the opposite property of a relation.
    pub fn with_opposite(mut self, opposite: impl Into<String>) -> Self {
        if let PropertyKind::Relation(r) = &mut self.kind {
            r.opposite_property = Some(opposite.into());
        }
        self
    }

    /// Declare that a single-valued relation side holds no foreign key.
    pub fn without_foreign_key(mut self) -> Self {
        if let PropertyKind::Relation(r) = &mut self.kind {
            r.contains_foreign_key = Some(false);
        }
        self
    }

    /// Mark a relation mandatory.
    pub fn mandatory(mut self) -> Self {
        if let PropertyKind::Relation(r) = &mut self.kind {
            r.is_mandatory = true;
        }
        self
    }

    /// Attach a sort expression to a relation.
    pub fn with_sort_expression(mut self, expression: impl Into<String>) -> Self {
        if let PropertyKind::Relation(r) = &mut self.kind {
            r.sort_expression = Some(expression.into());
        }
        self
    }

    /// Override the column name.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column_name = Some(column.into());
        self
    }

    /// Override nullability.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = Some(nullable);
        self
    }

    /// Set the maximum length.
    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Set the storage class.
    pub fn with_storage_class(mut self, storage_class: StorageClass) -> Self {
        self.storage_class = storage_class;
        self
    }

    /// Relation metadata, if this is a relation property.
    pub fn relation_descriptor(&self) -> Option<&RelationDescriptor> {
        match &self.kind {
            PropertyKind::Relation(r) => Some(r),
            _ => None,
        }
    }

    /// Default column: the short name, suffixed with `ID` for foreign keys.
    pub fn effective_column_name(&self) -> String {
        match (&self.column_name, &self.kind) {
            (Some(column), _) => column.clone(),
            (None, PropertyKind::Relation(_)) => format!("{}ID", self.name),
            (None, _) => self.name.clone(),
        }
    }
}

/// Options of a mapping build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingOptions {
    /// Provider for descriptors that do not name one.
    pub default_storage_provider_id: String,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            default_storage_provider_id: DEFAULT_STORAGE_PROVIDER_ID.to_string(),
        }
    }
}

impl MappingOptions {
    /// Set the default storage provider.
    pub fn with_default_storage_provider(mut self, provider: impl Into<String>) -> Self {
        self.default_storage_provider_id = provider.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_from_json() {
        let json = r#"{
            "entities": [
                {
                    "type_name": "Order",
                    "entity_name": "Order",
                    "properties": [
                        { "name": "OrderNo", "kind": { "scalar": "Int32" } },
                        {
                            "name": "OrderItems",
                            "kind": { "relation": {
                                "target_type": "OrderItem",
                                "cardinality": "Many",
                                "opposite_property": "Order",
                                "sort_expression": "Position asc"
                            } }
                        }
                    ],
                    "mixins": [ { "mixin_type": "Audit" } ]
                }
            ],
            "extensions": [ { "type_name": "Audit", "persistent": true } ]
        }"#;

        let schema = MappingSchema::from_json(json).unwrap();
        let order = schema.entity("Order").unwrap();
        assert_eq!(order.class_id(), "Order");
        assert_eq!(order.properties.len(), 2);
        assert_eq!(order.properties[0].storage_class, StorageClass::Persistent);
        let items = order.properties[1].relation_descriptor().unwrap();
        assert!(items.is_virtual());
        assert_eq!(items.sort_expression.as_deref(), Some("Position asc"));
        assert!(schema.extension("Audit").unwrap().persistent);
    }

    #[test]
    fn test_invalid_json_is_a_schema_error() {
        let err = MappingSchema::from_json("{ \"entities\": 5 }").unwrap_err();
        assert!(matches!(err, MappingError::InvalidSchema(_)));
    }

    #[test]
    fn test_default_columns() {
        assert_eq!(
            PropertyDescriptor::scalar("OrderNo", ScalarType::Int32).effective_column_name(),
            "OrderNo"
        );
        assert_eq!(
            PropertyDescriptor::reference("Customer", "Customer").effective_column_name(),
            "CustomerID"
        );
        assert_eq!(
            PropertyDescriptor::reference("Customer", "Customer")
                .with_column("Buyer")
                .effective_column_name(),
            "Buyer"
        );
    }

    #[test]
    fn test_relation_virtuality() {
        let one = PropertyDescriptor::reference("Order", "Order");
        assert!(!one.relation_descriptor().unwrap().is_virtual());

        let one_virtual = PropertyDescriptor::reference("Ticket", "Ticket").without_foreign_key();
        assert!(one_virtual.relation_descriptor().unwrap().is_virtual());
    }

    #[test]
    fn test_mixin_display_name() {
        let app = MixinApplication::new("Audit").with_argument("Order");
        assert_eq!(app.display_name(&["T".to_string()]), "Audit<Order>");
        assert_eq!(MixinApplication::new("Audit").display_name(&["T".to_string()]), "Audit<T>");
        assert_eq!(MixinApplication::new("Audit").display_name(&[]), "Audit");
    }
}
