//! Class definitions.

use super::error::MappingError;
use super::property::PropertyDefinition;
use crate::storage::EntityDefinition;

/// Metadata of one mapped entity type.
///
/// Ancestor and descendant navigation goes through
/// [`MappingConfiguration`](super::MappingConfiguration), which owns every
/// class of a mapping.
#[derive(Debug, Clone)]
pub struct ClassDefinition {
    id: String,
    type_name: String,
    entity_name: Option<String>,
    storage_provider_id: String,
    is_abstract: bool,
    base_class_id: Option<String>,
    derived_class_ids: Vec<String>,
    my_properties: Vec<PropertyDefinition>,
    persistent_mixins: Vec<String>,
    relation_ids: Vec<String>,
    storage_entity: Option<EntityDefinition>,
}

impl ClassDefinition {
    /// Create a class definition without base class.
    pub fn new(
        id: impl Into<String>,
        type_name: impl Into<String>,
        entity_name: Option<String>,
        storage_provider_id: impl Into<String>,
        is_abstract: bool,
    ) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            entity_name,
            storage_provider_id: storage_provider_id.into(),
            is_abstract,
            base_class_id: None,
            derived_class_ids: Vec::new(),
            my_properties: Vec::new(),
            persistent_mixins: Vec::new(),
            relation_ids: Vec::new(),
            storage_entity: None,
        }
    }

    /// Derive this class from `base`.
    ///
    /// `declared_base_type` is the base type named by this class's
    /// declaration; it must be the type of `base`.
    pub fn with_base_class(
        mut self,
        base: &ClassDefinition,
        declared_base_type: &str,
    ) -> Result<Self, MappingError> {
        if base.type_name != declared_base_type {
            return Err(MappingError::TypeNotAssignable {
                class_id: self.id,
                type_name: self.type_name,
                base_class_id: base.id.clone(),
                base_type_name: base.type_name.clone(),
            });
        }
        if base.storage_provider_id != self.storage_provider_id {
            return Err(MappingError::StorageProviderMismatch {
                class_id: self.id,
                base_class_id: base.id.clone(),
            });
        }
        self.base_class_id = Some(base.id.clone());
        Ok(self)
    }

    /// Add a locally declared property.
    pub fn add_property(&mut self, property: PropertyDefinition) -> Result<(), MappingError> {
        if property.class_id() != self.id {
            return Err(MappingError::PropertyOwnedByOtherClass {
                property: property.name().to_string(),
                class_id: self.id.clone(),
                owner_id: property.class_id().to_string(),
            });
        }
        if self.my_property(property.name()).is_some() {
            return Err(MappingError::DuplicateProperty {
                class_id: self.id.clone(),
                property: property.name().to_string(),
            });
        }
        self.my_properties.push(property);
        Ok(())
    }

    /// Stable class ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the declared entity type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Table name declared by this class itself.
    pub fn entity_name(&self) -> Option<&str> {
        self.entity_name.as_deref()
    }

    /// Storage provider handling the class.
    pub fn storage_provider_id(&self) -> &str {
        &self.storage_provider_id
    }

    /// Check if the class cannot have instances.
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// ID of the base class.
    pub fn base_class_id(&self) -> Option<&str> {
        self.base_class_id.as_deref()
    }

    /// IDs of the directly derived classes.
    pub fn derived_class_ids(&self) -> &[String] {
        &self.derived_class_ids
    }

    /// Check if the class has a base class or derived classes.
    pub fn is_part_of_inheritance_hierarchy(&self) -> bool {
        self.base_class_id.is_some() || !self.derived_class_ids.is_empty()
    }

    /// Locally declared properties in declaration order.
    pub fn my_properties(&self) -> &[PropertyDefinition] {
        &self.my_properties
    }

    /// Look up a locally declared property.
    pub fn my_property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.my_properties.iter().find(|p| p.name() == name)
    }

    /// Persistence-relevant mixins introduced by this class.
    pub fn persistent_mixins(&self) -> &[String] {
        &self.persistent_mixins
    }

    /// IDs of relations declared on this class.
    pub fn relation_ids(&self) -> &[String] {
        &self.relation_ids
    }

    /// Storage entity assigned after validation.
    pub fn storage_entity(&self) -> Result<&EntityDefinition, MappingError> {
        self.storage_entity
            .as_ref()
            .ok_or_else(|| MappingError::StorageEntityNotAssigned {
                class_id: self.id.clone(),
            })
    }

    pub(crate) fn add_derived_class(&mut self, class_id: &str) {
        if !self.derived_class_ids.iter().any(|id| id == class_id) {
            self.derived_class_ids.push(class_id.to_string());
        }
    }

    pub(crate) fn set_persistent_mixins(&mut self, mixins: Vec<String>) {
        self.persistent_mixins = mixins;
    }

    /// Register a relation once; returns `false` if it was already known.
    pub(crate) fn register_relation(&mut self, relation_id: &str) -> bool {
        if self.relation_ids.iter().any(|id| id == relation_id) {
            return false;
        }
        self.relation_ids.push(relation_id.to_string());
        true
    }

    pub(crate) fn set_storage_entity(&mut self, entity: EntityDefinition) {
        self.storage_entity = Some(entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{PropertyType, ScalarType, StorageClass};

    fn order_no(class_id: &str) -> PropertyDefinition {
        PropertyDefinition::new(
            class_id,
            "Order.OrderNo",
            "OrderNo",
            PropertyType::scalar(ScalarType::Int32),
            None,
            None,
            StorageClass::Persistent,
        )
        .unwrap()
    }

    #[test]
    fn test_property_ownership_is_exclusive() {
        let mut order = ClassDefinition::new("Order", "Order", Some("Order".into()), "Sql", false);
        let mut customer =
            ClassDefinition::new("Customer", "Customer", Some("Customer".into()), "Sql", false);

        order.add_property(order_no("Order")).unwrap();
        let err = customer.add_property(order_no("Order")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Property 'Order.OrderNo' cannot be added to class 'Customer', because it was \
             initialized for class 'Order'."
        );
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let mut order = ClassDefinition::new("Order", "Order", Some("Order".into()), "Sql", false);
        order.add_property(order_no("Order")).unwrap();
        let err = order.add_property(order_no("Order")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Class 'Order' defines property 'Order.OrderNo' more than once."
        );
    }

    #[test]
    fn test_base_class_checks() {
        let base = ClassDefinition::new("Company", "Company", Some("Company".into()), "Sql", false);

        let derived = ClassDefinition::new("Customer", "Customer", None, "Sql", false)
            .with_base_class(&base, "Company")
            .unwrap();
        assert_eq!(derived.base_class_id(), Some("Company"));
        assert!(derived.is_part_of_inheritance_hierarchy());

        let err = ClassDefinition::new("Customer", "Customer", None, "Other", false)
            .with_base_class(&base, "Company")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot derive class 'Customer' from base class 'Company' handled by different \
             storage providers."
        );

        let err = ClassDefinition::new("Customer", "Customer", None, "Sql", false)
            .with_base_class(&base, "Partner")
            .unwrap_err();
        assert!(matches!(err, MappingError::TypeNotAssignable { .. }));
    }
}
