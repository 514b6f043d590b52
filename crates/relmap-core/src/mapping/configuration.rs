//! The immutable mapping configuration.

use std::collections::HashMap;
use std::sync::Arc;

use super::class::ClassDefinition;
use super::descriptor::MappingSchema;
use super::error::MappingError;
use super::mixin::PersistentMixinFinder;
use super::property::PropertyDefinition;
use super::relation::{RelationDefinition, RelationEndPointDefinition};
use crate::storage::EntityDefinition;

/// A validated mapping: every class, property and relation of a domain.
///
/// Built once by [`MappingBuilder`](super::MappingBuilder) and shared
/// read-only (typically as `Arc<MappingConfiguration>`) by the command
/// factory, the object readers and the providers.
#[derive(Debug, Clone, Default)]
pub struct MappingConfiguration {
    classes: HashMap<String, ClassDefinition>,
    class_order: Vec<String>,
    type_index: HashMap<String, String>,
    relations: HashMap<String, Arc<RelationDefinition>>,
    relation_order: Vec<String>,
    end_points: HashMap<(String, String), String>,
}

impl MappingConfiguration {
    /// Create an empty configuration.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_class(&mut self, class: ClassDefinition) -> Result<(), MappingError> {
        if let Some(existing) = self.classes.get(class.id()) {
            return Err(MappingError::DuplicateClassId {
                class_id: class.id().to_string(),
                first_type: existing.type_name().to_string(),
                second_type: class.type_name().to_string(),
            });
        }
        if let Some(base_id) = class.base_class_id() {
            if let Some(base) = self.classes.get_mut(base_id) {
                base.add_derived_class(class.id());
            }
        }
        self.type_index
            .insert(class.type_name().to_string(), class.id().to_string());
        self.class_order.push(class.id().to_string());
        self.classes.insert(class.id().to_string(), class);
        Ok(())
    }

    pub(crate) fn class_mut(
        &mut self,
        class_id: &str,
    ) -> Result<&mut ClassDefinition, MappingError> {
        self.classes
            .get_mut(class_id)
            .ok_or_else(|| MappingError::ClassNotFound {
                class_id: class_id.to_string(),
            })
    }

    /// Register `relation`, or return the instance already registered
    /// under its ID.
    pub(crate) fn get_or_insert_relation(
        &mut self,
        relation: RelationDefinition,
    ) -> Arc<RelationDefinition> {
        if let Some(existing) = self.relations.get(relation.id()) {
            return Arc::clone(existing);
        }
        for end_point in relation.end_points() {
            if let Some(property) = end_point.property_name() {
                self.end_points.insert(
                    (end_point.class_id().to_string(), property.to_string()),
                    relation.id().to_string(),
                );
            }
        }
        let id = relation.id().to_string();
        let relation = Arc::new(relation);
        self.relation_order.push(id.clone());
        self.relations.insert(id, Arc::clone(&relation));
        relation
    }

    /// Look up a class by ID.
    pub fn get_class(&self, class_id: &str) -> Result<&ClassDefinition, MappingError> {
        self.classes
            .get(class_id)
            .ok_or_else(|| MappingError::ClassNotFound {
                class_id: class_id.to_string(),
            })
    }

    /// Look up a class by ID without failing.
    pub fn find_class(&self, class_id: &str) -> Option<&ClassDefinition> {
        self.classes.get(class_id)
    }

    /// Look up a class by its type name.
    pub fn get_class_for_type(&self, type_name: &str) -> Result<&ClassDefinition, MappingError> {
        self.type_index
            .get(type_name)
            .and_then(|id| self.classes.get(id))
            .ok_or_else(|| MappingError::TypeNotFound {
                type_name: type_name.to_string(),
            })
    }

    /// All classes in declaration order (base classes before derived ones).
    pub fn classes(&self) -> impl Iterator<Item = &ClassDefinition> {
        self.class_order.iter().filter_map(|id| self.classes.get(id))
    }

    /// Number of classes.
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Base class of `class`.
    pub fn base_class(&self, class: &ClassDefinition) -> Option<&ClassDefinition> {
        class.base_class_id().and_then(|id| self.classes.get(id))
    }

    /// Ancestors of `class_id`, nearest first.
    pub fn ancestors(&self, class_id: &str) -> Vec<&ClassDefinition> {
        let mut result = Vec::new();
        let mut current = self.classes.get(class_id).and_then(|c| self.base_class(c));
        while let Some(class) = current {
            result.push(class);
            current = self.base_class(class);
        }
        result
    }

    /// The root of the inheritance hierarchy containing `class_id`.
    pub fn inheritance_root(&self, class_id: &str) -> Result<&ClassDefinition, MappingError> {
        let class = self.get_class(class_id)?;
        Ok(self.ancestors(class_id).pop().unwrap_or(class))
    }

    /// All descendants of `class_id`, breadth first.
    pub fn descendants(&self, class_id: &str) -> Vec<&ClassDefinition> {
        let mut result: Vec<&ClassDefinition> = Vec::new();
        let mut pending: Vec<&str> = match self.classes.get(class_id) {
            Some(class) => class.derived_class_ids().iter().map(String::as_str).collect(),
            None => return result,
        };
        while !pending.is_empty() {
            let mut next = Vec::new();
            for id in pending {
                if let Some(class) = self.classes.get(id) {
                    next.extend(class.derived_class_ids().iter().map(String::as_str));
                    result.push(class);
                }
            }
            pending = next;
        }
        result
    }

    /// Properties of `class_id` and its ancestors, root class first.
    pub fn all_properties(&self, class_id: &str) -> Result<Vec<&PropertyDefinition>, MappingError> {
        let class = self.get_class(class_id)?;
        let mut chain = self.ancestors(class_id);
        chain.reverse();
        chain.push(class);
        Ok(chain
            .into_iter()
            .flat_map(|c| c.my_properties().iter())
            .collect())
    }

    /// Persistent properties of `class_id` and its ancestors.
    pub fn persistent_properties(
        &self,
        class_id: &str,
    ) -> Result<Vec<&PropertyDefinition>, MappingError> {
        Ok(self
            .all_properties(class_id)?
            .into_iter()
            .filter(|p| p.is_persistent())
            .collect())
    }

    /// Properties of the whole hierarchy segment visible from `class_id`:
    /// its ancestors, itself and every descendant.
    pub fn hierarchy_properties(
        &self,
        class_id: &str,
    ) -> Result<Vec<&PropertyDefinition>, MappingError> {
        let mut properties = self.all_properties(class_id)?;
        properties.extend(
            self.descendants(class_id)
                .into_iter()
                .flat_map(|c| c.my_properties().iter()),
        );
        Ok(properties)
    }

    /// Look up a property declared by `class_id` or one of its ancestors.
    pub fn find_property(
        &self,
        class_id: &str,
        property_name: &str,
    ) -> Option<&PropertyDefinition> {
        let class = self.classes.get(class_id)?;
        std::iter::once(class)
            .chain(self.ancestors(class_id))
            .find_map(|c| c.my_property(property_name))
    }

    /// Like [`find_property`](Self::find_property), failing when absent.
    pub fn get_property(
        &self,
        class_id: &str,
        property_name: &str,
    ) -> Result<&PropertyDefinition, MappingError> {
        self.get_class(class_id)?;
        self.find_property(class_id, property_name)
            .ok_or_else(|| MappingError::PropertyNotFound {
                class_id: class_id.to_string(),
                property: property_name.to_string(),
            })
    }

    /// All relations in registration order.
    pub fn relations(&self) -> impl Iterator<Item = &Arc<RelationDefinition>> {
        self.relation_order.iter().filter_map(|id| self.relations.get(id))
    }

    /// Number of distinct relations.
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Look up a relation by ID.
    pub fn get_relation(&self, relation_id: &str) -> Option<&Arc<RelationDefinition>> {
        self.relations.get(relation_id)
    }

    /// Relation whose end point is `class_id.property_name`, searching the
    /// class and its ancestors.
    pub fn relation_for(
        &self,
        class_id: &str,
        property_name: &str,
    ) -> Option<&Arc<RelationDefinition>> {
        let class = self.classes.get(class_id)?;
        std::iter::once(class)
            .chain(self.ancestors(class_id))
            .find_map(|c| {
                self.end_points
                    .get(&(c.id().to_string(), property_name.to_string()))
                    .and_then(|id| self.relations.get(id))
            })
    }

    /// End point declared by `class_id.property_name` (or an ancestor).
    pub fn relation_end_point(
        &self,
        class_id: &str,
        property_name: &str,
    ) -> Option<&RelationEndPointDefinition> {
        let relation = self.relation_for(class_id, property_name)?;
        relation
            .end_points()
            .iter()
            .find(|ep| ep.property_name() == Some(property_name))
    }

    /// End point opposite to `class_id.property_name`.
    pub fn opposite_end_point(
        &self,
        class_id: &str,
        property_name: &str,
    ) -> Option<&RelationEndPointDefinition> {
        let relation = self.relation_for(class_id, property_name)?;
        let end_point = self.relation_end_point(class_id, property_name)?;
        relation.opposite_end_point(end_point)
    }

    /// Class on the other side of `class_id.property_name`.
    pub fn opposite_class(&self, class_id: &str, property_name: &str) -> Option<&ClassDefinition> {
        let opposite = self.opposite_end_point(class_id, property_name)?;
        self.classes.get(opposite.class_id())
    }

    /// Check if the relation property `class_id.property_name` stores the
    /// referenced class ID in a companion column, which is the case when the
    /// opposite class takes part in an inheritance hierarchy.
    pub fn has_class_id_column(&self, class_id: &str, property_name: &str) -> bool {
        self.opposite_class(class_id, property_name)
            .is_some_and(ClassDefinition::is_part_of_inheritance_hierarchy)
    }

    /// Storage entity of `class_id`.
    pub fn storage_entity(&self, class_id: &str) -> Result<&EntityDefinition, MappingError> {
        self.get_class(class_id)?.storage_entity()
    }

    /// Compare the persistent mixins recorded at build time with those
    /// `current` applies, for every class and its ancestors.
    pub fn validate_mixin_configuration(
        &self,
        current: &MappingSchema,
    ) -> Result<(), MappingError> {
        for class in self.classes() {
            self.validate_class_mixins(class.id(), current)?;
        }
        Ok(())
    }

    /// Compare the recorded and current persistent mixins of `class_id` and
    /// its ancestors.
    pub fn validate_class_mixins(
        &self,
        class_id: &str,
        current: &MappingSchema,
    ) -> Result<(), MappingError> {
        let class = self.get_class(class_id)?;
        let finder = PersistentMixinFinder::new(current);

        for c in std::iter::once(class).chain(self.ancestors(class_id)) {
            let now: Vec<String> = match current.entity(c.type_name()) {
                Some(entity) => finder
                    .find_introduced(entity)?
                    .into_iter()
                    .map(|m| m.name)
                    .collect(),
                None => Vec::new(),
            };
            let recorded = c.persistent_mixins();

            let removed: Vec<&str> = recorded
                .iter()
                .filter(|m| !now.contains(m))
                .map(String::as_str)
                .collect();
            if !removed.is_empty() {
                return Err(MappingError::MixinsRemoved {
                    type_name: c.type_name().to_string(),
                    mixins: removed.join(", "),
                });
            }

            let added: Vec<&str> = now
                .iter()
                .filter(|m| !recorded.contains(m))
                .map(String::as_str)
                .collect();
            if !added.is_empty() {
                return Err(MappingError::MixinsAdded {
                    type_name: c.type_name().to_string(),
                    mixins: added.join(", "),
                });
            }
        }
        Ok(())
    }
}
