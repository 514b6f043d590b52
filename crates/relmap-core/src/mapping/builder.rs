//! Builds a [`MappingConfiguration`] from a [`MappingSchema`].
//!
//! The build runs in fixed stages and aborts on the first violation:
//!
//! 1. order the entity types so that base types come first;
//! 2. create class definitions, collecting persistent mixins and properties;
//! 3. reflect every relation-shaped property into a shared relation;
//! 4. validate tables and columns;
//! 5. assign storage entities.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::class::ClassDefinition;
use super::configuration::MappingConfiguration;
use super::descriptor::{
    EntityDescriptor, MappingOptions, MappingSchema, PropertyDescriptor, PropertyKind,
    RelationDescriptor,
};
use super::error::MappingError;
use super::mixin::PersistentMixinFinder;
use super::property::PropertyDefinition;
use super::relation::{
    AnonymousEndPoint, Cardinality, RealEndPoint, RelationDefinition, RelationEndPointDefinition,
    VirtualEndPoint,
};
use super::sort::SortExpressionDefinition;
use super::types::PropertyType;
use super::validator;
use crate::storage::assign_storage_entities;

/// Builds and validates mappings.
#[derive(Debug, Clone)]
pub struct MappingBuilder {
    schema: MappingSchema,
    options: MappingOptions,
}

impl MappingBuilder {
    /// Create a builder with default options.
    pub fn new(schema: MappingSchema) -> Self {
        Self {
            schema,
            options: MappingOptions::default(),
        }
    }

    /// Replace the options.
    pub fn with_options(mut self, options: MappingOptions) -> Self {
        self.options = options;
        self
    }

    /// The schema being mapped.
    pub fn schema(&self) -> &MappingSchema {
        &self.schema
    }

    /// Build the mapping.
    #[instrument(skip(self), fields(entities = self.schema.entities.len()))]
    pub fn build(&self) -> Result<MappingConfiguration, MappingError> {
        let ordered = self.inheritance_order()?;
        let finder = PersistentMixinFinder::new(&self.schema);

        let mut config = MappingConfiguration::new();
        for entity in &ordered {
            let class = self.create_class(entity, &config, &finder)?;
            debug!(
                class_id = class.id(),
                properties = class.my_properties().len(),
                mixins = class.persistent_mixins().len(),
                "class defined"
            );
            config.insert_class(class)?;
        }

        let reflector = RelationReflector::new(&ordered, &finder)?;
        for property in reflector.properties() {
            reflector.reflect(property, &mut config)?;
        }

        validator::validate(&config)?;
        assign_storage_entities(&mut config)?;

        info!(
            classes = config.class_count(),
            relations = config.relation_count(),
            "mapping built"
        );
        Ok(config)
    }

    /// Entity descriptors with every base type ahead of its derived types.
    fn inheritance_order(&self) -> Result<Vec<&EntityDescriptor>, MappingError> {
        let mut ordered = Vec::with_capacity(self.schema.entities.len());
        let mut placed: HashSet<&str> = HashSet::new();

        for entity in &self.schema.entities {
            let mut chain = Vec::new();
            let mut on_chain = HashSet::new();
            let mut current = entity;
            loop {
                if placed.contains(current.type_name.as_str()) {
                    break;
                }
                if !on_chain.insert(current.type_name.as_str()) {
                    return Err(MappingError::InheritanceCycle {
                        type_name: current.type_name.clone(),
                    });
                }
                chain.push(current);
                let Some(base_type) = current.base_type.as_deref() else {
                    break;
                };
                current = self
                    .schema
                    .entity(base_type)
                    .ok_or_else(|| MappingError::UnknownBaseType {
                        type_name: current.type_name.clone(),
                        base_type: base_type.to_string(),
                    })?;
            }
            for descriptor in chain.into_iter().rev() {
                placed.insert(descriptor.type_name.as_str());
                ordered.push(descriptor);
            }
        }
        Ok(ordered)
    }

    fn create_class(
        &self,
        entity: &EntityDescriptor,
        config: &MappingConfiguration,
        finder: &PersistentMixinFinder<'_>,
    ) -> Result<ClassDefinition, MappingError> {
        let provider = entity
            .storage_provider
            .clone()
            .unwrap_or_else(|| self.options.default_storage_provider_id.clone());
        let mut class = ClassDefinition::new(
            entity.class_id(),
            entity.type_name.as_str(),
            entity.entity_name.clone(),
            provider,
            entity.is_abstract,
        );

        let base = match entity.base_type.as_deref() {
            Some(base_type) => {
                let base = config.get_class_for_type(base_type)?;
                class = class.with_base_class(base, base_type)?;
                Some(base)
            }
            None => None,
        };

        let mixins = finder.find_introduced(entity)?;
        class.set_persistent_mixins(mixins.iter().map(|m| m.name.clone()).collect());

        let own = entity.properties.iter().map(|p| (entity.type_name.as_str(), p));
        let contributed = mixins
            .iter()
            .flat_map(|m| finder.contributed_properties(m.extension));
        for (declaring_type, descriptor) in own.chain(contributed) {
            let Some(property) = property_definition(class.id(), declaring_type, descriptor)? else {
                continue;
            };
            if let Some(base) = base {
                let ancestor = std::iter::once(base)
                    .chain(config.ancestors(base.id()))
                    .find(|a| a.my_property(property.name()).is_some());
                if let Some(ancestor) = ancestor {
                    return Err(MappingError::PropertyDefinedByAncestor {
                        class_id: class.id().to_string(),
                        property: property.name().to_string(),
                        ancestor_id: ancestor.id().to_string(),
                    });
                }
            }
            class.add_property(property)?;
        }
        Ok(class)
    }
}

/// Property definition for a descriptor; virtual relation sides have none.
fn property_definition(
    class_id: &str,
    declaring_type: &str,
    descriptor: &PropertyDescriptor,
) -> Result<Option<PropertyDefinition>, MappingError> {
    let (property_type, is_nullable) = match &descriptor.kind {
        PropertyKind::Scalar(ty) => (PropertyType::Scalar(*ty), descriptor.is_nullable),
        PropertyKind::OptionalScalar(ty) => {
            (PropertyType::OptionalScalar(*ty), descriptor.is_nullable)
        }
        PropertyKind::Relation(relation) if relation.is_virtual() => return Ok(None),
        PropertyKind::Relation(relation) => (
            PropertyType::ObjectId,
            descriptor
                .is_nullable
                .or_else(|| relation.is_mandatory.then_some(false)),
        ),
    };
    PropertyDefinition::new(
        class_id,
        format!("{declaring_type}.{}", descriptor.name),
        descriptor.effective_column_name(),
        property_type,
        is_nullable,
        descriptor.max_length,
        descriptor.storage_class,
    )
    .map(Some)
}

/// A relation-shaped property of one class.
#[derive(Debug, Clone)]
pub(crate) struct RelationProperty<'s> {
    class_id: String,
    type_name: String,
    declaring_type: &'s str,
    descriptor: &'s PropertyDescriptor,
    relation: &'s RelationDescriptor,
    from_mixin: bool,
}

impl RelationProperty<'_> {
    fn property_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.descriptor.name)
    }

    fn relation_id(&self) -> String {
        if self.from_mixin {
            format!("{}->{}", self.type_name, self.property_name())
        } else {
            self.property_name()
        }
    }
}

/// Turns relation-shaped properties into shared relation definitions.
pub(crate) struct RelationReflector<'s> {
    properties: Vec<RelationProperty<'s>>,
    by_class: HashMap<String, Vec<usize>>,
}

impl<'s> RelationReflector<'s> {
    pub(crate) fn new(
        ordered: &[&'s EntityDescriptor],
        finder: &PersistentMixinFinder<'s>,
    ) -> Result<Self, MappingError> {
        let mut properties = Vec::new();
        let mut by_class: HashMap<String, Vec<usize>> = HashMap::new();

        for &entity in ordered {
            let class_id = entity.class_id().to_string();
            let own = entity
                .properties
                .iter()
                .map(|p| (entity.type_name.as_str(), p, false));
            let mixins = finder.find_introduced(entity)?;
            let contributed = mixins
                .iter()
                .flat_map(|m| finder.contributed_properties(m.extension))
                .map(|(t, p)| (t, p, true));

            for (declaring_type, descriptor, from_mixin) in own.chain(contributed) {
                if let PropertyKind::Relation(relation) = &descriptor.kind {
                    by_class.entry(class_id.clone()).or_default().push(properties.len());
                    properties.push(RelationProperty {
                        class_id: class_id.clone(),
                        type_name: entity.type_name.clone(),
                        declaring_type,
                        descriptor,
                        relation,
                        from_mixin,
                    });
                }
            }
        }
        Ok(Self { properties, by_class })
    }

    pub(crate) fn properties(&self) -> &[RelationProperty<'s>] {
        &self.properties
    }

    /// Reflect one property; returns the relation shared by both sides.
    pub(crate) fn reflect(
        &self,
        property: &RelationProperty<'s>,
        config: &mut MappingConfiguration,
    ) -> Result<Arc<RelationDefinition>, MappingError> {
        let relation = property.relation;
        let target = config
            .get_class_for_type(&relation.target_type)
            .map_err(|_| MappingError::RelationTargetNotMapped {
                class_id: property.class_id.clone(),
                property: property.property_name(),
                target: relation.target_type.clone(),
            })?;
        let target_id = target.id().to_string();

        let Some(opposite_name) = relation.opposite_property.as_deref() else {
            return self.reflect_unidirectional(property, target_id, config);
        };

        let opposite = self
            .find_opposite(config, &target_id, opposite_name)
            .ok_or_else(|| MappingError::OppositePropertyNotFound {
                property: property.property_name(),
                type_name: property.type_name.clone(),
                opposite_property: opposite_name.to_string(),
                opposite_type: relation.target_type.clone(),
            })?;

        let points_back = opposite.relation.opposite_property.as_deref()
            == Some(property.descriptor.name.as_str());
        if !points_back {
            return Err(MappingError::OppositePropertyMismatch {
                property: property.property_name(),
                type_name: property.type_name.clone(),
                opposite_property: opposite.property_name(),
                opposite_type: opposite.type_name.clone(),
            });
        }
        if opposite.relation.target_type != property.type_name {
            return Err(MappingError::OppositeTypeMismatch {
                property: property.property_name(),
                type_name: property.type_name.clone(),
                referenced_type: opposite.relation.target_type.clone(),
                opposite_property: opposite.property_name(),
                opposite_type: opposite.type_name.clone(),
            });
        }

        let (real, virtual_side) = match (relation.is_virtual(), opposite.relation.is_virtual()) {
            (true, true) => {
                return Err(MappingError::TwoVirtualEndPoints {
                    relation_id: property.relation_id(),
                })
            }
            (false, false) => {
                return Err(MappingError::TwoNonVirtualEndPoints {
                    relation_id: property.relation_id(),
                })
            }
            (false, true) => (property, opposite),
            (true, false) => (opposite, property),
        };

        let relation_id = real.relation_id();
        if let Some(existing) = config.get_relation(&relation_id) {
            return Ok(Arc::clone(existing));
        }

        if real.relation.sort_expression.is_some() {
            return Err(MappingError::SortExpressionOnRealEndPoint {
                class_id: real.class_id.clone(),
                property: real.property_name(),
            });
        }
        let sort_expression = match virtual_side.relation.sort_expression.as_deref() {
            Some(_) if virtual_side.relation.cardinality == Cardinality::One => {
                return Err(MappingError::SortExpressionOnSingleEndPoint {
                    class_id: virtual_side.class_id.clone(),
                    property: virtual_side.property_name(),
                });
            }
            Some(text) => {
                let visible = config.all_properties(&real.class_id)?;
                let hierarchy = config.hierarchy_properties(&real.class_id)?;
                Some(SortExpressionDefinition::parse(text, &real.class_id, &visible, &hierarchy)?)
            }
            None => None,
        };

        let definition = RelationDefinition::new(
            relation_id,
            RelationEndPointDefinition::Real(RealEndPoint {
                class_id: real.class_id.clone(),
                property_name: real.property_name(),
                is_mandatory: real.relation.is_mandatory,
            }),
            RelationEndPointDefinition::Virtual(VirtualEndPoint {
                class_id: virtual_side.class_id.clone(),
                property_name: virtual_side.property_name(),
                is_mandatory: virtual_side.relation.is_mandatory,
                cardinality: virtual_side.relation.cardinality,
                sort_expression_text: virtual_side.relation.sort_expression.clone(),
                sort_expression,
            }),
        );
        self.register(definition, config)
    }

    fn reflect_unidirectional(
        &self,
        property: &RelationProperty<'s>,
        target_id: String,
        config: &mut MappingConfiguration,
    ) -> Result<Arc<RelationDefinition>, MappingError> {
        let relation = property.relation;
        if relation.cardinality == Cardinality::Many {
            return Err(MappingError::CollectionWithoutOpposite {
                class_id: property.class_id.clone(),
                property: property.property_name(),
            });
        }
        if relation.is_virtual() {
            return Err(MappingError::TwoVirtualEndPoints {
                relation_id: property.relation_id(),
            });
        }
        if relation.sort_expression.is_some() {
            return Err(MappingError::SortExpressionOnRealEndPoint {
                class_id: property.class_id.clone(),
                property: property.property_name(),
            });
        }

        let relation_id = property.relation_id();
        if let Some(existing) = config.get_relation(&relation_id) {
            return Ok(Arc::clone(existing));
        }
        let definition = RelationDefinition::new(
            relation_id,
            RelationEndPointDefinition::Real(RealEndPoint {
                class_id: property.class_id.clone(),
                property_name: property.property_name(),
                is_mandatory: relation.is_mandatory,
            }),
            RelationEndPointDefinition::Anonymous(AnonymousEndPoint { class_id: target_id }),
        );
        self.register(definition, config)
    }

    fn register(
        &self,
        definition: RelationDefinition,
        config: &mut MappingConfiguration,
    ) -> Result<Arc<RelationDefinition>, MappingError> {
        let relation = config.get_or_insert_relation(definition);
        for end_point in relation.end_points() {
            if end_point.property_name().is_some() {
                config.class_mut(end_point.class_id())?.register_relation(relation.id());
            }
        }
        debug!(relation_id = relation.id(), kind = ?relation.kind(), "relation reflected");
        Ok(relation)
    }

    /// Find the relation property `name` on `class_id` or its ancestors.
    fn find_opposite(
        &self,
        config: &MappingConfiguration,
        class_id: &str,
        name: &str,
    ) -> Option<&RelationProperty<'s>> {
        let class = config.find_class(class_id)?;
        std::iter::once(class)
            .chain(config.ancestors(class_id))
            .find_map(|c| {
                self.by_class.get(c.id()).and_then(|indices| {
                    indices
                        .iter()
                        .map(|&i| &self.properties[i])
                        .find(|p| p.descriptor.name == name)
                })
            })
    }
}
