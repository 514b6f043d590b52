//! Metadata model and mapping builder.
//!
//! The mapping describes classes, their properties and the relations between
//! them. It is derived from a declarative [`MappingSchema`] by the
//! [`MappingBuilder`], validated once and then shared read-only.

mod builder;
mod class;
mod configuration;
mod descriptor;
mod error;
mod mixin;
mod property;
mod relation;
mod sort;
mod types;
mod validator;

pub use builder::MappingBuilder;
pub use class::ClassDefinition;
pub use configuration::MappingConfiguration;
pub use descriptor::{
    EntityDescriptor, ExtensionDescriptor, MappingOptions, MappingSchema, MixinApplication,
    PropertyDescriptor, PropertyKind, RelationDescriptor, DEFAULT_STORAGE_PROVIDER_ID,
};
pub use error::MappingError;
pub use mixin::{PersistentMixin, PersistentMixinFinder};
pub use property::PropertyDefinition;
pub use relation::{
    AnonymousEndPoint, Cardinality, RealEndPoint, RelationDefinition, RelationEndPointDefinition,
    RelationKind, VirtualEndPoint,
};
pub use sort::{OrderDirection, SortExpressionDefinition, SortedProperty};
pub use types::{PropertyType, ScalarType, StorageClass};
