//! Storage entity model.
//!
//! Every class is backed by exactly one [`EntityDefinition`]:
//!
//! - a class naming an entity owns a [`TableDefinition`];
//! - a class below such a class shares it through a [`FilterViewDefinition`];
//! - a class above the tables of its descendants is a [`UnionViewDefinition`];
//! - anything else is a [`NullEntityDefinition`].

mod assigner;
mod entity;

pub(crate) use assigner::{assign_storage_entities, claim_column, table_owner};
pub use entity::{
    ColumnDefinition, ColumnKind, EntityDefinition, FilterViewDefinition, NullEntityDefinition,
    TableDefinition, UnionViewDefinition, CLASS_ID_COLUMN, ID_COLUMN, TIMESTAMP_COLUMN,
};
