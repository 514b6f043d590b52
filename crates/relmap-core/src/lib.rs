//! relmap core - metadata model, command generation and relational storage.
//!
//! This crate maps typed domain entities onto relational tables: it builds
//! and validates the mapping, generates parameterized SQL, reads result rows
//! into data containers and saves them with optimistic concurrency.

pub mod command;
pub mod data;
pub mod error;
pub mod mapping;
pub mod provider;
pub mod reader;
pub mod sql;
pub mod storage;

pub use command::{
    Command, CommandExecutionContext, CommandFactory, ObjectLookupResult, StorageCommand,
};
pub use data::{DataContainer, PropertyValue, Query, QueryParameterType, QueryType, StateType};
pub use error::{Error, Result};
pub use mapping::{
    ClassDefinition, EntityDescriptor, ExtensionDescriptor, MappingBuilder, MappingConfiguration,
    MappingError, MappingOptions, MappingSchema, PropertyDefinition, PropertyDescriptor,
    RelationDefinition, RelationEndPointDefinition,
};
pub use provider::{
    ConnectionTarget, ProviderConfig, ProviderState, RdbmsProvider, SqliteConnection,
};
pub use reader::{DataContainerReader, Row};
pub use sql::{DialectKind, SqlDialect, SqlServerDialect, SqliteDialect};
pub use storage::EntityDefinition;

/// Re-export protocol types.
pub use relmap_proto as proto;
pub use relmap_proto::{ObjectId, Timestamp, Value};
