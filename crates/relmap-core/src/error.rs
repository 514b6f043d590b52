//! Error types for relmap-core.

use thiserror::Error;

use crate::mapping::MappingError;

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the command factory, the object readers and the providers.
#[derive(Debug, Error)]
pub enum Error {
    /// The mapping is invalid or does not describe a requested element.
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// An object identity could not be parsed.
    #[error(transparent)]
    Identity(#[from] relmap_proto::Error),

    /// A row does not have the layout the mapping predicts.
    #[error(
        "Incorrect database format encountered. Entity: '{entity}', column: '{column}': {message}"
    )]
    StorageFormat {
        /// The entity being read.
        entity: String,
        /// The offending column.
        column: String,
        /// What is wrong.
        message: String,
    },

    /// An update or delete affected no row.
    #[error(
        "Concurrency violation encountered. Object '{object_id}' has already been changed by \
         someone else."
    )]
    ConcurrencyViolation {
        /// The conflicting object.
        object_id: String,
    },

    /// The same object was returned more than once by one query.
    #[error(
        "A database query returned duplicates of the domain object '{object_id}', which is not \
         supported."
    )]
    DuplicateObject {
        /// The duplicated object.
        object_id: String,
    },

    /// A lookup that does not allow missing objects found none.
    #[error("Object(s) could not be found: {object_ids}.")]
    ObjectsNotFound {
        /// The missing objects, comma separated.
        object_ids: String,
    },

    /// A row carried a NULL identity where none is allowed.
    #[error("A database query returned a NULL ID for entity '{entity}', which is not supported.")]
    NullObjectId {
        /// The entity being read.
        entity: String,
    },

    /// A value does not fit the declared property type.
    #[error(
        "Property '{property}' of type '{expected}' cannot be set to a value of type '{actual}'."
    )]
    InvalidValue {
        /// The property.
        property: String,
        /// The declared type.
        expected: String,
        /// The type of the supplied value.
        actual: String,
    },

    /// The API was used in a way that is not allowed.
    #[error("{0}")]
    Usage(String),

    /// An internal consistency check failed.
    #[error("internal error: {0}")]
    Internal(String),

    /// A command failed in the database driver.
    #[error("Error while executing SQL command '{command}': {source}")]
    Command {
        /// Text of the failing command.
        command: String,
        /// The driver error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Opening or configuring a connection failed.
    #[error("connection error: {0}")]
    Connection(String),
}

impl Error {
    /// Create a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Error::Usage(message.into())
    }

    /// Create an internal consistency error.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }

    /// Create a storage format error.
    pub fn storage_format(
        entity: impl Into<String>,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::StorageFormat {
            entity: entity.into(),
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is an optimistic-concurrency violation.
    pub fn is_concurrency_violation(&self) -> bool {
        matches!(self, Error::ConcurrencyViolation { .. })
    }
}
