//! Object identities and optimistic-concurrency timestamps.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Identity of one persisted domain object.
///
/// An object ID names the storage provider holding the row, the class ID of
/// the concrete mapped class and the identity value stored in the `ID`
/// column. IDs are immutable and compare by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    storage_provider_id: Arc<str>,
    class_id: Arc<str>,
    value: Uuid,
}

impl ObjectId {
    /// Create an object ID from its parts.
    pub fn new(
        storage_provider_id: impl Into<Arc<str>>,
        class_id: impl Into<Arc<str>>,
        value: Uuid,
    ) -> Self {
        Self {
            storage_provider_id: storage_provider_id.into(),
            class_id: class_id.into(),
            value,
        }
    }

    /// Allocate a fresh random identity for the given class.
    pub fn generate(
        storage_provider_id: impl Into<Arc<str>>,
        class_id: impl Into<Arc<str>>,
    ) -> Self {
        Self::new(storage_provider_id, class_id, Uuid::new_v4())
    }

    /// Parse the `ClassID|value` form produced by [`fmt::Display`].
    pub fn parse(storage_provider_id: impl Into<Arc<str>>, text: &str) -> Result<Self, Error> {
        let (class_id, value) = text.split_once('|').ok_or_else(|| Error::InvalidObjectId {
            text: text.to_string(),
            reason: "expected 'ClassID|value'".to_string(),
        })?;
        if class_id.is_empty() {
            return Err(Error::InvalidObjectId {
                text: text.to_string(),
                reason: "class id is empty".to_string(),
            });
        }
        let value = Uuid::parse_str(value).map_err(|e| Error::InvalidObjectId {
            text: text.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(storage_provider_id, class_id, value))
    }

    /// The storage provider holding the object.
    pub fn storage_provider_id(&self) -> &str {
        &self.storage_provider_id
    }

    /// The ID of the object's concrete class.
    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    /// The identity value stored in the `ID` column.
    pub fn value(&self) -> Uuid {
        self.value
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.class_id, self.value)
    }
}

/// Row version used for optimistic concurrency checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Version assigned to freshly inserted rows.
    pub const INITIAL: Timestamp = Timestamp(1);

    /// The raw row version.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
