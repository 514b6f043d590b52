//! Object readers: turn result rows into data containers and identities.

mod container;
mod row;

pub use container::{DataContainerReader, ObjectIdReader, TimestampReader};
pub use row::Row;
