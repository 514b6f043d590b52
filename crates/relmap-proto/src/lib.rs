//! relmap protocol types.
//!
//! Identity and value types shared by the metadata model, the command
//! factory, the object readers and the storage providers.
//!
//! # Modules
//!
//! - [`id`] - Object identities and optimistic-concurrency timestamps
//! - [`value`] - Runtime property values
//! - [`error`] - Parsing errors

pub mod error;
pub mod id;
pub mod value;

pub use error::Error;
pub use id::{ObjectId, Timestamp};
pub use value::Value;
