//! Protocol error types.

use thiserror::Error;

/// Errors raised while parsing identities and values.
#[derive(Debug, Error)]
pub enum Error {
    /// The textual form of an object ID is malformed.
    #[error("invalid object id '{text}': {reason}")]
    InvalidObjectId {
        /// The text that failed to parse.
        text: String,
        /// Why parsing failed.
        reason: String,
    },
}
