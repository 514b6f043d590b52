//! Storage providers: configuration, the connection seam and the
//! relational provider.

mod config;
mod connection;
mod rdbms;
mod sqlite;

pub use config::{ConnectionTarget, ProviderConfig, DEFAULT_BUSY_TIMEOUT_MS};
pub use connection::Connection;
pub use rdbms::{ProviderState, RdbmsProvider};
pub use sqlite::SqliteConnection;
