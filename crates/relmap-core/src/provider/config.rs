//! Provider configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mapping::DEFAULT_STORAGE_PROVIDER_ID;
use crate::sql::DialectKind;

/// Default time a connection waits for a locked database, in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Where a connection points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionTarget {
    /// A private in-memory database, dropped with the connection.
    InMemory,
    /// A database file.
    File(PathBuf),
}

/// Configuration of an RDBMS provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Storage provider ID; only classes mapped to this ID are handled.
    pub storage_provider_id: String,

    /// SQL dialect used to render commands.
    pub dialect: DialectKind,

    /// Database location.
    pub target: ConnectionTarget,

    /// Time to wait for a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            storage_provider_id: DEFAULT_STORAGE_PROVIDER_ID.to_string(),
            dialect: DialectKind::Sqlite,
            target: ConnectionTarget::InMemory,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl ProviderConfig {
    /// Configuration for an in-memory SQLite database.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Configuration for a SQLite database file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: ConnectionTarget::File(path.into()),
            ..Default::default()
        }
    }

    /// Set the storage provider ID.
    pub fn with_storage_provider_id(mut self, id: impl Into<String>) -> Self {
        self.storage_provider_id = id.into();
        self
    }

    /// Set the dialect.
    pub fn with_dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// The busy timeout.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProviderConfig::default();
        assert_eq!(config.storage_provider_id, "Default");
        assert_eq!(config.dialect, DialectKind::Sqlite);
        assert_eq!(config.target, ConnectionTarget::InMemory);
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_builder() {
        let config = ProviderConfig::file("/tmp/relmap.db")
            .with_storage_provider_id("Sales")
            .with_dialect(DialectKind::SqlServer)
            .with_busy_timeout(Duration::from_millis(250));

        assert_eq!(config.target, ConnectionTarget::File(PathBuf::from("/tmp/relmap.db")));
        assert_eq!(config.storage_provider_id, "Sales");
        assert_eq!(config.dialect, DialectKind::SqlServer);
        assert_eq!(config.busy_timeout_ms, 250);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{"storage_provider_id": "Sales", "target": {"file": "sales.db"}}"#;
        let config: ProviderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.storage_provider_id, "Sales");
        assert_eq!(config.target, ConnectionTarget::File(PathBuf::from("sales.db")));
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
    }
}
