//! SQL dialects.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The thin seam between the command builders and a database's SQL syntax.
pub trait SqlDialect: fmt::Debug + Send + Sync {
    /// Quote an identifier.
    fn delimit_identifier(&self, name: &str) -> String;

    /// Parameter marker for `name`, e.g. `@ID`.
    fn parameter_name(&self, name: &str) -> String {
        if name.starts_with('@') {
            name.to_string()
        } else {
            format!("@{name}")
        }
    }

    /// Terminator appended to every statement.
    fn statement_delimiter(&self) -> &str {
        ";"
    }

    /// Whether an ID list can be passed as one XML parameter.
    fn supports_xml_id_lists(&self) -> bool {
        false
    }
}

/// Microsoft SQL Server: `[name]`, `@name`, XML ID lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlServerDialect;

impl SqlDialect for SqlServerDialect {
    fn delimit_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn supports_xml_id_lists(&self) -> bool {
        true
    }
}

/// SQLite: `"name"`, `@name`, `IN (...)` ID lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn delimit_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Selects a dialect in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectKind {
    /// [`SqlServerDialect`].
    SqlServer,
    /// [`SqliteDialect`].
    #[default]
    Sqlite,
}

impl DialectKind {
    /// Instantiate the dialect.
    pub fn dialect(self) -> Arc<dyn SqlDialect> {
        match self {
            DialectKind::SqlServer => Arc::new(SqlServerDialect),
            DialectKind::Sqlite => Arc::new(SqliteDialect),
        }
    }
}
