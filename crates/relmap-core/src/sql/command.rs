//! Executable commands.

use std::fmt;

use relmap_proto::Value;

/// A bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct DbParameter {
    /// Parameter marker including its prefix, e.g. `@ID`.
    pub name: String,
    /// Bound value.
    pub value: Value,
}

/// Statement text plus its parameters, ready for a connection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DbCommand {
    /// SQL text.
    pub text: String,
    /// Parameters in marker order.
    pub parameters: Vec<DbParameter>,
}

impl DbCommand {
    /// Create a command without parameters.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    /// Add a parameter.
    pub fn add_parameter(&mut self, name: impl Into<String>, value: Value) {
        self.parameters.push(DbParameter {
            name: name.into(),
            value,
        });
    }

    /// Look up a parameter value.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

impl fmt::Display for DbCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
