//! Ad-hoc queries.

use relmap_proto::Value;

/// What a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    /// Rows read into data containers.
    Collection,
    /// A single value.
    Scalar,
}

/// How a parameter reaches the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryParameterType {
    /// Bound as a command parameter.
    Value,
    /// Substituted into the statement text.
    Text,
}

/// A named query parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParameter {
    /// Name as it appears in the statement, e.g. `@customer`.
    pub name: String,
    /// The value.
    pub value: Value,
    /// Binding mode.
    pub parameter_type: QueryParameterType,
}

/// A parameterized SQL statement executed against one storage provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    id: String,
    storage_provider_id: String,
    statement: String,
    query_type: QueryType,
    parameters: Vec<QueryParameter>,
    allow_nulls: bool,
}

impl Query {
    /// Create a query without parameters.
    pub fn new(
        id: impl Into<String>,
        storage_provider_id: impl Into<String>,
        statement: impl Into<String>,
        query_type: QueryType,
    ) -> Self {
        Self {
            id: id.into(),
            storage_provider_id: storage_provider_id.into(),
            statement: statement.into(),
            query_type,
            parameters: Vec::new(),
            allow_nulls: false,
        }
    }

    /// Read rows with a NULL identity as empty slots instead of failing.
    pub fn allowing_nulls(mut self) -> Self {
        self.allow_nulls = true;
        self
    }

    /// Add a bound parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.push(QueryParameter {
            name: name.into(),
            value: value.into(),
            parameter_type: QueryParameterType::Value,
        });
        self
    }

    /// Add a parameter substituted into the statement text.
    pub fn with_text_parameter(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.parameters.push(QueryParameter {
            name: name.into(),
            value: Value::String(text.into()),
            parameter_type: QueryParameterType::Text,
        });
        self
    }

    /// Query ID, used in diagnostics.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Storage provider the statement targets.
    pub fn storage_provider_id(&self) -> &str {
        &self.storage_provider_id
    }

    /// Statement text before text substitution.
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Result kind.
    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// All parameters.
    pub fn parameters(&self) -> &[QueryParameter] {
        &self.parameters
    }

    /// Whether NULL identities are read as empty slots.
    pub fn allows_nulls(&self) -> bool {
        self.allow_nulls
    }
}
