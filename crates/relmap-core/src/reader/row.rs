//! Result rows as returned by a connection.

use std::sync::Arc;

use relmap_proto::Value;

/// One result row: the column names of the result set plus the raw values.
///
/// Values arrive in storage form; the readers convert them to the declared
/// property types.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row. `columns` is shared by all rows of one result set.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Column names in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw values in select order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Check if the result set has a column `name`.
    pub fn has_column(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Value of column `name`, matched exactly first, then ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index_of(name).and_then(|i| self.values.get(i))
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }
}
