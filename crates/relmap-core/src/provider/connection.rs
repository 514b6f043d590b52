//! The connection seam between providers and database drivers.

use relmap_proto::Value;

use crate::error::Result;
use crate::reader::Row;
use crate::sql::DbCommand;

/// One physical database connection.
///
/// Statements and cursors opened by an implementation live only for the
/// duration of a single call.
pub trait Connection: Send {
    /// Run a select and return all rows.
    fn execute_reader(&mut self, command: &DbCommand) -> Result<Vec<Row>>;

    /// Run a statement and return the number of affected rows.
    fn execute_non_query(&mut self, command: &DbCommand) -> Result<usize>;

    /// Run a select and return the first column of the first row, or
    /// `Value::Null` for an empty result.
    fn execute_scalar(&mut self, command: &DbCommand) -> Result<Value>;

    /// Begin a transaction.
    fn begin(&mut self) -> Result<()>;

    /// Commit the current transaction.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the current transaction.
    fn rollback(&mut self) -> Result<()>;
}
