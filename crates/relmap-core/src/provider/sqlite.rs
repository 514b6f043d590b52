//! SQLite connection backed by rusqlite.

use std::sync::Arc;

use relmap_proto::Value;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;

use super::config::{ConnectionTarget, ProviderConfig};
use super::connection::Connection;
use crate::error::{Error, Result};
use crate::reader::Row;
use crate::sql::DbCommand;

/// A [`Connection`] to a SQLite database.
///
/// Identities are stored as hyphenated UUID text, booleans and date-times as
/// integers.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Open the database `config` points to.
    pub fn open(config: &ProviderConfig) -> Result<Self> {
        let conn = match &config.target {
            ConnectionTarget::InMemory => rusqlite::Connection::open_in_memory(),
            ConnectionTarget::File(path) => rusqlite::Connection::open(path),
        }
        .map_err(|e| Error::Connection(format!("failed to open {:?}: {e}", config.target)))?;
        conn.busy_timeout(config.busy_timeout())
            .map_err(|e| Error::Connection(format!("failed to set busy timeout: {e}")))?;
        Ok(Self { conn })
    }

    /// Wrap an open rusqlite connection.
    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Run a batch of statements without parameters, e.g. DDL.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).map_err(|e| command_error(sql, e))
    }

    fn prepare(&self, command: &DbCommand) -> Result<rusqlite::Statement<'_>> {
        let mut stmt = self
            .conn
            .prepare(&command.text)
            .map_err(|e| command_error(&command.text, e))?;
        for parameter in &command.parameters {
            let index = stmt
                .parameter_index(&parameter.name)
                .map_err(|e| command_error(&command.text, e))?
                .ok_or_else(|| {
                    Error::usage(format!(
                        "Parameter '{}' does not occur in command '{}'.",
                        parameter.name, command.text
                    ))
                })?;
            stmt.raw_bind_parameter(index, SqlParam(&parameter.value))
                .map_err(|e| command_error(&command.text, e))?;
        }
        Ok(stmt)
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Connection for SqliteConnection {
    fn execute_reader(&mut self, command: &DbCommand) -> Result<Vec<Row>> {
        let mut stmt = self.prepare(command)?;
        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into();
        let count = columns.len();

        let mut rows = stmt.raw_query();
        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(|e| command_error(&command.text, e))? {
            let mut values = Vec::with_capacity(count);
            for i in 0..count {
                let value = row.get_ref(i).map_err(|e| command_error(&command.text, e))?;
                values.push(from_sql(value));
            }
            result.push(Row::new(columns.clone(), values));
        }
        Ok(result)
    }

    fn execute_non_query(&mut self, command: &DbCommand) -> Result<usize> {
        let mut stmt = self.prepare(command)?;
        stmt.raw_execute().map_err(|e| command_error(&command.text, e))
    }

    fn execute_scalar(&mut self, command: &DbCommand) -> Result<Value> {
        let mut stmt = self.prepare(command)?;
        let mut rows = stmt.raw_query();
        let value = match rows.next().map_err(|e| command_error(&command.text, e))? {
            Some(row) => from_sql(row.get_ref(0).map_err(|e| command_error(&command.text, e))?),
            None => Value::Null,
        };
        Ok(value)
    }

    fn begin(&mut self) -> Result<()> {
        self.execute_batch("BEGIN")
    }

    fn commit(&mut self) -> Result<()> {
        self.execute_batch("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.execute_batch("ROLLBACK")
    }
}

/// Binds a [`Value`] as a SQLite parameter.
struct SqlParam<'a>(&'a Value);

impl ToSql for SqlParam<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;

        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(Sql::Null),
            Value::Bool(b) => ToSqlOutput::Owned(Sql::Integer(i64::from(*b))),
            Value::Int32(i) => ToSqlOutput::Owned(Sql::Integer(i64::from(*i))),
            Value::Int64(i) | Value::DateTime(i) => ToSqlOutput::Owned(Sql::Integer(*i)),
            Value::Float64(f) => ToSqlOutput::Owned(Sql::Real(*f)),
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
            Value::Uuid(u) => ToSqlOutput::Owned(Sql::Text(u.to_string())),
            Value::ObjectId(id) => ToSqlOutput::Owned(Sql::Text(id.value().to_string())),
        })
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

fn command_error(text: &str, source: rusqlite::Error) -> Error {
    Error::Command {
        command: text.to_string(),
        source: Box::new(source),
    }
}
