//! SQL generation: dialects, command builders and rendered commands.

mod builder;
mod command;
mod dialect;

pub use builder::{
    DbCommandBuilder, DeleteDbCommandBuilder, InsertDbCommandBuilder, QueryDbCommandBuilder,
    SelectDbCommandBuilder, SelectFilter, SelectedColumns, UnionSelectDbCommandBuilder,
    UpdateDbCommandBuilder,
};
pub use command::{DbCommand, DbParameter};
pub use dialect::{DialectKind, SqlDialect, SqlServerDialect, SqliteDialect};
