//! Storage commands.
//!
//! A storage command pairs one or more command builders with the reader that
//! interprets their results. Commands are created by the [`CommandFactory`]
//! and executed against a [`CommandExecutionContext`], normally a provider.

mod commands;
mod factory;

use relmap_proto::Value;

use crate::error::Result;
use crate::reader::Row;
use crate::sql::DbCommandBuilder;

pub use commands::{
    FixedValueCommand, IndirectDataContainerLoadCommand, MultiDataContainerLoadCommand,
    MultiIdLookupCommand, ObjectLookupResult, QueryCommand, SaveCommand, SaveStep,
    ScalarQueryCommand, SingleDataContainerLoadCommand, TimestampLookupCommand,
};
pub use factory::CommandFactory;

/// Runs rendered commands. Implemented by providers.
pub trait CommandExecutionContext {
    /// Run a select and return all rows.
    fn execute_reader(&mut self, builder: &dyn DbCommandBuilder) -> Result<Vec<Row>>;

    /// Run a statement and return the number of affected rows.
    fn execute_non_query(&mut self, builder: &dyn DbCommandBuilder) -> Result<usize>;

    /// Run a select and return the first column of the first row.
    fn execute_scalar(&mut self, builder: &dyn DbCommandBuilder) -> Result<Value>;
}

/// A command producing `Output` when executed.
pub trait StorageCommand: std::fmt::Debug {
    /// Result of the command.
    type Output;

    /// Execute the command.
    fn execute(&self, context: &mut dyn CommandExecutionContext) -> Result<Self::Output>;
}

/// A boxed storage command.
pub type Command<T> = Box<dyn StorageCommand<Output = T>>;
