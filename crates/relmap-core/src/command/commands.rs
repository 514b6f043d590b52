//! Storage command implementations.

use std::fmt;

use relmap_proto::{ObjectId, Timestamp, Value};
use tracing::warn;

use super::factory::CommandFactory;
use super::{CommandExecutionContext, StorageCommand};
use crate::data::DataContainer;
use crate::error::{Error, Result};
use crate::reader::{DataContainerReader, ObjectIdReader, TimestampReader};
use crate::sql::DbCommandBuilder;

/// Outcome of looking up one requested identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLookupResult {
    /// The requested identity.
    pub object_id: ObjectId,
    /// The loaded object, `None` if no row matched.
    pub located_object: Option<DataContainer>,
}

/// Loads at most one data container.
#[derive(Debug)]
pub struct SingleDataContainerLoadCommand {
    builder: Box<dyn DbCommandBuilder>,
    reader: DataContainerReader,
}

impl SingleDataContainerLoadCommand {
    pub(crate) fn new(builder: Box<dyn DbCommandBuilder>, reader: DataContainerReader) -> Self {
        Self { builder, reader }
    }
}

impl StorageCommand for SingleDataContainerLoadCommand {
    type Output = Option<DataContainer>;

    fn execute(&self, context: &mut dyn CommandExecutionContext) -> Result<Self::Output> {
        let rows = context.execute_reader(self.builder.as_ref())?;
        Ok(self.reader.read_sequence(&rows)?.into_iter().flatten().next())
    }
}

/// Loads data containers with one or more selects and concatenates the
/// results.
#[derive(Debug)]
pub struct MultiDataContainerLoadCommand {
    loads: Vec<(Box<dyn DbCommandBuilder>, DataContainerReader)>,
}

impl MultiDataContainerLoadCommand {
    pub(crate) fn new(loads: Vec<(Box<dyn DbCommandBuilder>, DataContainerReader)>) -> Self {
        Self { loads }
    }
}

impl StorageCommand for MultiDataContainerLoadCommand {
    type Output = Vec<DataContainer>;

    fn execute(&self, context: &mut dyn CommandExecutionContext) -> Result<Self::Output> {
        let mut containers = Vec::new();
        for (builder, reader) in &self.loads {
            let rows = context.execute_reader(builder.as_ref())?;
            containers.extend(reader.read_sequence(&rows)?.into_iter().flatten());
        }
        Ok(containers)
    }
}

/// Wraps a multi-table load and re-sorts its result into request order.
#[derive(Debug)]
pub struct MultiIdLookupCommand {
    load: MultiDataContainerLoadCommand,
    requested: Vec<ObjectId>,
}

impl MultiIdLookupCommand {
    pub(crate) fn new(load: MultiDataContainerLoadCommand, requested: Vec<ObjectId>) -> Self {
        Self { load, requested }
    }
}

impl StorageCommand for MultiIdLookupCommand {
    type Output = Vec<ObjectLookupResult>;

    fn execute(&self, context: &mut dyn CommandExecutionContext) -> Result<Self::Output> {
        let loaded = self.load.execute(context)?;
        Ok(self
            .requested
            .iter()
            .map(|id| ObjectLookupResult {
                object_id: id.clone(),
                located_object: loaded.iter().find(|c| c.id() == id).cloned(),
            })
            .collect())
    }
}

/// Resolves identities with an identity-only scan, then loads them through
/// a multi-ID lookup. Used for relations into union views.
#[derive(Debug)]
pub struct IndirectDataContainerLoadCommand {
    id_lookup: Box<dyn DbCommandBuilder>,
    reader: ObjectIdReader,
    factory: CommandFactory,
}

impl IndirectDataContainerLoadCommand {
    pub(crate) fn new(
        id_lookup: Box<dyn DbCommandBuilder>,
        reader: ObjectIdReader,
        factory: CommandFactory,
    ) -> Self {
        Self {
            id_lookup,
            reader,
            factory,
        }
    }
}

impl StorageCommand for IndirectDataContainerLoadCommand {
    type Output = Vec<DataContainer>;

    fn execute(&self, context: &mut dyn CommandExecutionContext) -> Result<Self::Output> {
        let rows = context.execute_reader(self.id_lookup.as_ref())?;
        let ids = self.reader.read_sequence(&rows)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let lookup = self.factory.create_for_multi_id_lookup(&ids)?;
        let mut containers = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for result in lookup.execute(context)? {
            match result.located_object {
                Some(container) => containers.push(container),
                None => missing.push(result.object_id.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(Error::ObjectsNotFound {
                object_ids: missing.join(", "),
            });
        }
        Ok(containers)
    }
}

/// Returns a value without touching the database.
pub struct FixedValueCommand<T> {
    value: T,
}

impl<T> FixedValueCommand<T> {
    pub(crate) fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> fmt::Debug for FixedValueCommand<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedValueCommand").finish_non_exhaustive()
    }
}

impl<T: Clone> StorageCommand for FixedValueCommand<T> {
    type Output = T;

    fn execute(&self, _context: &mut dyn CommandExecutionContext) -> Result<Self::Output> {
        Ok(self.value.clone())
    }
}

/// Runs a collection query.
#[derive(Debug)]
pub struct QueryCommand {
    builder: Box<dyn DbCommandBuilder>,
    reader: DataContainerReader,
}

impl QueryCommand {
    pub(crate) fn new(builder: Box<dyn DbCommandBuilder>, reader: DataContainerReader) -> Self {
        Self { builder, reader }
    }
}

impl StorageCommand for QueryCommand {
    type Output = Vec<Option<DataContainer>>;

    fn execute(&self, context: &mut dyn CommandExecutionContext) -> Result<Self::Output> {
        let rows = context.execute_reader(self.builder.as_ref())?;
        self.reader.read_sequence(&rows)
    }
}

/// Runs a scalar query.
#[derive(Debug)]
pub struct ScalarQueryCommand {
    builder: Box<dyn DbCommandBuilder>,
}

impl ScalarQueryCommand {
    pub(crate) fn new(builder: Box<dyn DbCommandBuilder>) -> Self {
        Self { builder }
    }
}

impl StorageCommand for ScalarQueryCommand {
    type Output = Value;

    fn execute(&self, context: &mut dyn CommandExecutionContext) -> Result<Self::Output> {
        context.execute_scalar(self.builder.as_ref())
    }
}

/// Reads current row versions.
#[derive(Debug)]
pub struct TimestampLookupCommand {
    lookups: Vec<(Box<dyn DbCommandBuilder>, TimestampReader)>,
}

impl TimestampLookupCommand {
    pub(crate) fn new(lookups: Vec<(Box<dyn DbCommandBuilder>, TimestampReader)>) -> Self {
        Self { lookups }
    }
}

impl StorageCommand for TimestampLookupCommand {
    type Output = Vec<(ObjectId, Timestamp)>;

    fn execute(&self, context: &mut dyn CommandExecutionContext) -> Result<Self::Output> {
        let mut timestamps = Vec::new();
        for (builder, reader) in &self.lookups {
            let rows = context.execute_reader(builder.as_ref())?;
            timestamps.extend(reader.read_sequence(&rows)?);
        }
        Ok(timestamps)
    }
}

/// One statement of a save.
#[derive(Debug)]
pub struct SaveStep {
    /// The statement.
    pub builder: Box<dyn DbCommandBuilder>,
    /// The object written by the statement.
    pub object_id: ObjectId,
    /// Whether zero affected rows is a concurrency violation.
    pub checks_concurrency: bool,
}

/// Inserts, foreign-key completions, updates and deletes, in that order.
#[derive(Debug)]
pub struct SaveCommand {
    steps: Vec<SaveStep>,
}

impl SaveCommand {
    pub(crate) fn new(steps: Vec<SaveStep>) -> Self {
        Self { steps }
    }

    /// Statements in execution order.
    pub fn steps(&self) -> &[SaveStep] {
        &self.steps
    }
}

impl StorageCommand for SaveCommand {
    type Output = ();

    fn execute(&self, context: &mut dyn CommandExecutionContext) -> Result<Self::Output> {
        for step in &self.steps {
            let affected = context.execute_non_query(step.builder.as_ref())?;
            if affected == 0 && step.checks_concurrency {
                warn!(object_id = %step.object_id, "Concurrency violation");
                return Err(Error::ConcurrencyViolation {
                    object_id: step.object_id.to_string(),
                });
            }
        }
        Ok(())
    }
}
