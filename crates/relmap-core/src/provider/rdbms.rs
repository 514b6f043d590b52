//! Relational storage provider.

use std::fmt;
use std::sync::Arc;

use relmap_proto::{ObjectId, Value};
use tracing::{debug, info, instrument, warn};

use super::config::ProviderConfig;
use super::connection::Connection;
use super::sqlite::SqliteConnection;
use crate::command::{CommandExecutionContext, CommandFactory, ObjectLookupResult, StorageCommand};
use crate::data::{DataContainer, Query, StateType};
use crate::error::{Error, Result};
use crate::mapping::{MappingConfiguration, RelationEndPointDefinition, SortExpressionDefinition};
use crate::reader::Row;
use crate::sql::{DbCommandBuilder, SqlDialect};

/// Connection state of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// No open connection.
    Disconnected,
    /// Connected, every command commits on its own.
    Connected,
    /// Connected with an open transaction.
    InTransaction,
    /// Disposed; every further call fails.
    Disposed,
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderState::Disconnected => "Disconnected",
            ProviderState::Connected => "Connected",
            ProviderState::InTransaction => "InTransaction",
            ProviderState::Disposed => "Disposed",
        };
        f.write_str(name)
    }
}

/// Loads and saves data containers through one relational connection.
///
/// A provider owns at most one connection and one transaction. Operations
/// connect on demand; commands outside an explicit transaction commit
/// individually.
pub struct RdbmsProvider {
    config: ProviderConfig,
    factory: CommandFactory,
    dialect: Arc<dyn SqlDialect>,
    connection: Option<Box<dyn Connection>>,
    state: ProviderState,
}

impl RdbmsProvider {
    /// Create a disconnected provider.
    pub fn new(config: ProviderConfig, mapping: Arc<MappingConfiguration>) -> Self {
        let factory = CommandFactory::new(mapping, config.storage_provider_id.clone());
        let dialect = config.dialect.dialect();
        Self {
            config,
            factory,
            dialect,
            connection: None,
            state: ProviderState::Disconnected,
        }
    }

    /// The configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The storage provider ID.
    pub fn storage_provider_id(&self) -> &str {
        &self.config.storage_provider_id
    }

    /// The mapping.
    pub fn mapping(&self) -> &Arc<MappingConfiguration> {
        self.factory.config()
    }

    /// The command factory.
    pub fn command_factory(&self) -> &CommandFactory {
        &self.factory
    }

    /// Current state.
    pub fn state(&self) -> ProviderState {
        self.state
    }

    /// Check if a connection is open.
    pub fn is_connected(&self) -> bool {
        matches!(self.state, ProviderState::Connected | ProviderState::InTransaction)
    }

    /// Open the connection described by the configuration. Does nothing if
    /// already connected.
    #[instrument(skip(self), fields(provider = %self.config.storage_provider_id))]
    pub fn connect(&mut self) -> Result<()> {
        self.check_disposed()?;
        if self.is_connected() {
            return Ok(());
        }
        let connection = SqliteConnection::open(&self.config)?;
        self.attach(Box::new(connection));
        info!(location = ?self.config.target, "Connected");
        Ok(())
    }

    /// Use `connection` instead of opening one from the configuration.
    pub fn connect_with(&mut self, connection: Box<dyn Connection>) -> Result<()> {
        self.check_disposed()?;
        if self.is_connected() {
            return Err(Error::usage("The provider is already connected."));
        }
        self.attach(connection);
        info!(provider = %self.config.storage_provider_id, "Connected with supplied connection");
        Ok(())
    }

    /// Close the connection, rolling back an open transaction.
    #[instrument(skip(self), fields(provider = %self.config.storage_provider_id))]
    pub fn disconnect(&mut self) -> Result<()> {
        if self.state == ProviderState::InTransaction {
            warn!("Disconnecting with an open transaction; rolling back");
            self.connection_mut()?.rollback()?;
        }
        if self.connection.take().is_some() {
            info!("Disconnected");
        }
        if self.state != ProviderState::Disposed {
            self.state = ProviderState::Disconnected;
        }
        Ok(())
    }

    /// Disconnect and make the provider unusable.
    pub fn dispose(&mut self) -> Result<()> {
        if self.state == ProviderState::Disposed {
            return Ok(());
        }
        let result = self.disconnect();
        self.state = ProviderState::Disposed;
        result
    }

    /// Begin a transaction, connecting first if needed.
    #[instrument(skip(self), fields(provider = %self.config.storage_provider_id))]
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.check_disposed()?;
        if self.state == ProviderState::InTransaction {
            return Err(Error::usage(
                "Cannot call BeginTransaction when a transaction is already in progress.",
            ));
        }
        self.connect()?;
        self.connection_mut()?.begin()?;
        self.state = ProviderState::InTransaction;
        debug!("Transaction started");
        Ok(())
    }

    /// Commit the open transaction.
    #[instrument(skip(self), fields(provider = %self.config.storage_provider_id))]
    pub fn commit(&mut self) -> Result<()> {
        self.check_disposed()?;
        if self.state != ProviderState::InTransaction {
            return Err(Error::usage(
                "Commit cannot be called without calling BeginTransaction first.",
            ));
        }
        self.connection_mut()?.commit()?;
        self.state = ProviderState::Connected;
        debug!("Transaction committed");
        Ok(())
    }

    /// Roll back the open transaction.
    #[instrument(skip(self), fields(provider = %self.config.storage_provider_id))]
    pub fn rollback(&mut self) -> Result<()> {
        self.check_disposed()?;
        if self.state != ProviderState::InTransaction {
            return Err(Error::usage(
                "Rollback cannot be called without calling BeginTransaction first.",
            ));
        }
        self.connection_mut()?.rollback()?;
        self.state = ProviderState::Connected;
        debug!("Transaction rolled back");
        Ok(())
    }

    /// Allocate a new identity for an object of `class_id`.
    pub fn create_new_object_id(&self, class_id: &str) -> Result<ObjectId> {
        self.check_disposed()?;
        let class = self.mapping().get_class(class_id)?;
        if class.storage_provider_id() != self.storage_provider_id() {
            return Err(Error::usage(format!(
                "The class '{class_id}' is stored by storage provider '{}' \
                 and cannot get an ID from storage provider '{}'.",
                class.storage_provider_id(),
                self.storage_provider_id()
            )));
        }
        Ok(ObjectId::generate(class.storage_provider_id(), class.id()))
    }

    /// Load one object. Returns `None` if no row exists.
    #[instrument(skip(self, id), fields(id = %id))]
    pub fn load_data_container(&mut self, id: &ObjectId) -> Result<Option<DataContainer>> {
        let command = self.factory.create_for_single_id_lookup(id)?;
        self.execute(command.as_ref())
    }

    /// Load several objects; one result per requested identity, in request
    /// order.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub fn load_data_containers(&mut self, ids: &[ObjectId]) -> Result<Vec<ObjectLookupResult>> {
        let command = self.factory.create_for_multi_id_lookup(ids)?;
        self.execute(command.as_ref())
    }

    /// Load the objects whose foreign key `end_point` references `related_id`.
    #[instrument(skip(self, end_point, related_id, sort), fields(related_id = %related_id))]
    pub fn load_data_containers_by_relation(
        &mut self,
        end_point: &RelationEndPointDefinition,
        related_id: &ObjectId,
        sort: Option<&SortExpressionDefinition>,
    ) -> Result<Vec<DataContainer>> {
        let command = self.factory.create_for_relation_lookup(end_point, related_id, sort)?;
        self.execute(command.as_ref())
    }

    /// Run a collection query.
    #[instrument(skip(self, query), fields(query = %query.id()))]
    pub fn execute_collection_query(
        &mut self,
        query: &Query,
    ) -> Result<Vec<Option<DataContainer>>> {
        let command = self.factory.create_for_query(query)?;
        self.execute(command.as_ref())
    }

    /// Run a scalar query.
    #[instrument(skip(self, query), fields(query = %query.id()))]
    pub fn execute_scalar_query(&mut self, query: &Query) -> Result<Value> {
        let command = self.factory.create_for_scalar_query(query)?;
        self.execute(command.as_ref())
    }

    /// Write `containers`. Row versions are not refreshed; call
    /// [`update_timestamps`](Self::update_timestamps) afterwards.
    #[instrument(skip(self, containers), fields(count = containers.len()))]
    pub fn save(&mut self, containers: &[DataContainer]) -> Result<()> {
        let command = self.factory.create_for_save(containers)?;
        self.execute::<()>(&command)?;
        info!(steps = command.steps().len(), "Saved data containers");
        Ok(())
    }

    /// Refresh the row versions of `containers` from the database.
    /// Deleted containers are skipped.
    #[instrument(skip(self, containers), fields(count = containers.len()))]
    pub fn update_timestamps(&mut self, containers: &mut [DataContainer]) -> Result<()> {
        let ids: Vec<ObjectId> = containers
            .iter()
            .filter(|c| c.state() != StateType::Deleted)
            .map(|c| c.id().clone())
            .collect();
        if ids.is_empty() {
            return Ok(());
        }

        let command = self.factory.create_for_timestamp_lookup(&ids)?;
        let timestamps = self.execute(command.as_ref())?;

        let mut missing = Vec::new();
        for container in containers.iter_mut().filter(|c| c.state() != StateType::Deleted) {
            match timestamps.iter().find(|(id, _)| id == container.id()) {
                Some((_, timestamp)) => container.set_timestamp(*timestamp),
                None => missing.push(container.id().to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(Error::ObjectsNotFound {
                object_ids: missing.join(", "),
            });
        }
        Ok(())
    }

    fn execute<T>(&mut self, command: &dyn StorageCommand<Output = T>) -> Result<T> {
        self.check_disposed()?;
        self.connect()?;
        let dialect = self.dialect.clone();
        let connection = self.connection_mut()?;
        let mut context = ConnectionContext {
            connection,
            dialect: dialect.as_ref(),
        };
        command.execute(&mut context)
    }

    fn attach(&mut self, connection: Box<dyn Connection>) {
        self.connection = Some(connection);
        self.state = ProviderState::Connected;
    }

    fn connection_mut(&mut self) -> Result<&mut dyn Connection> {
        match self.connection.as_deref_mut() {
            Some(connection) => Ok(connection),
            None => Err(Error::internal("the provider has no open connection")),
        }
    }

    fn check_disposed(&self) -> Result<()> {
        if self.state == ProviderState::Disposed {
            return Err(Error::usage(format!(
                "The storage provider '{}' has been disposed.",
                self.config.storage_provider_id
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for RdbmsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdbmsProvider")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Drop for RdbmsProvider {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            warn!(error = %e, "Failed to dispose provider");
        }
    }
}

/// Renders commands with the provider's dialect and runs them on its
/// connection.
struct ConnectionContext<'a> {
    connection: &'a mut dyn Connection,
    dialect: &'a dyn SqlDialect,
}

impl CommandExecutionContext for ConnectionContext<'_> {
    fn execute_reader(&mut self, builder: &dyn DbCommandBuilder) -> Result<Vec<Row>> {
        let command = builder.create(self.dialect);
        debug!(sql = %command, parameters = command.parameters.len(), "Executing reader");
        self.connection.execute_reader(&command)
    }

    fn execute_non_query(&mut self, builder: &dyn DbCommandBuilder) -> Result<usize> {
        let command = builder.create(self.dialect);
        debug!(sql = %command, parameters = command.parameters.len(), "Executing non-query");
        self.connection.execute_non_query(&command)
    }

    fn execute_scalar(&mut self, builder: &dyn DbCommandBuilder) -> Result<Value> {
        let command = builder.create(self.dialect);
        debug!(sql = %command, parameters = command.parameters.len(), "Executing scalar");
        self.connection.execute_scalar(&command)
    }
}
