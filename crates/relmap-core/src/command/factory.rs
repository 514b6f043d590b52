//! Creates storage commands from the mapping.

use std::collections::HashSet;
use std::sync::Arc;

use relmap_proto::{ObjectId, Timestamp, Value};
use tracing::debug;
use uuid::Uuid;

use super::commands::{
    FixedValueCommand, IndirectDataContainerLoadCommand, MultiDataContainerLoadCommand,
    MultiIdLookupCommand, ObjectLookupResult, QueryCommand, SaveCommand, SaveStep,
    ScalarQueryCommand, SingleDataContainerLoadCommand, TimestampLookupCommand,
};
use super::Command;
use crate::data::{DataContainer, Query, QueryType, StateType};
use crate::error::{Error, Result};
use crate::mapping::{
    MappingConfiguration, PropertyDefinition, RelationEndPointDefinition, SortExpressionDefinition,
};
use crate::reader::{DataContainerReader, ObjectIdReader, TimestampReader};
use crate::sql::{
    DbCommandBuilder, DeleteDbCommandBuilder, InsertDbCommandBuilder, QueryDbCommandBuilder,
    SelectDbCommandBuilder, SelectFilter, UnionSelectDbCommandBuilder, UpdateDbCommandBuilder,
};
use crate::storage::{
    EntityDefinition, TableDefinition, CLASS_ID_COLUMN, ID_COLUMN, TIMESTAMP_COLUMN,
};

/// Creates the commands a provider executes for one storage provider ID.
#[derive(Debug, Clone)]
pub struct CommandFactory {
    config: Arc<MappingConfiguration>,
    storage_provider_id: String,
}

impl CommandFactory {
    /// Create a factory for the classes handled by `storage_provider_id`.
    pub fn new(config: Arc<MappingConfiguration>, storage_provider_id: impl Into<String>) -> Self {
        Self {
            config,
            storage_provider_id: storage_provider_id.into(),
        }
    }

    /// The mapping.
    pub fn config(&self) -> &Arc<MappingConfiguration> {
        &self.config
    }

    /// The storage provider the commands target.
    pub fn storage_provider_id(&self) -> &str {
        &self.storage_provider_id
    }

    /// Load one object by identity.
    pub fn create_for_single_id_lookup(
        &self,
        id: &ObjectId,
    ) -> Result<Command<Option<DataContainer>>> {
        self.check_provider(id)?;
        let table = self.table_for_identity(id)?;
        let builder = SelectDbCommandBuilder::new(&table.table_name, SelectFilter::Id(id.value()));
        let reader = DataContainerReader::new(self.config.clone(), &table.table_name);
        Ok(Box::new(SingleDataContainerLoadCommand::new(Box::new(builder), reader)))
    }

    /// Load several objects, one select per physical table.
    ///
    /// The result holds one entry per requested identity, in request order;
    /// identities without a row yield an entry without a located object.
    pub fn create_for_multi_id_lookup(
        &self,
        ids: &[ObjectId],
    ) -> Result<Command<Vec<ObjectLookupResult>>> {
        let mut groups: Vec<(Arc<TableDefinition>, Vec<Uuid>)> = Vec::new();
        let mut seen = HashSet::new();
        for id in ids {
            self.check_provider(id)?;
            if !seen.insert(id) {
                continue;
            }
            let table = self.table_for_identity(id)?;
            match groups.iter_mut().find(|(t, _)| t.table_name == table.table_name) {
                Some((_, values)) => values.push(id.value()),
                None => groups.push((table, vec![id.value()])),
            }
        }

        let loads = groups
            .into_iter()
            .map(|(table, values)| {
                let filter = match values.as_slice() {
                    [single] => SelectFilter::Id(*single),
                    _ => SelectFilter::Ids(values),
                };
                let builder: Box<dyn DbCommandBuilder> =
                    Box::new(SelectDbCommandBuilder::new(&table.table_name, filter));
                (builder, DataContainerReader::new(self.config.clone(), &table.table_name))
            })
            .collect::<Vec<_>>();
        debug!(requested = ids.len(), tables = loads.len(), "Created multi-ID lookup");

        Ok(Box::new(MultiIdLookupCommand::new(
            MultiDataContainerLoadCommand::new(loads),
            ids.to_vec(),
        )))
    }

    /// Load the objects whose foreign key `end_point` references
    /// `foreign_key`, ordered by `sort`.
    ///
    /// `end_point` must be the real (foreign-key) end point of the relation.
    pub fn create_for_relation_lookup(
        &self,
        end_point: &RelationEndPointDefinition,
        foreign_key: &ObjectId,
        sort: Option<&SortExpressionDefinition>,
    ) -> Result<Command<Vec<DataContainer>>> {
        let real = end_point.as_real().ok_or_else(|| {
            Error::usage(format!(
                "Relation lookups require the real end point of a relation; '{}' of class '{}' \
                 has no foreign key.",
                end_point.property_name().unwrap_or("<anonymous>"),
                end_point.class_id()
            ))
        })?;
        self.check_provider(foreign_key)?;

        let property = self.config.get_property(&real.class_id, &real.property_name)?;
        let column = property.column_name()?.to_string();
        let value = Value::Uuid(foreign_key.value());
        let order = sort.map(SortExpressionDefinition::ordered_columns).unwrap_or_default();

        let entity = self.config.storage_entity(&real.class_id)?;
        let command: Command<Vec<DataContainer>> = match entity {
            EntityDefinition::Table(table) => {
                let filter = SelectFilter::Column { column, value };
                let builder =
                    SelectDbCommandBuilder::new(&table.table_name, filter).with_order(order);
                Box::new(self.single_table_load(builder, &table.table_name))
            }
            EntityDefinition::FilterView(view) => {
                let filter = SelectFilter::Column { column, value };
                let builder = SelectDbCommandBuilder::new(&view.base_table.table_name, filter)
                    .with_class_filter(view.class_ids.clone())
                    .with_order(order);
                Box::new(self.single_table_load(builder, &view.base_table.table_name))
            }
            EntityDefinition::UnionView(view) => {
                let builder = UnionSelectDbCommandBuilder::new(view.tables.clone(), column, value)
                    .with_order(order);
                Box::new(IndirectDataContainerLoadCommand::new(
                    Box::new(builder),
                    ObjectIdReader::new(self.config.clone(), &real.class_id),
                    self.clone(),
                ))
            }
            EntityDefinition::Null(_) => Box::new(FixedValueCommand::new(Vec::new())),
        };
        Ok(command)
    }

    /// Run a collection query.
    pub fn create_for_query(&self, query: &Query) -> Result<Command<Vec<Option<DataContainer>>>> {
        self.check_query(query, QueryType::Collection)?;
        let builder = QueryDbCommandBuilder::new(query.statement(), query.parameters().to_vec());
        let mut reader = DataContainerReader::new(self.config.clone(), query.id());
        if query.allows_nulls() {
            reader = reader.allowing_nulls();
        }
        Ok(Box::new(QueryCommand::new(Box::new(builder), reader)))
    }

    /// Run a scalar query.
    pub fn create_for_scalar_query(&self, query: &Query) -> Result<Command<Value>> {
        self.check_query(query, QueryType::Scalar)?;
        let builder = QueryDbCommandBuilder::new(query.statement(), query.parameters().to_vec());
        Ok(Box::new(ScalarQueryCommand::new(Box::new(builder))))
    }

    /// Read the current row versions of `ids`.
    pub fn create_for_timestamp_lookup(
        &self,
        ids: &[ObjectId],
    ) -> Result<Command<Vec<(ObjectId, Timestamp)>>> {
        let mut groups: Vec<(Arc<TableDefinition>, Vec<Uuid>)> = Vec::new();
        for id in ids {
            self.check_provider(id)?;
            let table = self.table_for_identity(id)?;
            match groups.iter_mut().find(|(t, _)| t.table_name == table.table_name) {
                Some((_, values)) => {
                    if !values.contains(&id.value()) {
                        values.push(id.value());
                    }
                }
                None => groups.push((table, vec![id.value()])),
            }
        }

        let lookups = groups
            .into_iter()
            .map(|(table, values)| {
                let builder: Box<dyn DbCommandBuilder> = Box::new(
                    SelectDbCommandBuilder::new(&table.table_name, SelectFilter::Ids(values))
                        .with_columns(vec![
                            ID_COLUMN.to_string(),
                            CLASS_ID_COLUMN.to_string(),
                            TIMESTAMP_COLUMN.to_string(),
                        ]),
                );
                (builder, TimestampReader::new(self.config.clone(), &table.table_name))
            })
            .collect();
        Ok(Box::new(TimestampLookupCommand::new(lookups)))
    }

    /// Write `containers` according to their states.
    ///
    /// New objects are inserted first. Foreign keys referencing objects that
    /// are inserted by the same save are left out of the inserts and set by
    /// follow-up updates once all rows exist. Changed objects are updated and
    /// deleted objects removed afterwards; both check the row version.
    pub fn create_for_save(&self, containers: &[DataContainer]) -> Result<SaveCommand> {
        let new_ids: HashSet<&ObjectId> = containers
            .iter()
            .filter(|c| c.state() == StateType::New)
            .map(DataContainer::id)
            .collect();

        let mut inserts = Vec::new();
        let mut completions = Vec::new();
        let mut updates = Vec::new();
        let mut deletes = Vec::new();

        for container in containers {
            self.check_provider(container.id())?;
            let id = container.id();
            let table = self.table_for_identity(id)?;

            match container.state() {
                StateType::New => {
                    let mut values = vec![
                        (ID_COLUMN.to_string(), Value::Uuid(id.value())),
                        (CLASS_ID_COLUMN.to_string(), Value::String(id.class_id().to_string())),
                        (TIMESTAMP_COLUMN.to_string(), Value::Int64(Timestamp::INITIAL.get())),
                    ];
                    let mut deferred = Vec::new();
                    for property in self.config.persistent_properties(id.class_id())? {
                        let Some(value) = container.value(property.name()) else {
                            continue;
                        };
                        match value {
                            Value::ObjectId(related) if new_ids.contains(related) => {
                                self.push_columns(id.class_id(), property, value, &mut deferred)?;
                            }
                            _ => self.push_columns(id.class_id(), property, value, &mut values)?,
                        }
                    }
                    inserts.push(SaveStep {
                        builder: Box::new(InsertDbCommandBuilder::new(&table.table_name, values)),
                        object_id: id.clone(),
                        checks_concurrency: false,
                    });
                    if !deferred.is_empty() {
                        completions.push(SaveStep {
                            builder: Box::new(UpdateDbCommandBuilder::new(
                                &table.table_name,
                                id.value(),
                                deferred,
                                None,
                            )),
                            object_id: id.clone(),
                            checks_concurrency: false,
                        });
                    }
                }
                StateType::Changed => {
                    let timestamp = self.required_timestamp(container)?;
                    let mut values = Vec::new();
                    for changed in container.changed_values() {
                        let property = self.config.get_property(id.class_id(), changed.name())?;
                        self.push_columns(id.class_id(), property, changed.value(), &mut values)?;
                    }
                    updates.push(SaveStep {
                        builder: Box::new(UpdateDbCommandBuilder::new(
                            &table.table_name,
                            id.value(),
                            values,
                            Some(timestamp),
                        )),
                        object_id: id.clone(),
                        checks_concurrency: true,
                    });
                }
                StateType::Deleted => {
                    let timestamp = self.required_timestamp(container)?;
                    deletes.push(SaveStep {
                        builder: Box::new(DeleteDbCommandBuilder::new(
                            &table.table_name,
                            id.value(),
                            timestamp,
                        )),
                        object_id: id.clone(),
                        checks_concurrency: true,
                    });
                }
                StateType::Unchanged => {}
            }
        }

        debug!(
            inserts = inserts.len(),
            completions = completions.len(),
            updates = updates.len(),
            deletes = deletes.len(),
            "Created save command"
        );
        let steps = inserts
            .into_iter()
            .chain(completions)
            .chain(updates)
            .chain(deletes)
            .collect();
        Ok(SaveCommand::new(steps))
    }

    fn single_table_load(
        &self,
        builder: SelectDbCommandBuilder,
        table_name: &str,
    ) -> MultiDataContainerLoadCommand {
        let reader = DataContainerReader::new(self.config.clone(), table_name);
        let builder: Box<dyn DbCommandBuilder> = Box::new(builder);
        MultiDataContainerLoadCommand::new(vec![(builder, reader)])
    }

    /// Columns and values written for `property`. A relation property
    /// writes the referenced identity and, where the mapping requires it,
    /// the referenced class ID.
    fn push_columns(
        &self,
        class_id: &str,
        property: &PropertyDefinition,
        value: &Value,
        out: &mut Vec<(String, Value)>,
    ) -> Result<()> {
        let column = property.column_name()?.to_string();
        if !property.is_object_id() {
            out.push((column, value.clone()));
            return Ok(());
        }

        let with_class_id = self.config.has_class_id_column(class_id, property.name());
        match value {
            Value::ObjectId(related) => {
                out.push((column, Value::Uuid(related.value())));
                if with_class_id {
                    out.push((
                        property.class_id_column_name()?,
                        Value::String(related.class_id().to_string()),
                    ));
                }
            }
            Value::Null => {
                out.push((column, Value::Null));
                if with_class_id {
                    out.push((property.class_id_column_name()?, Value::Null));
                }
            }
            other => {
                return Err(Error::InvalidValue {
                    property: property.name().to_string(),
                    expected: property.property_type().to_string(),
                    actual: other.type_name().to_string(),
                })
            }
        }
        Ok(())
    }

    fn required_timestamp(&self, container: &DataContainer) -> Result<Timestamp> {
        container.timestamp().ok_or_else(|| {
            Error::usage(format!(
                "Object '{}' is {} but has no timestamp.",
                container.id(),
                container.state()
            ))
        })
    }

    /// Table holding the rows of `id`'s class.
    fn table_for_identity(&self, id: &ObjectId) -> Result<Arc<TableDefinition>> {
        match self.config.storage_entity(id.class_id())? {
            EntityDefinition::Table(table) => Ok(table.clone()),
            EntityDefinition::FilterView(view) => Ok(view.base_table.clone()),
            entity @ (EntityDefinition::UnionView(_) | EntityDefinition::Null(_)) => {
                Err(Error::internal(format!(
                    "Object '{id}' cannot be accessed by identity, \
                     because class '{}' is stored in a {}.",
                    id.class_id(),
                    entity.kind_name()
                )))
            }
        }
    }

    fn check_provider(&self, id: &ObjectId) -> Result<()> {
        if id.storage_provider_id() == self.storage_provider_id {
            return Ok(());
        }
        Err(Error::usage(format!(
            "The object '{id}' belongs to storage provider '{}' and cannot be handled by storage \
             provider '{}'.",
            id.storage_provider_id(),
            self.storage_provider_id
        )))
    }

    fn check_query(&self, query: &Query, expected: QueryType) -> Result<()> {
        if query.storage_provider_id() != self.storage_provider_id {
            return Err(Error::usage(format!(
                "Query '{}' targets storage provider '{}' and cannot be executed by storage \
                 provider '{}'.",
                query.id(),
                query.storage_provider_id(),
                self.storage_provider_id
            )));
        }
        if query.query_type() != expected {
            return Err(Error::usage(format!(
                "Query '{}' is a {:?} query and cannot be executed as a {expected:?} query.",
                query.id(),
                query.query_type()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::command::{CommandExecutionContext, StorageCommand};
    use crate::mapping::{
        EntityDescriptor, MappingBuilder, MappingSchema, PropertyDescriptor, ScalarType,
    };
    use crate::reader::Row;
    use crate::sql::{DbCommand, SqlServerDialect};

    /// Renders commands with the SQL Server dialect and answers selects
    /// with canned rows.
    #[derive(Default)]
    struct RecordingContext {
        commands: Vec<DbCommand>,
        results: VecDeque<Vec<Row>>,
        affected: usize,
    }

    impl CommandExecutionContext for RecordingContext {
        fn execute_reader(&mut self, builder: &dyn DbCommandBuilder) -> Result<Vec<Row>> {
            self.commands.push(builder.create(&SqlServerDialect));
            Ok(self.results.pop_front().unwrap_or_default())
        }

        fn execute_non_query(&mut self, builder: &dyn DbCommandBuilder) -> Result<usize> {
            self.commands.push(builder.create(&SqlServerDialect));
            Ok(self.affected)
        }

        fn execute_scalar(&mut self, builder: &dyn DbCommandBuilder) -> Result<Value> {
            self.commands.push(builder.create(&SqlServerDialect));
            Ok(Value::Int64(0))
        }
    }

    fn factory() -> CommandFactory {
        let schema = MappingSchema::new()
            .with_entity(
                EntityDescriptor::new("Order")
                    .with_table("Order")
                    .with_property(PropertyDescriptor::scalar("OrderNo", ScalarType::Int32))
                    .with_property(
                        PropertyDescriptor::optional("DeliveryDate", ScalarType::DateTime),
                    )
                    .with_property(
                        PropertyDescriptor::collection("OrderItems", "OrderItem")
                            .with_opposite("Order")
                            .with_sort_expression("Position asc"),
                    ),
            )
            .with_entity(
                EntityDescriptor::new("OrderItem")
                    .with_table("OrderItem")
                    .with_property(PropertyDescriptor::scalar("Position", ScalarType::Int32))
                    .with_property(
                        PropertyDescriptor::reference("Order", "Order").with_opposite("OrderItems"),
                    ),
            )
            .with_entity(
                EntityDescriptor::new("Person")
                    .with_table("Person")
                    .with_property(
                        PropertyDescriptor::collection("Companies", "Company").with_opposite("Ceo"),
                    ),
            )
            .with_entity(
                EntityDescriptor::new("Company")
                    .abstract_type()
                    .with_property(PropertyDescriptor::scalar("Name", ScalarType::String))
                    .with_property(
                        PropertyDescriptor::reference("Ceo", "Person").with_opposite("Companies"),
                    ),
            )
            .with_entity(
                EntityDescriptor::new("Customer").with_base("Company").with_table("Customer"),
            )
            .with_entity(
                EntityDescriptor::new("Partner").with_base("Company").with_table("Partner"),
            );
        CommandFactory::new(Arc::new(MappingBuilder::new(schema).build().unwrap()), "Default")
    }

    fn row(pairs: Vec<(&str, Value)>) -> Row {
        let columns: Arc<[String]> = pairs
            .iter()
            .map(|(c, _)| c.to_string())
            .collect::<Vec<_>>()
            .into();
        Row::new(columns, pairs.into_iter().map(|(_, v)| v).collect())
    }

    fn order_row(id: &ObjectId, order_no: i64) -> Row {
        row(vec![
            ("ID", Value::String(id.value().to_string())),
            ("ClassID", Value::String("Order".into())),
            ("Timestamp", Value::Int64(1)),
            ("OrderNo", Value::Int64(order_no)),
            ("DeliveryDate", Value::Null),
        ])
    }

    fn order_item_row(id: &ObjectId, position: i64, order: &ObjectId) -> Row {
        row(vec![
            ("ID", Value::String(id.value().to_string())),
            ("ClassID", Value::String("OrderItem".into())),
            ("Timestamp", Value::Int64(1)),
            ("Position", Value::Int64(position)),
            ("OrderID", Value::String(order.value().to_string())),
        ])
    }

    #[test]
    fn test_relation_lookup_orders_by_sort_expression() {
        let factory = factory();
        let config = factory.config().clone();
        let end_point = config.relation_end_point("OrderItem", "OrderItem.Order").unwrap();
        let sort = config
            .relation_end_point("Order", "Order.OrderItems")
            .and_then(RelationEndPointDefinition::sort_expression);
        let order = ObjectId::generate("Default", "Order");

        let command = factory.create_for_relation_lookup(end_point, &order, sort).unwrap();
        let mut context = RecordingContext::default();
        command.execute(&mut context).unwrap();

        assert_eq!(
            context.commands[0].text,
            "SELECT * FROM [OrderItem] WHERE [OrderID] = @OrderID ORDER BY [Position] ASC;"
        );
        assert_eq!(context.commands[0].parameter("@OrderID"), Some(&Value::Uuid(order.value())));
    }

    #[test]
    fn test_relation_lookup_requires_real_end_point() {
        let factory = factory();
        let config = factory.config().clone();
        let virtual_end = config.relation_end_point("Order", "Order.OrderItems").unwrap();
        let order = ObjectId::generate("Default", "Order");
        assert!(matches!(
            factory.create_for_relation_lookup(virtual_end, &order, None),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn test_multi_id_lookup_preserves_request_order() {
        let factory = factory();
        let order1 = ObjectId::generate("Default", "Order");
        let item1 = ObjectId::generate("Default", "OrderItem");
        let order2 = ObjectId::generate("Default", "Order");
        let missing = ObjectId::generate("Default", "Order");

        let requested = [order1.clone(), item1.clone(), order2.clone(), missing.clone()];
        let command = factory.create_for_multi_id_lookup(&requested).unwrap();
        let mut context = RecordingContext::default();
        // Storage order differs from request order.
        context.results.push_back(vec![order_row(&order2, 2), order_row(&order1, 1)]);
        context.results.push_back(vec![order_item_row(&item1, 1, &order1)]);

        let results = command.execute(&mut context).unwrap();
        assert_eq!(context.commands.len(), 2);
        assert!(context.commands[0].text.starts_with("SELECT * FROM [Order] WHERE [ID] IN"));
        assert_eq!(context.commands[1].text, "SELECT * FROM [OrderItem] WHERE [ID] = @ID;");

        let ids: Vec<&ObjectId> = results.iter().map(|r| &r.object_id).collect();
        assert_eq!(ids, vec![&order1, &item1, &order2, &missing]);
        assert_eq!(results[0].located_object.as_ref().map(DataContainer::id), Some(&order1));
        assert_eq!(results[1].located_object.as_ref().map(DataContainer::id), Some(&item1));
        assert_eq!(results[2].located_object.as_ref().map(DataContainer::id), Some(&order2));
        assert!(results[3].located_object.is_none());
    }

    #[test]
    fn test_union_view_relation_lookup_is_indirect() {
        let factory = factory();
        let config = factory.config().clone();
        assert!(matches!(
            config.storage_entity("Company").unwrap(),
            EntityDefinition::UnionView(_)
        ));

        let end_point = config.relation_end_point("Company", "Company.Ceo").unwrap();
        let ceo = ObjectId::generate("Default", "Person");
        let customer = ObjectId::generate("Default", "Customer");

        let command = factory.create_for_relation_lookup(end_point, &ceo, None).unwrap();
        let mut context = RecordingContext::default();
        context.results.push_back(vec![row(vec![
            ("ID", Value::String(customer.value().to_string())),
            ("ClassID", Value::String("Customer".into())),
        ])]);
        context.results.push_back(vec![row(vec![
            ("ID", Value::String(customer.value().to_string())),
            ("ClassID", Value::String("Customer".into())),
            ("Timestamp", Value::Int64(1)),
            ("Name", Value::String("Acme".into())),
            ("CeoID", Value::String(ceo.value().to_string())),
        ])]);

        let loaded = command.execute(&mut context).unwrap();
        assert_eq!(
            context.commands[0].text,
            "SELECT [ID], [ClassID] FROM [Customer] WHERE [CeoID] = @CeoID UNION ALL \
             SELECT [ID], [ClassID] FROM [Partner] WHERE [CeoID] = @CeoID;"
        );
        assert_eq!(context.commands[1].text, "SELECT * FROM [Customer] WHERE [ID] = @ID;");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id(), &customer);
    }

    #[test]
    fn test_union_view_identity_lookup_is_internal_error() {
        let factory = factory();
        let company = ObjectId::generate("Default", "Company");
        let err = factory.create_for_single_id_lookup(&company).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn test_foreign_provider_rejected() {
        let factory = factory();
        let foreign = ObjectId::generate("Other", "Order");
        let err = factory.create_for_single_id_lookup(&foreign).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[test]
    fn test_save_orders_steps_and_defers_new_foreign_keys() {
        let factory = factory();
        let order_id = ObjectId::generate("Default", "Order");
        let item_id = ObjectId::generate("Default", "OrderItem");

        let mut item = DataContainer::create_new(item_id.clone());
        item.set_value("OrderItem.Position", 1).unwrap();
        item.set_value("OrderItem.Order", order_id.clone()).unwrap();
        let mut order = DataContainer::create_new(order_id.clone());
        order.set_value("Order.OrderNo", 1).unwrap();

        let mut changed = DataContainer::create_for_existing(
            ObjectId::generate("Default", "Order"),
            Timestamp(4),
            vec![("Order.OrderNo".to_string(), Value::Int32(2))],
        );
        changed.set_value("Order.OrderNo", 3).unwrap();

        let save = factory.create_for_save(&[item, order, changed]).unwrap();
        let texts: Vec<String> = save
            .steps()
            .iter()
            .map(|s| s.builder.create(&SqlServerDialect).text)
            .collect();
        assert_eq!(
            texts,
            vec![
                "INSERT INTO [OrderItem] ([ID], [ClassID], [Timestamp], [Position]) \
                 VALUES (@ID, @ClassID, @Timestamp, @Position);",
                "INSERT INTO [Order] ([ID], [ClassID], [Timestamp], [OrderNo]) \
                 VALUES (@ID, @ClassID, @Timestamp, @OrderNo);",
                "UPDATE [OrderItem] SET [OrderID] = @OrderID WHERE [ID] = @ID;",
                "UPDATE [Order] SET [OrderNo] = @OrderNo, [Timestamp] = [Timestamp] + 1 \
                 WHERE [ID] = @ID AND [Timestamp] = @Timestamp;",
            ]
        );
        assert_eq!(save.steps()[2].object_id, item_id);
        assert!(save.steps()[3].checks_concurrency);
    }

    #[test]
    fn test_save_reports_concurrency_violation() {
        let factory = factory();
        let id = ObjectId::generate("Default", "Order");
        let values = vec![("Order.OrderNo".to_string(), Value::Int32(1))];
        let mut container = DataContainer::create_for_existing(id.clone(), Timestamp(1), values);
        container.mark_as_deleted().unwrap();

        let save = factory.create_for_save(&[container]).unwrap();
        let mut context = RecordingContext::default();
        let err = save.execute(&mut context).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "Concurrency violation encountered. \
                 Object '{id}' has already been changed by someone else."
            )
        );
    }

    #[test]
    fn test_query_type_checked() {
        let factory = factory();
        let query =
            Query::new("count", "Default", "SELECT COUNT(*) FROM [Order]", QueryType::Scalar);
        assert!(factory.create_for_query(&query).is_err());
        let command = factory.create_for_scalar_query(&query).unwrap();
        let mut context = RecordingContext::default();
        assert_eq!(command.execute(&mut context).unwrap(), Value::Int64(0));
    }
}
