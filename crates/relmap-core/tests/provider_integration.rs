//! Integration tests for the RDBMS provider against SQLite.

use std::sync::Arc;

use relmap_core::{
    DataContainer, EntityDescriptor, Error, MappingBuilder, MappingConfiguration, MappingSchema,
    ObjectId, PropertyDescriptor, ProviderConfig, ProviderState, Query, QueryType, RdbmsProvider,
    SqliteConnection, StateType, Timestamp, Value,
};
use relmap_core::mapping::ScalarType;

const DDL: &str = r#"
CREATE TABLE "Order" (
    "ID" TEXT PRIMARY KEY,
    "ClassID" TEXT NOT NULL,
    "Timestamp" INTEGER NOT NULL,
    "OrderNo" INTEGER NOT NULL,
    "DeliveryDate" INTEGER
);
CREATE TABLE "OrderItem" (
    "ID" TEXT PRIMARY KEY,
    "ClassID" TEXT NOT NULL,
    "Timestamp" INTEGER NOT NULL,
    "Position" INTEGER NOT NULL,
    "OrderID" TEXT
);
CREATE TABLE "Person" (
    "ID" TEXT PRIMARY KEY,
    "ClassID" TEXT NOT NULL,
    "Timestamp" INTEGER NOT NULL
);
CREATE TABLE "Customer" (
    "ID" TEXT PRIMARY KEY,
    "ClassID" TEXT NOT NULL,
    "Timestamp" INTEGER NOT NULL,
    "Name" TEXT NOT NULL,
    "CeoID" TEXT
);
CREATE TABLE "Partner" (
    "ID" TEXT PRIMARY KEY,
    "ClassID" TEXT NOT NULL,
    "Timestamp" INTEGER NOT NULL,
    "Name" TEXT NOT NULL,
    "CeoID" TEXT
);
CREATE TABLE "Department" (
    "ID" TEXT PRIMARY KEY,
    "ClassID" TEXT NOT NULL,
    "Timestamp" INTEGER NOT NULL
);
CREATE TABLE "Employee" (
    "ID" TEXT PRIMARY KEY,
    "ClassID" TEXT NOT NULL,
    "Timestamp" INTEGER NOT NULL,
    "Name" TEXT NOT NULL,
    "DepartmentID" TEXT
);
"#;

struct TestContext {
    config: ProviderConfig,
    mapping: Arc<MappingConfiguration>,
    _db_dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let db_dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig::file(db_dir.path().join("relmap.db"));
        SqliteConnection::open(&config).unwrap().execute_batch(DDL).unwrap();

        Self {
            config,
            mapping: Arc::new(MappingBuilder::new(schema()).build().unwrap()),
            _db_dir: db_dir,
        }
    }

    fn provider(&self) -> RdbmsProvider {
        RdbmsProvider::new(self.config.clone(), self.mapping.clone())
    }

    fn new_object(&self, provider: &RdbmsProvider, class_id: &str) -> DataContainer {
        let id = provider.create_new_object_id(class_id).unwrap();
        DataContainer::create_new_for_class(id, &self.mapping).unwrap()
    }
}

fn schema() -> MappingSchema {
    MappingSchema::new()
        .with_entity(
            EntityDescriptor::new("Order")
                .with_table("Order")
                .with_property(PropertyDescriptor::scalar("OrderNo", ScalarType::Int32))
                .with_property(PropertyDescriptor::optional("DeliveryDate", ScalarType::DateTime))
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
        .with_entity(EntityDescriptor::new("Customer").with_base("Company").with_table("Customer"))
        .with_entity(EntityDescriptor::new("Partner").with_base("Company").with_table("Partner"))
        .with_entity(
            EntityDescriptor::new("Department")
                .with_table("Department")
                .with_property(
                    PropertyDescriptor::collection("Managers", "Manager")
                        .with_opposite("Department"),
                ),
        )
        .with_entity(
            EntityDescriptor::new("Employee")
                .with_table("Employee")
                .with_property(PropertyDescriptor::scalar("Name", ScalarType::String)),
        )
        .with_entity(
            EntityDescriptor::new("Manager")
                .with_base("Employee")
                .with_property(
                    PropertyDescriptor::reference("Department", "Department")
                        .with_opposite("Managers"),
                ),
        )
}

fn order_no(container: &DataContainer) -> Option<&Value> {
    container.value("Order.OrderNo")
}

#[test]
fn test_insert_and_load_round_trip() {
    let ctx = TestContext::new();
    let mut provider = ctx.provider();

    let mut order = ctx.new_object(&provider, "Order");
    order.set_value("Order.OrderNo", 42).unwrap();
    provider.save(std::slice::from_ref(&order)).unwrap();

    let loaded = provider.load_data_container(order.id()).unwrap().unwrap();
    assert_eq!(loaded.id(), order.id());
    assert_eq!(loaded.state(), StateType::Unchanged);
    assert_eq!(loaded.timestamp(), Some(Timestamp::INITIAL));
    assert_eq!(order_no(&loaded), Some(&Value::Int32(42)));
    assert_eq!(loaded.value("Order.DeliveryDate"), Some(&Value::Null));

    let missing = ObjectId::generate("Default", "Order");
    assert!(provider.load_data_container(&missing).unwrap().is_none());
}

#[test]
fn test_relation_lookup_orders_by_position() {
    let ctx = TestContext::new();
    let mut provider = ctx.provider();

    let mut order = ctx.new_object(&provider, "Order");
    order.set_value("Order.OrderNo", 1).unwrap();
    let mut items = Vec::new();
    for position in [3, 1, 2] {
        let mut item = ctx.new_object(&provider, "OrderItem");
        item.set_value("OrderItem.Position", position).unwrap();
        item.set_value("OrderItem.Order", order.id().clone()).unwrap();
        items.push(item);
    }
    let mut containers = vec![order.clone()];
    containers.extend(items);
    provider.save(&containers).unwrap();

    let end_point = ctx.mapping.relation_end_point("OrderItem", "OrderItem.Order").unwrap();
    let sort = ctx
        .mapping
        .relation_end_point("Order", "Order.OrderItems")
        .and_then(|ep| ep.sort_expression());
    let loaded = provider
        .load_data_containers_by_relation(end_point, order.id(), sort)
        .unwrap();

    let positions: Vec<&Value> = loaded
        .iter()
        .filter_map(|c| c.value("OrderItem.Position"))
        .collect();
    assert_eq!(positions, vec![&Value::Int32(1), &Value::Int32(2), &Value::Int32(3)]);
    assert!(loaded
        .iter()
        .all(|c| c.value("OrderItem.Order") == Some(&Value::ObjectId(order.id().clone()))));
}

#[test]
fn test_multi_id_lookup_across_tables() {
    let ctx = TestContext::new();
    let mut provider = ctx.provider();

    let mut order1 = ctx.new_object(&provider, "Order");
    order1.set_value("Order.OrderNo", 1).unwrap();
    let mut order2 = ctx.new_object(&provider, "Order");
    order2.set_value("Order.OrderNo", 2).unwrap();
    let mut item = ctx.new_object(&provider, "OrderItem");
    item.set_value("OrderItem.Position", 1).unwrap();
    item.set_value("OrderItem.Order", order1.id().clone()).unwrap();
    provider
        .save(&[order2.clone(), item.clone(), order1.clone()])
        .unwrap();

    let missing = ObjectId::generate("Default", "OrderItem");
    let ids = vec![order1.id().clone(), item.id().clone(), order2.id().clone(), missing.clone()];
    let results = provider.load_data_containers(&ids).unwrap();

    assert_eq!(results.len(), 4);
    for (result, id) in results.iter().zip(&ids) {
        assert_eq!(&result.object_id, id);
    }
    assert_eq!(order_no(results[0].located_object.as_ref().unwrap()), Some(&Value::Int32(1)));
    assert_eq!(results[1].located_object.as_ref().unwrap().id(), item.id());
    assert_eq!(order_no(results[2].located_object.as_ref().unwrap()), Some(&Value::Int32(2)));
    assert!(results[3].located_object.is_none());
}

#[test]
fn test_new_to_new_reference_is_completed_after_inserts() {
    let ctx = TestContext::new();
    let mut provider = ctx.provider();

    let order = ctx.new_object(&provider, "Order");
    let mut item = ctx.new_object(&provider, "OrderItem");
    item.set_value("OrderItem.Order", order.id().clone()).unwrap();

    // The item is inserted before the order it references.
    provider.save(&[item.clone(), order.clone()]).unwrap();

    let loaded = provider.load_data_container(item.id()).unwrap().unwrap();
    assert_eq!(loaded.value("OrderItem.Order"), Some(&Value::ObjectId(order.id().clone())));
    assert_eq!(loaded.timestamp(), Some(Timestamp::INITIAL));
}

#[test]
fn test_update_and_concurrency_violation() {
    let ctx = TestContext::new();
    let mut provider = ctx.provider();

    let mut order = ctx.new_object(&provider, "Order");
    order.set_value("Order.OrderNo", 1).unwrap();
    provider.save(std::slice::from_ref(&order)).unwrap();

    let mut first = provider.load_data_container(order.id()).unwrap().unwrap();
    let mut second = provider.load_data_container(order.id()).unwrap().unwrap();

    first.set_value("Order.OrderNo", 2).unwrap();
    assert_eq!(first.state(), StateType::Changed);
    provider.save(std::slice::from_ref(&first)).unwrap();

    second.set_value("Order.OrderNo", 3).unwrap();
    let err = provider.save(std::slice::from_ref(&second)).unwrap_err();
    match err {
        Error::ConcurrencyViolation { object_id } => assert_eq!(object_id, order.id().to_string()),
        other => panic!("expected a concurrency violation, got {other:?}"),
    }

    let reloaded = provider.load_data_container(order.id()).unwrap().unwrap();
    assert_eq!(order_no(&reloaded), Some(&Value::Int32(2)));
    assert_eq!(reloaded.timestamp(), Some(Timestamp(2)));

    // A refreshed copy can be saved again.
    provider.update_timestamps(std::slice::from_mut(&mut second)).unwrap();
    assert_eq!(second.timestamp(), Some(Timestamp(2)));
    provider.save(std::slice::from_ref(&second)).unwrap();
}

#[test]
fn test_delete_checks_timestamp() {
    let ctx = TestContext::new();
    let mut provider = ctx.provider();

    let order = ctx.new_object(&provider, "Order");
    provider.save(std::slice::from_ref(&order)).unwrap();

    let mut stale = provider.load_data_container(order.id()).unwrap().unwrap();
    let mut current = provider.load_data_container(order.id()).unwrap().unwrap();
    current.set_value("Order.OrderNo", 7).unwrap();
    provider.save(std::slice::from_ref(&current)).unwrap();

    stale.mark_as_deleted().unwrap();
    assert!(matches!(
        provider.save(std::slice::from_ref(&stale)),
        Err(Error::ConcurrencyViolation { .. })
    ));

    provider.update_timestamps(std::slice::from_mut(&mut current)).unwrap();
    current.commit_state();
    current.mark_as_deleted().unwrap();
    provider.save(std::slice::from_ref(&current)).unwrap();
    assert!(provider.load_data_container(order.id()).unwrap().is_none());
}

#[test]
fn test_update_timestamps_reports_missing_objects() {
    let ctx = TestContext::new();
    let mut provider = ctx.provider();

    let order = ctx.new_object(&provider, "Order");
    let unsaved = ctx.new_object(&provider, "Order");
    provider.save(std::slice::from_ref(&order)).unwrap();

    let mut containers = vec![order, unsaved.clone()];
    let err = provider.update_timestamps(&mut containers).unwrap_err();
    match err {
        Error::ObjectsNotFound { object_ids } => assert_eq!(object_ids, unsaved.id().to_string()),
        other => panic!("expected missing objects, got {other:?}"),
    }
    assert_eq!(containers[0].timestamp(), Some(Timestamp::INITIAL));
}

#[test]
fn test_union_view_relation_lookup() {
    let ctx = TestContext::new();
    let mut provider = ctx.provider();

    let ceo = ctx.new_object(&provider, "Person");
    let other = ctx.new_object(&provider, "Person");
    let mut customer = ctx.new_object(&provider, "Customer");
    customer.set_value("Company.Name", "Acme").unwrap();
    customer.set_value("Company.Ceo", ceo.id().clone()).unwrap();
    let mut partner = ctx.new_object(&provider, "Partner");
    partner.set_value("Company.Name", "Globex").unwrap();
    partner.set_value("Company.Ceo", ceo.id().clone()).unwrap();
    let mut unrelated = ctx.new_object(&provider, "Partner");
    unrelated.set_value("Company.Name", "Initech").unwrap();
    unrelated.set_value("Company.Ceo", other.id().clone()).unwrap();
    provider
        .save(&[ceo.clone(), other, customer.clone(), partner.clone(), unrelated])
        .unwrap();

    let end_point = ctx.mapping.relation_end_point("Company", "Company.Ceo").unwrap();
    let loaded = provider
        .load_data_containers_by_relation(end_point, ceo.id(), None)
        .unwrap();

    let mut class_ids: Vec<&str> = loaded.iter().map(DataContainer::class_id).collect();
    class_ids.sort_unstable();
    assert_eq!(class_ids, vec!["Customer", "Partner"]);
    assert!(loaded.iter().any(|c| c.id() == customer.id()));
    assert!(loaded.iter().any(|c| c.id() == partner.id()));
}

#[test]
fn test_filter_view_relation_lookup() {
    let ctx = TestContext::new();
    let mut provider = ctx.provider();

    let department = ctx.new_object(&provider, "Department");
    let mut manager = ctx.new_object(&provider, "Manager");
    manager.set_value("Employee.Name", "Ada").unwrap();
    manager.set_value("Manager.Department", department.id().clone()).unwrap();
    let mut employee = ctx.new_object(&provider, "Employee");
    employee.set_value("Employee.Name", "Bob").unwrap();
    provider
        .save(&[department.clone(), manager.clone(), employee.clone()])
        .unwrap();

    let end_point = ctx.mapping.relation_end_point("Manager", "Manager.Department").unwrap();
    let loaded = provider
        .load_data_containers_by_relation(end_point, department.id(), None)
        .unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id(), manager.id());
    assert_eq!(loaded[0].value("Employee.Name"), Some(&Value::String("Ada".into())));

    let employee = provider.load_data_container(employee.id()).unwrap().unwrap();
    assert_eq!(employee.class_id(), "Employee");
}

#[test]
fn test_collection_query_null_policy() {
    let ctx = TestContext::new();
    let mut provider = ctx.provider();

    let mut order = ctx.new_object(&provider, "Order");
    order.set_value("Order.OrderNo", 5).unwrap();
    provider.save(std::slice::from_ref(&order)).unwrap();

    let statement = r#"SELECT NULL AS "ID", NULL AS "ClassID", NULL AS "Timestamp",
        NULL AS "OrderNo", NULL AS "DeliveryDate"
        UNION ALL SELECT "ID", "ClassID", "Timestamp", "OrderNo", "DeliveryDate" FROM "Order""#;

    let strict = Query::new("OrdersWithGap", "Default", statement, QueryType::Collection);
    assert!(matches!(
        provider.execute_collection_query(&strict),
        Err(Error::NullObjectId { .. })
    ));

    let lenient =
        Query::new("OrdersWithGap", "Default", statement, QueryType::Collection).allowing_nulls();
    let result = provider.execute_collection_query(&lenient).unwrap();
    assert_eq!(result.len(), 2);
    assert!(result[0].is_none());
    assert_eq!(result[1].as_ref().map(|c| c.id()), Some(order.id()));
}

#[test]
fn test_parameterized_and_scalar_queries() {
    let ctx = TestContext::new();
    let mut provider = ctx.provider();

    let mut containers = Vec::new();
    for no in 1..=3 {
        let mut order = ctx.new_object(&provider, "Order");
        order.set_value("Order.OrderNo", no).unwrap();
        containers.push(order);
    }
    provider.save(&containers).unwrap();

    let query = Query::new(
        "OrdersFrom",
        "Default",
        r#"SELECT * FROM "Order" WHERE "OrderNo" >= @MinNo ORDER BY "OrderNo" DESC"#,
        QueryType::Collection,
    )
    .with_parameter("@MinNo", 2);
    let result = provider.execute_collection_query(&query).unwrap();
    let numbers: Vec<&Value> = result.iter().flatten().filter_map(order_no).collect();
    assert_eq!(numbers, vec![&Value::Int32(3), &Value::Int32(2)]);

    let count_sql = r#"SELECT COUNT(*) FROM "Order""#;
    let count = Query::new("OrderCount", "Default", count_sql, QueryType::Scalar);
    assert_eq!(provider.execute_scalar_query(&count).unwrap(), Value::Int64(3));

    assert!(matches!(provider.execute_collection_query(&count), Err(Error::Usage(_))));
}

#[test]
fn test_transaction_rollback_and_commit() {
    let ctx = TestContext::new();
    let mut provider = ctx.provider();

    let discarded = ctx.new_object(&provider, "Order");
    provider.begin_transaction().unwrap();
    assert_eq!(provider.state(), ProviderState::InTransaction);
    provider.save(std::slice::from_ref(&discarded)).unwrap();
    provider.rollback().unwrap();
    assert!(provider.load_data_container(discarded.id()).unwrap().is_none());

    let kept = ctx.new_object(&provider, "Order");
    provider.begin_transaction().unwrap();
    provider.save(std::slice::from_ref(&kept)).unwrap();
    provider.commit().unwrap();
    provider.disconnect().unwrap();
    assert_eq!(provider.state(), ProviderState::Disconnected);

    // A second provider sees the committed row.
    let mut reader = ctx.provider();
    assert!(reader.load_data_container(kept.id()).unwrap().is_some());
    assert!(reader.load_data_container(discarded.id()).unwrap().is_none());
}

#[test]
fn test_in_memory_connection() {
    let mapping = Arc::new(MappingBuilder::new(schema()).build().unwrap());
    let connection = SqliteConnection::open(&ProviderConfig::in_memory()).unwrap();
    connection.execute_batch(DDL).unwrap();

    let mut provider = RdbmsProvider::new(ProviderConfig::in_memory(), mapping.clone());
    provider.connect_with(Box::new(connection)).unwrap();
    assert!(provider.is_connected());

    let id = provider.create_new_object_id("Order").unwrap();
    let order = DataContainer::create_new_for_class(id, &mapping).unwrap();
    provider.save(std::slice::from_ref(&order)).unwrap();
    assert!(provider.load_data_container(order.id()).unwrap().is_some());
}
