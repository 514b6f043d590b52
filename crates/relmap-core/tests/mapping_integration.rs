//! Integration tests for schemas declared in JSON.

use std::sync::Arc;

use relmap_core::mapping::{ExtensionDescriptor, MixinApplication};
use relmap_core::storage::EntityDefinition;
use relmap_core::{
    DataContainer, MappingBuilder, MappingError, MappingSchema, ProviderConfig, RdbmsProvider,
    SqliteConnection, Value,
};

const SCHEMA: &str = r#"{
    "entities": [
        {
            "type_name": "Ticket",
            "entity_name": "Ticket",
            "properties": [
                { "name": "Title", "kind": { "scalar": "String" }, "max_length": 100 },
                { "name": "Priority", "kind": { "optional_scalar": "Int32" } }
            ],
            "mixins": [ { "mixin_type": "Audited" } ]
        },
        {
            "type_name": "Bug",
            "base_type": "Ticket",
            "properties": [ { "name": "Severity", "kind": { "scalar": "Int32" } } ]
        },
        {
            "type_name": "Attachment",
            "is_abstract": true,
            "properties": [ { "name": "FileName", "kind": { "scalar": "String" } } ]
        }
    ],
    "extensions": [
        {
            "type_name": "Audited",
            "persistent": true,
            "properties": [ { "name": "CreatedBy", "kind": { "scalar": "String" } } ]
        }
    ]
}"#;

const DDL: &str = r#"
CREATE TABLE "Ticket" (
    "ID" TEXT PRIMARY KEY,
    "ClassID" TEXT NOT NULL,
    "Timestamp" INTEGER NOT NULL,
    "Title" TEXT NOT NULL,
    "Priority" INTEGER,
    "CreatedBy" TEXT NOT NULL,
    "Severity" INTEGER
);
"#;

fn mapping() -> Arc<relmap_core::MappingConfiguration> {
    let schema = MappingSchema::from_json(SCHEMA).unwrap();
    Arc::new(MappingBuilder::new(schema).build().unwrap())
}

#[test]
fn test_storage_entities_from_json_schema() {
    let config = mapping();

    assert!(matches!(config.storage_entity("Ticket").unwrap(), EntityDefinition::Table(_)));
    match config.storage_entity("Bug").unwrap() {
        EntityDefinition::FilterView(view) => {
            assert_eq!(view.base_table.table_name, "Ticket");
            assert_eq!(view.class_ids, vec!["Bug".to_string()]);
        }
        other => panic!("expected a filter view, got {other}"),
    }
    assert!(matches!(config.storage_entity("Attachment").unwrap(), EntityDefinition::Null(_)));

    let ticket = config.storage_entity("Ticket").unwrap();
    for column in ["ID", "ClassID", "Timestamp", "Title", "Priority", "CreatedBy", "Severity"] {
        assert!(ticket.column(column).is_some(), "missing column {column}");
    }
    assert_eq!(config.get_class("Ticket").unwrap().persistent_mixins(), ["Audited".to_string()]);
}

#[test]
fn test_mixin_and_derived_properties_round_trip() {
    let config = mapping();
    let connection = SqliteConnection::open(&ProviderConfig::in_memory()).unwrap();
    connection.execute_batch(DDL).unwrap();
    let mut provider = RdbmsProvider::new(ProviderConfig::in_memory(), config.clone());
    provider.connect_with(Box::new(connection)).unwrap();

    let id = provider.create_new_object_id("Bug").unwrap();
    let mut bug = DataContainer::create_new_for_class(id, &config).unwrap();
    let title = config.get_property("Bug", "Ticket.Title").unwrap();
    bug.set_property_value(title, "Crash on save").unwrap();
    bug.set_value("Audited.CreatedBy", "qa").unwrap();
    bug.set_value("Bug.Severity", 2).unwrap();
    provider.save(std::slice::from_ref(&bug)).unwrap();

    let loaded = provider.load_data_container(bug.id()).unwrap().unwrap();
    assert_eq!(loaded.class_id(), "Bug");
    assert_eq!(loaded.value("Ticket.Title"), Some(&Value::String("Crash on save".into())));
    assert_eq!(loaded.value("Ticket.Priority"), Some(&Value::Null));
    assert_eq!(loaded.value("Audited.CreatedBy"), Some(&Value::String("qa".into())));
    assert_eq!(loaded.value("Bug.Severity"), Some(&Value::Int32(2)));
}

#[test]
fn test_suppressing_inherited_persistent_mixin_fails() {
    let mut schema = MappingSchema::from_json(SCHEMA).unwrap();
    schema
        .entity_mut("Bug")
        .unwrap()
        .suppressed_mixins
        .push("Audited".to_string());

    let err = MappingBuilder::new(schema).build().unwrap_err();
    assert!(matches!(err, MappingError::SuppressedPersistentMixin { .. }));
}

#[test]
fn test_removed_mixin_is_reported() {
    let config = mapping();
    let mut current = MappingSchema::from_json(SCHEMA).unwrap();
    current.entity_mut("Ticket").unwrap().mixins.clear();

    let err = config.validate_mixin_configuration(&current).unwrap_err();
    assert!(matches!(err, MappingError::MixinsRemoved { .. }));
    assert_eq!(
        err.to_string(),
        "One or more persistence-related mixins were removed from the domain object type 'Ticket' \
         after the mapping information was built: 'Audited'."
    );
}

#[test]
fn test_added_mixin_is_reported() {
    let config = mapping();
    let mut current = MappingSchema::from_json(SCHEMA).unwrap();
    current.extensions.push(ExtensionDescriptor::new("Tracked").persistent());
    current
        .entity_mut("Ticket")
        .unwrap()
        .mixins
        .push(MixinApplication::new("Tracked"));

    let err = config.validate_class_mixins("Bug", &current).unwrap_err();
    assert!(matches!(err, MappingError::MixinsAdded { .. }));
    assert_eq!(
        err.to_string(),
        "One or more persistence-related mixins were added to the domain object type 'Ticket' \
         after the mapping information was built: 'Tracked'."
    );
}

#[test]
fn test_unchanged_mixins_validate() {
    let config = mapping();
    let current = MappingSchema::from_json(SCHEMA).unwrap();
    config.validate_mixin_configuration(&current).unwrap();

    // Non-persistent mixins are not recorded.
    let mut with_helper = current.clone();
    with_helper.extensions.push(ExtensionDescriptor::new("Helper"));
    with_helper
        .entity_mut("Ticket")
        .unwrap()
        .mixins
        .push(MixinApplication::new("Helper"));
    config.validate_mixin_configuration(&with_helper).unwrap();
}
