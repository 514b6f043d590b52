//! Assigns a storage entity definition to every class of a mapping.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::entity::{
    ColumnDefinition, ColumnKind, EntityDefinition, FilterViewDefinition, NullEntityDefinition,
    TableDefinition, UnionViewDefinition, CLASS_ID_COLUMN, ID_COLUMN, TIMESTAMP_COLUMN,
};
use crate::mapping::{ClassDefinition, MappingConfiguration, MappingError, PropertyDefinition};

/// Class owning the table `class_id` is stored in: the topmost class of the
/// chain from the root down to `class_id` that names an entity.
pub(crate) fn table_owner<'a>(
    config: &'a MappingConfiguration,
    class_id: &str,
) -> Option<&'a ClassDefinition> {
    let class = config.find_class(class_id)?;
    let mut chain = config.ancestors(class_id);
    chain.reverse();
    chain.push(class);
    chain.into_iter().find(|c| c.entity_name().is_some())
}

/// Record that `property` stores its value in `column`. Fails for the
/// system columns and for columns another property already uses.
pub(crate) fn claim_column<'a>(
    claimed: &mut HashMap<String, &'a PropertyDefinition>,
    column: &str,
    property: &'a PropertyDefinition,
) -> Result<(), MappingError> {
    if [ID_COLUMN, CLASS_ID_COLUMN, TIMESTAMP_COLUMN]
        .iter()
        .any(|system| system.eq_ignore_ascii_case(column))
    {
        return Err(MappingError::ReservedColumn {
            class_id: property.class_id().to_string(),
            property: property.name().to_string(),
            column: column.to_string(),
        });
    }
    if let Some(other) = claimed.insert(column.to_string(), property) {
        return Err(MappingError::DuplicateColumn {
            class_id: property.class_id().to_string(),
            property: property.name().to_string(),
            column: column.to_string(),
            other_class_id: other.class_id().to_string(),
            other_property: other.name().to_string(),
        });
    }
    Ok(())
}

/// Assign storage entities to every class of `config`.
pub(crate) fn assign_storage_entities(
    config: &mut MappingConfiguration,
) -> Result<(), MappingError> {
    let mut tables: HashMap<String, Arc<TableDefinition>> = HashMap::new();
    let mut assignments = Vec::new();

    let class_ids: Vec<String> = config.classes().map(|c| c.id().to_string()).collect();
    for class_id in &class_ids {
        let entity = entity_for(config, class_id, &mut tables)?;
        debug!(
            class_id = %class_id,
            entity = %entity,
            kind = entity.kind_name(),
            "storage entity assigned"
        );
        assignments.push((class_id.clone(), entity));
    }

    for (class_id, entity) in assignments {
        config.class_mut(&class_id)?.set_storage_entity(entity);
    }
    Ok(())
}

fn entity_for(
    config: &MappingConfiguration,
    class_id: &str,
    tables: &mut HashMap<String, Arc<TableDefinition>>,
) -> Result<EntityDefinition, MappingError> {
    let class = config.get_class(class_id)?;

    if let Some(owner) = table_owner(config, class_id) {
        let table = table_of(config, owner, tables)?;
        if owner.id() == class_id {
            return Ok(EntityDefinition::Table(table));
        }
        let mut class_ids = vec![class_id.to_string()];
        class_ids.extend(config.descendants(class_id).iter().map(|c| c.id().to_string()));
        return Ok(EntityDefinition::FilterView(FilterViewDefinition {
            base_table: table,
            class_ids,
        }));
    }

    let mut union_tables = Vec::new();
    collect_descendant_tables(config, class, tables, &mut union_tables)?;
    if union_tables.is_empty() {
        return Ok(EntityDefinition::Null(NullEntityDefinition {
            storage_provider_id: class.storage_provider_id().to_string(),
        }));
    }

    let mut columns: Vec<ColumnDefinition> = Vec::new();
    for table in &union_tables {
        for column in &table.columns {
            match columns.iter_mut().find(|c| c.name == column.name) {
                Some(existing) => existing.is_nullable |= column.is_nullable,
                None => columns.push(column.clone()),
            }
        }
    }
    for column in &mut columns {
        if union_tables.iter().any(|t| !t.has_column(&column.name)) {
            column.is_nullable = true;
        }
    }

    Ok(EntityDefinition::UnionView(UnionViewDefinition {
        storage_provider_id: class.storage_provider_id().to_string(),
        tables: union_tables,
        columns,
    }))
}

/// Nearest descendant tables: a descendant owning a table hides the
/// descendants below it, which share that table.
fn collect_descendant_tables(
    config: &MappingConfiguration,
    class: &ClassDefinition,
    tables: &mut HashMap<String, Arc<TableDefinition>>,
    found: &mut Vec<Arc<TableDefinition>>,
) -> Result<(), MappingError> {
    for derived_id in class.derived_class_ids() {
        let derived = config.get_class(derived_id)?;
        if derived.entity_name().is_some() {
            found.push(table_of(config, derived, tables)?);
        } else {
            collect_descendant_tables(config, derived, tables, found)?;
        }
    }
    Ok(())
}

fn table_of(
    config: &MappingConfiguration,
    owner: &ClassDefinition,
    tables: &mut HashMap<String, Arc<TableDefinition>>,
) -> Result<Arc<TableDefinition>, MappingError> {
    if let Some(table) = tables.get(owner.id()) {
        return Ok(Arc::clone(table));
    }

    let table_name = owner.entity_name().unwrap_or(owner.id()).to_string();
    let mut columns = ColumnDefinition::system_columns();

    let mut properties = config.all_properties(owner.id())?;
    properties.extend(
        config
            .descendants(owner.id())
            .into_iter()
            .flat_map(|c| c.my_properties().iter()),
    );

    let mut claimed = HashMap::new();
    for property in properties.into_iter().filter(|p| p.is_persistent()) {
        let column = property.column_name()?;
        claim_column(&mut claimed, column, property)?;
        let shared = property.class_id() != owner.id()
            && config
                .ancestors(owner.id())
                .iter()
                .all(|a| a.id() != property.class_id());
        columns.push(ColumnDefinition::new(
            column,
            ColumnKind::Property {
                property_name: property.name().to_string(),
            },
            property.is_nullable() || shared,
        ));
        if property.is_object_id()
            && config.has_class_id_column(property.class_id(), property.name())
        {
            let class_id_column = property.class_id_column_name()?;
            claim_column(&mut claimed, &class_id_column, property)?;
            columns.push(ColumnDefinition::new(
                class_id_column,
                ColumnKind::RelationClassId {
                    property_name: property.name().to_string(),
                },
                property.is_nullable() || shared,
            ));
        }
    }

    let table = Arc::new(TableDefinition {
        storage_provider_id: owner.storage_provider_id().to_string(),
        table_name,
        columns,
    });
    tables.insert(owner.id().to_string(), Arc::clone(&table));
    Ok(table)
}
