//! Structural checks run on a mapping after its relations are reflected.

use std::collections::HashMap;

use super::class::ClassDefinition;
use super::configuration::MappingConfiguration;
use super::error::MappingError;
use crate::storage::{claim_column, table_owner};

/// Run every class-level and table-level check.
pub(crate) fn validate(config: &MappingConfiguration) -> Result<(), MappingError> {
    for class in config.classes() {
        check_entity_name(config, class)?;
        check_concrete_class_has_table(config, class)?;
    }
    for class in config.classes() {
        if table_owner(config, class.id()).map(ClassDefinition::id) == Some(class.id()) {
            check_unique_columns(config, class)?;
        }
    }
    Ok(())
}

fn check_entity_name(
    config: &MappingConfiguration,
    class: &ClassDefinition,
) -> Result<(), MappingError> {
    let Some(entity_name) = class.entity_name() else {
        return Ok(());
    };
    let inherited = config
        .ancestors(class.id())
        .into_iter()
        .find_map(ClassDefinition::entity_name);
    match inherited {
        Some(inherited) if inherited != entity_name => Err(MappingError::EntityNameMismatch {
            class_id: class.id().to_string(),
            entity_name: entity_name.to_string(),
            inherited_entity_name: inherited.to_string(),
        }),
        _ => Ok(()),
    }
}

fn check_concrete_class_has_table(
    config: &MappingConfiguration,
    class: &ClassDefinition,
) -> Result<(), MappingError> {
    if class.is_abstract() || table_owner(config, class.id()).is_some() {
        return Ok(());
    }
    Err(MappingError::NoTableForConcreteClass {
        class_id: class.id().to_string(),
    })
}

/// Every persistent property stored in the table of `owner` needs its own
/// column, apart from the system columns and the class ID companions of
/// relation properties.
fn check_unique_columns(
    config: &MappingConfiguration,
    owner: &ClassDefinition,
) -> Result<(), MappingError> {
    let mut properties = config.all_properties(owner.id())?;
    properties.extend(
        config
            .descendants(owner.id())
            .into_iter()
            .flat_map(|c| c.my_properties().iter()),
    );

    let mut columns = HashMap::new();
    for property in properties.into_iter().filter(|p| p.is_persistent()) {
        claim_column(&mut columns, property.column_name()?, property)?;
        if property.is_object_id()
            && config.has_class_id_column(property.class_id(), property.name())
        {
            claim_column(&mut columns, &property.class_id_column_name()?, property)?;
        }
    }
    Ok(())
}
