//! Persistent mixin discovery.
//!
//! A mixin is persistence relevant if its extension descriptor, or any base
//! extension of it, carries the persistent capability. Only persistence
//! relevant mixins contribute properties to the mapping.

use std::collections::HashSet;

use super::descriptor::{
    EntityDescriptor, ExtensionDescriptor, MappingSchema, MixinApplication, PropertyDescriptor,
};
use super::error::MappingError;

/// A persistent mixin introduced by one class.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistentMixin<'a> {
    /// Display name including generic arguments.
    pub name: String,
    /// The extension descriptor applied.
    pub extension: &'a ExtensionDescriptor,
}

/// Finds the persistence-relevant mixins of entity types.
pub struct PersistentMixinFinder<'a> {
    schema: &'a MappingSchema,
}

impl<'a> PersistentMixinFinder<'a> {
    /// Create a finder over `schema`.
    pub fn new(schema: &'a MappingSchema) -> Self {
        Self { schema }
    }

    /// Check whether `mixin_type` or one of its base extensions is persistent.
    pub fn is_persistent(&self, class_id: &str, mixin_type: &str) -> Result<bool, MappingError> {
        let mut seen = HashSet::new();
        let mut current = Some(mixin_type);
        while let Some(name) = current {
            if !seen.insert(name) {
                return Ok(false);
            }
            let extension = self.schema.extension(name).ok_or_else(|| MappingError::UnknownMixin {
                class_id: class_id.to_string(),
                mixin: name.to_string(),
            })?;
            if extension.persistent {
                return Ok(true);
            }
            current = extension.base_type.as_deref();
        }
        Ok(false)
    }

    /// Persistent mixins applied by `entity` itself.
    ///
    /// Mixins already applied by a base type are not collected again, and a
    /// type may not suppress a persistent mixin its base type applies.
    pub fn find_introduced(
        &self,
        entity: &EntityDescriptor,
    ) -> Result<Vec<PersistentMixin<'a>>, MappingError> {
        let class_id = entity.class_id();
        let inherited = match entity.base_type.as_deref().and_then(|b| self.schema.entity(b)) {
            Some(base) => self.applied_by_hierarchy(base)?,
            None => Vec::new(),
        };

        for suppressed in &entity.suppressed_mixins {
            if let Some((_, owner)) = inherited.iter().find(|(m, _)| &m.mixin_type == suppressed) {
                if self.is_persistent(class_id, suppressed)? {
                    return Err(MappingError::SuppressedPersistentMixin {
                        class_id: class_id.to_string(),
                        mixin: suppressed.clone(),
                        base_class_id: owner.clone(),
                    });
                }
            }
        }

        let mut found = Vec::new();
        for application in &entity.mixins {
            if inherited.iter().any(|(m, _)| m.mixin_type == application.mixin_type) {
                continue;
            }
            if !self.is_persistent(class_id, &application.mixin_type)? {
                continue;
            }
            let extension = self
                .schema
                .extension(&application.mixin_type)
                .ok_or_else(|| MappingError::UnknownMixin {
                    class_id: class_id.to_string(),
                    mixin: application.mixin_type.clone(),
                })?;
            let name = application.display_name(&extension.generic_parameters);
            if application.generic_arguments.len() < extension.generic_parameters.len() {
                return Err(MappingError::OpenGenericMixin {
                    class_id: class_id.to_string(),
                    mixin: name,
                });
            }
            found.push(PersistentMixin { name, extension });
        }
        Ok(found)
    }

    /// Properties a mixin contributes, paired with their declaring extension
    /// type. Base extensions come first.
    pub fn contributed_properties(
        &self,
        extension: &'a ExtensionDescriptor,
    ) -> Vec<(&'a str, &'a PropertyDescriptor)> {
        let mut chain = vec![extension];
        let mut seen: HashSet<&str> = HashSet::from([extension.type_name.as_str()]);
        let mut current = extension.base_type.as_deref();
        while let Some(name) = current {
            match self.schema.extension(name) {
                Some(base) if seen.insert(name) => {
                    chain.push(base);
                    current = base.base_type.as_deref();
                }
                _ => break,
            }
        }
        chain
            .into_iter()
            .rev()
            .flat_map(|ext| ext.properties.iter().map(move |p| (ext.type_name.as_str(), p)))
            .collect()
    }

    /// Mixins applied by `entity` or any of its base types, with the class ID
    /// of the applying type; suppressed mixins are removed.
    fn applied_by_hierarchy(
        &self,
        entity: &'a EntityDescriptor,
    ) -> Result<Vec<(&'a MixinApplication, String)>, MappingError> {
        let mut chain = vec![entity];
        let mut seen: HashSet<&str> = HashSet::from([entity.type_name.as_str()]);
        let mut current = entity.base_type.as_deref();
        while let Some(name) = current {
            match self.schema.entity(name) {
                Some(base) if seen.insert(name) => {
                    chain.push(base);
                    current = base.base_type.as_deref();
                }
                Some(_) => {
                    return Err(MappingError::InheritanceCycle {
                        type_name: name.to_string(),
                    })
                }
                None => break,
            }
        }

        let mut applied: Vec<(&MixinApplication, String)> = Vec::new();
        for descriptor in chain.into_iter().rev() {
            applied.retain(|(m, _)| !descriptor.suppressed_mixins.contains(&m.mixin_type));
            for mixin in &descriptor.mixins {
                if !applied.iter().any(|(m, _)| m.mixin_type == mixin.mixin_type) {
                    applied.push((mixin, descriptor.class_id().to_string()));
                }
            }
        }
        Ok(applied)
    }
}
