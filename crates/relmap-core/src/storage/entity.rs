//! Storage entity definitions.

use std::fmt;
use std::sync::Arc;

/// Name of the identity column.
pub const ID_COLUMN: &str = "ID";
/// Name of the class discriminator column.
pub const CLASS_ID_COLUMN: &str = "ClassID";
/// Name of the optimistic-concurrency column.
pub const TIMESTAMP_COLUMN: &str = "Timestamp";

/// What a column stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    /// The object identity value.
    ObjectId,
    /// The class discriminator.
    ClassId,
    /// The row version.
    Timestamp,
    /// A persistent property.
    Property {
        /// Full name of the property.
        property_name: String,
    },
    /// Class ID of the object referenced by a relation property.
    RelationClassId {
        /// Full name of the relation property.
        property_name: String,
    },
}

/// A physical column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// What the column stores.
    pub kind: ColumnKind,
    /// Whether the column accepts NULL.
    pub is_nullable: bool,
}

impl ColumnDefinition {
    /// Create a column definition.
    pub fn new(name: impl Into<String>, kind: ColumnKind, is_nullable: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            is_nullable,
        }
    }

    /// The three columns every table starts with.
    pub fn system_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new(ID_COLUMN, ColumnKind::ObjectId, false),
            ColumnDefinition::new(CLASS_ID_COLUMN, ColumnKind::ClassId, false),
            ColumnDefinition::new(TIMESTAMP_COLUMN, ColumnKind::Timestamp, false),
        ]
    }
}

/// A physical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    /// Storage provider handling the table.
    pub storage_provider_id: String,
    /// Table name.
    pub table_name: String,
    /// Columns in table order, system columns first.
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check if the table has a column named `name`.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

/// A class-ID filter over an ancestor's table (single-table inheritance).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterViewDefinition {
    /// The shared table.
    pub base_table: Arc<TableDefinition>,
    /// Class IDs admitted by the filter: the class and its descendants.
    pub class_ids: Vec<String>,
}

/// The union of the tables of a class's descendants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionViewDefinition {
    /// Storage provider handling the tables.
    pub storage_provider_id: String,
    /// The concrete tables, in hierarchy order.
    pub tables: Vec<Arc<TableDefinition>>,
    /// Union of the columns of every table.
    pub columns: Vec<ColumnDefinition>,
}

/// Marks a class without physical storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullEntityDefinition {
    /// Storage provider handling the class.
    pub storage_provider_id: String,
}

/// Physical backing of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityDefinition {
    /// The class owns a table.
    Table(Arc<TableDefinition>),
    /// The class shares an ancestor's table.
    FilterView(FilterViewDefinition),
    /// The class's instances live in several descendant tables.
    UnionView(UnionViewDefinition),
    /// The class has no storage.
    Null(NullEntityDefinition),
}

impl EntityDefinition {
    /// Storage provider handling the entity.
    pub fn storage_provider_id(&self) -> &str {
        match self {
            EntityDefinition::Table(t) => &t.storage_provider_id,
            EntityDefinition::FilterView(v) => &v.base_table.storage_provider_id,
            EntityDefinition::UnionView(v) => &v.storage_provider_id,
            EntityDefinition::Null(n) => &n.storage_provider_id,
        }
    }

    /// Columns visible through the entity.
    pub fn columns(&self) -> &[ColumnDefinition] {
        match self {
            EntityDefinition::Table(t) => &t.columns,
            EntityDefinition::FilterView(v) => &v.base_table.columns,
            EntityDefinition::UnionView(v) => &v.columns,
            EntityDefinition::Null(_) => &[],
        }
    }

    /// Look up a visible column.
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns().iter().find(|c| c.name == name)
    }

    /// The single physical table a row of this entity lives in.
    ///
    /// Only tables and filter views identify one table; union views and
    /// null entities are lookup targets only.
    pub fn physical_table(&self) -> Option<&Arc<TableDefinition>> {
        match self {
            EntityDefinition::Table(t) => Some(t),
            EntityDefinition::FilterView(v) => Some(&v.base_table),
            EntityDefinition::UnionView(_) | EntityDefinition::Null(_) => None,
        }
    }

    /// Fold over every table the entity refers to.
    pub fn fold_tables<'a, T, F>(&'a self, init: T, mut f: F) -> T
    where
        F: FnMut(T, &'a Arc<TableDefinition>) -> T,
    {
        match self {
            EntityDefinition::Table(t) => f(init, t),
            EntityDefinition::FilterView(v) => f(init, &v.base_table),
            EntityDefinition::UnionView(v) => v.tables.iter().fold(init, f),
            EntityDefinition::Null(_) => init,
        }
    }

    /// Every table the entity refers to.
    pub fn tables(&self) -> Vec<&Arc<TableDefinition>> {
        self.fold_tables(Vec::new(), |mut acc, t| {
            acc.push(t);
            acc
        })
    }

    /// Short variant name, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            EntityDefinition::Table(_) => "TableDefinition",
            EntityDefinition::FilterView(_) => "FilterViewDefinition",
            EntityDefinition::UnionView(_) => "UnionViewDefinition",
            EntityDefinition::Null(_) => "NullEntityDefinition",
        }
    }
}

impl fmt::Display for EntityDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityDefinition::Table(t) => f.write_str(&t.table_name),
            EntityDefinition::FilterView(v) => write!(f, "{} (filtered)", v.base_table.table_name),
            EntityDefinition::UnionView(v) => {
                let names: Vec<&str> = v.tables.iter().map(|t| t.table_name.as_str()).collect();
                write!(f, "union of {}", names.join(", "))
            }
            EntityDefinition::Null(_) => f.write_str("null entity"),
        }
    }
}
