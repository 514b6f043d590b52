//! Command builders.
//!
//! A builder captures everything a statement needs except the dialect;
//! [`DbCommandBuilder::create`] renders the text and binds the parameters.

use std::fmt;
use std::sync::Arc;

use relmap_proto::{Timestamp, Value};
use uuid::Uuid;

use super::command::DbCommand;
use super::dialect::SqlDialect;
use crate::data::{QueryParameter, QueryParameterType};
use crate::mapping::OrderDirection;
use crate::storage::{TableDefinition, CLASS_ID_COLUMN, ID_COLUMN, TIMESTAMP_COLUMN};

/// Renders one command for a dialect.
pub trait DbCommandBuilder: fmt::Debug + Send + Sync {
    /// Render the command.
    fn create(&self, dialect: &dyn SqlDialect) -> DbCommand;
}

/// Columns of a select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectedColumns {
    /// `*`
    All,
    /// An explicit column list.
    Columns(Vec<String>),
}

/// Row restriction of a select.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectFilter {
    /// One identity.
    Id(Uuid),
    /// Several identities.
    Ids(Vec<Uuid>),
    /// A column compared to a value.
    Column {
        /// Compared column.
        column: String,
        /// Required value.
        value: Value,
    },
}

/// `SELECT ... FROM <table> WHERE ...`
#[derive(Debug, Clone, PartialEq)]
pub struct SelectDbCommandBuilder {
    table_name: String,
    columns: SelectedColumns,
    filter: SelectFilter,
    class_ids: Vec<String>,
    order: Vec<(String, OrderDirection)>,
}

impl SelectDbCommandBuilder {
    /// Select every column of the rows matching `filter`.
    pub fn new(table_name: impl Into<String>, filter: SelectFilter) -> Self {
        Self {
            table_name: table_name.into(),
            columns: SelectedColumns::All,
            filter,
            class_ids: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Select only `columns`.
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = SelectedColumns::Columns(columns);
        self
    }

    /// Admit only rows whose class ID is in `class_ids`.
    pub fn with_class_filter(mut self, class_ids: Vec<String>) -> Self {
        self.class_ids = class_ids;
        self
    }

    /// Order the result.
    pub fn with_order(mut self, order: Vec<(String, OrderDirection)>) -> Self {
        self.order = order;
        self
    }

    /// The queried table.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

impl DbCommandBuilder for SelectDbCommandBuilder {
    fn create(&self, dialect: &dyn SqlDialect) -> DbCommand {
        let mut command = DbCommand::default();
        let mut text = format!(
            "SELECT {} FROM {} WHERE ",
            select_list(dialect, &self.columns),
            dialect.delimit_identifier(&self.table_name)
        );

        match &self.filter {
            SelectFilter::Id(id) => {
                let parameter = dialect.parameter_name(ID_COLUMN);
                text.push_str(&format!("{} = {parameter}", dialect.delimit_identifier(ID_COLUMN)));
                command.add_parameter(parameter, Value::Uuid(*id));
            }
            SelectFilter::Ids(ids) if dialect.supports_xml_id_lists() => {
                let parameter = dialect.parameter_name(ID_COLUMN);
                text.push_str(&format!(
                    "{} IN (SELECT T.c.value('.', 'uniqueidentifier') \
                     FROM {parameter}.nodes('/L/I') T(c))",
                    dialect.delimit_identifier(ID_COLUMN)
                ));
                command.add_parameter(parameter, Value::String(xml_id_list(ids)));
            }
            SelectFilter::Ids(ids) => {
                let mut markers = Vec::with_capacity(ids.len());
                for (i, id) in ids.iter().enumerate() {
                    let parameter = dialect.parameter_name(&format!("{ID_COLUMN}{i}"));
                    markers.push(parameter.clone());
                    command.add_parameter(parameter, Value::Uuid(*id));
                }
                text.push_str(&format!(
                    "{} IN ({})",
                    dialect.delimit_identifier(ID_COLUMN),
                    markers.join(", ")
                ));
            }
            SelectFilter::Column { column, value } => {
                let parameter = dialect.parameter_name(column);
                text.push_str(&format!("{} = {parameter}", dialect.delimit_identifier(column)));
                command.add_parameter(parameter, value.clone());
            }
        }

        if !self.class_ids.is_empty() {
            let mut markers = Vec::with_capacity(self.class_ids.len());
            for (i, class_id) in self.class_ids.iter().enumerate() {
                let parameter = dialect.parameter_name(&format!("{CLASS_ID_COLUMN}{i}"));
                markers.push(parameter.clone());
                command.add_parameter(parameter, Value::String(class_id.clone()));
            }
            text.push_str(&format!(
                " AND {} IN ({})",
                dialect.delimit_identifier(CLASS_ID_COLUMN),
                markers.join(", ")
            ));
        }

        text.push_str(&order_by(dialect, &self.order));
        text.push_str(dialect.statement_delimiter());
        command.text = text;
        command
    }
}

/// `SELECT [ID], [ClassID] ... UNION ALL ...` over several tables,
/// resolving the identities of related objects stored in different tables.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionSelectDbCommandBuilder {
    tables: Vec<Arc<TableDefinition>>,
    filter_column: String,
    value: Value,
    order: Vec<(String, OrderDirection)>,
}

impl UnionSelectDbCommandBuilder {
    /// Select the identities in `tables` whose `filter_column` equals `value`.
    pub fn new(
        tables: Vec<Arc<TableDefinition>>,
        filter_column: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            tables,
            filter_column: filter_column.into(),
            value,
            order: Vec::new(),
        }
    }

    /// Order the combined result; the sort columns are selected as well.
    pub fn with_order(mut self, order: Vec<(String, OrderDirection)>) -> Self {
        self.order = order;
        self
    }
}

impl DbCommandBuilder for UnionSelectDbCommandBuilder {
    fn create(&self, dialect: &dyn SqlDialect) -> DbCommand {
        let mut command = DbCommand::default();
        let parameter = dialect.parameter_name(&self.filter_column);
        command.add_parameter(parameter.clone(), self.value.clone());

        let selects: Vec<String> = self
            .tables
            .iter()
            .filter(|t| t.has_column(&self.filter_column))
            .map(|table| {
                let mut columns = vec![
                    dialect.delimit_identifier(ID_COLUMN),
                    dialect.delimit_identifier(CLASS_ID_COLUMN),
                ];
                for (column, _) in &self.order {
                    if table.has_column(column) {
                        columns.push(dialect.delimit_identifier(column));
                    } else {
                        columns.push(format!("NULL AS {}", dialect.delimit_identifier(column)));
                    }
                }
                format!(
                    "SELECT {} FROM {} WHERE {} = {parameter}",
                    columns.join(", "),
                    dialect.delimit_identifier(&table.table_name),
                    dialect.delimit_identifier(&self.filter_column)
                )
            })
            .collect();

        command.text = format!(
            "{}{}{}",
            selects.join(" UNION ALL "),
            order_by(dialect, &self.order),
            dialect.statement_delimiter()
        );
        command
    }
}

/// A user-supplied statement with value and text parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDbCommandBuilder {
    statement: String,
    parameters: Vec<QueryParameter>,
}

impl QueryDbCommandBuilder {
    /// Create a builder for `statement`.
    pub fn new(statement: impl Into<String>, parameters: Vec<QueryParameter>) -> Self {
        Self {
            statement: statement.into(),
            parameters,
        }
    }
}

impl DbCommandBuilder for QueryDbCommandBuilder {
    fn create(&self, dialect: &dyn SqlDialect) -> DbCommand {
        let mut command = DbCommand::default();
        let mut text = self.statement.clone();
        for parameter in &self.parameters {
            match parameter.parameter_type {
                QueryParameterType::Text => {
                    let replacement = match &parameter.value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    text = replace_token(&text, &parameter.name, &replacement);
                }
                QueryParameterType::Value => {
                    command.add_parameter(
                        dialect.parameter_name(&parameter.name),
                        parameter.value.clone(),
                    );
                }
            }
        }
        command.text = text;
        command
    }
}

/// `INSERT INTO <table> (...) VALUES (...)`
#[derive(Debug, Clone, PartialEq)]
pub struct InsertDbCommandBuilder {
    table_name: String,
    values: Vec<(String, Value)>,
}

impl InsertDbCommandBuilder {
    /// Insert one row with the given column values.
    pub fn new(table_name: impl Into<String>, values: Vec<(String, Value)>) -> Self {
        Self {
            table_name: table_name.into(),
            values,
        }
    }
}

impl DbCommandBuilder for InsertDbCommandBuilder {
    fn create(&self, dialect: &dyn SqlDialect) -> DbCommand {
        let mut command = DbCommand::default();
        let mut columns = Vec::with_capacity(self.values.len());
        let mut markers = Vec::with_capacity(self.values.len());
        for (column, value) in &self.values {
            let parameter = dialect.parameter_name(column);
            columns.push(dialect.delimit_identifier(column));
            markers.push(parameter.clone());
            command.add_parameter(parameter, value.clone());
        }
        command.text = format!(
            "INSERT INTO {} ({}) VALUES ({}){}",
            dialect.delimit_identifier(&self.table_name),
            columns.join(", "),
            markers.join(", "),
            dialect.statement_delimiter()
        );
        command
    }
}

/// `UPDATE <table> SET ... WHERE [ID] = @ID [AND [Timestamp] = @Timestamp]`
///
/// With a timestamp the row version is checked and incremented; without one
/// the statement completes a row inserted by the same save.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDbCommandBuilder {
    table_name: String,
    id: Uuid,
    values: Vec<(String, Value)>,
    timestamp: Option<Timestamp>,
}

impl UpdateDbCommandBuilder {
    /// Update the row `id` with the given column values.
    pub fn new(
        table_name: impl Into<String>,
        id: Uuid,
        values: Vec<(String, Value)>,
        timestamp: Option<Timestamp>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            id,
            values,
            timestamp,
        }
    }
}

impl DbCommandBuilder for UpdateDbCommandBuilder {
    fn create(&self, dialect: &dyn SqlDialect) -> DbCommand {
        let mut command = DbCommand::default();
        let mut assignments = Vec::with_capacity(self.values.len() + 1);
        for (column, value) in &self.values {
            let parameter = dialect.parameter_name(column);
            assignments.push(format!("{} = {parameter}", dialect.delimit_identifier(column)));
            command.add_parameter(parameter, value.clone());
        }
        let timestamp_column = dialect.delimit_identifier(TIMESTAMP_COLUMN);
        if self.timestamp.is_some() {
            assignments.push(format!("{timestamp_column} = {timestamp_column} + 1"));
        }

        let id_parameter = dialect.parameter_name(ID_COLUMN);
        let mut text = format!(
            "UPDATE {} SET {} WHERE {} = {id_parameter}",
            dialect.delimit_identifier(&self.table_name),
            assignments.join(", "),
            dialect.delimit_identifier(ID_COLUMN)
        );
        command.add_parameter(id_parameter, Value::Uuid(self.id));

        if let Some(timestamp) = self.timestamp {
            let parameter = dialect.parameter_name(TIMESTAMP_COLUMN);
            text.push_str(&format!(" AND {timestamp_column} = {parameter}"));
            command.add_parameter(parameter, Value::Int64(timestamp.get()));
        }
        text.push_str(dialect.statement_delimiter());
        command.text = text;
        command
    }
}

/// `DELETE FROM <table> WHERE [ID] = @ID AND [Timestamp] = @Timestamp`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteDbCommandBuilder {
    table_name: String,
    id: Uuid,
    timestamp: Timestamp,
}

impl DeleteDbCommandBuilder {
    /// Delete the row `id` if it still has `timestamp`.
    pub fn new(table_name: impl Into<String>, id: Uuid, timestamp: Timestamp) -> Self {
        Self {
            table_name: table_name.into(),
            id,
            timestamp,
        }
    }
}

impl DbCommandBuilder for DeleteDbCommandBuilder {
    fn create(&self, dialect: &dyn SqlDialect) -> DbCommand {
        let mut command = DbCommand::default();
        let id_parameter = dialect.parameter_name(ID_COLUMN);
        let timestamp_parameter = dialect.parameter_name(TIMESTAMP_COLUMN);
        command.text = format!(
            "DELETE FROM {} WHERE {} = {id_parameter} AND {} = {timestamp_parameter}{}",
            dialect.delimit_identifier(&self.table_name),
            dialect.delimit_identifier(ID_COLUMN),
            dialect.delimit_identifier(TIMESTAMP_COLUMN),
            dialect.statement_delimiter()
        );
        command.add_parameter(id_parameter, Value::Uuid(self.id));
        command.add_parameter(timestamp_parameter, Value::Int64(self.timestamp.get()));
        command
    }
}

fn select_list(dialect: &dyn SqlDialect, columns: &SelectedColumns) -> String {
    match columns {
        SelectedColumns::All => "*".to_string(),
        SelectedColumns::Columns(columns) => columns
            .iter()
            .map(|c| dialect.delimit_identifier(c))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn order_by(dialect: &dyn SqlDialect, order: &[(String, OrderDirection)]) -> String {
    if order.is_empty() {
        return String::new();
    }
    let items: Vec<String> = order
        .iter()
        .map(|(column, direction)| format!("{} {direction}", dialect.delimit_identifier(column)))
        .collect();
    format!(" ORDER BY {}", items.join(", "))
}

/// Replace every occurrence of `name` that is not the prefix of a longer
/// identifier, so `@a` leaves `@ab` untouched.
fn replace_token(text: &str, name: &str, replacement: &str) -> String {
    if name.is_empty() {
        return text.to_string();
    }
    let bounded = name.ends_with(is_identifier_char);
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(name) {
        let end = start + name.len();
        result.push_str(&rest[..start]);
        if bounded && rest[end..].starts_with(is_identifier_char) {
            result.push_str(name);
        } else {
            result.push_str(replacement);
        }
        rest = &rest[end..];
    }
    result.push_str(rest);
    result
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn xml_id_list(ids: &[Uuid]) -> String {
    let mut xml = String::from("<L>");
    for id in ids {
        xml.push_str(&format!("<I>{id}</I>"));
    }
    xml.push_str("</L>");
    xml
}
