//! Sort expressions of virtual collection end points.
//!
//! A sort expression is a comma-separated list of `<property> [asc|desc]`
//! tokens. Property names are resolved against the collected class: the
//! short name of a property declared by the class or its base classes, or
//! the full dotted name of any property in the hierarchy (needed for mixin
//! and derived-class properties, or to resolve ambiguities).

use std::fmt;

use super::error::MappingError;
use super::property::PropertyDefinition;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => f.write_str("ASC"),
            OrderDirection::Desc => f.write_str("DESC"),
        }
    }
}

/// One resolved `(property, direction)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedProperty {
    /// Full name of the sorted property.
    pub property_name: String,
    /// Column storing the property.
    pub column_name: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

/// A parsed sort expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortExpressionDefinition {
    properties: Vec<SortedProperty>,
}

impl SortExpressionDefinition {
    /// Create a sort expression from resolved properties.
    pub fn new(properties: Vec<SortedProperty>) -> Self {
        Self { properties }
    }

    /// Parse `expression` for the collected class `class_id`.
    ///
    /// `visible` holds the properties of the class and its base classes,
    /// `hierarchy` additionally the properties of derived classes.
    pub fn parse(
        expression: &str,
        class_id: &str,
        visible: &[&PropertyDefinition],
        hierarchy: &[&PropertyDefinition],
    ) -> Result<Self, MappingError> {
        let fail = |reason: String| MappingError::InvalidSortExpression {
            expression: expression.to_string(),
            reason,
        };

        let mut properties = Vec::new();
        for token in expression.split(',') {
            let mut words = token.split_whitespace();
            let name = words.next().ok_or_else(|| {
                fail("the expression contains an empty sort specification.".to_string())
            })?;
            let direction = match words.next() {
                None => OrderDirection::Asc,
                Some(word) if word.eq_ignore_ascii_case("asc") => OrderDirection::Asc,
                Some(word) if word.eq_ignore_ascii_case("desc") => OrderDirection::Desc,
                Some(word) => {
                    return Err(fail(format!(
                        "'{word}' is not a valid sort order. Expected 'asc' or 'desc'."
                    )));
                }
            };
            if let Some(extra) = words.next() {
                return Err(fail(format!(
                    "unexpected token '{extra}' after the sort specification of '{name}'."
                )));
            }

            let property = resolve_property(name, class_id, visible, hierarchy).map_err(fail)?;
            if !property.is_persistent() {
                return Err(fail(format!(
                    "the property '{}' is not a persistent property.",
                    property.name()
                )));
            }
            let column_name = property
                .column_name()
                .map_err(|e| fail(e.to_string()))?
                .to_string();
            properties.push(SortedProperty {
                property_name: property.name().to_string(),
                column_name,
                direction,
            });
        }

        Ok(Self { properties })
    }

    /// The sorted properties in priority order.
    pub fn properties(&self) -> &[SortedProperty] {
        &self.properties
    }

    /// Ordered `(column, direction)` tuples.
    pub fn ordered_columns(&self) -> Vec<(String, OrderDirection)> {
        self.properties
            .iter()
            .map(|p| (p.column_name.clone(), p.direction))
            .collect()
    }
}

impl fmt::Display for SortExpressionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.properties.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", p.property_name, p.direction)?;
        }
        Ok(())
    }
}

fn resolve_property<'a>(
    name: &str,
    class_id: &str,
    visible: &[&'a PropertyDefinition],
    hierarchy: &[&'a PropertyDefinition],
) -> Result<&'a PropertyDefinition, String> {
    if let Some(p) = hierarchy.iter().find(|p| p.name() == name) {
        return Ok(p);
    }

    let candidates: Vec<&PropertyDefinition> = visible
        .iter()
        .copied()
        .filter(|p| p.short_name() == name)
        .collect();
    match candidates.as_slice() {
        [single] => Ok(single),
        [] => Err(format!(
            "'{name}' is not a valid mapped property name. Expected the name of a property \
             declared by the '{class_id}' class or its base classes, or the full property name of \
             a property in its hierarchy."
        )),
        _ => Err(format!(
            "'{name}' is ambiguous in class '{class_id}'. Use the full property name instead."
        )),
    }
}
