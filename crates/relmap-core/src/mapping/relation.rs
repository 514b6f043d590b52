//! Relation definitions between mapped classes.

use serde::{Deserialize, Serialize};

use super::sort::SortExpressionDefinition;

/// Cardinality of a virtual relation end point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    /// A single related object.
    One,
    /// A collection of related objects.
    Many,
}

/// The foreign-key holding side of a relation.
#[derive(Debug, Clone, PartialEq)]
pub struct RealEndPoint {
    /// Class declaring the foreign-key property.
    pub class_id: String,
    /// The foreign-key property (also a property definition of the class).
    pub property_name: String,
    /// Whether a related object must always be set.
    pub is_mandatory: bool,
}

/// The side of a relation without a physical column.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualEndPoint {
    /// Class declaring the property.
    pub class_id: String,
    /// The relation property.
    pub property_name: String,
    /// Whether a related object must always be set.
    pub is_mandatory: bool,
    /// Single object or collection.
    pub cardinality: Cardinality,
    /// Sort expression as declared.
    pub sort_expression_text: Option<String>,
    /// Sort expression resolved against the opposite class.
    pub sort_expression: Option<SortExpressionDefinition>,
}

/// The implicit opposite side of a unidirectional relation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnonymousEndPoint {
    /// The referenced class.
    pub class_id: String,
}

/// One end of a relation.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationEndPointDefinition {
    /// Foreign-key side.
    Real(RealEndPoint),
    /// Collection or single-object side without a column.
    Virtual(VirtualEndPoint),
    /// Opposite of a unidirectional relation.
    Anonymous(AnonymousEndPoint),
}

impl RelationEndPointDefinition {
    /// Class the end point belongs to.
    pub fn class_id(&self) -> &str {
        match self {
            RelationEndPointDefinition::Real(ep) => &ep.class_id,
            RelationEndPointDefinition::Virtual(ep) => &ep.class_id,
            RelationEndPointDefinition::Anonymous(ep) => &ep.class_id,
        }
    }

    /// Property of the end point; anonymous end points have none.
    pub fn property_name(&self) -> Option<&str> {
        match self {
            RelationEndPointDefinition::Real(ep) => Some(&ep.property_name),
            RelationEndPointDefinition::Virtual(ep) => Some(&ep.property_name),
            RelationEndPointDefinition::Anonymous(_) => None,
        }
    }

    /// Check if the end point has no physical column.
    pub fn is_virtual(&self) -> bool {
        matches!(self, RelationEndPointDefinition::Virtual(_))
    }

    /// Check if this is the opposite side of a unidirectional relation.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, RelationEndPointDefinition::Anonymous(_))
    }

    /// Cardinality; real and anonymous end points always reference one object.
    pub fn cardinality(&self) -> Cardinality {
        match self {
            RelationEndPointDefinition::Virtual(ep) => ep.cardinality,
            _ => Cardinality::One,
        }
    }

    /// Check if a related object must always be set.
    pub fn is_mandatory(&self) -> bool {
        match self {
            RelationEndPointDefinition::Real(ep) => ep.is_mandatory,
            RelationEndPointDefinition::Virtual(ep) => ep.is_mandatory,
            RelationEndPointDefinition::Anonymous(_) => false,
        }
    }

    /// Sort expression of a virtual collection end point.
    pub fn sort_expression(&self) -> Option<&SortExpressionDefinition> {
        match self {
            RelationEndPointDefinition::Virtual(ep) => ep.sort_expression.as_ref(),
            _ => None,
        }
    }

    /// The real end point, if this is one.
    pub fn as_real(&self) -> Option<&RealEndPoint> {
        match self {
            RelationEndPointDefinition::Real(ep) => Some(ep),
            _ => None,
        }
    }

    fn matches(&self, class_id: &str, property_name: &str) -> bool {
        self.class_id() == class_id && self.property_name() == Some(property_name)
    }
}

/// Kind of a relation derived from its end points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Both sides reference a single object.
    OneToOne,
    /// One side holds a collection.
    OneToMany,
    /// Only the foreign-key side is navigable.
    Unidirectional,
}

/// A relation between two end points.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDefinition {
    id: String,
    end_points: [RelationEndPointDefinition; 2],
}

impl RelationDefinition {
    /// Create a relation definition from its two end points.
    pub fn new(
        id: impl Into<String>,
        first: RelationEndPointDefinition,
        second: RelationEndPointDefinition,
    ) -> Self {
        Self {
            id: id.into(),
            end_points: [first, second],
        }
    }

    /// The relation ID (name of the foreign-key property).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Both end points.
    pub fn end_points(&self) -> &[RelationEndPointDefinition; 2] {
        &self.end_points
    }

    /// Find the end point declared by `class_id.property_name`.
    pub fn end_point(
        &self,
        class_id: &str,
        property_name: &str,
    ) -> Option<&RelationEndPointDefinition> {
        self.end_points.iter().find(|ep| ep.matches(class_id, property_name))
    }

    /// Check whether the given property is one of the relation's end points.
    pub fn is_end_point(&self, class_id: &str, property_name: &str) -> bool {
        self.end_point(class_id, property_name).is_some()
    }

    /// The end point opposite to `end_point`.
    pub fn opposite_end_point(
        &self,
        end_point: &RelationEndPointDefinition,
    ) -> Option<&RelationEndPointDefinition> {
        if &self.end_points[0] == end_point {
            Some(&self.end_points[1])
        } else if &self.end_points[1] == end_point {
            Some(&self.end_points[0])
        } else {
            None
        }
    }

    /// The end point opposite to the one declared by `class_id.property_name`.
    pub fn opposite_of(
        &self,
        class_id: &str,
        property_name: &str,
    ) -> Option<&RelationEndPointDefinition> {
        self.end_point(class_id, property_name)
            .and_then(|ep| self.opposite_end_point(ep))
    }

    /// The foreign-key holding end point.
    pub fn real_end_point(&self) -> Option<&RealEndPoint> {
        self.end_points.iter().find_map(RelationEndPointDefinition::as_real)
    }

    /// Classify the relation.
    pub fn kind(&self) -> RelationKind {
        if self.end_points.iter().any(RelationEndPointDefinition::is_anonymous) {
            RelationKind::Unidirectional
        } else if self
            .end_points
            .iter()
            .any(|ep| ep.cardinality() == Cardinality::Many)
        {
            RelationKind::OneToMany
        } else {
            RelationKind::OneToOne
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_items() -> RelationDefinition {
        RelationDefinition::new(
            "OrderItem.Order",
            RelationEndPointDefinition::Real(RealEndPoint {
                class_id: "OrderItem".into(),
                property_name: "OrderItem.Order".into(),
                is_mandatory: true,
            }),
            RelationEndPointDefinition::Virtual(VirtualEndPoint {
                class_id: "Order".into(),
                property_name: "Order.OrderItems".into(),
                is_mandatory: false,
                cardinality: Cardinality::Many,
                sort_expression_text: None,
                sort_expression: None,
            }),
        )
    }

    #[test]
    fn test_opposite_end_points_are_symmetric() {
        let rel = order_items();
        let [a, b] = rel.end_points();

        assert_eq!(rel.opposite_end_point(a), Some(b));
        assert_eq!(rel.opposite_end_point(b), Some(a));
        assert_eq!(rel.kind(), RelationKind::OneToMany);
    }

    #[test]
    fn test_end_point_lookup_is_two_valued() {
        let rel = order_items();

        assert!(rel.is_end_point("Order", "Order.OrderItems"));
        assert!(!rel.is_end_point("Order", "Order.Customer"));
        assert!(rel.end_point("Customer", "Order.OrderItems").is_none());
        assert_eq!(
            rel.opposite_of("Order", "Order.OrderItems").map(|ep| ep.class_id()),
            Some("OrderItem")
        );
    }

    #[test]
    fn test_unidirectional_relation() {
        let rel = RelationDefinition::new(
            "Order.Official",
            RelationEndPointDefinition::Real(RealEndPoint {
                class_id: "Order".into(),
                property_name: "Order.Official".into(),
                is_mandatory: false,
            }),
            RelationEndPointDefinition::Anonymous(AnonymousEndPoint {
                class_id: "Official".into(),
            }),
        );

        assert_eq!(rel.kind(), RelationKind::Unidirectional);
        assert_eq!(rel.real_end_point().map(|ep| ep.class_id.as_str()), Some("Order"));
        assert!(rel.end_points()[1].property_name().is_none());
    }
}
