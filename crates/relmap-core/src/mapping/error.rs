//! Mapping-specific error types.

use thiserror::Error;

/// Structural violations detected while building or validating a mapping.
///
/// Messages name the offending classes and properties verbatim; a mapping
/// error always aborts the whole build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// Two types share one class ID.
    #[error(
        "Class IDs must be unique: types '{first_type}' and '{second_type}' both use class ID \
         '{class_id}'."
    )]
    DuplicateClassId {
        /// The duplicated class ID.
        class_id: String,
        /// First type using the ID.
        first_type: String,
        /// Second type using the ID.
        second_type: String,
    },

    /// A base type is not part of the schema.
    #[error(
        "Type '{type_name}' derives from '{base_type}', which is not a mapped domain object type."
    )]
    UnknownBaseType {
        /// The derived type.
        type_name: String,
        /// The unresolved base type.
        base_type: String,
    },

    /// The inheritance chain loops back onto itself.
    #[error("The inheritance chain of type '{type_name}' contains a cycle.")]
    InheritanceCycle {
        /// A type on the cycle.
        type_name: String,
    },

    /// A class's declared base type is not the type of its base class definition.
    #[error(
        "Type '{type_name}' of class '{class_id}' is not derived from type '{base_type_name}' of \
         base class '{base_class_id}'."
    )]
    TypeNotAssignable {
        /// The derived class.
        class_id: String,
        /// The derived class's type.
        type_name: String,
        /// The base class.
        base_class_id: String,
        /// The base class's type.
        base_type_name: String,
    },

    /// A class and its base class use different storage providers.
    #[error(
        "Cannot derive class '{class_id}' from base class '{base_class_id}' handled by different \
         storage providers."
    )]
    StorageProviderMismatch {
        /// The derived class.
        class_id: String,
        /// The base class.
        base_class_id: String,
    },

    /// A class declares the same property name twice.
    #[error("Class '{class_id}' defines property '{property}' more than once.")]
    DuplicateProperty {
        /// The class.
        class_id: String,
        /// The duplicated property name.
        property: String,
    },

    /// A class redeclares a property defined by an ancestor.
    #[error(
        "Class '{class_id}' must not define property '{property}', because base class \
         '{ancestor_id}' already defines a property with the same name."
    )]
    PropertyDefinedByAncestor {
        /// The derived class.
        class_id: String,
        /// The duplicated property name.
        property: String,
        /// The ancestor that already defines it.
        ancestor_id: String,
    },

    /// A property definition was added to a class it was not created for.
    #[error(
        "Property '{property}' cannot be added to class '{class_id}', because it was initialized \
         for class '{owner_id}'."
    )]
    PropertyOwnedByOtherClass {
        /// The property.
        property: String,
        /// The class it was added to.
        class_id: String,
        /// The class it belongs to.
        owner_id: String,
    },

    /// A max length was supplied for a type that has no length.
    #[error(
        "MaxLength parameter can only be supplied for strings and byte arrays but property \
         '{property}' is of type '{property_type}'."
    )]
    InvalidMaxLength {
        /// The property.
        property: String,
        /// Its declared type.
        property_type: String,
    },

    /// A nullability override was supplied for a value type.
    #[error(
        "IsNullable parameter can only be supplied for reference types but property '{property}' \
         is of type '{property_type}'."
    )]
    InvalidNullability {
        /// The property.
        property: String,
        /// Its declared type.
        property_type: String,
    },

    /// The column name of a non-persistent property was requested.
    #[error(
        "Cannot access the column name of property '{property}', because it is not a persistent \
         property."
    )]
    NonPersistentColumnAccess {
        /// The property.
        property: String,
    },

    /// Two properties stored in one table use the same column.
    #[error(
        "Property '{property}' of class '{class_id}' must not use column '{column}', because \
         property '{other_property}' of class '{other_class_id}' in the same table already uses it."
    )]
    DuplicateColumn {
        /// The class declaring the second property.
        class_id: String,
        /// The second property.
        property: String,
        /// The shared column.
        column: String,
        /// The class declaring the first property.
        other_class_id: String,
        /// The first property.
        other_property: String,
    },

    /// A property is mapped to one of the columns every table reserves.
    #[error(
        "Property '{property}' of class '{class_id}' must not use column '{column}', which is \
         reserved for the object identity, class ID and row version."
    )]
    ReservedColumn {
        /// The class declaring the property.
        class_id: String,
        /// The property.
        property: String,
        /// The reserved column.
        column: String,
    },

    /// A relation property references a type outside the mapping.
    #[error(
        "Property '{property}' of class '{class_id}' references type '{target}', which is not a \
         mapped domain object type."
    )]
    RelationTargetNotMapped {
        /// The class declaring the relation property.
        class_id: String,
        /// The relation property.
        property: String,
        /// The unresolved target type.
        target: String,
    },

    /// The opposite property named by a relation does not exist.
    #[error(
        "Opposite relation property '{opposite_property}' of property '{property}' declared on \
         type '{type_name}' could not be found on type '{opposite_type}'."
    )]
    OppositePropertyNotFound {
        /// The relation property.
        property: String,
        /// The declaring type.
        type_name: String,
        /// The missing opposite property.
        opposite_property: String,
        /// The type searched.
        opposite_type: String,
    },

    /// The opposite property does not name this property as its opposite.
    #[error(
        "Opposite relation property '{opposite_property}' declared on type '{opposite_type}' does \
         not point back to property '{property}' declared on type '{type_name}'."
    )]
    OppositePropertyMismatch {
        /// The relation property.
        property: String,
        /// The declaring type.
        type_name: String,
        /// The opposite property.
        opposite_property: String,
        /// The opposite type.
        opposite_type: String,
    },

    /// The opposite property references a different type.
    #[error(
        "The declaring type '{type_name}' of property '{property}' does not match the type \
         '{referenced_type}' referenced by the opposite relation property '{opposite_property}' \
         declared on type '{opposite_type}'."
    )]
    OppositeTypeMismatch {
        /// The relation property.
        property: String,
        /// The declaring type.
        type_name: String,
        /// The type referenced by the opposite property.
        referenced_type: String,
        /// The opposite property.
        opposite_property: String,
        /// The opposite type.
        opposite_type: String,
    },

    /// Both ends of a relation are virtual.
    #[error("Relation '{relation_id}' cannot have two virtual end points.")]
    TwoVirtualEndPoints {
        /// The relation.
        relation_id: String,
    },

    /// Both ends of a relation hold a foreign key.
    #[error("Relation '{relation_id}' cannot have two non-virtual end points.")]
    TwoNonVirtualEndPoints {
        /// The relation.
        relation_id: String,
    },

    /// A collection property does not name its opposite property.
    #[error(
        "Collection property '{property}' of class '{class_id}' must specify an opposite property."
    )]
    CollectionWithoutOpposite {
        /// The class.
        class_id: String,
        /// The collection property.
        property: String,
    },

    /// A sort expression was declared on the foreign-key side of a relation.
    #[error(
        "Property '{property}' of class '{class_id}' must not specify a sort expression, because \
         it holds the foreign key."
    )]
    SortExpressionOnRealEndPoint {
        /// The class.
        class_id: String,
        /// The property.
        property: String,
    },

    /// A sort expression was declared on a single-valued virtual end point.
    #[error(
        "Property '{property}' of class '{class_id}' must not specify a sort expression, because \
         its cardinality is 'One'."
    )]
    SortExpressionOnSingleEndPoint {
        /// The class.
        class_id: String,
        /// The property.
        property: String,
    },

    /// A sort expression is malformed or names an unusable property.
    #[error("Sort expression '{expression}' cannot be parsed: {reason}")]
    InvalidSortExpression {
        /// The expression text.
        expression: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A mixin applied to a class is not described.
    #[error("Mixin '{mixin}' applied to class '{class_id}' is not described in the schema.")]
    UnknownMixin {
        /// The class.
        class_id: String,
        /// The unknown mixin.
        mixin: String,
    },

    /// A persistent mixin was applied with open generic parameters.
    #[error(
        "The persistence-relevant mixin '{mixin}' applied to class '{class_id}' has open generic \
         type parameters. All type parameters of the mixin must be specified when it is applied \
         to a domain object."
    )]
    OpenGenericMixin {
        /// The class.
        class_id: String,
        /// The mixin.
        mixin: String,
    },

    /// A derived class suppresses a persistent mixin of its base class.
    #[error(
        "Class '{class_id}' suppresses mixin '{mixin}' inherited from its base class \
         '{base_class_id}'. This is not allowed because the mixin adds persistence information to \
         the base class which must also be present in the derived class."
    )]
    SuppressedPersistentMixin {
        /// The derived class.
        class_id: String,
        /// The suppressed mixin.
        mixin: String,
        /// The base class applying the mixin.
        base_class_id: String,
    },

    /// Persistent mixins disappeared since the mapping was built.
    #[error(
        "One or more persistence-related mixins were removed from the domain object type \
         '{type_name}' after the mapping information was built: '{mixins}'."
    )]
    MixinsRemoved {
        /// The affected type.
        type_name: String,
        /// Comma-separated removed mixins.
        mixins: String,
    },

    /// Persistent mixins appeared since the mapping was built.
    #[error(
        "One or more persistence-related mixins were added to the domain object type \
         '{type_name}' after the mapping information was built: '{mixins}'."
    )]
    MixinsAdded {
        /// The affected type.
        type_name: String,
        /// Comma-separated added mixins.
        mixins: String,
    },

    /// A derived class names a table different from the inherited one.
    #[error(
        "Class '{class_id}' must not specify an entity name '{entity_name}' which is different \
         from inherited entity name '{inherited_entity_name}'."
    )]
    EntityNameMismatch {
        /// The derived class.
        class_id: String,
        /// Its entity name.
        entity_name: String,
        /// The inherited entity name.
        inherited_entity_name: String,
    },

    /// A concrete class has no table on itself or any ancestor.
    #[error(
        "Neither class '{class_id}' nor its base classes are mapped to a table. Make class \
         '{class_id}' abstract or define a table for it or one of its base classes."
    )]
    NoTableForConcreteClass {
        /// The class.
        class_id: String,
    },

    /// A class ID lookup failed.
    #[error("Mapping does not contain class '{class_id}'.")]
    ClassNotFound {
        /// The requested class ID.
        class_id: String,
    },

    /// A type lookup failed.
    #[error("Mapping does not contain type '{type_name}'.")]
    TypeNotFound {
        /// The requested type.
        type_name: String,
    },

    /// A property lookup failed.
    #[error("Class '{class_id}' does not define property '{property}'.")]
    PropertyNotFound {
        /// The class.
        class_id: String,
        /// The requested property.
        property: String,
    },

    /// The class has not been assigned a storage entity yet.
    #[error("The storage entity definition of class '{class_id}' has not been assigned.")]
    StorageEntityNotAssigned {
        /// The class.
        class_id: String,
    },

    /// The schema description itself could not be read.
    #[error("invalid mapping schema: {0}")]
    InvalidSchema(String),
}
