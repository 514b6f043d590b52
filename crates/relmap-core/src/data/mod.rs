//! Data containers and queries.

mod container;
mod query;

pub use container::{check_value, DataContainer, PropertyValue, StateType};
pub use query::{Query, QueryParameter, QueryParameterType, QueryType};
