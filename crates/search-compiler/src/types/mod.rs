//! Core search types: value types, modifiers, prefixes, typed values, and
//! the compiled query.

mod query;
mod search_params;
mod value;

pub use query::{
    ChainNode, CompiledQuery, IncludeParameter, IncludeSpec, ParameterExpression, QueryTerm,
    ReverseChainNode,
};
pub use search_params::{SearchModifier, SearchParamType, SearchPrefix, is_type_name};
pub use value::TypedValue;
