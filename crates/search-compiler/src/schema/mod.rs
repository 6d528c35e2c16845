//! Resource type schema and search parameter registry.
//!
//! The compiler reads the schema only through [`SchemaProvider`]; the
//! crate's own implementation is the immutable [`SearchParameterRegistry`]
//! built by [`SearchParameterLoader`].

mod definition;
mod loader;
mod registry;

pub use definition::{ResourceTypeSchema, SearchParameterDefinition, SearchParameterStatus};
pub use loader::{SearchParameterLoader, TARGET_TYPE_REQUIRED_EXTENSION};
pub use registry::{RegistryBuilder, SchemaProvider, SearchParameterRegistry};

/// The root of the resource type hierarchy.
pub const RESOURCE_BASE_TYPE: &str = "Resource";
