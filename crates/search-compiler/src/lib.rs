//! Helios FHIR Server Search Compiler
//!
//! This crate turns the raw query parameters of a FHIR search request into a
//! validated, fully typed [`CompiledQuery`] that a storage layer can execute.
//! It performs no I/O during compilation: every decision is made against an
//! immutable search parameter registry and per-tenant restriction policies.
//!
//! # Features
//!
//! - **Parameter grammar**: modifiers, comparator prefixes, chained
//!   parameters (`subject:Patient.name`), `_has` reverse chains, FHIR escapes
//! - **Type-directed resolution**: every chain hop is checked against the
//!   reference targets declared in the registry, with base-type inheritance
//! - **Tenant restrictions**: allowed comparators, modifiers, OR/AND use,
//!   parameter combinations and `_include`/`_revinclude` directives
//! - **Hot reload**: registries and policies are swapped as whole snapshots
//!
//! # Architecture
//!
//! - [`parse`] - Query tokens and the parameter name grammar
//! - [`schema`] - Search parameter registry and its loader
//! - [`resolve`] - Chain, reverse chain, modifier and include resolution
//! - [`tenant`] - Tenant ids and restriction policies
//! - [`restrict`] - Policy enforcement
//! - [`compiler`] - The per-request pipeline
//! - [`service`] - Snapshot-holding entry point
//!
//! # Quick Start
//!
//! ```
//! use helios_search_compiler::{
//!     CompilerConfig, QueryCompiler, RawQuery, SearchParameterLoader, TenantId, TenantPolicies,
//! };
//!
//! let registry = SearchParameterLoader::new().load_embedded().unwrap();
//! let policies = TenantPolicies::new();
//! let config = CompilerConfig::default();
//! let compiler = QueryCompiler::new(&registry, &policies, &config);
//!
//! let query = RawQuery::from_pairs([
//!     ("_has:Procedure:subject:status", "completed"),
//!     ("general-practitioner:Practitioner.name", "Smith"),
//! ]);
//! let compiled = compiler
//!     .compile(&TenantId::default_tenant(), "Patient", &query)
//!     .unwrap();
//!
//! assert_eq!(compiled.terms().len(), 2);
//! assert_eq!(
//!     compiled.to_query_pairs()[1],
//!     (
//!         "general-practitioner:Practitioner.name".to_string(),
//!         "Smith".to_string()
//!     )
//! );
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod compiler;
pub mod config;
pub mod error;
pub mod parse;
pub mod resolve;
pub mod restrict;
pub mod schema;
pub mod service;
pub mod snapshot;
pub mod tenant;
pub mod types;

// Re-export commonly used types at crate root
pub use compiler::QueryCompiler;
pub use config::CompilerConfig;
pub use error::{ErrorKind, LoaderError, QueryErrors, RestrictionKind, SearchError};
pub use parse::RawQuery;
pub use schema::{SchemaProvider, SearchParameterLoader, SearchParameterRegistry};
pub use service::SearchService;
pub use tenant::{PolicyProvider, RestrictionPolicy, TenantId, TenantPolicies};
pub use types::{CompiledQuery, QueryTerm};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
