//! Registry and tenant policy fixtures.
//!
//! The registry is the embedded R4 core registry layered with the
//! `multiple-birth-count` extensions in `tests/resources`. The policy file
//! configures `tenant7` (restriction scenarios) and `tenant8` (reverse chain
//! scenarios).

use std::path::PathBuf;

use helios_search_compiler::schema::SearchParameterLoader;
use helios_search_compiler::{SearchParameterRegistry, TenantPolicies};

/// The tenant configured with parameter, combination and include restrictions.
pub const TENANT7: &str = "tenant7";

/// The tenant configured for `_has` combinations.
pub const TENANT8: &str = "tenant8";

/// Returns the path of a file under `tests/resources`.
pub fn resource_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("resources")
        .join(name)
}

/// Builds the embedded registry plus the test extensions.
pub fn registry() -> SearchParameterRegistry {
    let loader = SearchParameterLoader::new();
    let mut builder = loader.embedded_builder().expect("embedded registry");
    loader
        .load_file(&resource_path("search-parameter-extensions.json"), &mut builder)
        .expect("extension parameters");
    builder.build().expect("registry")
}

/// Loads the tenant policy fixture.
pub fn policies() -> TenantPolicies {
    TenantPolicies::load_file(&resource_path("tenant-policies.json")).expect("tenant policies")
}
