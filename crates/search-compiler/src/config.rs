//! Compiler configuration.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SEARCH_MAX_CHAIN_DEPTH` | 10 | Maximum `.` / `_has` hops per key |
//! | `SEARCH_DEFAULT_TENANT` | default | Tenant used when a request names none |
//! | `SEARCH_AGGREGATE_ERRORS` | true | Report every failing key, not just the first |
//!
//! # Example
//!
//! ```rust
//! use helios_search_compiler::CompilerConfig;
//!
//! let config = CompilerConfig {
//!     max_chain_depth: 4,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::env;
use std::str::FromStr;

use serde::Deserialize;
use tracing::warn;

use crate::tenant::{DEFAULT_TENANT_ID, TenantId};

/// Settings shared by every compilation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerConfig {
    /// Maximum number of chain and reverse-chain hops in one key.
    pub max_chain_depth: usize,

    /// Tenant applied when the caller does not supply one.
    pub default_tenant: String,

    /// Collect errors from every key instead of stopping at the first.
    pub aggregate_errors: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: 10,
            default_tenant: DEFAULT_TENANT_ID.to_string(),
            aggregate_errors: true,
        }
    }
}

impl CompilerConfig {
    /// Creates a configuration from environment variables, falling back to
    /// defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_chain_depth: env_or("SEARCH_MAX_CHAIN_DEPTH", defaults.max_chain_depth),
            default_tenant: env::var("SEARCH_DEFAULT_TENANT").unwrap_or(defaults.default_tenant),
            aggregate_errors: env_or("SEARCH_AGGREGATE_ERRORS", defaults.aggregate_errors),
        }
    }

    /// The tenant used when a request does not name one.
    pub fn default_tenant_id(&self) -> TenantId {
        TenantId::new(self.default_tenant.clone())
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.max_chain_depth == 0 {
            errors.push("Max chain depth cannot be 0".to_string());
        }

        if self.default_tenant.trim().is_empty() {
            errors.push("Default tenant cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    pub fn for_testing() -> Self {
        Self {
            max_chain_depth: 4,
            default_tenant: "test-tenant".to_string(),
            aggregate_errors: true,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "Ignoring unparsable environment value");
            default
        }),
        Err(_) => default,
    }
}
