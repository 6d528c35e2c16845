//! Tenant identifier type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The tenant that never carries search restrictions.
pub const DEFAULT_TENANT_ID: &str = "default";

/// An opaque tenant identifier, supplied with every compile request.
///
/// # Examples
///
/// ```
/// use helios_search_compiler::tenant::TenantId;
///
/// let tenant = TenantId::new("tenant7");
/// assert_eq!(tenant.as_str(), "tenant7");
/// assert!(!tenant.is_default());
/// assert!(TenantId::default_tenant().is_default());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a tenant ID from the given string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the default tenant ID.
    pub fn default_tenant() -> Self {
        Self(DEFAULT_TENANT_ID.to_string())
    }

    /// Returns the tenant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this is the default tenant.
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_TENANT_ID
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({:?})", self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
