//! Tenant identity and search restriction policies.
//!
//! Policies are looked up per (tenant, resource type) through
//! [`PolicyProvider`]. The [`DEFAULT_TENANT_ID`] tenant, and any tenant with
//! no configured policy, is unrestricted.

mod id;
mod policy;
mod store;

pub use id::{DEFAULT_TENANT_ID, TenantId};
pub use policy::{IncludeRule, MultiValueMode, ParameterRestriction, RestrictionPolicy};
pub use store::{PolicyProvider, TenantPolicies};
