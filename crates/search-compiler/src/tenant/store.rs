//! Tenant policy snapshots and their JSON configuration.
//!
//! The configuration file maps tenants to per-resource-type settings:
//!
//! ```json
//! {
//!   "tenants": {
//!     "tenant7": {
//!       "resources": {
//!         "Resource": {
//!           "searchParameterCombinations": ["", "_id"],
//!           "searchIncludes": ["MedicationRequest:patient"],
//!           "searchRevIncludes": ["Provenance:target"]
//!         },
//!         "Patient": {
//!           "searchParameters": {
//!             "multiple-birth-count-basic": {
//!               "comparators": ["gt"],
//!               "modifiers": [],
//!               "multipleValues": "none"
//!             }
//!           },
//!           "searchParameterCombinations": ["", "multiple-birth-count-basic"],
//!           "wildcardIncludes": false
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! A combination is written as parameter names joined by `+`; `""` is the
//! empty set and `"*"` allows every combination.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::error::LoaderError;
use crate::types::{SearchModifier, SearchPrefix};

use super::id::TenantId;
use super::policy::{IncludeRule, MultiValueMode, ParameterRestriction, RestrictionPolicy};

/// Read-only source of tenant restriction policies.
///
/// Implementations return only the policy declared for exactly
/// `resource_type`; base-type inheritance is resolved by the caller.
pub trait PolicyProvider: Send + Sync {
    /// Returns the policy declared for a tenant and resource type.
    fn policy_for(&self, tenant: &TenantId, resource_type: &str) -> Option<Arc<RestrictionPolicy>>;
}

/// Immutable snapshot of every tenant's policies.
#[derive(Debug, Clone, Default)]
pub struct TenantPolicies {
    tenants: HashMap<TenantId, HashMap<String, Arc<RestrictionPolicy>>>,
}

impl TenantPolicies {
    /// Creates an empty snapshot, which allows everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a policy for a tenant and resource type.
    pub fn with_policy(
        mut self,
        tenant: impl Into<TenantId>,
        resource_type: impl Into<String>,
        policy: RestrictionPolicy,
    ) -> Self {
        self.tenants
            .entry(tenant.into())
            .or_default()
            .insert(resource_type.into(), Arc::new(policy));
        self
    }

    /// Returns the number of tenants with policies.
    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }

    /// Parses a policy configuration document.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, LoaderError> {
        let document: PolicyDocument = serde_json::from_value(json.clone())?;
        let mut policies = Self::new();
        for (tenant, config) in document.tenants {
            for (resource_type, resource) in config.resources {
                let policy = resource.into_policy().map_err(|message| LoaderError::InvalidPolicy {
                    tenant: tenant.clone(),
                    resource_type: resource_type.clone(),
                    message,
                })?;
                policies = policies.with_policy(tenant.as_str(), resource_type, policy);
            }
        }
        Ok(policies)
    }

    /// Reads a policy configuration file.
    pub fn load_file(path: &Path) -> Result<Self, LoaderError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let json: serde_json::Value = serde_json::from_str(&content)?;
        let policies = Self::from_json(&json)?;
        debug!(
            path = %path.display(),
            tenants = policies.tenant_count(),
            "Loaded tenant search policies"
        );
        Ok(policies)
    }
}

impl PolicyProvider for TenantPolicies {
    fn policy_for(&self, tenant: &TenantId, resource_type: &str) -> Option<Arc<RestrictionPolicy>> {
        if tenant.is_default() {
            return None;
        }
        self.tenants
            .get(tenant)
            .and_then(|types| types.get(resource_type))
            .cloned()
    }
}

#[derive(Debug, Deserialize)]
struct PolicyDocument {
    #[serde(default)]
    tenants: HashMap<String, TenantConfig>,
}

#[derive(Debug, Deserialize)]
struct TenantConfig {
    #[serde(default)]
    resources: HashMap<String, ResourceConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceConfig {
    #[serde(default)]
    search_parameters: HashMap<String, ParameterConfig>,
    search_parameter_combinations: Option<Vec<String>>,
    search_includes: Option<Vec<String>>,
    search_rev_includes: Option<Vec<String>>,
    wildcard_includes: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParameterConfig {
    comparators: Option<Vec<SearchPrefix>>,
    modifiers: Option<Vec<String>>,
    #[serde(default)]
    multiple_values: MultiValueMode,
}

impl ResourceConfig {
    fn into_policy(self) -> Result<RestrictionPolicy, String> {
        let mut policy = RestrictionPolicy::new();

        for (name, config) in self.search_parameters {
            let allowed_modifiers = config
                .modifiers
                .map(|mods| {
                    mods.iter()
                        .map(|m| {
                            SearchModifier::parse(m)
                                .ok_or_else(|| format!("unknown modifier '{}' for '{}'", m, name))
                        })
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?;
            let restriction = ParameterRestriction {
                allowed_comparators: config.comparators,
                allowed_modifiers,
                multi_value: config.multiple_values,
            };
            policy = policy.with_parameter(name, restriction);
        }

        if let Some(combinations) = self.search_parameter_combinations {
            let mut allowed = Vec::new();
            for combination in combinations {
                let combination = combination.trim();
                if combination == "*" {
                    policy.default_allow_all = true;
                } else {
                    allowed.push(parse_combination(combination)?);
                }
            }
            policy.allowed_combinations = Some(allowed);
        }

        policy.allowed_includes = self.search_includes.map(parse_rules).transpose()?;
        policy.allowed_rev_includes = self.search_rev_includes.map(parse_rules).transpose()?;
        policy.wildcard_include_allowed = self.wildcard_includes;
        Ok(policy)
    }
}

fn parse_combination(combination: &str) -> Result<BTreeSet<String>, String> {
    if combination.is_empty() {
        return Ok(BTreeSet::new());
    }
    combination
        .split('+')
        .map(|name| {
            let name = name.trim();
            if name.is_empty() {
                Err(format!("empty parameter name in combination '{}'", combination))
            } else {
                Ok(name.to_string())
            }
        })
        .collect()
}

fn parse_rules(rules: Vec<String>) -> Result<Vec<IncludeRule>, String> {
    rules.iter().map(|r| IncludeRule::parse(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "tenants": {
                "tenant7": {
                    "resources": {
                        "Resource": {
                            "searchParameterCombinations": ["", "_id"],
                            "searchIncludes": ["MedicationRequest:patient"]
                        },
                        "RelatedPerson": {
                            "searchParameterCombinations": ["*"]
                        },
                        "Patient": {
                            "searchParameters": {
                                "multiple-birth-count-basic": {
                                    "comparators": ["gt"],
                                    "modifiers": [],
                                    "multipleValues": "none"
                                }
                            },
                            "searchParameterCombinations": ["name+family"],
                            "wildcardIncludes": false
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_from_json() {
        let policies = TenantPolicies::from_json(&sample()).unwrap();
        let tenant = TenantId::new("tenant7");

        let patient = policies.policy_for(&tenant, "Patient").unwrap();
        let basic = &patient.per_parameter["multiple-birth-count-basic"];
        assert_eq!(basic.allowed_comparators, Some(vec![SearchPrefix::Gt]));
        assert_eq!(basic.allowed_modifiers, Some(vec![]));
        assert_eq!(basic.multi_value, MultiValueMode::None);
        assert_eq!(patient.wildcard_include_allowed, Some(false));
        assert!(patient.allowed_includes.is_none());

        let names: BTreeSet<String> = ["family", "name"].iter().map(|s| s.to_string()).collect();
        assert!(patient.allows_combination(&names));

        let resource = policies.policy_for(&tenant, "Resource").unwrap();
        assert!(resource.allows_combination(&BTreeSet::new()));
        assert_eq!(resource.allowed_includes.as_ref().map(Vec::len), Some(1));

        let related = policies.policy_for(&tenant, "RelatedPerson").unwrap();
        assert!(related.default_allow_all);
    }

    #[test]
    fn test_default_tenant_has_no_policy() {
        let policies = TenantPolicies::new().with_policy(
            TenantId::default_tenant(),
            "Patient",
            RestrictionPolicy::new().with_wildcard_includes(false),
        );
        assert!(policies
            .policy_for(&TenantId::default_tenant(), "Patient")
            .is_none());
        assert!(policies.policy_for(&TenantId::new("other"), "Patient").is_none());
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let bad_modifier = json!({"tenants": {"t": {"resources": {"Patient": {
            "searchParameters": {"name": {"modifiers": ["bogus"]}}
        }}}}});
        assert!(matches!(
            TenantPolicies::from_json(&bad_modifier),
            Err(LoaderError::InvalidPolicy { .. })
        ));

        let bad_rule = json!({"tenants": {"t": {"resources": {"Patient": {
            "searchIncludes": ["Patient"]
        }}}}});
        assert!(TenantPolicies::from_json(&bad_rule).is_err());

        let bad_comparator = json!({"tenants": {"t": {"resources": {"Patient": {
            "searchParameters": {"x": {"comparators": ["zz"]}}
        }}}}});
        assert!(matches!(
            TenantPolicies::from_json(&bad_comparator),
            Err(LoaderError::Json(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tenants.json");
        std::fs::write(&path, sample().to_string()).unwrap();
        let policies = TenantPolicies::load_file(&path).unwrap();
        assert_eq!(policies.tenant_count(), 1);
    }
}
