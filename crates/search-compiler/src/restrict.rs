//! Tenant restriction enforcement.
//!
//! Policies are looked up per facet along the base-type lineage of the
//! searched type: the first policy on `Patient`, `DomainResource`, `Resource`
//! that declares a facet decides it. A tenant with no policy at any level
//! allows everything.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::trace;

use crate::error::{RestrictionKind, SearchError};
use crate::resolve::IncludeKind;
use crate::schema::SchemaProvider;
use crate::tenant::{IncludeRule, ParameterRestriction, PolicyProvider, RestrictionPolicy, TenantId};
use crate::types::{IncludeParameter, IncludeSpec, QueryTerm};

/// Applies one tenant's policies to resolved query parts.
pub struct RestrictionEnforcer<'a> {
    schema: &'a dyn SchemaProvider,
    policies: &'a dyn PolicyProvider,
    tenant: &'a TenantId,
}

impl<'a> RestrictionEnforcer<'a> {
    /// Creates an enforcer for `tenant`.
    pub fn new(
        schema: &'a dyn SchemaProvider,
        policies: &'a dyn PolicyProvider,
        tenant: &'a TenantId,
    ) -> Self {
        Self {
            schema,
            policies,
            tenant,
        }
    }

    /// Policies declared for `resource_type` and its bases, most derived first.
    fn lineage_policies(&self, resource_type: &str) -> Vec<Arc<RestrictionPolicy>> {
        if self.tenant.is_default() {
            return Vec::new();
        }
        self.schema
            .lineage(resource_type)
            .iter()
            .filter_map(|t| self.policies.policy_for(self.tenant, t))
            .collect()
    }

    fn parameter_restriction(&self, resource_type: &str, name: &str) -> Option<ParameterRestriction> {
        self.lineage_policies(resource_type)
            .into_iter()
            .find_map(|p| p.per_parameter.get(name).cloned())
    }

    /// Checks multi-value use, comparators and modifiers of one term, in that
    /// order.
    ///
    /// `repetitions` is the number of AND occurrences of the term's key.
    pub fn check_parameter(&self, term: &QueryTerm, repetitions: usize) -> Result<(), SearchError> {
        let expr = term.terminal();
        let Some(restriction) = self.parameter_restriction(&expr.resource_type, expr.name()) else {
            return Ok(());
        };
        let violation = |kind: RestrictionKind, message: String| SearchError::RestrictionViolation { kind, message };

        if expr.values.len() > 1 && !restriction.multi_value.allows_or() {
            return Err(violation(
                RestrictionKind::MultiValue,
                format!(
                    "Multiple OR values are not allowed for search parameter '{}' of resource type '{}'",
                    expr.name(),
                    expr.resource_type
                ),
            ));
        }
        if repetitions > 1 && !restriction.multi_value.allows_and() {
            return Err(violation(
                RestrictionKind::MultiValue,
                format!(
                    "Multiple AND occurrences are not allowed for search parameter '{}' of resource type '{}'",
                    expr.name(),
                    expr.resource_type
                ),
            ));
        }

        for prefix in expr.values.iter().filter_map(|v| v.prefix()) {
            if !restriction.allows_comparator(prefix) {
                return Err(violation(
                    RestrictionKind::Comparator,
                    format!(
                        "Comparator '{}' is not allowed for search parameter '{}' of resource type '{}'",
                        prefix,
                        expr.name(),
                        expr.resource_type
                    ),
                ));
            }
        }

        if let Some(modifier) = &expr.modifier {
            if !restriction.allows_modifier(modifier) {
                return Err(violation(
                    RestrictionKind::Modifier,
                    format!(
                        "Modifier '{}' is not allowed for search parameter '{}' of resource type '{}'",
                        modifier,
                        expr.name(),
                        expr.resource_type
                    ),
                ));
            }
        }

        trace!(tenant = %self.tenant, parameter = expr.name(), "Parameter restrictions satisfied");
        Ok(())
    }

    /// Checks the set of distinct top-level parameter names of a request.
    pub fn check_combination(&self, resource_type: &str, names: &BTreeSet<String>) -> Result<(), SearchError> {
        let Some(policy) = self
            .lineage_policies(resource_type)
            .into_iter()
            .find(|p| p.declares_combinations())
        else {
            return Ok(());
        };
        if policy.allows_combination(names) {
            return Ok(());
        }
        Err(SearchError::RestrictionViolation {
            kind: RestrictionKind::Combination,
            message: format!(
                "Search parameter combination [{}] is not allowed for resource type '{}'",
                names.iter().map(String::as_str).collect::<Vec<_>>().join(", "),
                resource_type
            ),
        })
    }

    /// Checks an include directive against the wildcard and allow-list facets.
    pub fn check_include(
        &self,
        resource_type: &str,
        kind: IncludeKind,
        spec: &IncludeSpec,
    ) -> Result<(), SearchError> {
        let policies = self.lineage_policies(resource_type);
        let allowed = match &spec.parameter {
            IncludeParameter::Wildcard(_) => policies
                .iter()
                .find_map(|p| p.wildcard_include_allowed)
                .unwrap_or(true),
            IncludeParameter::Named(definition) => {
                let rules = policies.iter().find_map(|p| match kind {
                    IncludeKind::Include => p.allowed_includes.as_ref(),
                    IncludeKind::RevInclude => p.allowed_rev_includes.as_ref(),
                });
                rules.is_none_or(|rules: &Vec<IncludeRule>| {
                    rules.iter().any(|rule| {
                        rule.matches(&spec.source_type, &definition.code, spec.target_type.as_deref())
                    })
                })
            }
        };
        if allowed {
            return Ok(());
        }
        Err(SearchError::RestrictionViolation {
            kind: RestrictionKind::Include,
            message: format!(
                "{} '{}' is not allowed for resource type '{}'",
                kind,
                spec.directive(),
                resource_type
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parse::NameParser;
    use crate::resolve::Resolver;
    use crate::resolve::test_support::registry;
    use crate::schema::SearchParameterRegistry;
    use crate::tenant::{MultiValueMode, TenantPolicies};
    use crate::types::{SearchModifier, SearchPrefix};

    fn policies() -> TenantPolicies {
        let birthdate = ParameterRestriction {
            allowed_comparators: Some(vec![SearchPrefix::Gt]),
            allowed_modifiers: Some(vec![]),
            multi_value: MultiValueMode::None,
        };
        let name = ParameterRestriction {
            allowed_comparators: None,
            allowed_modifiers: Some(vec![SearchModifier::Exact]),
            multi_value: MultiValueMode::OrOnly,
        };
        TenantPolicies::new()
            .with_policy(
                "acme",
                "Resource",
                RestrictionPolicy::new()
                    .with_combination(Vec::<String>::new())
                    .with_combination(["_id"])
                    .with_include(IncludeRule::parse("MedicationRequest:patient").unwrap()),
            )
            .with_policy(
                "acme",
                "Patient",
                RestrictionPolicy::new()
                    .with_parameter("birthdate", birthdate)
                    .with_parameter("name", name)
                    .with_combination(["birthdate", "name"])
                    .with_wildcard_includes(false)
                    .with_include(IncludeRule::parse("Patient:general-practitioner").unwrap()),
            )
    }

    fn term(registry: &SearchParameterRegistry, resource_type: &str, key: &str, values: &[&str]) -> QueryTerm {
        let parsed = NameParser::new(10).parse(key).unwrap();
        let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        Resolver::new(registry).resolve(resource_type, &parsed, &values).unwrap()
    }

    fn names(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_comparator_restriction() {
        let (registry, policies, tenant) = (registry(), policies(), TenantId::new("acme"));
        let enforcer = RestrictionEnforcer::new(&registry, &policies, &tenant);

        assert!(enforcer.check_parameter(&term(&registry, "Patient", "birthdate", &["gt2000"]), 1).is_ok());
        // No prefix means no comparator check.
        assert!(enforcer.check_parameter(&term(&registry, "Patient", "birthdate", &["2000"]), 1).is_ok());

        let err = enforcer
            .check_parameter(&term(&registry, "Patient", "birthdate", &["lt2000"]), 1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RestrictionViolation(RestrictionKind::Comparator));
        assert_eq!(
            err.to_string(),
            "Comparator 'lt' is not allowed for search parameter 'birthdate' of resource type 'Patient'"
        );
    }

    #[test]
    fn test_modifier_restriction() {
        let (registry, policies, tenant) = (registry(), policies(), TenantId::new("acme"));
        let enforcer = RestrictionEnforcer::new(&registry, &policies, &tenant);

        assert!(enforcer.check_parameter(&term(&registry, "Patient", "name:exact", &["Smith"]), 1).is_ok());
        let err = enforcer
            .check_parameter(&term(&registry, "Patient", "name:contains", &["Smi"]), 1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RestrictionViolation(RestrictionKind::Modifier));

        let err = enforcer
            .check_parameter(&term(&registry, "Patient", "birthdate:missing", &["true"]), 1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RestrictionViolation(RestrictionKind::Modifier));
    }

    #[test]
    fn test_multi_value_restriction() {
        let (registry, policies, tenant) = (registry(), policies(), TenantId::new("acme"));
        let enforcer = RestrictionEnforcer::new(&registry, &policies, &tenant);

        let or_birthdate = term(&registry, "Patient", "birthdate", &["gt2000", "gt2001"]);
        let err = enforcer.check_parameter(&or_birthdate, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RestrictionViolation(RestrictionKind::MultiValue));

        let or_name = term(&registry, "Patient", "name", &["Smith", "Jones"]);
        assert!(enforcer.check_parameter(&or_name, 1).is_ok());
        let err = enforcer.check_parameter(&or_name, 2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Multiple AND occurrences are not allowed for search parameter 'name' of resource type 'Patient'"
        );
    }

    #[test]
    fn test_chained_terminal_uses_target_policy() {
        let (registry, policies, tenant) = (registry(), policies(), TenantId::new("acme"));
        let enforcer = RestrictionEnforcer::new(&registry, &policies, &tenant);
        let chained = term(&registry, "Encounter", "subject:Patient.birthdate", &["lt2000"]);
        let err = enforcer.check_parameter(&chained, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RestrictionViolation(RestrictionKind::Comparator));
    }

    #[test]
    fn test_combination_inherits_from_base() {
        let (registry, policies, tenant) = (registry(), policies(), TenantId::new("acme"));
        let enforcer = RestrictionEnforcer::new(&registry, &policies, &tenant);

        assert!(enforcer.check_combination("Patient", &names(&["birthdate", "name"])).is_ok());
        let err = enforcer.check_combination("Patient", &names(&["name"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Search parameter combination [name] is not allowed for resource type 'Patient'"
        );

        // Observation has no policy of its own and inherits the Resource one.
        assert!(enforcer.check_combination("Observation", &names(&[])).is_ok());
        assert!(enforcer.check_combination("Observation", &names(&["_id"])).is_ok());
        let err = enforcer.check_combination("Observation", &names(&["code"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RestrictionViolation(RestrictionKind::Combination));
    }

    #[test]
    fn test_default_tenant_allows_everything() {
        let (registry, policies, tenant) = (registry(), policies(), TenantId::default_tenant());
        let enforcer = RestrictionEnforcer::new(&registry, &policies, &tenant);
        assert!(enforcer.check_combination("Patient", &names(&["gender"])).is_ok());
        assert!(enforcer.check_parameter(&term(&registry, "Patient", "birthdate", &["lt2000", "lt2001"]), 3).is_ok());

        let unknown = TenantId::new("other");
        let enforcer = RestrictionEnforcer::new(&registry, &policies, &unknown);
        assert!(enforcer.check_combination("Patient", &names(&["gender"])).is_ok());
    }

    #[test]
    fn test_include_rules() {
        let (registry, policies, tenant) = (registry(), policies(), TenantId::new("acme"));
        let enforcer = RestrictionEnforcer::new(&registry, &policies, &tenant);
        let resolver = Resolver::new(&registry);
        let include = |searched: &str, raw: &str| {
            resolver
                .resolve_include(IncludeKind::Include, Some(searched), raw, false)
                .unwrap()
        };

        let spec = include("Patient", "Patient:general-practitioner:Practitioner");
        assert!(enforcer.check_include("Patient", IncludeKind::Include, &spec).is_ok());

        let spec = include("Patient", "Patient:organization");
        let err = enforcer.check_include("Patient", IncludeKind::Include, &spec).unwrap_err();
        assert_eq!(
            err.to_string(),
            "_include 'Patient:organization' is not allowed for resource type 'Patient'"
        );

        let spec = include("Patient", "Patient:*");
        let err = enforcer.check_include("Patient", IncludeKind::Include, &spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RestrictionViolation(RestrictionKind::Include));

        let spec = include("MedicationRequest", "MedicationRequest:patient");
        assert!(enforcer.check_include("MedicationRequest", IncludeKind::Include, &spec).is_ok());
        let spec = include("MedicationRequest", "MedicationRequest:*");
        assert!(enforcer.check_include("MedicationRequest", IncludeKind::Include, &spec).is_ok());
    }
}
