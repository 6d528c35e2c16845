//! Tenant search restriction policies.
//!
//! A [`RestrictionPolicy`] applies to one (tenant, resource type) pair. Every
//! facet is optional; an undeclared facet is inherited from the policy of
//! the nearest base type that declares it, and is unrestricted when no type
//! in the chain declares it.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{SearchModifier, SearchPrefix};

/// How the values of a parameter may be combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum MultiValueMode {
    /// Comma-separated OR values only.
    OrOnly,
    /// Repeated (AND) occurrences only.
    AndOnly,
    /// Both OR and AND.
    #[default]
    Both,
    /// A single value in a single occurrence.
    None,
}

impl MultiValueMode {
    /// Returns true if an occurrence may carry several OR values.
    pub fn allows_or(&self) -> bool {
        matches!(self, MultiValueMode::OrOnly | MultiValueMode::Both)
    }

    /// Returns true if the parameter may be repeated.
    pub fn allows_and(&self) -> bool {
        matches!(self, MultiValueMode::AndOnly | MultiValueMode::Both)
    }
}

/// Restrictions on a single search parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParameterRestriction {
    /// Comparators clients may write explicitly; `None` allows all.
    pub allowed_comparators: Option<Vec<SearchPrefix>>,
    /// Modifiers clients may use; `None` allows all.
    pub allowed_modifiers: Option<Vec<SearchModifier>>,
    /// Allowed OR/AND usage.
    pub multi_value: MultiValueMode,
}

impl ParameterRestriction {
    /// Returns true if the comparator may be written explicitly.
    pub fn allows_comparator(&self, prefix: SearchPrefix) -> bool {
        self.allowed_comparators
            .as_ref()
            .is_none_or(|allowed| allowed.contains(&prefix))
    }

    /// Returns true if the modifier may be used.
    pub fn allows_modifier(&self, modifier: &SearchModifier) -> bool {
        self.allowed_modifiers
            .as_ref()
            .is_none_or(|allowed| allowed.contains(modifier))
    }
}

/// An allowed `_include` or `_revinclude` directive: `Source:param[:Target]`.
///
/// A rule without a target matches the directive with any target or none.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncludeRule {
    /// Resource type holding the reference.
    pub source_type: String,
    /// Reference parameter code.
    pub parameter: String,
    /// Required target type, if the rule names one.
    pub target_type: Option<String>,
}

impl IncludeRule {
    /// Parses `Source:param[:Target]`.
    pub fn parse(rule: &str) -> Result<Self, String> {
        let parts: Vec<&str> = rule.split(':').collect();
        match parts.as_slice() {
            [source, param] if !source.is_empty() && !param.is_empty() => Ok(Self {
                source_type: source.to_string(),
                parameter: param.to_string(),
                target_type: None,
            }),
            [source, param, target]
                if !source.is_empty() && !param.is_empty() && !target.is_empty() =>
            {
                Ok(Self {
                    source_type: source.to_string(),
                    parameter: param.to_string(),
                    target_type: Some(target.to_string()),
                })
            }
            _ => Err(format!("include rule '{}' is not Source:param[:Target]", rule)),
        }
    }

    /// Returns true if the directive is covered by this rule.
    pub fn matches(&self, source_type: &str, parameter: &str, target_type: Option<&str>) -> bool {
        self.source_type == source_type
            && self.parameter == parameter
            && match &self.target_type {
                None => true,
                Some(t) => target_type == Some(t.as_str()),
            }
    }
}

impl fmt::Display for IncludeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_type, self.parameter)?;
        if let Some(t) = &self.target_type {
            write!(f, ":{}", t)?;
        }
        Ok(())
    }
}

/// The search policy of one tenant for one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RestrictionPolicy {
    /// Any parameter combination is allowed.
    pub default_allow_all: bool,
    /// Per-parameter restrictions by parameter name.
    pub per_parameter: HashMap<String, ParameterRestriction>,
    /// Allowed sets of top-level parameter names.
    pub allowed_combinations: Option<Vec<BTreeSet<String>>>,
    /// Whether `Source:*` includes are allowed.
    pub wildcard_include_allowed: Option<bool>,
    /// Allowed `_include` directives.
    pub allowed_includes: Option<Vec<IncludeRule>>,
    /// Allowed `_revinclude` directives.
    pub allowed_rev_includes: Option<Vec<IncludeRule>>,
}

impl RestrictionPolicy {
    /// Creates a policy with every facet undeclared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a per-parameter restriction.
    pub fn with_parameter(mut self, name: impl Into<String>, restriction: ParameterRestriction) -> Self {
        self.per_parameter.insert(name.into(), restriction);
        self
    }

    /// Adds an allowed combination of top-level parameter names.
    pub fn with_combination<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_combinations
            .get_or_insert_with(Vec::new)
            .push(names.into_iter().map(Into::into).collect());
        self
    }

    /// Allows every combination.
    pub fn allow_all_combinations(mut self) -> Self {
        self.default_allow_all = true;
        self
    }

    /// Sets wildcard include permission.
    pub fn with_wildcard_includes(mut self, allowed: bool) -> Self {
        self.wildcard_include_allowed = Some(allowed);
        self
    }

    /// Adds an allowed `_include` rule.
    pub fn with_include(mut self, rule: IncludeRule) -> Self {
        self.allowed_includes.get_or_insert_with(Vec::new).push(rule);
        self
    }

    /// Adds an allowed `_revinclude` rule.
    pub fn with_rev_include(mut self, rule: IncludeRule) -> Self {
        self.allowed_rev_includes
            .get_or_insert_with(Vec::new)
            .push(rule);
        self
    }

    /// Returns true if this policy declares the combination facet.
    pub fn declares_combinations(&self) -> bool {
        self.default_allow_all || self.allowed_combinations.is_some()
    }

    /// Returns true if `names` is an allowed combination.
    pub fn allows_combination(&self, names: &BTreeSet<String>) -> bool {
        self.default_allow_all
            || self
                .allowed_combinations
                .as_ref()
                .is_some_and(|combos| combos.iter().any(|c| c == names))
    }
}
