//! Search parameter and resource type definitions.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::SearchParamType;

/// Publication status of a SearchParameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchParameterStatus {
    /// Can be used in searches.
    #[default]
    Active,
    /// Informational, not yet active.
    Draft,
    /// Disabled.
    Retired,
}

impl SearchParameterStatus {
    /// Parse from FHIR status string.
    pub fn from_fhir_status(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SearchParameterStatus::Active),
            "draft" => Some(SearchParameterStatus::Draft),
            "retired" => Some(SearchParameterStatus::Retired),
            _ => None,
        }
    }

    /// Returns true if this status allows the parameter to be used in searches.
    pub fn is_usable(&self) -> bool {
        *self == SearchParameterStatus::Active
    }
}

/// Definition of one search parameter.
///
/// Definitions are immutable once registered and shared through `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParameterDefinition {
    /// Canonical URL.
    pub url: String,

    /// Parameter code as used in query strings (e.g. `subject`).
    pub code: String,

    /// The value type.
    pub param_type: SearchParamType,

    /// FHIRPath expression, informational only.
    pub expression: Option<String>,

    /// Resource types declaring this parameter.
    pub base: Vec<String>,

    /// Target resource types (reference parameters only).
    pub target: BTreeSet<String>,

    /// Whether includes through this parameter must name a target type.
    pub target_type_required: bool,

    /// Current status.
    pub status: SearchParameterStatus,
}

impl SearchParameterDefinition {
    /// Creates an active definition with no base or targets.
    pub fn new(url: impl Into<String>, code: impl Into<String>, param_type: SearchParamType) -> Self {
        Self {
            url: url.into(),
            code: code.into(),
            param_type,
            expression: None,
            base: Vec::new(),
            target: BTreeSet::new(),
            target_type_required: false,
            status: SearchParameterStatus::Active,
        }
    }

    /// Sets the base resource types.
    pub fn with_base<I, S>(mut self, base: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base = base.into_iter().map(Into::into).collect();
        self
    }

    /// Sets target types for reference parameters.
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the FHIRPath expression.
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Requires include directives to name a target type.
    pub fn with_required_target_type(mut self, required: bool) -> Self {
        self.target_type_required = required;
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: SearchParameterStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns true for reference parameters.
    pub fn is_reference(&self) -> bool {
        self.param_type == SearchParamType::Reference
    }

    /// Returns true if the parameter may reference any resource type.
    pub fn targets_any(&self) -> bool {
        self.target.contains(crate::schema::RESOURCE_BASE_TYPE)
    }

    /// Returns the single target type, if there is exactly one concrete one.
    pub fn single_target(&self) -> Option<&str> {
        if self.target.len() == 1 && !self.targets_any() {
            self.target.iter().next().map(String::as_str)
        } else {
            None
        }
    }
}

/// A resource type with the parameters it declares itself.
///
/// Inherited parameters live on the base types; see
/// [`SchemaProvider::lookup_parameter`](crate::schema::SchemaProvider::lookup_parameter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTypeSchema {
    /// The resource type name.
    pub type_name: String,
    /// The base type, `None` for `Resource`.
    pub base_type: Option<String>,
    /// Declared parameters by code.
    pub parameters: HashMap<String, Arc<SearchParameterDefinition>>,
}

impl ResourceTypeSchema {
    /// Creates a schema with no parameters.
    pub fn new(type_name: impl Into<String>, base_type: Option<String>) -> Self {
        Self {
            type_name: type_name.into(),
            base_type,
            parameters: HashMap::new(),
        }
    }

    /// Returns a declared, usable parameter.
    pub fn parameter(&self, code: &str) -> Option<&Arc<SearchParameterDefinition>> {
        self.parameters.get(code).filter(|p| p.status.is_usable())
    }
}
