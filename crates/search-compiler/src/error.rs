//! Error types for search compilation.
//!
//! Client errors ([`SearchError`] variants other than `Configuration`) map to
//! HTTP 400 and are never retried. Problems with the registry or tenant
//! configuration surface as [`SearchError::Configuration`] (HTTP 500) and are
//! kept apart from client mistakes. Loading problems are [`LoaderError`]s.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::types::SearchParamType;

/// An error raised while compiling one search parameter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("An incorrect number of components were specified for '_has' (reverse chain) search.")]
    MalformedReverseChain { key: String },

    #[error("system search not supported with _has")]
    UnsupportedTopLevelHas { key: String },

    #[error("Invalid search parameter name '{key}': {reason}")]
    MalformedParameterName { key: String, reason: String },

    #[error("Resource type '{resource_type}' is not valid for '_has' (reverse chain) search.")]
    UnknownResourceType { resource_type: String },

    #[error("Resource type '{resource_type}' is not a searchable resource type.")]
    UnsupportedSearchType { resource_type: String },

    #[error("Search parameter '{name}' for resource type '{resource_type}' was not found.")]
    UnknownSearchParameter { name: String, resource_type: String },

    #[error("Type: '{param_type}' not allowed on chained parameter")]
    NotChainable {
        name: String,
        param_type: SearchParamType,
    },

    #[error("Search parameter '{name}' is not of type reference for '_has' (reverse chain) search.")]
    NotReverseChainable { name: String },

    #[error("Modifier: '{modifier}' not allowed on chained parameter")]
    DisallowedChainModifier { modifier: String },

    #[error("Search parameter: '{name}' must have resource type name modifier")]
    AmbiguousTargetType { name: String },

    #[error(
        "Modifier resource type [{target_type}] is not allowed for search parameter [{name}] of resource type [{resource_type}]."
    )]
    TargetTypeNotAllowed {
        target_type: String,
        name: String,
        resource_type: String,
    },

    #[error(
        "Search parameter '{name}' target types do not include expected type '{expected}' for '_has' (reverse chain) search."
    )]
    ReverseChainTargetMismatch { name: String, expected: String },

    #[error("Search parameter '{name}' in '{directive}' must specify a target resource type")]
    MissingRequiredTargetType { directive: String, name: String },

    #[error("Undefined Modifier: '{modifier}'")]
    UndefinedModifier { modifier: String },

    #[error("Unsupported type/modifier combination: '{param_type}'/'{modifier}'")]
    UnsupportedModifierForType {
        param_type: SearchParamType,
        modifier: String,
    },

    #[error("Invalid value '{value}' for search parameter '{name}': {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid include directive '{directive}': {reason}")]
    InvalidInclude { directive: String, reason: String },

    #[error("Search parameter '{key}' exceeds the maximum chain depth of {max_depth}")]
    ChainTooDeep { key: String, max_depth: usize },

    #[error("{message}")]
    RestrictionViolation {
        kind: RestrictionKind,
        message: String,
    },

    #[error("Search configuration error: {message}")]
    Configuration { message: String },
}

/// Which facet of a tenant policy rejected a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestrictionKind {
    Comparator,
    Modifier,
    MultiValue,
    Combination,
    Include,
}

impl fmt::Display for RestrictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestrictionKind::Comparator => write!(f, "comparator"),
            RestrictionKind::Modifier => write!(f, "modifier"),
            RestrictionKind::MultiValue => write!(f, "multi-value"),
            RestrictionKind::Combination => write!(f, "combination"),
            RestrictionKind::Include => write!(f, "include"),
        }
    }
}

/// Stable classification of a [`SearchError`].
///
/// Several variants share a kind; for instance a non-reference parameter in
/// a forward chain and in a `_has` chain are both `WrongParameterType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    MalformedReverseChain,
    UnsupportedTopLevelHas,
    MalformedParameterName,
    UnknownResourceType,
    UnknownSearchParameter,
    WrongParameterType,
    DisallowedChainModifier,
    AmbiguousTargetType,
    MismatchedTargetType,
    MissingRequiredTargetType,
    UndefinedModifier,
    UnsupportedModifierForType,
    InvalidValue,
    InvalidInclude,
    ChainTooDeep,
    RestrictionViolation(RestrictionKind),
    ConfigurationError,
}

impl SearchError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::MalformedReverseChain { .. } => ErrorKind::MalformedReverseChain,
            SearchError::UnsupportedTopLevelHas { .. } => ErrorKind::UnsupportedTopLevelHas,
            SearchError::MalformedParameterName { .. } => ErrorKind::MalformedParameterName,
            SearchError::UnknownResourceType { .. } | SearchError::UnsupportedSearchType { .. } => {
                ErrorKind::UnknownResourceType
            }
            SearchError::UnknownSearchParameter { .. } => ErrorKind::UnknownSearchParameter,
            SearchError::NotChainable { .. } | SearchError::NotReverseChainable { .. } => {
                ErrorKind::WrongParameterType
            }
            SearchError::DisallowedChainModifier { .. } => ErrorKind::DisallowedChainModifier,
            SearchError::AmbiguousTargetType { .. } => ErrorKind::AmbiguousTargetType,
            SearchError::TargetTypeNotAllowed { .. }
            | SearchError::ReverseChainTargetMismatch { .. } => ErrorKind::MismatchedTargetType,
            SearchError::MissingRequiredTargetType { .. } => ErrorKind::MissingRequiredTargetType,
            SearchError::UndefinedModifier { .. } => ErrorKind::UndefinedModifier,
            SearchError::UnsupportedModifierForType { .. } => {
                ErrorKind::UnsupportedModifierForType
            }
            SearchError::InvalidValue { .. } => ErrorKind::InvalidValue,
            SearchError::InvalidInclude { .. } => ErrorKind::InvalidInclude,
            SearchError::ChainTooDeep { .. } => ErrorKind::ChainTooDeep,
            SearchError::RestrictionViolation { kind, .. } => ErrorKind::RestrictionViolation(*kind),
            SearchError::Configuration { .. } => ErrorKind::ConfigurationError,
        }
    }

    /// Returns true if the request itself is at fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, SearchError::Configuration { .. })
    }

    /// Returns the HTTP status code equivalent.
    pub fn http_status(&self) -> u16 {
        if self.is_client_error() { 400 } else { 500 }
    }

    /// Builds the OperationOutcome issue for this error.
    pub fn to_issue(&self) -> Issue {
        let (severity, code) = match self.kind() {
            ErrorKind::ConfigurationError => (IssueSeverity::Fatal, IssueType::Exception),
            ErrorKind::UnknownSearchParameter | ErrorKind::UnknownResourceType => {
                (IssueSeverity::Error, IssueType::NotFound)
            }
            ErrorKind::UnsupportedTopLevelHas
            | ErrorKind::UnsupportedModifierForType
            | ErrorKind::RestrictionViolation(_) => (IssueSeverity::Error, IssueType::NotSupported),
            _ => (IssueSeverity::Error, IssueType::Invalid),
        };
        Issue {
            severity,
            code,
            diagnostics: self.to_string(),
        }
    }
}

/// Converts loading problems into configuration errors.
impl From<LoaderError> for SearchError {
    fn from(err: LoaderError) -> Self {
        SearchError::Configuration {
            message: err.to_string(),
        }
    }
}

/// Issue severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Processing cannot continue.
    Fatal,
    /// Processing has failed.
    Error,
}

/// Issue type codes used by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    /// Invalid content.
    Invalid,
    /// Referenced type or parameter not found.
    NotFound,
    /// Not supported by this server or tenant.
    NotSupported,
    /// Server-side exception.
    Exception,
}

/// One OperationOutcome-style issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: IssueSeverity,
    pub code: IssueType,
    pub diagnostics: String,
}

/// All errors raised while compiling one request.
///
/// Errors from independent top-level keys are collected; at most one error is
/// recorded per key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", summarize(.errors))]
pub struct QueryErrors {
    errors: Vec<SearchError>,
}

fn summarize(errors: &[SearchError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl QueryErrors {
    pub(crate) fn new(errors: Vec<SearchError>) -> Self {
        Self { errors }
    }

    /// Returns the collected errors in request order.
    pub fn errors(&self) -> &[SearchError] {
        &self.errors
    }

    /// Returns the first error.
    pub fn first(&self) -> Option<&SearchError> {
        self.errors.first()
    }

    /// Returns true if any error has the given kind.
    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind() == kind)
    }

    /// Returns 500 if any error is a configuration error, otherwise 400.
    pub fn http_status(&self) -> u16 {
        self.errors
            .iter()
            .map(SearchError::http_status)
            .max()
            .unwrap_or(400)
    }

    /// Builds the OperationOutcome issue list.
    pub fn issues(&self) -> Vec<Issue> {
        self.errors.iter().map(SearchError::to_issue).collect()
    }

    /// Consumes the collection, returning the errors.
    pub fn into_errors(self) -> Vec<SearchError> {
        self.errors
    }
}

impl From<SearchError> for QueryErrors {
    fn from(err: SearchError) -> Self {
        Self::new(vec![err])
    }
}

/// Errors raised while loading registry or tenant policy configuration.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required field '{field}' in SearchParameter {url}")]
    MissingField { field: String, url: String },

    #[error("invalid SearchParameter resource: {message}")]
    InvalidResource { message: String },

    #[error("duplicate search parameter '{code}' on resource type '{resource_type}'")]
    DuplicateParameter { resource_type: String, code: String },

    #[error("resource type '{type_name}' referenced by {context} is not declared")]
    UndeclaredResourceType { type_name: String, context: String },

    #[error("resource type hierarchy contains a cycle at '{type_name}'")]
    CyclicHierarchy { type_name: String },

    #[error("invalid policy for tenant '{tenant}' resource type '{resource_type}': {message}")]
    InvalidPolicy {
        tenant: String,
        resource_type: String,
        message: String,
    },
}
