//! Search parameter value types, modifiers, and comparator prefixes.
//!
//! These are the closed vocabularies every other stage of the compiler
//! dispatches on. See: https://build.fhir.org/search.html

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// FHIR search parameter value types.
///
/// See: https://build.fhir.org/search.html#ptypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamType {
    /// A simple string, like a name or description.
    String,
    /// A search against a URI.
    Uri,
    /// A search for a number.
    Number,
    /// A search for a date, dateTime, or period.
    Date,
    /// A quantity, with a number and units.
    Quantity,
    /// A code from a code system or value set.
    Token,
    /// A reference to another resource.
    Reference,
    /// A composite search parameter that combines others.
    Composite,
    /// Parameters with bespoke matching rules, such as `Location.near`.
    Special,
}

impl SearchParamType {
    /// Returns the lowercase type code used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchParamType::String => "string",
            SearchParamType::Uri => "uri",
            SearchParamType::Number => "number",
            SearchParamType::Date => "date",
            SearchParamType::Quantity => "quantity",
            SearchParamType::Token => "token",
            SearchParamType::Reference => "reference",
            SearchParamType::Composite => "composite",
            SearchParamType::Special => "special",
        }
    }

    /// Returns true if values of this type may carry a comparator prefix.
    pub fn supports_prefix(&self) -> bool {
        matches!(
            self,
            SearchParamType::Number | SearchParamType::Date | SearchParamType::Quantity
        )
    }
}

impl fmt::Display for SearchParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchParamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" => Ok(SearchParamType::String),
            "uri" => Ok(SearchParamType::Uri),
            "number" => Ok(SearchParamType::Number),
            "date" => Ok(SearchParamType::Date),
            "quantity" => Ok(SearchParamType::Quantity),
            "token" => Ok(SearchParamType::Token),
            "reference" => Ok(SearchParamType::Reference),
            "composite" => Ok(SearchParamType::Composite),
            "special" => Ok(SearchParamType::Special),
            _ => Err(format!("unknown search parameter type: {}", s)),
        }
    }
}

/// Search modifiers that can follow a parameter name after `:`.
///
/// See: https://build.fhir.org/search.html#modifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SearchModifier {
    /// Exact string match (string parameters).
    Exact,
    /// Contains substring (string parameters).
    Contains,
    /// Text search (token parameters).
    Text,
    /// Negation (token parameters).
    Not,
    /// Match if value is missing.
    Missing,
    /// Match codes or URIs above in hierarchy.
    Above,
    /// Match codes or URIs below in hierarchy.
    Below,
    /// Match codes in a value set (token parameters).
    In,
    /// Match codes not in a value set (token parameters).
    NotIn,
    /// Match on the identifier of a reference.
    Identifier,
    /// Match on identifier type (token parameters).
    OfType,
    /// Resource type disambiguator on a reference (`subject:Patient`).
    Type(String),
}

impl fmt::Display for SearchModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchModifier::Exact => write!(f, "exact"),
            SearchModifier::Contains => write!(f, "contains"),
            SearchModifier::Text => write!(f, "text"),
            SearchModifier::Not => write!(f, "not"),
            SearchModifier::Missing => write!(f, "missing"),
            SearchModifier::Above => write!(f, "above"),
            SearchModifier::Below => write!(f, "below"),
            SearchModifier::In => write!(f, "in"),
            SearchModifier::NotIn => write!(f, "not-in"),
            SearchModifier::Identifier => write!(f, "identifier"),
            SearchModifier::OfType => write!(f, "of-type"),
            SearchModifier::Type(t) => write!(f, "{}", t),
        }
    }
}

impl SearchModifier {
    /// Parses a modifier string, returning None for unknown modifiers.
    ///
    /// A modifier starting with an uppercase letter is taken to be a
    /// resource type name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exact" => Some(SearchModifier::Exact),
            "contains" => Some(SearchModifier::Contains),
            "text" => Some(SearchModifier::Text),
            "not" => Some(SearchModifier::Not),
            "missing" => Some(SearchModifier::Missing),
            "above" => Some(SearchModifier::Above),
            "below" => Some(SearchModifier::Below),
            "in" => Some(SearchModifier::In),
            "not-in" => Some(SearchModifier::NotIn),
            "identifier" => Some(SearchModifier::Identifier),
            "of-type" | "ofType" => Some(SearchModifier::OfType),
            _ if is_type_name(s) => Some(SearchModifier::Type(s.to_string())),
            _ => None,
        }
    }

    /// Returns true if this modifier may be applied to the given type.
    pub fn is_valid_for(&self, param_type: SearchParamType) -> bool {
        match self {
            SearchModifier::Missing => param_type != SearchParamType::Special,
            SearchModifier::Exact | SearchModifier::Contains => {
                param_type == SearchParamType::String
            }
            SearchModifier::Not
            | SearchModifier::Text
            | SearchModifier::In
            | SearchModifier::NotIn
            | SearchModifier::OfType => param_type == SearchParamType::Token,
            SearchModifier::Above | SearchModifier::Below => {
                matches!(param_type, SearchParamType::Token | SearchParamType::Uri)
            }
            SearchModifier::Identifier | SearchModifier::Type(_) => {
                param_type == SearchParamType::Reference
            }
        }
    }

    /// Returns the resource type named by a type modifier.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            SearchModifier::Type(t) => Some(t),
            _ => None,
        }
    }
}

/// Returns true if `s` looks like a resource type name.
pub fn is_type_name(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Comparison prefixes for number, date, and quantity values.
///
/// See: https://build.fhir.org/search.html#prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPrefix {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Less than.
    Lt,
    /// Greater than or equal.
    Ge,
    /// Less than or equal.
    Le,
    /// Starts after.
    Sa,
    /// Ends before.
    Eb,
    /// Approximately equal.
    Ap,
}

impl fmt::Display for SearchPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchPrefix::Eq => write!(f, "eq"),
            SearchPrefix::Ne => write!(f, "ne"),
            SearchPrefix::Gt => write!(f, "gt"),
            SearchPrefix::Lt => write!(f, "lt"),
            SearchPrefix::Ge => write!(f, "ge"),
            SearchPrefix::Le => write!(f, "le"),
            SearchPrefix::Sa => write!(f, "sa"),
            SearchPrefix::Eb => write!(f, "eb"),
            SearchPrefix::Ap => write!(f, "ap"),
        }
    }
}

impl FromStr for SearchPrefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(SearchPrefix::Eq),
            "ne" => Ok(SearchPrefix::Ne),
            "gt" => Ok(SearchPrefix::Gt),
            "lt" => Ok(SearchPrefix::Lt),
            "ge" => Ok(SearchPrefix::Ge),
            "le" => Ok(SearchPrefix::Le),
            "sa" => Ok(SearchPrefix::Sa),
            "eb" => Ok(SearchPrefix::Eb),
            "ap" => Ok(SearchPrefix::Ap),
            _ => Err(format!("unknown search prefix: {}", s)),
        }
    }
}

impl SearchPrefix {
    /// Splits an explicit prefix off the front of a value.
    ///
    /// Returns `None` when the value does not start with a known prefix.
    pub fn extract(value: &str) -> (Option<Self>, &str) {
        if let (Some(head), Some(rest)) = (value.get(..2), value.get(2..)) {
            if let Ok(p) = head.parse() {
                return (Some(p), rest);
            }
        }
        (None, value)
    }

    /// Returns true if this prefix is valid for the given parameter type.
    pub fn is_valid_for(&self, param_type: SearchParamType) -> bool {
        match self {
            SearchPrefix::Sa | SearchPrefix::Eb => param_type == SearchParamType::Date,
            _ => param_type.supports_prefix(),
        }
    }
}
