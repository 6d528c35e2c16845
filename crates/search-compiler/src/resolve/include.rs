//! `_include` / `_revinclude` directive resolution.
//!
//! Directive grammar: `Source:param[:Target][:iterate]`, or `Source:*` for
//! every reference parameter of `Source`. `:iterate` may also be written on
//! the key (`_include:iterate`).

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::SearchError;
use crate::parse::escape::unescape;
use crate::schema::SearchParameterDefinition;
use crate::types::{IncludeParameter, IncludeSpec};

use super::Resolver;

const WILDCARD: &str = "*";
const ITERATE: &str = "iterate";

/// Which direction an include directive follows references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncludeKind {
    /// `_include`: resources referenced by the matches.
    Include,
    /// `_revinclude`: resources referencing the matches.
    RevInclude,
}

impl IncludeKind {
    /// The query key, without `:iterate`.
    pub fn key(&self) -> &'static str {
        match self {
            IncludeKind::Include => "_include",
            IncludeKind::RevInclude => "_revinclude",
        }
    }

    /// Recognizes an include key, returning the kind and whether the key
    /// carries `:iterate`.
    pub fn from_key(key: &str) -> Option<(Self, bool)> {
        let (base, iterate) = match key.strip_suffix(":iterate") {
            Some(base) => (base, true),
            None => (key, false),
        };
        let kind = match base {
            "_include" => IncludeKind::Include,
            "_revinclude" => IncludeKind::RevInclude,
            _ => return None,
        };
        Some((kind, iterate))
    }
}

impl fmt::Display for IncludeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A directive split into its parts.
struct Directive<'a> {
    source_type: &'a str,
    parameter: &'a str,
    target_type: Option<&'a str>,
    iterate: bool,
}

fn split_directive(text: &str) -> Result<Directive<'_>, String> {
    let mut parts: Vec<&str> = text.split(':').collect();
    let iterate = parts.len() > 2 && parts.last() == Some(&ITERATE);
    if iterate {
        parts.pop();
    }
    if parts.iter().any(|p| p.is_empty()) {
        return Err("empty component".to_string());
    }
    match *parts.as_slice() {
        [source_type, parameter] => Ok(Directive {
            source_type,
            parameter,
            target_type: None,
            iterate,
        }),
        [source_type, parameter, target_type] => Ok(Directive {
            source_type,
            parameter,
            target_type: Some(target_type),
            iterate,
        }),
        _ => Err("expected 'SourceType:parameter[:TargetType]'".to_string()),
    }
}

impl Resolver<'_> {
    /// Resolves one include directive value.
    ///
    /// `searched_type` is `None` for a system-level search. `key_iterate`
    /// is set when the key itself was `_include:iterate`.
    pub fn resolve_include(
        &self,
        kind: IncludeKind,
        searched_type: Option<&str>,
        raw: &str,
        key_iterate: bool,
    ) -> Result<IncludeSpec, SearchError> {
        let invalid = |reason: String| SearchError::InvalidInclude {
            directive: raw.to_string(),
            reason,
        };

        let text = unescape(raw).map_err(invalid)?;
        let directive = split_directive(&text).map_err(invalid)?;
        let iterate = key_iterate || directive.iterate;

        if self.schema.lookup(directive.source_type).is_none() {
            return Err(invalid(format!(
                "unknown resource type '{}'",
                directive.source_type
            )));
        }

        let spec = match kind {
            IncludeKind::Include => self.resolve_forward_include(searched_type, &directive, iterate, raw)?,
            IncludeKind::RevInclude => self.resolve_rev_include(searched_type, &directive, raw)?,
        };

        trace!(kind = %kind, directive = %spec.directive(), iterate, "Resolved include");
        Ok(IncludeSpec { iterate, ..spec })
    }

    fn resolve_forward_include(
        &self,
        searched_type: Option<&str>,
        directive: &Directive<'_>,
        iterate: bool,
        raw: &str,
    ) -> Result<IncludeSpec, SearchError> {
        // Iterated includes may start from previously included resources.
        if let Some(searched) = searched_type {
            if !iterate && directive.source_type != searched {
                return Err(SearchError::InvalidInclude {
                    directive: raw.to_string(),
                    reason: format!(
                        "source type '{}' does not match the searched type '{}'",
                        directive.source_type, searched
                    ),
                });
            }
        }

        if directive.parameter == WILDCARD {
            return self.wildcard(directive, raw, |_| true);
        }

        let definition = self.reference_parameter(directive, raw)?;
        match directive.target_type {
            None if definition.target_type_required => Err(SearchError::MissingRequiredTargetType {
                directive: raw.to_string(),
                name: definition.code.clone(),
            }),
            Some(target) if !self.accepts_target(&definition, target) => {
                Err(SearchError::TargetTypeNotAllowed {
                    target_type: target.to_string(),
                    name: definition.code.clone(),
                    resource_type: directive.source_type.to_string(),
                })
            }
            _ => Ok(IncludeSpec {
                source_type: directive.source_type.to_string(),
                parameter: IncludeParameter::Named(definition),
                target_type: directive.target_type.map(str::to_string),
                iterate: false,
            }),
        }
    }

    fn resolve_rev_include(
        &self,
        searched_type: Option<&str>,
        directive: &Directive<'_>,
        raw: &str,
    ) -> Result<IncludeSpec, SearchError> {
        let points_at_searched = |targets: &BTreeSet<String>| match searched_type {
            Some(searched) => targets.iter().any(|t| self.schema.is_a(searched, t)),
            None => true,
        };

        if directive.parameter == WILDCARD {
            return self.wildcard(directive, raw, |def| points_at_searched(&def.target));
        }

        let definition = self.reference_parameter(directive, raw)?;
        if let Some(searched) = searched_type {
            if !points_at_searched(&definition.target) {
                return Err(SearchError::TargetTypeNotAllowed {
                    target_type: searched.to_string(),
                    name: definition.code.clone(),
                    resource_type: directive.source_type.to_string(),
                });
            }
        }

        match directive.target_type {
            None if definition.target_type_required => Err(SearchError::MissingRequiredTargetType {
                directive: raw.to_string(),
                name: definition.code.clone(),
            }),
            Some(target)
                if !self.accepts_target(&definition, target)
                    || searched_type.is_some_and(|searched| !self.schema.is_a(searched, target)) =>
            {
                Err(SearchError::TargetTypeNotAllowed {
                    target_type: target.to_string(),
                    name: definition.code.clone(),
                    resource_type: directive.source_type.to_string(),
                })
            }
            _ => Ok(IncludeSpec {
                source_type: directive.source_type.to_string(),
                parameter: IncludeParameter::Named(definition),
                target_type: directive.target_type.map(str::to_string),
                iterate: false,
            }),
        }
    }

    fn reference_parameter(
        &self,
        directive: &Directive<'_>,
        raw: &str,
    ) -> Result<Arc<SearchParameterDefinition>, SearchError> {
        let definition = self
            .schema
            .lookup_parameter(directive.source_type, directive.parameter)
            .ok_or_else(|| SearchError::UnknownSearchParameter {
                name: directive.parameter.to_string(),
                resource_type: directive.source_type.to_string(),
            })?;
        if !definition.is_reference() {
            return Err(SearchError::InvalidInclude {
                directive: raw.to_string(),
                reason: format!("search parameter '{}' is not a reference", definition.code),
            });
        }
        Ok(definition)
    }

    fn wildcard<F>(&self, directive: &Directive<'_>, raw: &str, keep: F) -> Result<IncludeSpec, SearchError>
    where
        F: Fn(&SearchParameterDefinition) -> bool,
    {
        if directive.target_type.is_some() {
            return Err(SearchError::InvalidInclude {
                directive: raw.to_string(),
                reason: "a wildcard include cannot name a target type".to_string(),
            });
        }
        let parameters = self
            .schema
            .reference_parameters(directive.source_type)
            .into_iter()
            .filter(|def| keep(def))
            .collect();
        Ok(IncludeSpec {
            source_type: directive.source_type.to_string(),
            parameter: IncludeParameter::Wildcard(parameters),
            target_type: None,
            iterate: false,
        })
    }
}
