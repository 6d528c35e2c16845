//! Forward chain resolution (`subject:Patient.name=...`).

use crate::error::SearchError;
use crate::parse::ParsedName;
use crate::types::{ChainNode, QueryTerm};

use super::Resolver;

impl Resolver<'_> {
    pub(super) fn resolve_chain(
        &self,
        resource_type: &str,
        head: &str,
        head_modifier: Option<&str>,
        explicit_target: Option<&str>,
        rest: &ParsedName,
        values: &[String],
    ) -> Result<QueryTerm, SearchError> {
        let via = self
            .schema
            .lookup_parameter(resource_type, head)
            .ok_or_else(|| SearchError::UnknownSearchParameter {
                name: head.to_string(),
                resource_type: resource_type.to_string(),
            })?;

        if !via.is_reference() {
            return Err(SearchError::NotChainable {
                name: via.code.clone(),
                param_type: via.param_type,
            });
        }

        if let Some(modifier) = head_modifier {
            return Err(SearchError::DisallowedChainModifier {
                modifier: modifier.to_string(),
            });
        }

        let target_type = match explicit_target {
            Some(target) => {
                if !self.accepts_target(&via, target) {
                    return Err(SearchError::TargetTypeNotAllowed {
                        target_type: target.to_string(),
                        name: via.code.clone(),
                        resource_type: resource_type.to_string(),
                    });
                }
                target
            }
            None => via
                .single_target()
                .ok_or_else(|| SearchError::AmbiguousTargetType {
                    name: via.code.clone(),
                })?,
        };
        self.require_declared(target_type, &via.code)?;

        let child = self.resolve(target_type, rest, values)?;
        Ok(QueryTerm::Chain(ChainNode {
            source_type: resource_type.to_string(),
            target_type: target_type.to_string(),
            via,
            child: Box::new(child),
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{ErrorKind, SearchError};
    use crate::parse::NameParser;
    use crate::resolve::Resolver;
    use crate::resolve::test_support::registry;
    use crate::types::QueryTerm;

    fn resolve(resource_type: &str, key: &str) -> Result<QueryTerm, SearchError> {
        let registry = registry();
        let parsed = NameParser::new(10).parse(key)?;
        Resolver::new(&registry).resolve(resource_type, &parsed, &["x".to_string()])
    }

    #[test]
    fn test_single_target_chain() {
        let term = resolve("Encounter", "service-provider.name").unwrap();
        let QueryTerm::Chain(node) = &term else {
            panic!("expected chain");
        };
        assert_eq!(node.target_type, "Organization");
        assert_eq!(term.terminal().resource_type, "Organization");
        assert_eq!(term.key(), "service-provider:Organization.name");
    }

    #[test]
    fn test_multi_hop_chain() {
        let term = resolve("Encounter", "service-provider.endpoint.name").unwrap();
        assert_eq!(term.terminal().resource_type, "Endpoint");
    }

    #[test]
    fn test_explicit_target_disambiguates() {
        let term = resolve("Observation", "subject:Patient.name").unwrap();
        assert_eq!(term.terminal().resource_type, "Patient");
    }

    #[test]
    fn test_ambiguous_target() {
        let err = resolve("Procedure", "part-of.status").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousTargetType);
        assert_eq!(
            err.to_string(),
            "Search parameter: 'part-of' must have resource type name modifier"
        );
    }

    #[test]
    fn test_mismatched_target() {
        let err = resolve("Procedure", "part-of:Condition.status").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MismatchedTargetType);
        assert_eq!(
            err.to_string(),
            "Modifier resource type [Condition] is not allowed for search parameter [part-of] of resource type [Procedure]."
        );
    }

    #[test]
    fn test_non_reference_head() {
        let err = resolve("Procedure", "code.status").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongParameterType);
        assert_eq!(err.to_string(), "Type: 'token' not allowed on chained parameter");

        // Deeper hops are checked the same way.
        let err = resolve("Encounter", "service-provider.name.value").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongParameterType);
    }

    #[test]
    fn test_chain_modifier_rejected() {
        let err = resolve("Procedure", "encounter:contains.status").unwrap_err();
        assert_eq!(err.to_string(), "Modifier: 'contains' not allowed on chained parameter");
    }

    #[test]
    fn test_unknown_terminal_on_target() {
        let err = resolve("Encounter", "service-provider.shoe-size").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Search parameter 'shoe-size' for resource type 'Organization' was not found."
        );
    }
}
