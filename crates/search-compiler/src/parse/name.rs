//! Parameter name grammar.
//!
//! ```text
//! key := "_has:" Type ":" Name ":" key
//!      | Name (":" Modifier)? ("." key)?
//! ```
//!
//! A modifier starting with an uppercase letter on a chained segment is a
//! target type disambiguator (`subject:Patient.name`). Modifier names are
//! kept as written; they are validated during resolution.

use crate::error::SearchError;
use crate::types::is_type_name;

const HAS_PREFIX: &str = "_has:";

/// A parsed parameter key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedName {
    /// `name` or `name:modifier`.
    Simple {
        /// Parameter code.
        name: String,
        /// Modifier as written.
        modifier: Option<String>,
    },
    /// `head[:modifier|:Type].rest`.
    Chain {
        /// The reference parameter followed.
        head: String,
        /// A non-type modifier on the head; always rejected during resolution.
        head_modifier: Option<String>,
        /// Explicit target type.
        target_type: Option<String>,
        /// The remainder of the key.
        rest: Box<ParsedName>,
    },
    /// `_has:ChildType:refParam:rest`.
    ReverseChain {
        /// The referencing resource type.
        child_type: String,
        /// Reference parameter on `child_type`.
        ref_param: String,
        /// The remainder of the key.
        rest: Box<ParsedName>,
    },
}

impl ParsedName {
    /// Returns true for a `_has` expression.
    pub fn is_reverse_chain(&self) -> bool {
        matches!(self, ParsedName::ReverseChain { .. })
    }

    /// Number of `.` and `_has` hops.
    pub fn depth(&self) -> usize {
        match self {
            ParsedName::Simple { .. } => 0,
            ParsedName::Chain { rest, .. } | ParsedName::ReverseChain { rest, .. } => {
                1 + rest.depth()
            }
        }
    }
}

/// Returns true if `key` is a reverse-chain key.
pub fn is_has_key(key: &str) -> bool {
    key == "_has" || key.starts_with(HAS_PREFIX)
}

/// Parser for parameter keys, bounded by a maximum chain depth.
#[derive(Debug, Clone, Copy)]
pub struct NameParser {
    max_depth: usize,
}

impl NameParser {
    /// Creates a parser allowing at most `max_depth` hops.
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Parses a top-level parameter key.
    pub fn parse(&self, key: &str) -> Result<ParsedName, SearchError> {
        self.parse_key(key, key, 0)
    }

    fn parse_key(&self, full: &str, key: &str, depth: usize) -> Result<ParsedName, SearchError> {
        if is_has_key(key) {
            self.parse_reverse_chain(full, key, depth)
        } else {
            self.parse_forward(full, key, depth)
        }
    }

    fn check_depth(&self, full: &str, depth: usize) -> Result<(), SearchError> {
        if depth >= self.max_depth {
            return Err(SearchError::ChainTooDeep {
                key: full.to_string(),
                max_depth: self.max_depth,
            });
        }
        Ok(())
    }

    fn parse_reverse_chain(
        &self,
        full: &str,
        key: &str,
        depth: usize,
    ) -> Result<ParsedName, SearchError> {
        let malformed = || SearchError::MalformedReverseChain {
            key: full.to_string(),
        };

        let body = key.strip_prefix(HAS_PREFIX).ok_or_else(malformed)?;
        let mut parts = body.splitn(3, ':');
        let (Some(child_type), Some(ref_param), Some(tail)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        if child_type.is_empty() || ref_param.is_empty() || tail.is_empty() {
            return Err(malformed());
        }

        if !is_has_key(tail) {
            // The first segment of a forward tail is `name[:modifier]`.
            let segment = tail.split('.').next().unwrap_or(tail);
            if segment.matches(':').count() > 1 {
                return Err(malformed());
            }
        }

        self.check_depth(full, depth)?;
        let rest = self.parse_key(full, tail, depth + 1)?;
        Ok(ParsedName::ReverseChain {
            child_type: child_type.to_string(),
            ref_param: ref_param.to_string(),
            rest: Box::new(rest),
        })
    }

    fn parse_forward(&self, full: &str, key: &str, depth: usize) -> Result<ParsedName, SearchError> {
        let malformed = |reason: &str| SearchError::MalformedParameterName {
            key: full.to_string(),
            reason: reason.to_string(),
        };

        let (segment, rest) = match key.split_once('.') {
            Some((segment, rest)) => (segment, Some(rest)),
            None => (key, None),
        };

        let (name, modifier) = match segment.split_once(':') {
            Some((name, modifier)) => (name, Some(modifier)),
            None => (segment, None),
        };
        if name.is_empty() {
            return Err(malformed("empty parameter name"));
        }
        if let Some(modifier) = modifier {
            if modifier.is_empty() {
                return Err(malformed("empty modifier"));
            }
            if modifier.contains(':') {
                return Err(malformed("more than one modifier"));
            }
        }

        let Some(rest) = rest else {
            return Ok(ParsedName::Simple {
                name: name.to_string(),
                modifier: modifier.map(str::to_string),
            });
        };
        if rest.is_empty() {
            return Err(malformed("empty chained parameter"));
        }

        self.check_depth(full, depth)?;
        let rest = self.parse_key(full, rest, depth + 1)?;
        let (head_modifier, target_type) = match modifier {
            Some(m) if is_type_name(m) => (None, Some(m.to_string())),
            Some(m) => (Some(m.to_string()), None),
            None => (None, None),
        };
        Ok(ParsedName::Chain {
            head: name.to_string(),
            head_modifier,
            target_type,
            rest: Box::new(rest),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn parse(key: &str) -> Result<ParsedName, SearchError> {
        NameParser::new(10).parse(key)
    }

    fn simple(name: &str, modifier: Option<&str>) -> ParsedName {
        ParsedName::Simple {
            name: name.to_string(),
            modifier: modifier.map(str::to_string),
        }
    }

    #[test]
    fn test_simple_and_modifier() {
        assert_eq!(parse("name").unwrap(), simple("name", None));
        assert_eq!(parse("name:exact").unwrap(), simple("name", Some("exact")));
    }

    #[test]
    fn test_chain_with_target_type() {
        let parsed = parse("subject:Patient.name").unwrap();
        assert_eq!(
            parsed,
            ParsedName::Chain {
                head: "subject".into(),
                head_modifier: None,
                target_type: Some("Patient".into()),
                rest: Box::new(simple("name", None)),
            }
        );
        assert_eq!(parsed.depth(), 1);
    }

    #[test]
    fn test_chain_keeps_lowercase_modifier() {
        let parsed = parse("encounter:contains.status").unwrap();
        assert!(matches!(
            parsed,
            ParsedName::Chain { head_modifier: Some(ref m), target_type: None, .. } if m == "contains"
        ));
    }

    #[test]
    fn test_nested_reverse_chain() {
        let parsed = parse("_has:Procedure:subject:_has:Encounter:reason-reference:service-provider.endpoint.name")
            .unwrap();
        assert!(parsed.is_reverse_chain());
        assert_eq!(parsed.depth(), 4);
        let ParsedName::ReverseChain { child_type, rest, .. } = parsed else {
            panic!("expected reverse chain");
        };
        assert_eq!(child_type, "Procedure");
        assert!(rest.is_reverse_chain());
    }

    #[test]
    fn test_reverse_chain_with_modifier_tail() {
        let parsed = parse("_has:Procedure:subject:code:badModifier").unwrap();
        let ParsedName::ReverseChain { rest, .. } = parsed else {
            panic!("expected reverse chain");
        };
        assert_eq!(*rest, simple("code", Some("badModifier")));
    }

    #[test]
    fn test_malformed_reverse_chains() {
        for key in [
            "_has",
            "_has:",
            "_has:Procedure",
            "_has:Procedure:subject",
            "_has:Procedure:subject:",
            "_has:Procedure:subject:extra:_has:Encounter:reason-reference:status",
        ] {
            let err = parse(key).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedReverseChain, "key {}", key);
        }
    }

    #[test]
    fn test_malformed_names() {
        for key in ["", ":exact", "name:", "subject.", "a:b:c", "subject..name"] {
            let err = parse(key).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedParameterName, "key {}", key);
        }
    }

    #[test]
    fn test_depth_bound() {
        let parser = NameParser::new(2);
        assert!(parser.parse("a.b.c").is_ok());
        let err = parser.parse("a.b.c.d").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChainTooDeep);
        let err = parser
            .parse("_has:A:b:_has:C:d:_has:E:f:g")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChainTooDeep);
    }
}
