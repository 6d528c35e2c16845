//! The compiled query handed to the execution layer.

use std::sync::Arc;

use crate::schema::SearchParameterDefinition;

use super::search_params::SearchModifier;
use super::value::TypedValue;

/// A terminal parameter test: one AND occurrence with its OR values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterExpression {
    /// The resource type the parameter is evaluated on.
    pub resource_type: String,
    /// The resolved definition.
    pub definition: Arc<SearchParameterDefinition>,
    /// Validated modifier.
    pub modifier: Option<SearchModifier>,
    /// OR alternatives.
    pub values: Vec<TypedValue>,
}

impl ParameterExpression {
    /// The parameter code.
    pub fn name(&self) -> &str {
        &self.definition.code
    }

    fn key(&self) -> String {
        match &self.modifier {
            Some(m) => format!("{}:{}", self.definition.code, m),
            None => self.definition.code.clone(),
        }
    }
}

/// A forward chain hop: `via` on `source_type` leads to `target_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainNode {
    /// Type holding the reference.
    pub source_type: String,
    /// The reference parameter followed.
    pub via: Arc<SearchParameterDefinition>,
    /// The target type the chain continues on.
    pub target_type: String,
    /// The rest of the chain.
    pub child: Box<QueryTerm>,
}

/// A reverse chain hop: some `child_type` resource references the parent
/// through `ref_param`. Evaluated as an EXISTS predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseChainNode {
    /// The referencing resource type.
    pub child_type: String,
    /// The reference parameter on `child_type`.
    pub ref_param: Arc<SearchParameterDefinition>,
    /// The type being searched at this level.
    pub parent_type: String,
    /// The test applied to the referencing resource.
    pub child: Box<QueryTerm>,
}

/// One ANDed term of a compiled query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTerm {
    /// A parameter of the searched type.
    Parameter(ParameterExpression),
    /// A forward chain.
    Chain(ChainNode),
    /// A `_has` reverse chain.
    ReverseChain(ReverseChainNode),
}

impl QueryTerm {
    /// Returns the terminal parameter expression.
    pub fn terminal(&self) -> &ParameterExpression {
        let mut term = self;
        loop {
            match term {
                QueryTerm::Parameter(expr) => return expr,
                QueryTerm::Chain(node) => term = node.child.as_ref(),
                QueryTerm::ReverseChain(node) => term = node.child.as_ref(),
            }
        }
    }

    /// The top-level name used for combination checks: the parameter code,
    /// the chain head, or `_has`.
    pub fn head_name(&self) -> &str {
        match self {
            QueryTerm::Parameter(expr) => expr.name(),
            QueryTerm::Chain(node) => &node.via.code,
            QueryTerm::ReverseChain(_) => "_has",
        }
    }

    /// Prints the canonical parameter key.
    pub fn key(&self) -> String {
        match self {
            QueryTerm::Parameter(expr) => expr.key(),
            QueryTerm::Chain(node) => {
                format!("{}:{}.{}", node.via.code, node.target_type, node.child.key())
            }
            QueryTerm::ReverseChain(node) => format!(
                "_has:{}:{}:{}",
                node.child_type,
                node.ref_param.code,
                node.child.key()
            ),
        }
    }

    /// Prints the canonical, escaped OR value list.
    pub fn value(&self) -> String {
        self.terminal()
            .values
            .iter()
            .map(TypedValue::to_query_value)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// The reference parameter(s) an include follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeParameter {
    /// A single named reference parameter.
    Named(Arc<SearchParameterDefinition>),
    /// `Source:*`, expanded to every reference parameter of the source type.
    Wildcard(Vec<Arc<SearchParameterDefinition>>),
}

/// A resolved `_include` or `_revinclude` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeSpec {
    /// Type holding the reference.
    pub source_type: String,
    /// Reference parameter(s) followed.
    pub parameter: IncludeParameter,
    /// Target type restriction.
    pub target_type: Option<String>,
    /// `:iterate` was requested.
    pub iterate: bool,
}

impl IncludeSpec {
    /// Prints the directive as `Source:param[:Target]`.
    pub fn directive(&self) -> String {
        let param = match &self.parameter {
            IncludeParameter::Named(def) => def.code.as_str(),
            IncludeParameter::Wildcard(_) => "*",
        };
        match &self.target_type {
            Some(t) => format!("{}:{}:{}", self.source_type, param, t),
            None => format!("{}:{}", self.source_type, param),
        }
    }
}

/// A validated search, ready for execution.
///
/// Built once by the compiler and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    resource_type: Option<String>,
    terms: Vec<QueryTerm>,
    includes: Vec<IncludeSpec>,
    rev_includes: Vec<IncludeSpec>,
}

impl CompiledQuery {
    pub(crate) fn new(
        resource_type: Option<String>,
        terms: Vec<QueryTerm>,
        includes: Vec<IncludeSpec>,
        rev_includes: Vec<IncludeSpec>,
    ) -> Self {
        Self {
            resource_type,
            terms,
            includes,
            rev_includes,
        }
    }

    /// The searched type; `None` for a system-level search.
    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    /// ANDed terms, in request order.
    pub fn terms(&self) -> &[QueryTerm] {
        &self.terms
    }

    /// `_include` directives.
    pub fn includes(&self) -> &[IncludeSpec] {
        &self.includes
    }

    /// `_revinclude` directives.
    pub fn rev_includes(&self) -> &[IncludeSpec] {
        &self.rev_includes
    }

    /// Prints the query as ordered `(key, value)` pairs that compile back to
    /// an equal query.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> =
            self.terms.iter().map(|t| (t.key(), t.value())).collect();
        for (key, specs) in [("_include", &self.includes), ("_revinclude", &self.rev_includes)] {
            for spec in specs {
                let key = if spec.iterate {
                    format!("{}:iterate", key)
                } else {
                    key.to_string()
                };
                pairs.push((key, spec.directive()));
            }
        }
        pairs
    }
}
