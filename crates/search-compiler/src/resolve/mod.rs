//! Type-directed resolution of parsed parameter names against the schema.
//!
//! Resolution walks the [`ParsedName`] tree, looking each hop up on the
//! current resource type, and produces a [`QueryTerm`] whose leaf is a fully
//! typed [`ParameterExpression`]. Resolution stops at the first error.

mod chain;
mod include;
mod modifier;
mod reverse_chain;

use tracing::trace;

use crate::error::SearchError;
use crate::parse::ParsedName;
use crate::schema::{SchemaProvider, SearchParameterDefinition};
use crate::types::{ParameterExpression, QueryTerm, TypedValue};

pub use include::IncludeKind;

/// Resolves parsed names and include directives against a schema snapshot.
pub struct Resolver<'a> {
    schema: &'a dyn SchemaProvider,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver over `schema`.
    pub fn new(schema: &'a dyn SchemaProvider) -> Self {
        Self { schema }
    }

    /// Resolves `name` on `resource_type`, parsing `values` at the terminal.
    pub fn resolve(
        &self,
        resource_type: &str,
        name: &ParsedName,
        values: &[String],
    ) -> Result<QueryTerm, SearchError> {
        match name {
            ParsedName::Simple { name, modifier } => self
                .resolve_parameter(resource_type, name, modifier.as_deref(), values)
                .map(QueryTerm::Parameter),
            ParsedName::Chain {
                head,
                head_modifier,
                target_type,
                rest,
            } => self.resolve_chain(
                resource_type,
                head,
                head_modifier.as_deref(),
                target_type.as_deref(),
                rest,
                values,
            ),
            ParsedName::ReverseChain {
                child_type,
                ref_param,
                rest,
            } => self.resolve_reverse_chain(resource_type, child_type, ref_param, rest, values),
        }
    }

    fn resolve_parameter(
        &self,
        resource_type: &str,
        name: &str,
        modifier: Option<&str>,
        values: &[String],
    ) -> Result<ParameterExpression, SearchError> {
        let definition = self
            .schema
            .lookup_parameter(resource_type, name)
            .ok_or_else(|| SearchError::UnknownSearchParameter {
                name: name.to_string(),
                resource_type: resource_type.to_string(),
            })?;

        let modifier = self.validate_modifier(resource_type, &definition, modifier)?;

        let values = values
            .iter()
            .map(|raw| {
                TypedValue::parse(raw, definition.param_type, modifier.as_ref()).map_err(|reason| {
                    SearchError::InvalidValue {
                        name: name.to_string(),
                        value: raw.clone(),
                        reason,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        trace!(resource_type, parameter = name, values = values.len(), "Resolved parameter");
        Ok(ParameterExpression {
            resource_type: resource_type.to_string(),
            definition,
            modifier,
            values,
        })
    }

    /// Returns true if `target_type` is an acceptable target of `definition`.
    fn accepts_target(&self, definition: &SearchParameterDefinition, target_type: &str) -> bool {
        definition.target.contains(target_type)
            || (definition.targets_any() && self.schema.lookup(target_type).is_some())
    }

    /// Ensures a resolved target type exists in the schema.
    fn require_declared(&self, target_type: &str, parameter: &str) -> Result<(), SearchError> {
        if self.schema.lookup(target_type).is_none() {
            return Err(SearchError::Configuration {
                message: format!(
                    "target type '{}' of search parameter '{}' is not a declared resource type",
                    target_type, parameter
                ),
            });
        }
        Ok(())
    }
}
