//! `_has` reverse chain resolution.
//!
//! `Patient?_has:Observation:subject:code=x` keeps patients referenced by at
//! least one Observation (through `subject`) whose `code` matches `x`.

use tracing::trace;

use crate::error::SearchError;
use crate::parse::ParsedName;
use crate::types::{QueryTerm, ReverseChainNode};

use super::Resolver;

impl Resolver<'_> {
    pub(super) fn resolve_reverse_chain(
        &self,
        parent_type: &str,
        child_type: &str,
        ref_param: &str,
        rest: &ParsedName,
        values: &[String],
    ) -> Result<QueryTerm, SearchError> {
        if self.schema.lookup(child_type).is_none() {
            return Err(SearchError::UnknownResourceType {
                resource_type: child_type.to_string(),
            });
        }

        let reference = self
            .schema
            .lookup_parameter(child_type, ref_param)
            .ok_or_else(|| SearchError::UnknownSearchParameter {
                name: ref_param.to_string(),
                resource_type: child_type.to_string(),
            })?;

        if !reference.is_reference() {
            return Err(SearchError::NotReverseChainable {
                name: reference.code.clone(),
            });
        }

        // The reference must be able to point at the parent or one of its bases.
        if !reference
            .target
            .iter()
            .any(|target| self.schema.is_a(parent_type, target))
        {
            return Err(SearchError::ReverseChainTargetMismatch {
                name: reference.code.clone(),
                expected: parent_type.to_string(),
            });
        }

        let child = self.resolve(child_type, rest, values)?;
        trace!(parent_type, child_type, ref_param, "Resolved reverse chain");
        Ok(QueryTerm::ReverseChain(ReverseChainNode {
            child_type: child_type.to_string(),
            ref_param: reference,
            parent_type: parent_type.to_string(),
            child: Box::new(child),
        }))
    }
}
