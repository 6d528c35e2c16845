//! Compiles raw search parameters into a [`CompiledQuery`].
//!
//! Each top-level key is parsed once and every AND occurrence is resolved.
//! Resolved terms are then grouped by canonical key and checked against the
//! tenant's policies. Resolution of one key stops at its first error; errors
//! from independent keys are collected. The combination check runs only when
//! every key succeeded.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::config::CompilerConfig;
use crate::error::{QueryErrors, SearchError};
use crate::parse::{NameParser, RawQuery, RepetitionGroup, is_has_key};
use crate::resolve::{IncludeKind, Resolver};
use crate::restrict::RestrictionEnforcer;
use crate::schema::{RESOURCE_BASE_TYPE, SchemaProvider};
use crate::tenant::{PolicyProvider, TenantId};
use crate::types::{CompiledQuery, IncludeSpec, QueryTerm};

/// Result-control parameters handled by the executor, not compiled here.
pub const RESULT_PARAMETERS: &[&str] = &[
    "_count",
    "_offset",
    "_sort",
    "_total",
    "_summary",
    "_elements",
    "_contained",
    "_containedType",
    "_format",
    "_pretty",
    "_cursor",
];

/// Returns true if `key` is a result-control parameter.
pub fn is_result_parameter(key: &str) -> bool {
    RESULT_PARAMETERS.contains(&key)
}

/// Request-scoped state accumulated while compiling.
#[derive(Default)]
struct Assembly {
    terms: Vec<QueryTerm>,
    includes: Vec<IncludeSpec>,
    rev_includes: Vec<IncludeSpec>,
}

/// Compiles searches against one schema and policy snapshot.
pub struct QueryCompiler<'a> {
    schema: &'a dyn SchemaProvider,
    policies: &'a dyn PolicyProvider,
    config: &'a CompilerConfig,
}

impl<'a> QueryCompiler<'a> {
    /// Creates a compiler over the given snapshots.
    pub fn new(
        schema: &'a dyn SchemaProvider,
        policies: &'a dyn PolicyProvider,
        config: &'a CompilerConfig,
    ) -> Self {
        Self {
            schema,
            policies,
            config,
        }
    }

    /// Compiles a search on `resource_type`.
    pub fn compile(
        &self,
        tenant: &TenantId,
        resource_type: &str,
        query: &RawQuery,
    ) -> Result<CompiledQuery, QueryErrors> {
        if self.schema.lookup(resource_type).is_none() {
            return Err(SearchError::UnsupportedSearchType {
                resource_type: resource_type.to_string(),
            }
            .into());
        }
        self.compile_in(tenant, Some(resource_type), query)
    }

    /// Compiles a system-level search across all resource types.
    ///
    /// Only parameters declared on `Resource` are available, and `_has` is
    /// rejected.
    pub fn compile_system(&self, tenant: &TenantId, query: &RawQuery) -> Result<CompiledQuery, QueryErrors> {
        self.compile_in(tenant, None, query)
    }

    fn compile_in(
        &self,
        tenant: &TenantId,
        searched: Option<&str>,
        query: &RawQuery,
    ) -> Result<CompiledQuery, QueryErrors> {
        let context = searched.unwrap_or(RESOURCE_BASE_TYPE);
        let enforcer = RestrictionEnforcer::new(self.schema, self.policies, tenant);
        let mut assembly = Assembly::default();
        let mut errors = Vec::new();
        let mut halted = false;

        for group in query.groups() {
            let outcome = match IncludeKind::from_key(&group.key) {
                Some((kind, key_iterate)) => {
                    self.compile_includes(&enforcer, searched, kind, key_iterate, group, &mut assembly)
                }
                None if is_result_parameter(&group.key) => continue,
                None => self.compile_group(searched, group, &mut assembly.terms),
            };

            if let Err(err) = outcome {
                let fatal = !err.is_client_error();
                errors.push(err);
                if fatal || !self.config.aggregate_errors {
                    halted = true;
                    break;
                }
            }
        }

        // Spellings of one key resolve to the same canonical key; AND
        // repetition is counted across all of them.
        let terms = group_by_key(std::mem::take(&mut assembly.terms), QueryTerm::key);
        if !halted {
            for group in &terms {
                let checked = group
                    .iter()
                    .try_for_each(|term| enforcer.check_parameter(term, group.len()));
                if let Err(err) = checked {
                    errors.push(err);
                    if !self.config.aggregate_errors {
                        break;
                    }
                }
            }
        }
        assembly.terms = terms.into_iter().flatten().collect();
        for specs in [&mut assembly.includes, &mut assembly.rev_includes] {
            *specs = group_by_key(std::mem::take(specs), |spec| spec.iterate)
                .into_iter()
                .flatten()
                .collect();
        }

        if errors.is_empty() {
            let names: BTreeSet<String> = assembly
                .terms
                .iter()
                .map(|term| term.head_name().to_string())
                .collect();
            if let Err(err) = enforcer.check_combination(context, &names) {
                errors.push(err);
            }
        }

        if !errors.is_empty() {
            warn!(
                tenant = %tenant,
                resource_type = context,
                errors = errors.len(),
                "Rejected search query"
            );
            return Err(QueryErrors::new(errors));
        }

        debug!(
            tenant = %tenant,
            resource_type = context,
            terms = assembly.terms.len(),
            includes = assembly.includes.len(),
            rev_includes = assembly.rev_includes.len(),
            "Compiled search query"
        );
        Ok(CompiledQuery::new(
            searched.map(str::to_string),
            assembly.terms,
            assembly.includes,
            assembly.rev_includes,
        ))
    }

    /// Resolves every AND occurrence of one key. Per-parameter restrictions
    /// are checked once all keys are resolved.
    fn compile_group(
        &self,
        searched: Option<&str>,
        group: &RepetitionGroup,
        terms: &mut Vec<QueryTerm>,
    ) -> Result<(), SearchError> {
        if searched.is_none() && is_has_key(&group.key) {
            return Err(SearchError::UnsupportedTopLevelHas {
                key: group.key.clone(),
            });
        }

        let context = searched.unwrap_or(RESOURCE_BASE_TYPE);
        let parsed = NameParser::new(self.config.max_chain_depth).parse(&group.key)?;
        let resolver = Resolver::new(self.schema);

        let mut resolved = Vec::with_capacity(group.repetitions());
        for occurrence in &group.occurrences {
            resolved.push(resolver.resolve(context, &parsed, &occurrence.values)?);
        }
        terms.extend(resolved);
        Ok(())
    }

    fn compile_includes(
        &self,
        enforcer: &RestrictionEnforcer<'_>,
        searched: Option<&str>,
        kind: IncludeKind,
        key_iterate: bool,
        group: &RepetitionGroup,
        assembly: &mut Assembly,
    ) -> Result<(), SearchError> {
        let context = searched.unwrap_or(RESOURCE_BASE_TYPE);
        let resolver = Resolver::new(self.schema);

        let mut resolved = Vec::new();
        for raw in group.occurrences.iter().flat_map(|o| o.values.iter()) {
            let spec = resolver.resolve_include(kind, searched, raw, key_iterate)?;
            enforcer.check_include(context, kind, &spec)?;
            resolved.push(spec);
        }
        match kind {
            IncludeKind::Include => assembly.includes.extend(resolved),
            IncludeKind::RevInclude => assembly.rev_includes.extend(resolved),
        }
        Ok(())
    }
}

/// Groups `items` by `key`, keeping each key's first appearance order.
fn group_by_key<T, K: PartialEq>(items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<Vec<T>> {
    let mut groups: Vec<(K, Vec<T>)> = Vec::new();
    for item in items {
        let k = key(&item);
        match groups.iter_mut().find(|(existing, _)| *existing == k) {
            Some((_, group)) => group.push(item),
            None => groups.push((k, vec![item])),
        }
    }
    groups.into_iter().map(|(_, group)| group).collect()
}
