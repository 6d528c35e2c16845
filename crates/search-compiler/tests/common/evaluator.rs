//! In-memory evaluation of compiled queries.
//!
//! Just enough of an executor to check the semantics of compiled terms:
//! every AND term must hold, OR values inside a term are alternatives, and a
//! reverse chain is an EXISTS over the referencing resources.

use std::collections::HashMap;

use helios_search_compiler::types::{CompiledQuery, QueryTerm, TypedValue};

/// A resource reduced to its indexed search values.
#[derive(Debug, Clone)]
pub struct TestResource {
    pub resource_type: String,
    pub id: String,
    values: HashMap<String, Vec<String>>,
}

impl TestResource {
    pub fn new(resource_type: &str, id: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            values: HashMap::new(),
        }
    }

    /// Adds an indexed value; references are written as `Type/id`.
    pub fn with(mut self, param: &str, value: &str) -> Self {
        self.values
            .entry(param.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    fn reference(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }

    fn indexed(&self, param: &str) -> Vec<&str> {
        if param == "_id" {
            return vec![self.id.as_str()];
        }
        self.values
            .get(param)
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// A set of resources that compiled queries run against.
#[derive(Debug, Default)]
pub struct TestStore {
    resources: Vec<TestResource>,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resource: TestResource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Returns the sorted ids of the searched type matching every term.
    pub fn search(&self, query: &CompiledQuery) -> Vec<String> {
        let mut ids: Vec<String> = self
            .resources
            .iter()
            .filter(|r| query.resource_type().is_none_or(|t| t == r.resource_type))
            .filter(|r| query.terms().iter().all(|term| self.matches(r, term)))
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn matches(&self, resource: &TestResource, term: &QueryTerm) -> bool {
        match term {
            QueryTerm::Parameter(expr) => {
                let indexed = resource.indexed(expr.name());
                expr.values
                    .iter()
                    .any(|value| indexed.iter().any(|stored| value_matches(value, stored)))
            }
            QueryTerm::Chain(node) => resource
                .indexed(&node.via.code)
                .iter()
                .filter_map(|reference| self.resolve(reference))
                .filter(|target| target.resource_type == node.target_type)
                .any(|target| self.matches(target, &node.child)),
            QueryTerm::ReverseChain(node) => {
                let reference = resource.reference();
                self.resources
                    .iter()
                    .filter(|child| child.resource_type == node.child_type)
                    .filter(|child| child.indexed(&node.ref_param.code).contains(&reference.as_str()))
                    .any(|child| self.matches(child, &node.child))
            }
        }
    }

    fn resolve(&self, reference: &str) -> Option<&TestResource> {
        self.resources.iter().find(|r| r.reference() == reference)
    }
}

fn value_matches(value: &TypedValue, stored: &str) -> bool {
    match value {
        TypedValue::Token { code, .. } => stored == code,
        TypedValue::String { value } => stored.to_lowercase().starts_with(&value.to_lowercase()),
        TypedValue::Uri { value } => stored == value,
        TypedValue::Reference { resource_type, id } => match resource_type {
            Some(t) => stored == format!("{}/{}", t, id),
            None => stored == id || stored.ends_with(&format!("/{}", id)),
        },
        _ => false,
    }
}
