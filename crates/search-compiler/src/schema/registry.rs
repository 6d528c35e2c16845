//! SearchParameter registry.
//!
//! The registry is an immutable snapshot of resource types and the search
//! parameters each declares, indexed by (resource_type, code) and by URL.
//! Reloads build a new registry and publish it through a
//! [`SnapshotStore`](crate::snapshot::SnapshotStore).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::LoaderError;

use super::definition::{ResourceTypeSchema, SearchParameterDefinition};

/// Read-only view of the resource type schema graph.
///
/// Only [`lookup`](Self::lookup) is required; the remaining methods walk the
/// base-type chain through it.
pub trait SchemaProvider: Send + Sync {
    /// Returns the schema of a resource type.
    fn lookup(&self, resource_type: &str) -> Option<&ResourceTypeSchema>;

    /// Returns `resource_type` followed by its base types, most derived first.
    ///
    /// Unknown types yield just themselves.
    fn lineage(&self, resource_type: &str) -> Vec<String> {
        let mut chain = vec![resource_type.to_string()];
        let mut current = self.lookup(resource_type);
        while let Some(base) = current.and_then(|s| s.base_type.as_deref()) {
            if chain.iter().any(|t| t == base) {
                break;
            }
            chain.push(base.to_string());
            current = self.lookup(base);
        }
        chain
    }

    /// Finds a usable parameter on a type or any of its base types.
    fn lookup_parameter(
        &self,
        resource_type: &str,
        code: &str,
    ) -> Option<Arc<SearchParameterDefinition>> {
        self.lineage(resource_type).iter().find_map(|t| {
            self.lookup(t)
                .and_then(|schema| schema.parameter(code))
                .cloned()
        })
    }

    /// Returns true if `ancestor` is `resource_type` or one of its base types.
    fn is_a(&self, resource_type: &str, ancestor: &str) -> bool {
        self.lineage(resource_type).iter().any(|t| t == ancestor)
    }

    /// Returns every usable reference parameter visible on a type, by code.
    fn reference_parameters(&self, resource_type: &str) -> Vec<Arc<SearchParameterDefinition>> {
        let mut seen = HashSet::new();
        let mut params = Vec::new();
        for t in self.lineage(resource_type) {
            let Some(schema) = self.lookup(&t) else {
                continue;
            };
            for (code, def) in &schema.parameters {
                if seen.insert(code.clone()) && def.status.is_usable() && def.is_reference() {
                    params.push(Arc::clone(def));
                }
            }
        }
        params.sort_by(|a, b| a.code.cmp(&b.code));
        params
    }
}

/// Immutable registry of resource types and their search parameters.
pub struct SearchParameterRegistry {
    /// Schemas by resource type name.
    types: HashMap<String, ResourceTypeSchema>,

    /// Parameters indexed by canonical URL.
    params_by_url: HashMap<String, Arc<SearchParameterDefinition>>,
}

impl SearchParameterRegistry {
    /// Starts building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Returns the number of registered parameters.
    pub fn len(&self) -> usize {
        self.params_by_url.len()
    }

    /// Returns true if no parameters are registered.
    pub fn is_empty(&self) -> bool {
        self.params_by_url.is_empty()
    }

    /// Returns the number of declared resource types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Gets a parameter by canonical URL.
    pub fn get_by_url(&self, url: &str) -> Option<Arc<SearchParameterDefinition>> {
        self.params_by_url.get(url).cloned()
    }

    /// Returns the declared resource type names, sorted.
    pub fn resource_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl SchemaProvider for SearchParameterRegistry {
    fn lookup(&self, resource_type: &str) -> Option<&ResourceTypeSchema> {
        self.types.get(resource_type)
    }
}

impl std::fmt::Debug for SearchParameterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchParameterRegistry")
            .field("params_count", &self.params_by_url.len())
            .field("resource_types", &self.resource_types())
            .finish()
    }
}

/// Collects type declarations and definitions, then validates them into a
/// [`SearchParameterRegistry`].
#[derive(Debug, Default, Clone)]
pub struct RegistryBuilder {
    types: Vec<(String, Option<String>)>,
    params: Vec<SearchParameterDefinition>,
}

impl RegistryBuilder {
    /// Declares a resource type and its base type.
    pub fn resource_type(mut self, name: impl Into<String>, base: Option<&str>) -> Self {
        self.add_resource_type(name, base.map(str::to_string));
        self
    }

    /// Adds a definition. A later definition with the same URL replaces an
    /// earlier one.
    pub fn parameter(mut self, def: SearchParameterDefinition) -> Self {
        self.add_parameter(def);
        self
    }

    /// Declares a resource type in place.
    pub fn add_resource_type(&mut self, name: impl Into<String>, base: Option<String>) {
        let name = name.into();
        match self.types.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = base,
            None => self.types.push((name, base)),
        }
    }

    /// Adds a definition in place.
    pub fn add_parameter(&mut self, def: SearchParameterDefinition) {
        match self.params.iter_mut().find(|p| p.url == def.url) {
            Some(existing) => *existing = def,
            None => self.params.push(def),
        }
    }

    /// Validates the declarations and builds the registry.
    pub fn build(self) -> Result<SearchParameterRegistry, LoaderError> {
        let mut types: HashMap<String, ResourceTypeSchema> = HashMap::new();
        for (name, base) in &self.types {
            types.insert(name.clone(), ResourceTypeSchema::new(name, base.clone()));
        }

        for (name, base) in &self.types {
            if let Some(base) = base {
                if !types.contains_key(base) {
                    return Err(LoaderError::UndeclaredResourceType {
                        type_name: base.clone(),
                        context: format!("the base of '{}'", name),
                    });
                }
            }
            check_acyclic(&types, name)?;
        }

        let mut params_by_url = HashMap::new();
        for def in self.params {
            let def = Arc::new(def);
            for base in &def.base {
                let schema =
                    types
                        .get_mut(base)
                        .ok_or_else(|| LoaderError::UndeclaredResourceType {
                            type_name: base.clone(),
                            context: format!("SearchParameter {}", def.url),
                        })?;
                if schema.parameters.contains_key(&def.code) {
                    return Err(LoaderError::DuplicateParameter {
                        resource_type: base.clone(),
                        code: def.code.clone(),
                    });
                }
                schema.parameters.insert(def.code.clone(), Arc::clone(&def));
            }
            params_by_url.insert(def.url.clone(), def);
        }

        Ok(SearchParameterRegistry {
            types,
            params_by_url,
        })
    }
}

fn check_acyclic(types: &HashMap<String, ResourceTypeSchema>, start: &str) -> Result<(), LoaderError> {
    let mut visited = HashSet::new();
    let mut current = Some(start);
    while let Some(name) = current {
        if !visited.insert(name) {
            return Err(LoaderError::CyclicHierarchy {
                type_name: start.to_string(),
            });
        }
        current = types.get(name).and_then(|s| s.base_type.as_deref());
    }
    Ok(())
}
