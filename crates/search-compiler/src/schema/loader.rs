//! SearchParameter loader.
//!
//! Reads FHIR `SearchParameter` resources and resource type declarations into
//! a [`RegistryBuilder`]. Sources are:
//!
//! - the embedded R4 core registry compiled into the crate
//! - registry documents (`{"resourceTypes": [...], "searchParameters": ...}`)
//! - plain SearchParameter JSON (Bundle, array, or single resource)
//! - any of the above read from a file

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::LoaderError;
use crate::types::SearchParamType;

use super::definition::{SearchParameterDefinition, SearchParameterStatus};
use super::registry::{RegistryBuilder, SearchParameterRegistry};

/// Extension flagging a reference parameter whose includes must name a
/// target type.
pub const TARGET_TYPE_REQUIRED_EXTENSION: &str =
    "http://heliossoftware.com/fhir/StructureDefinition/search-parameter-target-type-required";

const EMBEDDED_R4_REGISTRY: &str = include_str!("../../resources/r4-search-registry.json");

#[derive(Debug, Deserialize)]
struct ResourceTypeDeclaration {
    name: String,
    #[serde(default)]
    base: Option<String>,
}

/// Loader for search parameter registries.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchParameterLoader;

impl SearchParameterLoader {
    /// Creates a new loader.
    pub fn new() -> Self {
        Self
    }

    /// Builds the embedded R4 core registry.
    pub fn load_embedded(&self) -> Result<SearchParameterRegistry, LoaderError> {
        self.embedded_builder()?.build()
    }

    /// Returns a builder pre-filled with the embedded R4 core registry, for
    /// layering additional documents on top.
    pub fn embedded_builder(&self) -> Result<RegistryBuilder, LoaderError> {
        let json: Value = serde_json::from_str(EMBEDDED_R4_REGISTRY)?;
        let mut builder = SearchParameterRegistry::builder();
        self.load_document(&json, &mut builder)?;
        Ok(builder)
    }

    /// Adds a registry document or SearchParameter JSON to `builder`.
    ///
    /// Returns the number of SearchParameter definitions read.
    pub fn load_document(
        &self,
        json: &Value,
        builder: &mut RegistryBuilder,
    ) -> Result<usize, LoaderError> {
        let is_document = json.get("resourceTypes").is_some() || json.get("searchParameters").is_some();
        if !is_document {
            return self.add_parameters(json, builder);
        }

        if let Some(types) = json.get("resourceTypes") {
            let declarations: Vec<ResourceTypeDeclaration> =
                serde_json::from_value(types.clone())?;
            for decl in declarations {
                builder.add_resource_type(decl.name, decl.base);
            }
        }

        match json.get("searchParameters") {
            Some(params) => self.add_parameters(params, builder),
            None => Ok(0),
        }
    }

    /// Reads a registry document or SearchParameter JSON from a file.
    pub fn load_file(
        &self,
        path: &Path,
        builder: &mut RegistryBuilder,
    ) -> Result<usize, LoaderError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let json: Value = serde_json::from_str(&content)?;
        let count = self.load_document(&json, builder)?;
        debug!(path = %path.display(), count, "Loaded search parameter file");
        Ok(count)
    }

    /// Parses SearchParameter resources from a Bundle, an array, or a single
    /// resource. Entries of other resource types are skipped.
    pub fn load_from_json(&self, json: &Value) -> Result<Vec<SearchParameterDefinition>, LoaderError> {
        let is_search_parameter =
            |v: &Value| v.get("resourceType").and_then(Value::as_str) == Some("SearchParameter");

        let resources: Vec<&Value> = if let Some(entries) = json.get("entry").and_then(Value::as_array) {
            entries.iter().filter_map(|e| e.get("resource")).collect()
        } else if let Some(array) = json.as_array() {
            array.iter().collect()
        } else {
            vec![json]
        };

        resources
            .into_iter()
            .filter(|r| is_search_parameter(*r))
            .map(|r| self.parse_resource(r))
            .collect()
    }

    /// Parses a single SearchParameter resource.
    pub fn parse_resource(&self, resource: &Value) -> Result<SearchParameterDefinition, LoaderError> {
        let url = resource
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| LoaderError::MissingField {
                field: "url".to_string(),
                url: "(unknown)".to_string(),
            })?
            .to_string();

        let code = required_str(resource, "code", &url)?.to_string();
        let type_str = required_str(resource, "type", &url)?;
        let param_type =
            type_str
                .parse::<SearchParamType>()
                .map_err(|message| LoaderError::InvalidResource {
                    message: format!("{} in {}", message, url),
                })?;

        let base = string_array(resource, "base");
        if base.is_empty() {
            return Err(LoaderError::MissingField {
                field: "base".to_string(),
                url,
            });
        }

        let target = string_array(resource, "target");
        if param_type == SearchParamType::Reference && target.is_empty() {
            return Err(LoaderError::InvalidResource {
                message: format!("reference parameter {} declares no target types", url),
            });
        }

        let status = resource
            .get("status")
            .and_then(Value::as_str)
            .and_then(SearchParameterStatus::from_fhir_status)
            .unwrap_or_default();

        let target_type_required = resource
            .get("extension")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|ext| ext.get("url").and_then(Value::as_str) == Some(TARGET_TYPE_REQUIRED_EXTENSION))
            .find_map(|ext| ext.get("valueBoolean").and_then(Value::as_bool))
            .unwrap_or(false);

        let mut def = SearchParameterDefinition::new(url, code, param_type)
            .with_base(base)
            .with_targets(target)
            .with_required_target_type(target_type_required)
            .with_status(status);
        if let Some(expression) = resource.get("expression").and_then(Value::as_str) {
            def = def.with_expression(expression);
        }
        Ok(def)
    }

    fn add_parameters(&self, json: &Value, builder: &mut RegistryBuilder) -> Result<usize, LoaderError> {
        let params = self.load_from_json(json)?;
        let count = params.len();
        for def in params {
            builder.add_parameter(def);
        }
        Ok(count)
    }
}

fn required_str<'a>(resource: &'a Value, field: &str, url: &str) -> Result<&'a str, LoaderError> {
    resource
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| LoaderError::MissingField {
            field: field.to_string(),
            url: url.to_string(),
        })
}

fn string_array(resource: &Value, field: &str) -> Vec<String> {
    resource
        .get(field)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}
