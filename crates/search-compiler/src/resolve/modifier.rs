//! Modifier/type compatibility.

use crate::error::SearchError;
use crate::schema::SearchParameterDefinition;
use crate::types::SearchModifier;

use super::Resolver;

impl Resolver<'_> {
    /// Validates a terminal modifier against the parameter's value type.
    pub(super) fn validate_modifier(
        &self,
        resource_type: &str,
        definition: &SearchParameterDefinition,
        raw: Option<&str>,
    ) -> Result<Option<SearchModifier>, SearchError> {
        let Some(raw) = raw else {
            return Ok(None);
        };

        let modifier = SearchModifier::parse(raw).ok_or_else(|| SearchError::UndefinedModifier {
            modifier: raw.to_string(),
        })?;

        if !modifier.is_valid_for(definition.param_type) {
            return Err(SearchError::UnsupportedModifierForType {
                param_type: definition.param_type,
                modifier: raw.to_string(),
            });
        }

        if let Some(type_name) = modifier.type_name() {
            if !self.accepts_target(definition, type_name) {
                return Err(SearchError::TargetTypeNotAllowed {
                    target_type: type_name.to_string(),
                    name: definition.code.clone(),
                    resource_type: resource_type.to_string(),
                });
            }
        }

        Ok(Some(modifier))
    }
}
