//! Typed search values.
//!
//! A [`TypedValue`] is one OR alternative of a terminal parameter, parsed
//! according to the parameter's value type and modifier.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;

use super::search_params::{SearchModifier, SearchParamType, SearchPrefix, is_type_name};
use crate::parse::escape::{escape, split_unescaped, unescape};

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})(-(\d{2})(-(\d{2})(T\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:\d{2})?)?)?)?$",
    )
    .expect("valid date pattern")
});

/// One parsed search value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    /// A string value, or token text under `:text`.
    String { value: String },
    /// A URI, or a value set / canonical under `:in`, `:above`, `:below`.
    Uri { value: String },
    /// `[system|]code`; an empty system (`|code`) is kept as `Some("")`.
    Token {
        system: Option<String>,
        code: String,
    },
    /// `system|code|value` under `:of-type`: an identifier of the given type.
    OfType {
        system: String,
        code: String,
        value: String,
    },
    /// `[Type/]id`, or an absolute reference URL in `id`.
    Reference {
        resource_type: Option<String>,
        id: String,
    },
    /// `[prefix]decimal`.
    Number {
        prefix: Option<SearchPrefix>,
        value: Decimal,
    },
    /// `[prefix]date`, validated against the FHIR date/dateTime form.
    Date {
        prefix: Option<SearchPrefix>,
        value: String,
    },
    /// `[prefix]decimal[|system|code]`.
    Quantity {
        prefix: Option<SearchPrefix>,
        value: Decimal,
        system: Option<String>,
        code: Option<String>,
    },
    /// The argument of `:missing`.
    Missing { missing: bool },
    /// `$`-separated composite components.
    Composite { components: Vec<String> },
    /// Value of a special parameter, kept verbatim after unescaping.
    Special { value: String },
}

impl TypedValue {
    /// Parses one raw (still escaped) OR alternative.
    ///
    /// Returns a human-readable reason when the value is not acceptable.
    pub fn parse(
        raw: &str,
        param_type: SearchParamType,
        modifier: Option<&SearchModifier>,
    ) -> Result<Self, String> {
        if raw.is_empty() {
            return Err("empty value".to_string());
        }

        match modifier {
            Some(SearchModifier::Missing) => {
                return match raw {
                    "true" => Ok(TypedValue::Missing { missing: true }),
                    "false" => Ok(TypedValue::Missing { missing: false }),
                    _ => Err("':missing' takes 'true' or 'false'".to_string()),
                };
            }
            Some(SearchModifier::Text) => {
                return Ok(TypedValue::String {
                    value: unescape(raw)?,
                });
            }
            Some(
                SearchModifier::In
                | SearchModifier::NotIn
                | SearchModifier::Above
                | SearchModifier::Below,
            ) if param_type == SearchParamType::Token => {
                return Ok(TypedValue::Uri {
                    value: unescape(raw)?,
                });
            }
            Some(SearchModifier::Identifier) => return parse_token(raw),
            Some(SearchModifier::OfType) => return parse_of_type(raw),
            _ => {}
        }

        match param_type {
            SearchParamType::String => Ok(TypedValue::String {
                value: unescape(raw)?,
            }),
            SearchParamType::Uri => Ok(TypedValue::Uri {
                value: unescape(raw)?,
            }),
            SearchParamType::Token => parse_token(raw),
            SearchParamType::Reference => {
                let type_modifier = modifier.and_then(SearchModifier::type_name);
                parse_reference(raw, type_modifier)
            }
            SearchParamType::Number => {
                let (prefix, rest) = parse_prefix(raw, param_type)?;
                Ok(TypedValue::Number {
                    prefix,
                    value: parse_decimal(rest)?,
                })
            }
            SearchParamType::Date => {
                let (prefix, rest) = parse_prefix(raw, param_type)?;
                let value = unescape(rest)?;
                validate_date(&value)?;
                Ok(TypedValue::Date { prefix, value })
            }
            SearchParamType::Quantity => parse_quantity(raw),
            SearchParamType::Composite => Ok(TypedValue::Composite {
                components: split_unescaped(raw, '$')
                    .into_iter()
                    .map(unescape)
                    .collect::<Result<_, _>>()?,
            }),
            SearchParamType::Special => Ok(TypedValue::Special {
                value: unescape(raw)?,
            }),
        }
    }

    /// Returns the explicit comparator prefix, if any.
    pub fn prefix(&self) -> Option<SearchPrefix> {
        match self {
            TypedValue::Number { prefix, .. }
            | TypedValue::Date { prefix, .. }
            | TypedValue::Quantity { prefix, .. } => *prefix,
            _ => None,
        }
    }

    /// Prints the value in escaped query-string form.
    pub fn to_query_value(&self) -> String {
        match self {
            TypedValue::String { value }
            | TypedValue::Uri { value }
            | TypedValue::Special { value } => escape(value, &[]),
            TypedValue::Token { system, code } => match system {
                Some(system) => format!("{}|{}", escape(system, &['|']), escape(code, &['|'])),
                None => escape(code, &['|']),
            },
            TypedValue::OfType {
                system,
                code,
                value,
            } => [system, code, value]
                .iter()
                .map(|part| escape(part, &['|']))
                .collect::<Vec<_>>()
                .join("|"),
            TypedValue::Reference { resource_type, id } => match resource_type {
                Some(t) => format!("{}/{}", t, escape(id, &[])),
                None => escape(id, &[]),
            },
            TypedValue::Number { prefix, value } => format!("{}{}", prefix_str(prefix), value),
            TypedValue::Date { prefix, value } => {
                format!("{}{}", prefix_str(prefix), escape(value, &[]))
            }
            TypedValue::Quantity {
                prefix,
                value,
                system,
                code,
            } => {
                let mut out = format!("{}{}", prefix_str(prefix), value);
                if system.is_some() || code.is_some() {
                    out.push('|');
                    out.push_str(&escape(system.as_deref().unwrap_or(""), &['|']));
                    out.push('|');
                    out.push_str(&escape(code.as_deref().unwrap_or(""), &['|']));
                }
                out
            }
            TypedValue::Missing { missing } => missing.to_string(),
            TypedValue::Composite { components } => components
                .iter()
                .map(|c| escape(c, &['$']))
                .collect::<Vec<_>>()
                .join("$"),
        }
    }
}

fn prefix_str(prefix: &Option<SearchPrefix>) -> String {
    prefix.map(|p| p.to_string()).unwrap_or_default()
}

fn parse_prefix(
    raw: &str,
    param_type: SearchParamType,
) -> Result<(Option<SearchPrefix>, &str), String> {
    let (prefix, rest) = SearchPrefix::extract(raw);
    if let Some(p) = prefix {
        if !p.is_valid_for(param_type) {
            return Err(format!("prefix '{}' is not valid for {} values", p, param_type));
        }
    }
    Ok((prefix, rest))
}

fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    let text = unescape(raw)?;
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| format!("'{}' is not a decimal number", text))
}

fn validate_date(value: &str) -> Result<(), String> {
    let caps = DATE_PATTERN
        .captures(value)
        .ok_or_else(|| format!("'{}' is not a valid date or dateTime", value))?;

    // Reject calendar-impossible dates such as 2021-02-30.
    if let (Some(y), Some(m)) = (caps.get(1), caps.get(3)) {
        let day = caps.get(5).map(|d| d.as_str()).unwrap_or("01");
        let text = format!("{}-{}-{}", y.as_str(), m.as_str(), day);
        NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map_err(|_| format!("'{}' is not a valid calendar date", value))?;
    }
    Ok(())
}

fn parse_token(raw: &str) -> Result<TypedValue, String> {
    let parts = split_unescaped(raw, '|');
    match parts.as_slice() {
        [code] => Ok(TypedValue::Token {
            system: None,
            code: unescape(code)?,
        }),
        [system, code] => Ok(TypedValue::Token {
            system: Some(unescape(system)?),
            code: unescape(code)?,
        }),
        _ => Err("token values take the form [system|]code".to_string()),
    }
}

fn parse_of_type(raw: &str) -> Result<TypedValue, String> {
    let parts = split_unescaped(raw, '|');
    let [system, code, value] = parts.as_slice() else {
        return Err(":of-type values take the form system|code|value".to_string());
    };
    let (system, code, value) = (unescape(system)?, unescape(code)?, unescape(value)?);
    if code.is_empty() || value.is_empty() {
        return Err(":of-type values need a type code and an identifier value".to_string());
    }
    Ok(TypedValue::OfType {
        system,
        code,
        value,
    })
}

fn parse_reference(raw: &str, type_modifier: Option<&str>) -> Result<TypedValue, String> {
    let value = unescape(raw)?;
    if type_modifier.is_some() || value.contains("://") {
        return Ok(TypedValue::Reference {
            resource_type: None,
            id: value,
        });
    }
    match value.split_once('/') {
        Some((t, id)) if is_type_name(t) && !id.is_empty() => Ok(TypedValue::Reference {
            resource_type: Some(t.to_string()),
            id: id.to_string(),
        }),
        _ => Ok(TypedValue::Reference {
            resource_type: None,
            id: value,
        }),
    }
}

fn parse_quantity(raw: &str) -> Result<TypedValue, String> {
    let (prefix, rest) = parse_prefix(raw, SearchParamType::Quantity)?;
    let parts = split_unescaped(rest, '|');
    let non_empty = |s: &str| -> Result<Option<String>, String> {
        let s = unescape(s)?;
        Ok(if s.is_empty() { None } else { Some(s) })
    };
    match parts.as_slice() {
        [number] => Ok(TypedValue::Quantity {
            prefix,
            value: parse_decimal(number)?,
            system: None,
            code: None,
        }),
        [number, system, code] => Ok(TypedValue::Quantity {
            prefix,
            value: parse_decimal(number)?,
            system: non_empty(system)?,
            code: non_empty(code)?,
        }),
        _ => Err("quantity values take the form [prefix]number[|system|code]".to_string()),
    }
}
