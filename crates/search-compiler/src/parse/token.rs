//! Query token parsing.
//!
//! Groups raw `(key, value)` pairs into AND repetition groups and splits each
//! occurrence's value into its OR group. Keys stay opaque here.

use super::escape::split_unescaped;

/// One occurrence of a query parameter.
///
/// `values` holds the comma-separated OR alternatives, still escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawParameter {
    /// The parameter key as sent by the client.
    pub key: String,
    /// The OR alternatives of this occurrence.
    pub values: Vec<String>,
}

impl RawParameter {
    /// Creates a raw parameter, splitting `value` on unescaped commas.
    pub fn new(key: impl Into<String>, value: &str) -> Self {
        Self {
            key: key.into(),
            values: split_unescaped(value, ',')
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// All occurrences of one key; each occurrence is ANDed with the others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepetitionGroup {
    /// The shared key.
    pub key: String,
    /// The occurrences in request order.
    pub occurrences: Vec<RawParameter>,
}

impl RepetitionGroup {
    /// Number of AND occurrences of the key.
    pub fn repetitions(&self) -> usize {
        self.occurrences.len()
    }
}

/// The tokenized query of one search request.
///
/// Groups are kept in order of each key's first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuery {
    groups: Vec<RepetitionGroup>,
}

impl RawQuery {
    /// Creates an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a query from ordered `(key, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut query = Self::new();
        for (key, value) in pairs {
            query.push(key, value.as_ref());
        }
        query
    }

    /// Builds a query from a `key -> [occurrence values]` multimap.
    pub fn from_multimap<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut query = Self::new();
        for (key, values) in entries {
            let key = key.into();
            for value in values {
                query.push(key.clone(), value.as_ref());
            }
        }
        query
    }

    /// Builds a query from a raw `application/x-www-form-urlencoded` string.
    pub fn from_query_string(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    /// Appends one occurrence of `key`.
    pub fn push(&mut self, key: impl Into<String>, value: &str) {
        let param = RawParameter::new(key, value);
        match self.groups.iter_mut().find(|g| g.key == param.key) {
            Some(group) => group.occurrences.push(param),
            None => self.groups.push(RepetitionGroup {
                key: param.key.clone(),
                occurrences: vec![param],
            }),
        }
    }

    /// Returns the repetition groups in order of first appearance.
    pub fn groups(&self) -> &[RepetitionGroup] {
        &self.groups
    }

    /// Returns true if no parameters were supplied.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
