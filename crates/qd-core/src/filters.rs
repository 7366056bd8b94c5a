//! Multi-value filter state
//!
//! Holds the set of logical filter keys currently constraining the query,
//! each with the values the user has selected. Serialization turns the
//! selection into query parameters using the resolved actual field names.

use indexmap::IndexMap;
use tracing::debug;

use crate::resolve::ResolvedColumns;
use crate::rows::QueryParam;

/// Delimiter joining multiple selected values into one parameter.
///
/// Part of the data-service contract. Pipe rather than comma so that
/// values which themselves contain commas ("Suco, Gelo") survive intact.
pub const VALUE_DELIMITER: &str = "|";

/// Reserved parameter name for the free-text search term.
///
/// Matched case-insensitively against every column on the data-service
/// side; never a spreadsheet column name.
pub const SEARCH_PARAM: &str = "q";

/// Active filter selections, keyed by logical filter key
///
/// Invariant: a key is never present with an empty value list; clearing the
/// last value removes the key. Insertion order of keys and values is
/// preserved so serialization is deterministic. A free-text search term is
/// held alongside the per-key selections.
#[derive(Debug, Clone, Default)]
pub struct FilterStore {
    selections: IndexMap<String, Vec<String>>,
    search: Option<String>,
}

impl FilterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection for a key; an empty list removes the key
    pub fn set_values<S: Into<String>>(&mut self, key: &str, values: Vec<S>) {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            self.selections.shift_remove(key);
        } else {
            self.selections.insert(key.to_string(), values);
        }
    }

    /// Checkbox semantics: add the value if absent, remove it if present
    ///
    /// Removing the last value removes the key entirely.
    pub fn toggle_value(&mut self, key: &str, value: &str) {
        match self.selections.get_mut(key) {
            Some(values) => {
                if let Some(idx) = values.iter().position(|v| v == value) {
                    values.remove(idx);
                    if values.is_empty() {
                        self.selections.shift_remove(key);
                    }
                } else {
                    values.push(value.to_string());
                }
            }
            None => {
                self.selections
                    .insert(key.to_string(), vec![value.to_string()]);
            }
        }
    }

    /// Replace the free-text search term; blank input clears it
    pub fn set_search(&mut self, text: impl Into<String>) {
        let text = text.into();
        let trimmed = text.trim();
        self.search = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Remove all selections and the search term
    pub fn clear(&mut self) {
        self.selections.clear();
        self.search = None;
    }

    pub fn values(&self, key: &str) -> Option<&[String]> {
        self.selections.get(key).map(Vec::as_slice)
    }

    pub fn active_keys(&self) -> impl Iterator<Item = &String> {
        self.selections.keys()
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty() && self.search.is_none()
    }

    /// Build query parameters from the active selections
    ///
    /// Emits one parameter per key, using the resolved actual field name and
    /// joining values with [`VALUE_DELIMITER`]. Keys absent from the resolved
    /// map are silently dropped; they cannot be expressed until resolution
    /// has seen data for them. An active search term is appended last as the
    /// reserved [`SEARCH_PARAM`] parameter; it needs no resolution.
    pub fn serialize(&self, resolved: &ResolvedColumns) -> Vec<QueryParam> {
        let mut params = Vec::with_capacity(self.selections.len() + 1);

        for (key, values) in &self.selections {
            match resolved.field_for(key) {
                Some(field) => params.push(QueryParam {
                    field: field.to_string(),
                    value: values.join(VALUE_DELIMITER),
                }),
                None => {
                    debug!(key = %key, "dropping selection for unresolved filter key");
                }
            }
        }

        if let Some(term) = &self.search {
            params.push(QueryParam {
                field: SEARCH_PARAM.to_string(),
                value: term.clone(),
            });
        }

        params
    }
}
