//! Column resolution
//!
//! Logical filter keys are stable, hand-authored identifiers; the spelling
//! of the matching column depends entirely on the uploaded spreadsheet's
//! header row. Resolution maps each logical key to the actual field name
//! observed in the data, scanning an ordered candidate list and taking the
//! first spelling that is present.

use ahash::AHashMap;
use indexmap::IndexMap;
use tracing::warn;

use crate::rows::Row;

/// A logical filter key plus the ordered spellings it may appear under
#[derive(Debug, Clone)]
pub struct FilterKeySpec {
    /// Stable internal name, independent of the spreadsheet header
    pub logical: String,

    /// Plausible column spellings, first match against a row wins
    pub candidates: Vec<String>,
}

impl FilterKeySpec {
    pub fn new<S, I, C>(logical: S, candidates: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            logical: logical.into(),
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }
}

/// Outcome of resolving one logical key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedField {
    /// The candidate spelling was present in the observed data
    Matched(String),

    /// No candidate matched; holds the first candidate so a filter control
    /// can still render. Filtering on it matches zero rows.
    Fallback(String),
}

impl ResolvedField {
    /// The actual field name to use in query parameters
    pub fn field_name(&self) -> &str {
        match self {
            ResolvedField::Matched(name) | ResolvedField::Fallback(name) => name,
        }
    }

    /// Whether the field was actually observed in the data
    ///
    /// Controls bound to an unmatched key are rendered disabled.
    pub fn is_matched(&self) -> bool {
        matches!(self, ResolvedField::Matched(_))
    }
}

/// Logical key -> actual field name, built once per dataset
///
/// Replaced wholesale on every fetch that commits a new dataset; never
/// patched incrementally.
#[derive(Debug, Clone, Default)]
pub struct ResolvedColumns {
    fields: IndexMap<String, ResolvedField>,
}

impl ResolvedColumns {
    /// Resolve every logical key against a sample row
    ///
    /// Must be called with a row from a non-empty fetch; callers defer
    /// resolution while the dataset is empty.
    pub fn resolve(sample: &Row, specs: &[FilterKeySpec]) -> Self {
        let mut fields = IndexMap::new();

        for spec in specs {
            let matched = spec
                .candidates
                .iter()
                .find(|candidate| sample.contains_key(candidate.as_str()));

            match (matched, spec.candidates.first()) {
                (Some(name), _) => {
                    fields.insert(spec.logical.clone(), ResolvedField::Matched(name.clone()));
                }
                (None, Some(first)) => {
                    warn!(
                        key = %spec.logical,
                        fallback = %first,
                        "no candidate column matched, falling back to first candidate"
                    );
                    fields.insert(spec.logical.clone(), ResolvedField::Fallback(first.clone()));
                }
                (None, None) => {
                    // A key without candidates cannot even degrade
                    warn!(key = %spec.logical, "filter key has no candidate columns, skipping");
                }
            }
        }

        Self { fields }
    }

    /// Seed resolution from the data service's `*_col_name` hints
    ///
    /// Lets filter controls work before the first non-empty fetch arrives.
    pub fn from_hints(hints: &AHashMap<String, String>, specs: &[FilterKeySpec]) -> Self {
        let mut fields = IndexMap::new();

        for spec in specs {
            if let Some(name) = hints.get(&spec.logical) {
                fields.insert(spec.logical.clone(), ResolvedField::Matched(name.clone()));
            } else if let Some(first) = spec.candidates.first() {
                fields.insert(spec.logical.clone(), ResolvedField::Fallback(first.clone()));
            }
        }

        Self { fields }
    }

    pub fn get(&self, logical: &str) -> Option<&ResolvedField> {
        self.fields.get(logical)
    }

    /// Actual field name for a logical key, if the key is known
    pub fn field_for(&self, logical: &str) -> Option<&str> {
        self.fields.get(logical).map(ResolvedField::field_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResolvedField)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_row() -> Row {
        let mut row = Row::new();
        row.insert("sigla_loja".to_string(), json!("AB1"));
        row.insert("regional".to_string(), json!("RJ"));
        row.insert("pendencia".to_string(), json!("micro"));
        row
    }

    fn specs() -> Vec<FilterKeySpec> {
        vec![
            FilterKeySpec::new("loja", ["sigla", "sigla_loja"]),
            FilterKeySpec::new("regional", ["regional"]),
        ]
    }

    #[test]
    fn test_first_present_candidate_wins() {
        let resolved = ResolvedColumns::resolve(&sample_row(), &specs());

        assert_eq!(resolved.field_for("loja"), Some("sigla_loja"));
        assert_eq!(resolved.field_for("regional"), Some("regional"));
        assert!(resolved.get("loja").unwrap().is_matched());
    }

    #[test]
    fn test_total_miss_falls_back_to_first_candidate() {
        let specs = vec![FilterKeySpec::new("mes", ["mes", "mês"])];
        let resolved = ResolvedColumns::resolve(&sample_row(), &specs);

        let field = resolved.get("mes").unwrap();
        assert_eq!(field.field_name(), "mes");
        assert!(!field.is_matched());
    }

    #[test]
    fn test_every_key_resolves_to_something() {
        // Matched or first-candidate fallback, never absent
        let specs = vec![
            FilterKeySpec::new("loja", ["sigla", "sigla_loja"]),
            FilterKeySpec::new("ano", ["ano"]),
        ];
        let resolved = ResolvedColumns::resolve(&sample_row(), &specs);

        for spec in &specs {
            let field = resolved.get(&spec.logical).unwrap();
            let name = field.field_name();
            assert!(
                sample_row().contains_key(name) || name == spec.candidates[0],
                "{name} is neither observed nor the first candidate"
            );
        }
    }

    #[test]
    fn test_from_hints_prefers_service_hint() {
        let mut hints = AHashMap::new();
        hints.insert("loja".to_string(), "sigla_loja".to_string());

        let resolved = ResolvedColumns::from_hints(&hints, &specs());

        assert!(resolved.get("loja").unwrap().is_matched());
        assert_eq!(resolved.field_for("loja"), Some("sigla_loja"));
        // No hint for "regional": degraded to first candidate
        assert!(!resolved.get("regional").unwrap().is_matched());
        assert_eq!(resolved.field_for("regional"), Some("regional"));
    }
}
