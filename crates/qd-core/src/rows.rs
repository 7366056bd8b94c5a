//! Dynamic row model
//!
//! Rows originate from whatever header row an uploaded spreadsheet had, so
//! field names are never known at compile time. A row is an ordered mapping
//! from field name to a JSON-ish cell value; the column list that travels
//! with every fetch result defines the canonical server-provided order.

use ahash::AHashMap;
use indexmap::IndexMap;
use serde_json::Value;

/// A single fetched row: ordered field name -> cell value
///
/// Every row in a given fetch result shares the same field-name set.
pub type Row = IndexMap<String, Value>;

/// Result of one data-service fetch
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    /// The matching rows, in server order
    pub rows: Vec<Row>,

    /// Canonical ordered column list for this result
    pub columns: Vec<String>,
}

/// One serialized query parameter sent to the data service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    /// Actual field name, never the logical key
    pub field: String,

    /// Delimited value string (see [`crate::filters::VALUE_DELIMITER`])
    pub value: String,
}

/// Filter-option discovery payload from the data service
///
/// Mirrors the wire shape `{ [key]: string[], [key + "_col_name"]: string }`:
/// per logical key a list of selectable values, plus a hint naming the
/// actual column the key maps to.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Logical key -> distinct selectable values, in discovery order
    pub values: IndexMap<String, Vec<String>>,

    /// Logical key -> actual field name hint
    pub column_names: AHashMap<String, String>,
}

impl FilterOptions {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.column_names.is_empty()
    }
}

/// Render a cell value as display/comparison text
///
/// Nulls become the empty string so that spreadsheet blanks never filter
/// or render as the literal word "null".
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
