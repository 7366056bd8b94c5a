//! In-memory data service
//!
//! Serves a row set that already lives in memory, applying query parameters
//! with the backend's matching rules: a pipe-delimited parameter is a
//! case-insensitive membership test on the stringified cell, a single value
//! an equality test, the reserved search parameter a case-insensitive
//! contains across every column, and an unknown field name matches nothing.

use std::time::Duration;

use ahash::AHashSet;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use qd_core::{
    cell_text, DataService, FetchResult, FilterKeySpec, FilterOptions, QueryParam, Row,
    SEARCH_PARAM, VALUE_DELIMITER,
};

use crate::DataError;

/// Data service over an in-memory row set
pub struct MemoryService {
    name: String,

    /// Artificial per-request delay, for exercising debounce and
    /// stale-response handling
    latency: Option<Duration>,

    table: RwLock<TableData>,
}

struct TableData {
    rows: Vec<Row>,
    columns: Vec<String>,
}

impl TableData {
    fn new(rows: Vec<Row>) -> Self {
        // Every row shares one field-name set; the first row's order is the
        // canonical column order
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self { rows, columns }
    }
}

impl MemoryService {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            latency: None,
            table: RwLock::new(TableData::new(rows)),
        }
    }

    /// Parse a JSON array of row objects
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self, DataError> {
        let rows: Vec<Row> = serde_json::from_str(json)?;
        Ok(Self::new(name, rows))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Swap the dataset wholesale, as a fresh spreadsheet upload would
    pub fn replace_rows(&self, rows: Vec<Row>) {
        *self.table.write() = TableData::new(rows);
    }

    pub fn row_count(&self) -> usize {
        self.table.read().rows.len()
    }

    fn matches(row: &Row, param: &QueryParam) -> bool {
        if param.field == SEARCH_PARAM {
            let needle = param.value.trim().to_lowercase();
            return row
                .values()
                .any(|cell| cell_text(cell).to_lowercase().contains(&needle));
        }

        let Some(cell) = row.get(param.field.as_str()) else {
            return false;
        };
        let cell = cell_text(cell).to_lowercase();

        if param.value.contains(VALUE_DELIMITER) {
            param
                .value
                .split(VALUE_DELIMITER)
                .any(|wanted| wanted.trim().to_lowercase() == cell)
        } else {
            cell == param.value.trim().to_lowercase()
        }
    }
}

#[async_trait]
impl DataService for MemoryService {
    async fn fetch(&self, params: &[QueryParam]) -> anyhow::Result<FetchResult> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let table = self.table.read();
        let rows: Vec<Row> = table
            .rows
            .iter()
            .filter(|row| params.iter().all(|param| Self::matches(row, param)))
            .cloned()
            .collect();

        debug!(
            service = %self.name,
            total = table.rows.len(),
            matched = rows.len(),
            "serving fetch"
        );

        Ok(FetchResult {
            rows,
            columns: table.columns.clone(),
        })
    }

    async fn filter_options(&self, keys: &[FilterKeySpec]) -> anyhow::Result<FilterOptions> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let table = self.table.read();
        let mut options = FilterOptions::default();

        for spec in keys {
            // Keys whose candidates the sheet lacks get no options at all;
            // the client side degrades to a fallback resolution
            let Some(column) = spec
                .candidates
                .iter()
                .find(|candidate| table.columns.iter().any(|c| &c == candidate))
            else {
                continue;
            };

            let mut seen = AHashSet::new();
            let mut values = Vec::new();
            for row in &table.rows {
                if let Some(cell) = row.get(column.as_str()) {
                    let text = cell_text(cell);
                    if !text.is_empty() && seen.insert(text.clone()) {
                        values.push(text);
                    }
                }
            }
            values.sort();

            options.values.insert(spec.logical.clone(), values);
            options
                .column_names
                .insert(spec.logical.clone(), column.clone());
        }

        Ok(options)
    }

    fn service_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn service() -> MemoryService {
        MemoryService::new(
            "amostras",
            vec![
                row(&[
                    ("sigla_loja", json!("AB1")),
                    ("regional", json!("RJ")),
                    ("pendencia", json!("micro")),
                ]),
                row(&[
                    ("sigla_loja", json!("CD2")),
                    ("regional", json!("SP")),
                    ("pendencia", json!("fq")),
                ]),
                row(&[
                    ("sigla_loja", json!("EF3")),
                    ("regional", json!("MG")),
                    ("pendencia", json!(null)),
                ]),
            ],
        )
    }

    fn param(field: &str, value: &str) -> QueryParam {
        QueryParam {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetch_without_params_returns_all() {
        let result = service().fetch(&[]).await.unwrap();
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.columns, ["sigla_loja", "regional", "pendencia"]);
    }

    #[tokio::test]
    async fn test_multi_value_param_is_case_insensitive_membership() {
        let result = service()
            .fetch(&[param("regional", "rj|sp")])
            .await
            .unwrap();
        assert_eq!(result.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_single_value_param_is_equality() {
        let result = service().fetch(&[param("regional", "MG")]).await.unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(cell_text(&result.rows[0]["sigla_loja"]), "EF3");
    }

    #[tokio::test]
    async fn test_params_combine_with_and() {
        let result = service()
            .fetch(&[param("regional", "RJ|SP"), param("pendencia", "micro")])
            .await
            .unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(cell_text(&result.rows[0]["regional"]), "RJ");
    }

    #[tokio::test]
    async fn test_search_param_matches_any_column() {
        let result = service().fetch(&[param("q", "MIC")]).await.unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(cell_text(&result.rows[0]["pendencia"]), "micro");
    }

    #[tokio::test]
    async fn test_search_combines_with_column_params() {
        let result = service()
            .fetch(&[param("regional", "RJ|SP"), param("q", "fq")])
            .await
            .unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(cell_text(&result.rows[0]["sigla_loja"]), "CD2");
    }

    #[tokio::test]
    async fn test_unknown_field_matches_nothing() {
        let result = service()
            .fetch(&[param("inexistente", "x")])
            .await
            .unwrap();
        assert!(result.rows.is_empty());
    }

    #[tokio::test]
    async fn test_filter_options_distinct_sorted_with_hints() {
        let keys = vec![
            FilterKeySpec::new("loja", ["sigla", "sigla_loja"]),
            FilterKeySpec::new("regional", ["regional"]),
            FilterKeySpec::new("mes", ["mes"]),
        ];
        let options = service().filter_options(&keys).await.unwrap();

        assert_eq!(
            options.values["regional"],
            vec!["MG".to_string(), "RJ".to_string(), "SP".to_string()]
        );
        assert_eq!(options.column_names["loja"], "sigla_loja");
        // "mes" is not in the sheet: no options, no hint
        assert!(!options.values.contains_key("mes"));
        assert!(!options.column_names.contains_key("mes"));
    }

    #[tokio::test]
    async fn test_null_cells_are_not_offered_as_options() {
        let keys = vec![FilterKeySpec::new("pendencia", ["pendencia"])];
        let options = service().filter_options(&keys).await.unwrap();
        assert_eq!(
            options.values["pendencia"],
            vec!["fq".to_string(), "micro".to_string()]
        );
    }

    #[tokio::test]
    async fn test_replace_rows_swaps_dataset() {
        let service = service();
        service.replace_rows(vec![row(&[("amostra", json!("X"))])]);

        let result = service.fetch(&[]).await.unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.columns, ["amostra"]);
    }

    #[test]
    fn test_from_json_rejects_malformed_input() {
        assert!(MemoryService::from_json("bad", "{not json").is_err());
    }
}
