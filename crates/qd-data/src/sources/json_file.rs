//! JSON file data service
//!
//! The ingestion pipeline drops each processed spreadsheet as a JSON array
//! of row objects; this service reads such a file and serves it through the
//! in-memory service. `reload` picks up a rewritten file without restarting
//! the session.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use qd_core::{DataService, FetchResult, FilterKeySpec, FilterOptions, QueryParam, Row};

use crate::sources::MemoryService;
use crate::DataError;

/// Data service backed by a JSON rows file
pub struct JsonFileService {
    path: PathBuf,
    inner: MemoryService,
}

impl JsonFileService {
    /// Read and parse the file
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, DataError> {
        let path = path.into();
        let rows = Self::read_rows(&path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("dataset.json")
            .to_string();

        info!(file = %path.display(), rows = rows.len(), "loaded dataset");
        Ok(Self {
            inner: MemoryService::new(name, rows),
            path,
        })
    }

    /// Re-read the file and swap the dataset wholesale
    pub async fn reload(&self) -> Result<usize, DataError> {
        let rows = Self::read_rows(&self.path).await?;
        let count = rows.len();
        self.inner.replace_rows(rows);
        info!(file = %self.path.display(), rows = count, "reloaded dataset");
        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_rows(path: &Path) -> Result<Vec<Row>, DataError> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl DataService for JsonFileService {
    async fn fetch(&self, params: &[QueryParam]) -> anyhow::Result<FetchResult> {
        self.inner.fetch(params).await
    }

    async fn filter_options(&self, keys: &[FilterKeySpec]) -> anyhow::Result<FilterOptions> {
        self.inner.filter_options(keys).await
    }

    fn service_name(&self) -> &str {
        self.inner.service_name()
    }
}
