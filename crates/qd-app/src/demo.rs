//! Scripted exploration session
//!
//! Drives the engine through the interactions a dashboard host would
//! produce: initial load, rapid filter changes, pagination, column
//! customization, the ticker, and a backend outage with recovery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use qd_core::{
    cell_text, DataService, DatasetUpdate, EngineEvent, EngineSettings, FetchResult,
    FilterKeySpec, FilterOptions, PresentationSink, QueryParam, Row, SessionContext, TickerDriver,
};
use qd_data::{DataError, JsonFileService, MemoryService, QueryCoordinator};

/// Sink that renders engine output as log lines
struct LogSink;

impl PresentationSink for LogSink {
    fn on_dataset_update(&self, update: &DatasetUpdate) {
        info!(
            phase = ?update.phase,
            page = update.page,
            total_pages = update.total_pages,
            rows = update.row_count,
            ticker_rows = update.ticker_rows.len(),
            "dataset update"
        );
        for row in update.page_rows.iter().take(5) {
            let cells: Vec<String> = update
                .visible_columns
                .iter()
                .map(|col| row.get(col.as_str()).map(cell_text).unwrap_or_default())
                .collect();
            info!("  {}", cells.join(" | "));
        }
    }

    fn on_event(&self, event: &EngineEvent) {
        info!(?event, "engine event");
    }
}

/// Wraps a service and fails every fetch while the outage flag is set
struct FlakyService {
    inner: Arc<MemoryService>,
    failing: AtomicBool,
}

#[async_trait]
impl DataService for FlakyService {
    async fn fetch(&self, params: &[QueryParam]) -> Result<FetchResult> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DataError::Service("backend unavailable".into()).into());
        }
        self.inner.fetch(params).await
    }

    async fn filter_options(&self, keys: &[FilterKeySpec]) -> Result<FilterOptions> {
        self.inner.filter_options(keys).await
    }

    fn service_name(&self) -> &str {
        self.inner.service_name()
    }
}

fn key_specs() -> Vec<FilterKeySpec> {
    vec![
        FilterKeySpec::new("loja", ["sigla", "sigla_loja"]),
        FilterKeySpec::new("regional", ["regional"]),
        FilterKeySpec::new("mes", ["mes", "mes_referencia"]),
        FilterKeySpec::new("ano", ["ano"]),
        FilterKeySpec::new("pendencia", ["pendencia"]),
    ]
}

fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Synthetic lab results, enough rows for three pages
fn sample_rows() -> Vec<Row> {
    let regionais = ["RJ", "SP", "MG", "BA"];
    let meses = ["janeiro", "fevereiro", "marco"];
    let pendencias = ["", "micro", "", "fq", "", ""];

    (0..48)
        .map(|i| {
            row(&[
                ("sigla_loja", json!(format!("LJ{:02}", i + 1))),
                ("regional", json!(regionais[i % regionais.len()])),
                ("mes", json!(meses[i % meses.len()])),
                ("ano", json!(2026)),
                ("pendencia", json!(pendencias[i % pendencias.len()])),
                ("ph", json!(6.5 + (i % 10) as f64 * 0.15)),
                ("cloro_mg_l", json!(0.2 + (i % 5) as f64 * 0.3)),
            ])
        })
        .collect()
}

pub async fn run(dataset: Option<String>) -> Result<()> {
    let settings = EngineSettings {
        debounce_ms: 150,
        ..EngineSettings::default()
    };
    let ctx = SessionContext::new(settings, tokio::runtime::Handle::current());

    let memory = match dataset {
        Some(path) => {
            let loaded = JsonFileService::load(&path).await?;
            let result = loaded.fetch(&[]).await?;
            Arc::new(MemoryService::new("dataset", result.rows))
        }
        None => Arc::new(MemoryService::new("amostras", sample_rows())),
    };
    let service = Arc::new(FlakyService {
        inner: memory,
        failing: AtomicBool::new(false),
    });

    let coordinator = Arc::new(
        QueryCoordinator::new(ctx.clone(), service.clone(), key_specs()).with_highlight(
            Arc::new(|row: &Row| {
                matches!(row.get("pendencia"), Some(v) if !cell_text(v).is_empty())
            }),
        ),
    );

    let sink: Arc<dyn PresentationSink> = Arc::new(LogSink);
    ctx.sinks.register(sink.clone());

    // Initial load: filter options first, then an unfiltered fetch
    coordinator.load_filter_options().await?;
    coordinator.refresh().await;

    // Rapid filter changes coalesce into a single query
    info!("--- filtering by regional ---");
    ctx.filters.write().set_values("regional", vec!["RJ"]);
    coordinator.schedule_refresh();
    ctx.filters.write().set_values("regional", vec!["RJ", "SP"]);
    coordinator.schedule_refresh();
    tokio::time::sleep(Duration::from_millis(400)).await;

    // Free-text search across every column, then drop it
    info!("--- search ---");
    ctx.filters.write().set_search("micro");
    coordinator.refresh().await;
    ctx.filters.write().set_search("");
    coordinator.refresh().await;

    // Page through the filtered result
    info!("--- pagination ---");
    coordinator.go_to_page(2);
    coordinator.go_to_page(1);

    // Hide a column, move another to the front
    info!("--- column customization ---");
    ctx.view.write().toggle_visible("ano");
    ctx.view.write().move_before("pendencia", Some("sigla_loja"));
    coordinator.publish_update();

    // Let the ticker scroll, then pause and step through it
    info!("--- ticker ---");
    ctx.ticker.write().set_item_extent(160.0);
    let driver = TickerDriver::new(
        Arc::clone(&ctx.ticker),
        Arc::clone(&ctx.sinks),
        ctx.runtime_handle.clone(),
        Duration::from_millis(ctx.settings.frame_interval_ms),
    );
    driver.start();
    tokio::time::sleep(Duration::from_millis(500)).await;

    ctx.ticker.write().pause();
    ctx.ticker.write().step(160.0);
    tokio::time::sleep(Duration::from_millis(300)).await;
    info!(position = ctx.ticker.read().position() as f64, "stepped while paused");
    ctx.ticker.write().resume();
    tokio::time::sleep(Duration::from_millis(200)).await;
    driver.stop();

    // Backend outage: the committed rows stay on screen
    info!("--- outage and recovery ---");
    service.failing.store(true, Ordering::SeqCst);
    coordinator.refresh().await;
    info!(
        phase = ?coordinator.phase(),
        retained = coordinator.row_count(),
        "rows retained through the failure"
    );

    service.failing.store(false, Ordering::SeqCst);
    coordinator.retry();
    tokio::time::sleep(Duration::from_millis(200)).await;

    info!("session complete");
    Ok(())
}
