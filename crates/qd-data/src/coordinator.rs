//! Query coordination
//!
//! Exactly one component talks to the data service. Filter changes are
//! debounced; every dispatched fetch carries a monotonically increasing
//! sequence number and a response is committed only if no later response
//! has been seen, so a slow early query can never clobber a fast later
//! one. Fetch failures surface a phase change but never clear previously
//! committed rows.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use qd_core::{
    DataService, DatasetUpdate, EngineEvent, FetchPhase, FetchResult, FilterKeySpec,
    FilterOptions, ResolvedColumns, Row, SessionContext,
};

/// Marks rows the ticker should carry (e.g. irregular lab results)
pub type RowPredicate = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

/// Single mutator of the committed dataset
pub struct QueryCoordinator {
    ctx: SessionContext,
    service: Arc<dyn DataService>,
    key_specs: Vec<FilterKeySpec>,
    highlight: Option<RowPredicate>,

    dataset: RwLock<DatasetState>,

    /// Sequence numbers are assigned at dispatch time
    next_seq: AtomicU64,

    /// Pending debounce timer; each new schedule aborts the previous one
    pending: Mutex<Option<JoinHandle<()>>>,

    debounce: Duration,
}

/// Everything committed by the last accepted response
struct DatasetState {
    rows: Vec<Row>,
    columns: Vec<String>,
    resolved: Option<ResolvedColumns>,
    options: FilterOptions,
    phase: FetchPhase,

    /// Highest response sequence seen so far, success or failure; the
    /// discard gate
    highest_seen: u64,

    /// Sequence of the last committed (successful) response
    committed_seq: u64,
    committed_at: Option<DateTime<Utc>>,

    /// Flagged rows feeding the ticker, single copy
    ticker_source: Vec<Row>,
}

impl Default for DatasetState {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            columns: Vec::new(),
            resolved: None,
            options: FilterOptions::default(),
            phase: FetchPhase::Idle,
            highest_seen: 0,
            committed_seq: 0,
            committed_at: None,
            ticker_source: Vec::new(),
        }
    }
}

impl QueryCoordinator {
    pub fn new(
        ctx: SessionContext,
        service: Arc<dyn DataService>,
        key_specs: Vec<FilterKeySpec>,
    ) -> Self {
        let debounce = Duration::from_millis(ctx.settings.debounce_ms);
        Self {
            ctx,
            service,
            key_specs,
            highlight: None,
            dataset: RwLock::new(DatasetState::default()),
            next_seq: AtomicU64::new(0),
            pending: Mutex::new(None),
            debounce,
        }
    }

    /// Set the predicate selecting rows for the ticker
    pub fn with_highlight(mut self, predicate: RowPredicate) -> Self {
        self.highlight = Some(predicate);
        self
    }

    // --- snapshots -------------------------------------------------------

    pub fn phase(&self) -> FetchPhase {
        self.dataset.read().phase.clone()
    }

    pub fn rows(&self) -> Vec<Row> {
        self.dataset.read().rows.clone()
    }

    pub fn row_count(&self) -> usize {
        self.dataset.read().rows.len()
    }

    pub fn columns(&self) -> Vec<String> {
        self.dataset.read().columns.clone()
    }

    pub fn resolved_columns(&self) -> Option<ResolvedColumns> {
        self.dataset.read().resolved.clone()
    }

    pub fn filter_options(&self) -> FilterOptions {
        self.dataset.read().options.clone()
    }

    /// Flagged rows doubled for seamless looping (length 2N)
    pub fn ticker_rows(&self) -> Vec<Row> {
        let dataset = self.dataset.read();
        let mut doubled = Vec::with_capacity(dataset.ticker_source.len() * 2);
        doubled.extend(dataset.ticker_source.iter().cloned());
        doubled.extend(dataset.ticker_source.iter().cloned());
        doubled
    }

    // --- operations ------------------------------------------------------

    /// Fetch the discovery payload and seed resolution from its hints
    pub async fn load_filter_options(&self) -> Result<()> {
        let options = self.service.filter_options(&self.key_specs).await?;
        let key_count = options.values.len();

        {
            let mut dataset = self.dataset.write();
            if dataset.resolved.is_none() && !options.column_names.is_empty() {
                dataset.resolved = Some(ResolvedColumns::from_hints(
                    &options.column_names,
                    &self.key_specs,
                ));
            }
            dataset.options = options;
        }

        info!(
            key_count,
            service = self.service.service_name(),
            "filter options loaded"
        );
        self.ctx
            .sinks
            .publish(&EngineEvent::FilterOptionsLoaded { key_count });
        Ok(())
    }

    /// Schedule a fetch after the quiet period, coalescing rapid changes
    pub fn schedule_refresh(self: &Arc<Self>) {
        self.cancel_pending();

        let this = Arc::clone(self);
        let delay = self.debounce;
        let handle = self.ctx.runtime_handle.spawn(async move {
            tokio::time::sleep(delay).await;
            this.execute().await;
        });
        *self.pending.lock() = Some(handle);
    }

    /// Fetch without waiting out the debounce window
    pub fn refresh_now(self: &Arc<Self>) {
        self.cancel_pending();

        let this = Arc::clone(self);
        let handle = self
            .ctx
            .runtime_handle
            .spawn(async move { this.execute().await });
        *self.pending.lock() = Some(handle);
    }

    /// Run one fetch to completion on the caller's task
    pub async fn refresh(&self) {
        self.cancel_pending();
        self.execute().await;
    }

    /// Manual retry after a failure
    pub fn retry(self: &Arc<Self>) {
        info!("manual retry requested");
        self.refresh_now();
    }

    /// Abort the pending debounce timer, if any
    pub fn cancel_pending(&self) {
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
    }

    /// Jump to a page and republish the snapshot
    pub fn go_to_page(&self, page: usize) {
        let len = self.row_count();
        self.ctx.paginator.write().go_to(page, len);
        self.publish_update();
    }

    /// Re-notify sinks after a host-side store mutation (column toggled,
    /// column moved, page size changed)
    pub fn publish_update(&self) {
        let dataset = self.dataset.read();
        let update = self.build_update(&dataset);
        drop(dataset);
        self.ctx.sinks.notify_update(&update);
    }

    async fn execute(&self) {
        let sequence = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let params = {
            let dataset = self.dataset.read();
            // Selections for unresolved keys are dropped by serialization;
            // the free-text search needs no resolution and always survives
            let resolved = dataset.resolved.clone().unwrap_or_default();
            self.ctx.filters.read().serialize(&resolved)
        };

        // The Loading write shares the lock with the discard gate: a
        // dispatch already superseded by a newer response must not disturb
        // the committed phase
        let update = {
            let mut dataset = self.dataset.write();
            if sequence > dataset.highest_seen {
                dataset.phase = FetchPhase::Loading;
                Some(self.build_update(&dataset))
            } else {
                None
            }
        };
        if let Some(update) = update {
            self.ctx.sinks.notify_update(&update);
        }

        debug!(sequence, params = ?params, "dispatching fetch");
        let result = self.service.fetch(&params).await;
        self.apply_response(sequence, result);
    }

    /// Commit or discard one response
    ///
    /// The sole ordering guarantee in the engine: a response is applied only
    /// if no response with a higher sequence number has already arrived.
    pub fn apply_response(&self, sequence: u64, result: Result<FetchResult>) {
        let mut dataset = self.dataset.write();

        if sequence <= dataset.highest_seen {
            let newest = dataset.highest_seen;
            drop(dataset);
            debug!(sequence, newest, "discarding stale response");
            self.ctx
                .sinks
                .publish(&EngineEvent::StaleResponseDiscarded { sequence, newest });
            return;
        }
        dataset.highest_seen = sequence;

        match result {
            Ok(fetched) => {
                dataset.committed_seq = sequence;
                dataset.committed_at = Some(Utc::now());

                // First non-empty result resolves the filter columns
                if dataset.resolved.is_none() {
                    if let Some(sample) = fetched.rows.first() {
                        dataset.resolved =
                            Some(ResolvedColumns::resolve(sample, &self.key_specs));
                    }
                }

                dataset.rows = fetched.rows;
                dataset.columns = fetched.columns;
                dataset.phase = if dataset.rows.is_empty() {
                    FetchPhase::Empty
                } else {
                    FetchPhase::Ready
                };
                dataset.ticker_source = match &self.highlight {
                    Some(predicate) => dataset
                        .rows
                        .iter()
                        .filter(|row| predicate(row))
                        .cloned()
                        .collect(),
                    None => Vec::new(),
                };

                self.ctx.view.write().reconcile(&dataset.columns);
                self.ctx.paginator.write().reset();
                self.ctx
                    .ticker
                    .write()
                    .set_content_len(dataset.ticker_source.len());

                let event = EngineEvent::DatasetCommitted {
                    sequence,
                    row_count: dataset.rows.len(),
                    column_count: dataset.columns.len(),
                };
                let update = self.build_update(&dataset);
                drop(dataset);

                info!(
                    sequence,
                    rows = update.row_count,
                    columns = update.visible_columns.len(),
                    "dataset committed"
                );
                self.ctx.sinks.publish(&event);
                self.ctx.sinks.notify_update(&update);
            }
            Err(error) => {
                let message = error.to_string();
                dataset.phase = FetchPhase::Failed(message.clone());

                let update = self.build_update(&dataset);
                drop(dataset);

                warn!(sequence, error = %message, "fetch failed, retaining last-good rows");
                self.ctx.sinks.publish(&EngineEvent::FetchFailed {
                    sequence,
                    error: message,
                });
                self.ctx.sinks.notify_update(&update);
            }
        }
    }

    fn build_update(&self, dataset: &DatasetState) -> DatasetUpdate {
        let paginator = self.ctx.paginator.read();
        let total_pages = paginator.total_pages(dataset.rows.len());
        let page_rows = paginator.slice(&dataset.rows).to_vec();

        let mut ticker_rows = Vec::with_capacity(dataset.ticker_source.len() * 2);
        ticker_rows.extend(dataset.ticker_source.iter().cloned());
        ticker_rows.extend(dataset.ticker_source.iter().cloned());

        DatasetUpdate {
            phase: dataset.phase.clone(),
            sequence: dataset.committed_seq,
            visible_columns: self.ctx.view.read().visible_columns(),
            page_rows,
            page: paginator.current(),
            total_pages,
            row_count: dataset.rows.len(),
            ticker_rows,
            committed_at: dataset.committed_at.unwrap_or_else(Utc::now),
        }
    }
}

impl Drop for QueryCoordinator {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MemoryService;
    use qd_core::{cell_text, EngineSettings, TickerState};
    use serde_json::json;

    fn row(loja: &str, regional: &str, pendencia: &str) -> Row {
        [
            ("sigla_loja".to_string(), json!(loja)),
            ("regional".to_string(), json!(regional)),
            ("pendencia".to_string(), json!(pendencia)),
        ]
        .into_iter()
        .collect()
    }

    fn fetched(rows: Vec<Row>) -> FetchResult {
        let columns = rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        FetchResult { rows, columns }
    }

    fn key_specs() -> Vec<FilterKeySpec> {
        vec![
            FilterKeySpec::new("loja", ["sigla", "sigla_loja"]),
            FilterKeySpec::new("regional", ["regional"]),
        ]
    }

    fn coordinator(rows: Vec<Row>) -> (SessionContext, Arc<QueryCoordinator>) {
        let ctx = SessionContext::new(EngineSettings::default(), tokio::runtime::Handle::current());
        let service = Arc::new(MemoryService::new("test", rows));
        let coordinator = Arc::new(QueryCoordinator::new(ctx.clone(), service, key_specs()));
        (ctx, coordinator)
    }

    #[tokio::test]
    async fn test_out_of_order_response_is_discarded() {
        let (_ctx, coordinator) = coordinator(Vec::new());

        coordinator.apply_response(1, Ok(fetched(vec![row("AB1", "RJ", "")])));
        coordinator.apply_response(3, Ok(fetched(vec![row("EF3", "MG", "")])));
        coordinator.apply_response(2, Ok(fetched(vec![row("CD2", "SP", "")])));

        let rows = coordinator.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(cell_text(&rows[0]["sigla_loja"]), "EF3");
    }

    #[tokio::test]
    async fn test_failure_retains_last_good_rows() {
        let (_ctx, coordinator) = coordinator(Vec::new());

        coordinator.apply_response(1, Ok(fetched(vec![row("AB1", "RJ", "")])));
        coordinator.apply_response(2, Err(anyhow::anyhow!("backend unavailable")));

        assert!(coordinator.phase().is_error());
        assert_eq!(coordinator.row_count(), 1);
    }

    #[tokio::test]
    async fn test_success_older_than_seen_failure_is_discarded() {
        let (_ctx, coordinator) = coordinator(Vec::new());

        coordinator.apply_response(2, Err(anyhow::anyhow!("timeout")));
        coordinator.apply_response(1, Ok(fetched(vec![row("AB1", "RJ", "")])));

        assert!(coordinator.phase().is_error());
        assert_eq!(coordinator.row_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_result_is_not_an_error() {
        let (_ctx, coordinator) = coordinator(Vec::new());

        coordinator.apply_response(1, Ok(fetched(Vec::new())));

        assert_eq!(coordinator.phase(), FetchPhase::Empty);
    }

    #[tokio::test]
    async fn test_resolution_deferred_until_nonempty_fetch() {
        let (_ctx, coordinator) = coordinator(Vec::new());

        coordinator.apply_response(1, Ok(fetched(Vec::new())));
        assert!(coordinator.resolved_columns().is_none());

        coordinator.apply_response(2, Ok(fetched(vec![row("AB1", "RJ", "")])));
        let resolved = coordinator.resolved_columns().unwrap();
        assert_eq!(resolved.field_for("loja"), Some("sigla_loja"));
    }

    #[tokio::test]
    async fn test_commit_resets_page_and_reconciles_view() {
        let (ctx, coordinator) = coordinator(Vec::new());

        let many: Vec<Row> = (0..45).map(|i| row(&format!("L{i}"), "RJ", "")).collect();
        coordinator.apply_response(1, Ok(fetched(many)));
        ctx.paginator.write().go_to(3, 45);

        coordinator.apply_response(2, Ok(fetched(vec![row("AB1", "RJ", "")])));

        assert_eq!(ctx.paginator.read().current(), 1);
        assert_eq!(
            ctx.view.read().visible_columns(),
            ["sigla_loja", "regional", "pendencia"]
        );
    }

    #[tokio::test]
    async fn test_highlight_predicate_feeds_ticker() {
        let ctx = SessionContext::new(EngineSettings::default(), tokio::runtime::Handle::current());
        let service = Arc::new(MemoryService::new("test", Vec::new()));
        let coordinator = Arc::new(
            QueryCoordinator::new(ctx.clone(), service, key_specs()).with_highlight(Arc::new(
                |row: &Row| {
                    matches!(row.get("pendencia"), Some(v) if cell_text(v) == "micro")
                },
            )),
        );

        coordinator.apply_response(
            1,
            Ok(fetched(vec![
                row("AB1", "RJ", "micro"),
                row("CD2", "SP", "ok"),
                row("EF3", "MG", "micro"),
            ])),
        );

        assert_eq!(coordinator.ticker_rows().len(), 4);
        assert_eq!(ctx.ticker.read().content_len(), 2);
        assert_eq!(ctx.ticker.read().state(), TickerState::Running);
    }

    #[tokio::test]
    async fn test_superseded_dispatch_keeps_committed_phase() {
        let (_ctx, coordinator) = coordinator(vec![row("AB1", "RJ", "")]);

        coordinator.apply_response(2, Ok(fetched(vec![row("CD2", "SP", "")])));
        assert_eq!(coordinator.phase(), FetchPhase::Ready);

        // This dispatch draws sequence 1, which is already superseded; it
        // must neither flip the phase to Loading nor commit on arrival
        coordinator.refresh().await;

        assert_eq!(coordinator.phase(), FetchPhase::Ready);
        assert_eq!(cell_text(&coordinator.rows()[0]["sigla_loja"]), "CD2");
    }

    #[tokio::test]
    async fn test_sinks_observe_loading_before_commit() {
        struct PhaseSink {
            phases: Mutex<Vec<FetchPhase>>,
        }

        impl qd_core::PresentationSink for PhaseSink {
            fn on_dataset_update(&self, update: &DatasetUpdate) {
                self.phases.lock().push(update.phase.clone());
            }
        }

        let (ctx, coordinator) = coordinator(vec![row("AB1", "RJ", "")]);
        let sink = Arc::new(PhaseSink {
            phases: Mutex::new(Vec::new()),
        });
        ctx.sinks.register(sink.clone());

        coordinator.refresh().await;

        assert_eq!(*sink.phases.lock(), [FetchPhase::Loading, FetchPhase::Ready]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_rapid_changes() {
        let rows = vec![row("AB1", "RJ", "")];
        let (ctx, coordinator) = coordinator(rows);

        ctx.filters.write().set_values("regional", vec!["RJ"]);
        coordinator.schedule_refresh();
        ctx.filters.write().set_values("regional", vec!["RJ", "SP"]);
        coordinator.schedule_refresh();

        tokio::time::sleep(Duration::from_millis(500)).await;

        // Two schedules within the quiet period produce exactly one fetch
        assert_eq!(coordinator.phase(), FetchPhase::Ready);
        assert_eq!(coordinator.dataset.read().committed_seq, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_first_response_loses_to_fast_second() {
        // Dispatch through real service calls: the first fetch sleeps past
        // the second one's arrival and must be discarded
        let ctx = SessionContext::new(EngineSettings::default(), tokio::runtime::Handle::current());
        let slow = Arc::new(
            MemoryService::new("slow", vec![row("AB1", "RJ", "")])
                .with_latency(Duration::from_millis(200)),
        );
        let coordinator = Arc::new(QueryCoordinator::new(ctx.clone(), slow.clone(), key_specs()));

        let first = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // A later-sequence response lands while the first is still in
        // flight; the first must then be discarded on arrival
        coordinator.apply_response(2, Ok(fetched(vec![row("CD2", "SP", "")])));
        first.await.unwrap();

        let rows = coordinator.rows();
        assert_eq!(cell_text(&rows[0]["sigla_loja"]), "CD2");
    }
}
