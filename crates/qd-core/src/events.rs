//! Engine events and the presentation-sink boundary
//!
//! The engine never renders anything. Hosts register presentation sinks
//! (table views, chart panels, ticker strips) which receive committed
//! dataset snapshots and event notifications; registration is by weak
//! reference so a torn-down view is pruned on the next notify instead of
//! lingering as a dangling callback.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::rows::Row;

/// Where the last fetch left the dataset
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchPhase {
    /// Nothing fetched yet
    #[default]
    Idle,
    /// A fetch is in flight; previously committed rows remain visible
    Loading,
    /// A non-empty result is committed
    Ready,
    /// A valid zero-row result; distinct from failure
    Empty,
    /// The fetch failed; last-good rows are retained for display
    Failed(String),
}

impl FetchPhase {
    pub fn is_error(&self) -> bool {
        matches!(self, FetchPhase::Failed(_))
    }
}

/// Snapshot pushed to presentation sinks after every commit or failure
#[derive(Debug, Clone)]
pub struct DatasetUpdate {
    pub phase: FetchPhase,

    /// Sequence number of the commit this snapshot reflects
    pub sequence: u64,

    /// Column names the table should render, in user order
    pub visible_columns: Vec<String>,

    /// Rows of the current page only
    pub page_rows: Vec<Row>,

    pub page: usize,
    pub total_pages: usize,

    /// Size of the full committed row set
    pub row_count: usize,

    /// Flagged rows doubled for seamless ticker looping (length 2N)
    pub ticker_rows: Vec<Row>,

    pub committed_at: DateTime<Utc>,
}

/// Discrete engine notifications, for hosts that want event granularity
#[derive(Debug, Clone)]
pub enum EngineEvent {
    DatasetCommitted {
        sequence: u64,
        row_count: usize,
        column_count: usize,
    },
    FetchFailed {
        sequence: u64,
        error: String,
    },
    /// A response was superseded before it arrived; not an error
    StaleResponseDiscarded {
        sequence: u64,
        newest: u64,
    },
    FilterOptionsLoaded {
        key_count: usize,
    },
}

/// Trait for components that consume engine output
pub trait PresentationSink: Send + Sync {
    /// Called after every commit, failure or republish
    fn on_dataset_update(&self, update: &DatasetUpdate);

    /// Called for each discrete engine event
    fn on_event(&self, _event: &EngineEvent) {}

    /// Called once per ticker frame with the live scroll position
    fn on_ticker_frame(&self, _position: f32) {}
}

/// Registry of weakly-held presentation sinks
pub struct SinkRegistry {
    sinks: RwLock<Vec<Weak<dyn PresentationSink>>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
        }
    }

    pub fn register(&self, sink: Arc<dyn PresentationSink>) {
        self.sinks.write().push(Arc::downgrade(&sink));
    }

    pub fn notify_update(&self, update: &DatasetUpdate) {
        self.for_each_live(|sink| sink.on_dataset_update(update));
    }

    pub fn publish(&self, event: &EngineEvent) {
        self.for_each_live(|sink| sink.on_event(event));
    }

    pub fn notify_frame(&self, position: f32) {
        self.for_each_live(|sink| sink.on_ticker_frame(position));
    }

    pub fn len(&self) -> usize {
        self.sinks.read().iter().filter(|w| w.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn for_each_live(&self, mut f: impl FnMut(&dyn PresentationSink)) {
        let mut sinks = self.sinks.write();

        // Drop weak references whose sink was torn down
        sinks.retain(|weak| weak.strong_count() > 0);

        for weak in sinks.iter() {
            if let Some(sink) = weak.upgrade() {
                f(sink.as_ref());
            }
        }
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}
