//! Session context and settings
//!
//! One explicit context object per session, constructed once and passed to
//! every component that needs it. There are no module-level store
//! singletons; everything the engine mutates hangs off this struct.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use uuid::Uuid;

use crate::events::SinkRegistry;
use crate::filters::FilterStore;
use crate::paginate::Paginator;
use crate::ticker::TickerEngine;
use crate::view::ColumnView;

/// Session identifier type
pub type SessionId = Uuid;

/// Tunables for one engine session
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Quiet period after the last filter change before a fetch fires
    pub debounce_ms: u64,

    /// Rows per table page
    pub page_size: usize,

    /// Ticker auto-scroll speed, rendered units per second
    pub ticker_velocity: f32,

    /// Ticker frame cadence; 16 ms approximates a 60 Hz display
    pub frame_interval_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            page_size: 20,
            ticker_velocity: 40.0,
            frame_interval_ms: 16,
        }
    }
}

/// Shared state for one exploration session
///
/// Cloning is cheap; all stores are behind `Arc`s. The stores have exactly
/// one logical mutator each (user input or the query coordinator), so the
/// locks only guard against torn reads from sinks.
#[derive(Clone)]
pub struct SessionContext {
    pub session_id: SessionId,

    /// Active multi-value filter selections
    pub filters: Arc<RwLock<FilterStore>>,

    /// User column order and visibility
    pub view: Arc<RwLock<ColumnView>>,

    /// Current page over the committed row set
    pub paginator: Arc<RwLock<Paginator>>,

    /// Auto-scrolling flagged-row ticker
    pub ticker: Arc<RwLock<TickerEngine>>,

    /// Registered presentation sinks
    pub sinks: Arc<SinkRegistry>,

    pub settings: EngineSettings,

    /// Tokio runtime handle for debounce timers and the frame loop
    pub runtime_handle: tokio::runtime::Handle,
}

impl SessionContext {
    pub fn new(settings: EngineSettings, runtime_handle: tokio::runtime::Handle) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            filters: Arc::new(RwLock::new(FilterStore::new())),
            view: Arc::new(RwLock::new(ColumnView::new())),
            paginator: Arc::new(RwLock::new(Paginator::new(settings.page_size))),
            ticker: Arc::new(RwLock::new(TickerEngine::new(settings.ticker_velocity))),
            sinks: Arc::new(SinkRegistry::new()),
            settings,
            runtime_handle,
        }
    }
}
