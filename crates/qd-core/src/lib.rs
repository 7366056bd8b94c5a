//! Core engine for the quality dashboard
//!
//! This crate provides the fundamental abstractions and state management
//! for exploring schema-less tabular data: column resolution, filter state,
//! view customization, pagination and the ticker animation.

pub mod events;
pub mod filters;
pub mod paginate;
pub mod resolve;
pub mod rows;
pub mod session;
pub mod ticker;
pub mod view;

// Re-export commonly used types
pub use events::{DatasetUpdate, EngineEvent, FetchPhase, PresentationSink, SinkRegistry};
pub use filters::{FilterStore, SEARCH_PARAM, VALUE_DELIMITER};
pub use paginate::Paginator;
pub use resolve::{FilterKeySpec, ResolvedColumns, ResolvedField};
pub use rows::{cell_text, FetchResult, FilterOptions, QueryParam, Row};
pub use session::{EngineSettings, SessionContext, SessionId};
pub use ticker::{TickerDriver, TickerEngine, TickerState};

pub use data::DataService;

pub mod data {
    //! The data-service boundary
    //!
    //! The engine never talks HTTP itself; transport and authentication live
    //! behind this trait and are provided by the host.

    use crate::resolve::FilterKeySpec;
    use crate::rows::{FetchResult, FilterOptions, QueryParam};

    /// Trait for backends that produce rows for the engine
    #[async_trait::async_trait]
    pub trait DataService: Send + Sync {
        /// Fetch rows and the accompanying column list for the given
        /// query parameters (actual field name, delimited value string)
        async fn fetch(&self, params: &[QueryParam]) -> anyhow::Result<FetchResult>;

        /// Discover the distinct values offered for each logical filter key,
        /// together with the `*_col_name` actual-field hints
        async fn filter_options(&self, keys: &[FilterKeySpec]) -> anyhow::Result<FilterOptions>;

        /// Get the service name (used in logs and error messages)
        fn service_name(&self) -> &str;
    }
}
