//! Auto-scrolling ticker of flagged rows
//!
//! The ticker renders its source rows twice in a row (length 2N) so the
//! wrap from the end of the first copy to the start of the second is
//! invisible, provided the viewport never shows more than N items at once.
//! The engine's own math is pure and frame-clock free; a driver task feeds
//! it per-frame deltas.

mod driver;
mod engine;

pub use driver::TickerDriver;
pub use engine::TickerEngine;

/// Lifecycle of the ticker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerState {
    /// No content; the position accumulator does not exist
    Idle,
    /// Content present, advancing every frame
    Running,
    /// Hover or manual interaction froze the accumulator
    Paused,
}
