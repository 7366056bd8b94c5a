//! Demo entry point
//!
//! Runs a scripted exploration session against an in-memory sample dataset
//! so the whole engine can be exercised from a terminal. Pass a path to a
//! JSON rows file to explore real data instead.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod demo;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let dataset = std::env::args().nth(1);
    info!(dataset = ?dataset, "starting exploration session");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(demo::run(dataset))
}
