//! Frame loop driving the ticker engine
//!
//! One recurring task per ticker, scheduled at the display refresh cadence.
//! The task stops itself when the ticker goes `Idle` (content emptied) and
//! is aborted on `stop()` or drop, so no perpetually-rescheduling callback
//! can leak past the owning view's teardown.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

use super::{TickerEngine, TickerState};
use crate::events::SinkRegistry;

/// Recurring frame callback for a [`TickerEngine`]
pub struct TickerDriver {
    engine: Arc<RwLock<TickerEngine>>,
    sinks: Arc<SinkRegistry>,
    runtime_handle: tokio::runtime::Handle,
    frame_interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TickerDriver {
    pub fn new(
        engine: Arc<RwLock<TickerEngine>>,
        sinks: Arc<SinkRegistry>,
        runtime_handle: tokio::runtime::Handle,
        frame_interval: Duration,
    ) -> Self {
        Self {
            engine,
            sinks,
            runtime_handle,
            frame_interval,
            task: Mutex::new(None),
        }
    }

    /// Start the frame loop, replacing any previous one
    pub fn start(&self) {
        self.stop();

        let engine = Arc::clone(&self.engine);
        let sinks = Arc::clone(&self.sinks);
        let frame_interval = self.frame_interval;

        let handle = self.runtime_handle.spawn(async move {
            let mut frames = interval(frame_interval);
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last = Instant::now();

            loop {
                frames.tick().await;
                let now = Instant::now();
                let dt = (now - last).as_secs_f32();
                last = now;

                let position = {
                    let mut engine = engine.write();
                    if engine.state() == TickerState::Idle {
                        debug!("ticker content emptied, frame loop stopping");
                        break;
                    }
                    engine.advance(dt);
                    engine.position()
                };

                sinks.notify_frame(position);
            }
        });

        *self.task.lock() = Some(handle);
    }

    /// Cancel the frame loop
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for TickerDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
