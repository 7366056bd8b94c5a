//! Ticker position accumulator

use super::TickerState;

/// Per-second easing rate for manual steps; a queued step is mostly
/// absorbed within a couple hundred milliseconds at 60 fps.
const STEP_SMOOTHING: f32 = 10.0;

/// Remaining step smaller than this is applied in one go.
const STEP_EPSILON: f32 = 0.5;

/// Continuous scroll state for the doubled row sequence
///
/// Positions are in rendered units (pixels, points). The accumulator always
/// satisfies `0 <= position < half_extent` where `half_extent` is the
/// rendered extent of one copy of the content.
#[derive(Debug, Clone)]
pub struct TickerEngine {
    state: TickerState,

    /// Fractional scroll offset into the doubled sequence
    position: f32,

    /// Automatic scroll speed, units per second
    velocity: f32,

    /// Rendered extent of a single item; 0 means the viewport is detached
    /// and ticks are skipped
    item_extent: f32,

    /// Number of source rows (the doubled sequence has twice as many)
    content_len: usize,

    /// Queued manual offset, eased into the position over following frames
    pending_step: f32,
}

impl TickerEngine {
    pub fn new(velocity: f32) -> Self {
        Self {
            state: TickerState::Idle,
            position: 0.0,
            velocity,
            item_extent: 0.0,
            content_len: 0,
            pending_step: 0.0,
        }
    }

    /// Update the number of source rows
    ///
    /// Going empty destroys the accumulator (back to `Idle`); becoming
    /// non-empty from `Idle` starts running from position 0. A content
    /// change while running keeps the state and re-wraps the position into
    /// the new extent.
    pub fn set_content_len(&mut self, len: usize) {
        if len == 0 {
            self.state = TickerState::Idle;
            self.position = 0.0;
            self.pending_step = 0.0;
            self.content_len = 0;
            return;
        }

        let was_idle = self.state == TickerState::Idle;
        self.content_len = len;
        if was_idle {
            self.state = TickerState::Running;
            self.position = 0.0;
        } else {
            self.wrap();
        }
    }

    /// Tell the engine how large one rendered item is
    ///
    /// A zero extent means no rendering context is attached; `advance`
    /// becomes a no-op until a real extent arrives.
    pub fn set_item_extent(&mut self, extent: f32) {
        self.item_extent = extent.max(0.0);
        self.wrap();
    }

    /// Advance by one frame's worth of time
    ///
    /// While running the accumulator gains `velocity * dt`; queued manual
    /// steps are eased in regardless of pause so step buttons stay
    /// responsive while hovered. Skipped entirely without content or a
    /// rendering context.
    pub fn advance(&mut self, dt: f32) {
        if self.state == TickerState::Idle {
            return;
        }
        if self.content_len == 0 || self.item_extent <= 0.0 {
            return;
        }

        let mut delta = self.drain_step(dt);
        if self.state == TickerState::Running {
            delta += self.velocity * dt;
        }

        self.position = (self.position + delta).max(0.0);
        self.wrap();
    }

    /// Queue a manual offset; does not change the running velocity
    pub fn step(&mut self, delta: f32) {
        if self.state == TickerState::Idle {
            return;
        }
        self.pending_step += delta;
    }

    /// Freeze the accumulator (hover, manual interaction)
    pub fn pause(&mut self) {
        if self.state == TickerState::Running {
            self.state = TickerState::Paused;
        }
    }

    /// Resume from the frozen position
    pub fn resume(&mut self) {
        if self.state == TickerState::Paused {
            self.state = TickerState::Running;
        }
    }

    pub fn state(&self) -> TickerState {
        self.state
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: f32) {
        self.velocity = velocity;
    }

    pub fn content_len(&self) -> usize {
        self.content_len
    }

    /// Length of the doubled render sequence
    pub fn doubled_len(&self) -> usize {
        self.content_len * 2
    }

    /// Rendered extent of one copy of the content; the wrap threshold
    pub fn half_extent(&self) -> f32 {
        self.content_len as f32 * self.item_extent
    }

    fn drain_step(&mut self, dt: f32) -> f32 {
        if self.pending_step == 0.0 {
            return 0.0;
        }
        if self.pending_step.abs() < STEP_EPSILON {
            return std::mem::take(&mut self.pending_step);
        }
        let eased = self.pending_step * (dt * STEP_SMOOTHING).min(1.0);
        self.pending_step -= eased;
        eased
    }

    fn wrap(&mut self) {
        let half = self.half_extent();
        if half <= 0.0 {
            return;
        }
        while self.position >= half {
            self.position -= half;
        }
    }
}
