//! Tick clock - measures the elapsed wall-clock time each tick covers

use std::time::{Duration, Instant};

/// Default ceiling on a single tick's elapsed time
pub const DEFAULT_MAX_TICK: Duration = Duration::from_millis(250);

/// Monotonic tick clock.
/// INVARIANT: reported `dt` is never negative and never exceeds `max_tick`.
pub struct TickClock {
    /// Reference to monotonic OS clock
    started: Instant,
    /// Last tick instant
    last_tick: Instant,
    /// Total time handed out so far
    elapsed: Duration,
    /// Clamp for large jumps (e.g., after system sleep or a debugger pause)
    max_tick: Duration,
    ticks: u64,
}

impl TickClock {
    /// Create a new clock starting now
    pub fn new() -> Self {
        Self::with_max_tick(DEFAULT_MAX_TICK)
    }

    pub fn with_max_tick(max_tick: Duration) -> Self {
        let now = Instant::now();
        TickClock {
            started: now,
            last_tick: now,
            elapsed: Duration::ZERO,
            max_tick,
            ticks: 0,
        }
    }

    /// Advance to now and return the elapsed time since the previous tick
    pub fn tick(&mut self) -> Duration {
        self.tick_at(Instant::now())
    }

    /// Advance to `now` (for callers that already sampled the clock)
    pub fn tick_at(&mut self, now: Instant) -> Duration {
        let dt = now.saturating_duration_since(self.last_tick);
        let clamped = dt.min(self.max_tick);

        self.last_tick = now;
        self.elapsed += clamped;
        self.ticks += 1;
        clamped
    }

    /// Animation time handed out so far (sum of clamped ticks)
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Real time since the clock was created
    pub fn wall_elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn max_tick(&self) -> Duration {
        self.max_tick
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}
