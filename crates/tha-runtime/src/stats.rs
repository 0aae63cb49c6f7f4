//! Runtime statistics and the periodic fps report

use std::time::Duration;

use tracing::info;

use tha_time::SharedAverage;

/// Counters kept by the frame driver
#[derive(Clone, Debug, Default)]
pub struct RuntimeStats {
    pub ticks: u64,
    pub frames_emitted: u64,
    /// Frames re-sent because the render for their tick failed
    pub stale_frames: u64,
    pub inference_failures: u64,
    /// Composed channel values that had to be clamped
    pub range_violations: u64,
    pub commands_applied: u64,
    /// Commands dropped because applying them failed
    pub commands_rejected: u64,
    /// Ticks whose composed pose was never rendered (busy worker or paused)
    pub poses_skipped: u64,
    /// Animation time handed to the generators
    pub animation_time: Duration,
    /// Running average of adapter render time
    pub average_render_time: Duration,
    pub last_tick_duration: Duration,
}

/// One periodic report
#[derive(Clone, Debug, PartialEq)]
pub struct StatsReport {
    /// Frames emitted per second of animation time since the previous report
    pub fps: f64,
    /// Average render time in milliseconds
    pub render_ms: f64,
    pub stale_frames: u64,
    pub inference_failures: u64,
}

/// Logs a [`StatsReport`] every `interval` of animation time
#[derive(Debug)]
pub struct StatsReporter {
    interval: Duration,
    since_report: Duration,
    frames_at_report: u64,
    render_times: SharedAverage,
}

impl StatsReporter {
    /// Create a new reporter reading render times from `render_times`
    pub fn new(interval: Duration, render_times: SharedAverage) -> Self {
        Self {
            interval,
            since_report: Duration::ZERO,
            frames_at_report: 0,
            render_times,
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Account for `dt` of elapsed time; returns and logs a report when due
    pub fn observe(&mut self, dt: Duration, stats: &RuntimeStats) -> Option<StatsReport> {
        self.since_report = self.since_report.saturating_add(dt);
        if self.since_report < self.interval {
            return None;
        }

        let frames = stats.frames_emitted.saturating_sub(self.frames_at_report);
        let report = StatsReport {
            fps: frames as f64 / self.since_report.as_secs_f64(),
            render_ms: self.render_times.lock().average() * 1000.0,
            stale_frames: stats.stale_frames,
            inference_failures: stats.inference_failures,
        };
        info!(
            fps = format!("{:.1}", report.fps),
            render_ms = format!("{:.1}", report.render_ms),
            stale = report.stale_frames,
            failures = report.inference_failures,
            "animator statistics"
        );

        self.since_report = Duration::ZERO;
        self.frames_at_report = stats.frames_emitted;
        Some(report)
    }
}
