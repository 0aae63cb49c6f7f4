//! Mock inference adapters
//!
//! Stand-ins for the posing model: they render cheap synthetic frames,
//! fail on demand, take time, and record what they were asked to render.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use tha_core::{Channel, InferenceError, PoseVector};
use tha_effects::Frame;
use tha_runtime::InferenceAdapter;

/// Encodes the pose in the image: pixel `i` of every row carries channel
/// `i`, mapped from its range onto [0, 1] in red.
#[derive(Debug, Clone)]
pub struct PoseProbeAdapter {
    height: usize,
}

impl PoseProbeAdapter {
    /// Create a new probe adapter rendering `Channel::COUNT x height` frames
    pub fn new(height: usize) -> Self {
        Self {
            height: height.max(1),
        }
    }

    /// Read a pose back out of a probe frame (before gamma correction)
    pub fn decode(frame: &Frame) -> Option<PoseVector> {
        if frame.width() != Channel::COUNT {
            return None;
        }
        let mut pose = PoseVector::neutral();
        for channel in Channel::ALL {
            let red = frame.get(channel.index(), 0)?[0];
            let range = channel.range();
            pose.set_clamped(channel, range.min + red * range.span());
        }
        Some(pose)
    }
}

impl Default for PoseProbeAdapter {
    fn default() -> Self {
        Self::new(1)
    }
}

impl InferenceAdapter for PoseProbeAdapter {
    fn render(&mut self, pose: &PoseVector) -> Result<Frame, InferenceError> {
        let mut frame = Frame::new(Channel::COUNT, self.height);
        for y in 0..self.height {
            let row = frame.row_mut(y);
            for (channel, weight) in pose.iter() {
                let range = channel.range();
                let red = (weight - range.min) / range.span();
                row[channel.index()] = [red, 0.5, 0.5, 1.0];
            }
        }
        Ok(frame)
    }
}

/// Fails on chosen calls (1-based), succeeds with a flat frame otherwise
#[derive(Debug, Clone)]
pub struct FlakyAdapter {
    failing: BTreeSet<u64>,
    fatal_at: Option<u64>,
    calls: u64,
}

impl FlakyAdapter {
    pub fn new(failing: impl IntoIterator<Item = u64>) -> Self {
        Self {
            failing: failing.into_iter().collect(),
            fatal_at: None,
            calls: 0,
        }
    }

    /// Fail unrecoverably on call `call`
    pub fn with_fatal_at(mut self, call: u64) -> Self {
        self.fatal_at = Some(call);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl InferenceAdapter for FlakyAdapter {
    fn render(&mut self, _pose: &PoseVector) -> Result<Frame, InferenceError> {
        self.calls += 1;
        if self.fatal_at == Some(self.calls) {
            return Err(InferenceError::Fatal(format!("device lost at call {}", self.calls)));
        }
        if self.failing.contains(&self.calls) {
            return Err(InferenceError::Unavailable(format!(
                "model busy at call {}",
                self.calls
            )));
        }
        Ok(Frame::filled(8, 8, [0.5, 0.5, 0.5, 1.0]))
    }
}

/// Everything a [`RecordingAdapter`] has seen, shared with the test
#[derive(Debug, Default)]
pub struct RenderLog {
    poses: Mutex<Vec<PoseVector>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl RenderLog {
    pub fn poses(&self) -> Vec<PoseVector> {
        self.poses.lock().clone()
    }

    pub fn renders(&self) -> usize {
        self.poses.lock().len()
    }

    /// Highest number of renders ever running at the same time
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

/// Slow adapter that records every pose and tracks overlapping calls
#[derive(Debug, Clone)]
pub struct RecordingAdapter {
    latency: Duration,
    log: Arc<RenderLog>,
}

impl RecordingAdapter {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            log: Arc::new(RenderLog::default()),
        }
    }

    pub fn log(&self) -> Arc<RenderLog> {
        Arc::clone(&self.log)
    }
}

impl InferenceAdapter for RecordingAdapter {
    fn render(&mut self, pose: &PoseVector) -> Result<Frame, InferenceError> {
        let active = self.log.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.max_active.fetch_max(active, Ordering::SeqCst);

        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        self.log.poses.lock().push(*pose);

        self.log.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Frame::filled(4, 4, [0.2, 0.4, 0.6, 1.0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_round_trip() {
        let mut pose = PoseVector::neutral();
        pose.set(Channel::HeadX, -0.5).unwrap();
        pose.set(Channel::MouthAaa, 0.75).unwrap();

        let frame = PoseProbeAdapter::new(2).render(&pose).unwrap();
        let decoded = PoseProbeAdapter::decode(&frame).unwrap();
        assert!(decoded.max_abs_diff(&pose) < 1e-5);
        assert!(PoseProbeAdapter::decode(&Frame::new(3, 3)).is_none());
    }

    #[test]
    fn test_flaky_schedule() {
        let mut adapter = FlakyAdapter::new([2]).with_fatal_at(4);
        let pose = PoseVector::neutral();
        assert!(adapter.render(&pose).is_ok());
        assert!(!adapter.render(&pose).unwrap_err().is_fatal());
        assert!(adapter.render(&pose).is_ok());
        assert!(adapter.render(&pose).unwrap_err().is_fatal());
        assert_eq!(adapter.calls(), 4);
    }

    #[test]
    fn test_recording_log() {
        let mut adapter = RecordingAdapter::new(Duration::ZERO);
        let log = adapter.log();
        adapter.render(&PoseVector::neutral()).unwrap();
        adapter.render(&PoseVector::uniform(0.5)).unwrap();
        assert_eq!(log.renders(), 2);
        assert_eq!(log.max_concurrent(), 1);
        assert_eq!(log.poses()[1], PoseVector::uniform(0.5));
    }
}
