//! Frame pacing - target frame rate to tick interval

use std::time::Duration;

use tha_core::{ThaError, ThaResult};

/// Highest frame rate the driver accepts
pub const MAX_FPS: f64 = 240.0;

/// Target frame rate of the driver loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePacer {
    fps: f64,
}

impl FramePacer {
    pub fn new(fps: f64) -> ThaResult<Self> {
        if !(fps.is_finite() && fps > 0.0 && fps <= MAX_FPS) {
            return Err(ThaError::OutOfRange {
                what: "target_fps".into(),
                value: fps,
                min: 0.0,
                max: MAX_FPS,
            });
        }
        Ok(Self { fps })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Duration of one tick at the target rate
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }

    /// How long to wait before the next tick, given how long this one took
    pub fn remaining(&self, spent: Duration) -> Duration {
        self.interval().saturating_sub(spent)
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self { fps: 25.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval() {
        let pacer = FramePacer::new(25.0).unwrap();
        assert_eq!(pacer.interval(), Duration::from_millis(40));
        assert_eq!(
            pacer.remaining(Duration::from_millis(15)),
            Duration::from_millis(25)
        );
        assert_eq!(pacer.remaining(Duration::from_millis(90)), Duration::ZERO);
    }

    #[test]
    fn test_invalid_fps() {
        assert!(FramePacer::new(0.0).is_err());
        assert!(FramePacer::new(-5.0).is_err());
        assert!(FramePacer::new(1000.0).is_err());
        assert!(FramePacer::new(f64::INFINITY).is_err());
    }
}
