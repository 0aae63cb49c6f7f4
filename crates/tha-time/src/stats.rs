//! Timing statistics

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// Default number of samples kept
pub const DEFAULT_WINDOW: usize = 100;

/// Moving average over the last `window` samples
#[derive(Debug, Clone)]
pub struct RunningAverage {
    samples: VecDeque<f64>,
    window: usize,
    sum: f64,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    pub fn with_window(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
            sum: 0.0,
        }
    }

    pub fn add(&mut self, value: f64) {
        if self.samples.len() == self.window {
            if let Some(old) = self.samples.pop_front() {
                self.sum -= old;
            }
        }
        self.samples.push_back(value);
        self.sum += value;
    }

    pub fn add_duration(&mut self, value: Duration) {
        self.add(value.as_secs_f64());
    }

    /// Average of the window, 0.0 when empty
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.sum / self.samples.len() as f64
    }

    /// Rate implied by an average duration in seconds, 0.0 when unknown
    pub fn rate(&self) -> f64 {
        let avg = self.average();
        if avg > 0.0 {
            1.0 / avg
        } else {
            0.0
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }
}

impl Default for RunningAverage {
    fn default() -> Self {
        Self::new()
    }
}

/// Running average shared between the driver and the inference worker
pub type SharedAverage = Arc<Mutex<RunningAverage>>;
