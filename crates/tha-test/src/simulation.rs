//! Simulation harness - drives a frame driver on simulated time
//!
//! Simulates:
//! - Fixed tick rates
//! - Jittery schedulers (ticks early or late around the nominal interval)
//! - Long runs far faster than real time

use std::collections::BTreeMap;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tha_core::{Channel, ThaResult};
use tha_pose::{EmotionLibrary, EmotionTemplate};
use tha_runtime::{
    AnimatorConfig, ControlHandle, EmittedFrame, FrameDriver, InferenceAdapter, TickReport,
};

/// How simulated tick durations are drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickPattern {
    /// Every tick is exactly `1 / fps`
    Fixed { fps: f64 },
    /// `1 / fps` scaled by a uniform factor in `[1 - jitter, 1 + jitter]`
    Jittered { fps: f64, jitter: f64 },
}

impl TickPattern {
    pub fn fixed(fps: f64) -> Self {
        TickPattern::Fixed { fps }
    }

    pub fn jittered(fps: f64, jitter: f64) -> Self {
        TickPattern::Jittered {
            fps,
            jitter: jitter.clamp(0.0, 0.99),
        }
    }

    fn next(&self, rng: &mut StdRng) -> Duration {
        match *self {
            TickPattern::Fixed { fps } => Duration::from_secs_f64(1.0 / fps),
            TickPattern::Jittered { fps, jitter } => {
                let scale = if jitter > 0.0 {
                    rng.gen_range(1.0 - jitter..=1.0 + jitter)
                } else {
                    1.0
                };
                Duration::from_secs_f64(scale / fps)
            }
        }
    }
}

/// A driver plus the simulated clock feeding it
pub struct Simulation<A: InferenceAdapter> {
    driver: FrameDriver<A>,
    pattern: TickPattern,
    rng: StdRng,
    elapsed: Duration,
    frames: Vec<EmittedFrame>,
}

impl<A: InferenceAdapter> Simulation<A> {
    /// Create a new simulation; `seed` drives tick jitter only
    pub fn new(driver: FrameDriver<A>, pattern: TickPattern, seed: u64) -> Self {
        Simulation {
            driver,
            pattern,
            rng: StdRng::seed_from_u64(seed),
            elapsed: Duration::ZERO,
            frames: Vec::new(),
        }
    }

    pub fn control(&self) -> ControlHandle {
        self.driver.control()
    }

    pub fn driver(&self) -> &FrameDriver<A> {
        &self.driver
    }

    pub fn set_pattern(&mut self, pattern: TickPattern) {
        self.pattern = pattern;
    }

    /// Run a single tick
    pub fn step(&mut self) -> ThaResult<TickReport> {
        let dt = self.pattern.next(&mut self.rng);
        let report = self.driver.tick(dt)?;
        self.elapsed += dt;
        if let Some(frame) = &report.frame {
            self.frames.push(frame.clone());
        }
        Ok(report)
    }

    /// Tick until `duration` more simulated time has passed; returns the tick count
    pub fn run_for(&mut self, duration: Duration) -> ThaResult<u64> {
        let end = self.elapsed + duration;
        let mut ticks = 0;
        while self.elapsed < end {
            self.step()?;
            ticks += 1;
        }
        Ok(ticks)
    }

    /// Simulated time so far
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn frames(&self) -> &[EmittedFrame] {
        &self.frames
    }

    pub fn take_frames(&mut self) -> Vec<EmittedFrame> {
        std::mem::take(&mut self.frames)
    }
}

/// Configuration with every procedural motion effectively disabled, so
/// the composed pose is exactly the interpolated emotion pose (plus breathing)
pub fn still_config() -> AnimatorConfig {
    AnimatorConfig {
        blink_interval_min: 1e9,
        blink_interval_max: 1e9,
        sway_max_random: 0.0,
        sway_max_noise: 0.0,
        gamma_correct: false,
        ..AnimatorConfig::default()
    }
}

/// Neutral plus `surprised`, a template with every channel at its maximum
pub fn extreme_library() -> ThaResult<EmotionLibrary> {
    let values: BTreeMap<Channel, f32> = Channel::ALL
        .iter()
        .map(|channel| (*channel, channel.range().max))
        .collect();
    let surprised = EmotionTemplate::new("surprised", values)?;
    Ok(EmotionLibrary::neutral_only().with_template(surprised))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PoseProbeAdapter;

    #[test]
    fn test_fixed_pattern_run_for() {
        let driver = FrameDriver::new(
            still_config(),
            EmotionLibrary::builtin(),
            PoseProbeAdapter::default(),
            1,
        )
        .unwrap();
        let mut sim = Simulation::new(driver, TickPattern::fixed(25.0), 1);

        let ticks = sim.run_for(Duration::from_secs(2)).unwrap();
        assert_eq!(ticks, 50);
        assert_eq!(sim.frames().len(), 50);
        assert_eq!(sim.driver().stats().ticks, 50);
    }

    #[test]
    fn test_jittered_pattern_bounds() {
        let pattern = TickPattern::jittered(50.0, 0.5);
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..1000 {
            let dt = pattern.next(&mut rng).as_secs_f64();
            assert!((0.01 - 1e-9..=0.03 + 1e-9).contains(&dt));
        }
    }

    #[test]
    fn test_extreme_library() {
        let library = extreme_library().unwrap();
        let surprised = library.get("surprised").unwrap();
        assert_eq!(surprised.get(Channel::HeadX), Some(1.0));
        assert_eq!(surprised.get(Channel::Breathing), None);
        assert_eq!(library.len(), 2);
    }
}
