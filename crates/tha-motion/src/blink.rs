//! Blink generator
//!
//! `Idle → Closing → Opening → Idle`. Blinks are spaced by intervals drawn
//! uniformly from `[interval_min, interval_max]`; each interval is counted
//! from the previous *scheduled* blink time, so tick granularity does not
//! stretch the average spacing. Emotions flagged for rapid blinking may add
//! extra blinks for a while after they are entered.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tha_core::{Channel, EventRate, ThaError, ThaResult};

use crate::{sanitize_dt, EmotionCue, MotionGenerator, MotionOffsets, MotionSource};

/// Blink configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlinkConfig {
    /// Shortest spacing between scheduled blinks (seconds)
    pub interval_min: f64,
    /// Longest spacing between scheduled blinks (seconds)
    pub interval_max: f64,
    /// Eyelid closing time (seconds)
    pub close_duration: f64,
    /// Eyelid opening time (seconds)
    pub open_duration: f64,
    /// Chance of an extra blink per reference tick during a burst window
    pub burst_probability_per_tick: f64,
    /// How long after entering a rapid-blink emotion bursts may occur (seconds)
    pub burst_window: f64,
    /// Tick duration the burst probability was tuned at (seconds)
    pub reference_dt: f64,
    /// Eyelid offset at full closure
    pub amplitude: f32,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        // Humans blink 12-20 times per minute
        Self {
            interval_min: 2.0,
            interval_max: 5.0,
            close_duration: 0.06,
            open_duration: 0.12,
            burst_probability_per_tick: 0.03,
            burst_window: 10.0,
            reference_dt: 0.04,
            amplitude: 1.0,
        }
    }
}

impl BlinkConfig {
    pub fn validate(&self) -> ThaResult<()> {
        if !(self.interval_min > 0.0
            && self.interval_min <= self.interval_max
            && self.interval_max.is_finite())
        {
            return Err(ThaError::config(format!(
                "blink interval must satisfy 0 < min <= max < inf, got [{}, {}]",
                self.interval_min, self.interval_max
            )));
        }
        if !(self.close_duration > 0.0 && self.open_duration > 0.0) {
            return Err(ThaError::config("blink envelope durations must be positive"));
        }
        if self.close_duration + self.open_duration >= self.interval_min {
            return Err(ThaError::config(
                "blink envelope must finish before the shortest blink interval",
            ));
        }
        ThaError::check_range(
            "blink_probability_per_tick",
            self.burst_probability_per_tick,
            0.0,
            1.0,
        )?;
        ThaError::check_range("blink_burst_window", self.burst_window, 0.0, f64::MAX)?;
        ThaError::check_range("blink_amplitude", self.amplitude as f64, 0.0, 1.0)?;
        if !(self.reference_dt > 0.0) {
            return Err(ThaError::config("blink reference_dt must be positive"));
        }
        Ok(())
    }

    pub fn envelope_duration(&self) -> f64 {
        self.close_duration + self.open_duration
    }
}

/// Where the eyelids are in the blink cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkPhase {
    Idle,
    Closing,
    Opening,
}

/// Blink generator
#[derive(Debug)]
pub struct BlinkGenerator {
    config: BlinkConfig,
    burst_rate: EventRate,
    rng: StdRng,
    phase: BlinkPhase,
    /// Time spent in the current phase
    phase_time: f64,
    /// Time until the next scheduled blink
    until_next: f64,
    /// Time left in the current burst window
    burst_remaining: f64,
    /// Total blinks started (scheduled + extra)
    blinks: u64,
    extra_blinks: u64,
}

impl BlinkGenerator {
    /// Create a new blink generator
    pub fn new(config: BlinkConfig, seed: u64) -> ThaResult<Self> {
        config.validate()?;
        let burst_rate = EventRate::from_reference_probability(
            config.burst_probability_per_tick,
            config.reference_dt,
        )?;
        let mut rng = StdRng::seed_from_u64(seed);
        let until_next = rng.gen_range(config.interval_min..=config.interval_max);
        Ok(Self {
            config,
            burst_rate,
            rng,
            phase: BlinkPhase::Idle,
            phase_time: 0.0,
            until_next,
            burst_remaining: 0.0,
            blinks: 0,
            extra_blinks: 0,
        })
    }

    /// Replace the configuration; the current blink (if any) completes
    pub fn reconfigure(&mut self, config: BlinkConfig) -> ThaResult<()> {
        config.validate()?;
        self.burst_rate = EventRate::from_reference_probability(
            config.burst_probability_per_tick,
            config.reference_dt,
        )?;
        self.until_next = self.until_next.min(config.interval_max);
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &BlinkConfig {
        &self.config
    }

    pub fn phase(&self) -> BlinkPhase {
        self.phase
    }

    pub fn blink_count(&self) -> u64 {
        self.blinks
    }

    pub fn extra_blink_count(&self) -> u64 {
        self.extra_blinks
    }

    /// Time until the next scheduled blink
    pub fn next_blink_in(&self) -> f64 {
        self.until_next
    }

    pub fn in_burst_window(&self) -> bool {
        self.burst_remaining > 0.0
    }

    /// Eyelid closure in [0, 1]
    pub fn level(&self) -> f32 {
        match self.phase {
            BlinkPhase::Idle => 0.0,
            BlinkPhase::Closing => smoothstep(self.phase_time / self.config.close_duration),
            BlinkPhase::Opening => 1.0 - smoothstep(self.phase_time / self.config.open_duration),
        }
    }

    fn draw_interval(&mut self) -> f64 {
        self.rng
            .gen_range(self.config.interval_min..=self.config.interval_max)
    }

    fn progress_envelope(&mut self, dt: f64) {
        let mut remaining = dt;
        while remaining > 0.0 {
            match self.phase {
                BlinkPhase::Idle => return,
                BlinkPhase::Closing => {
                    let left = self.config.close_duration - self.phase_time;
                    if remaining < left {
                        self.phase_time += remaining;
                        return;
                    }
                    remaining -= left;
                    self.phase = BlinkPhase::Opening;
                    self.phase_time = 0.0;
                }
                BlinkPhase::Opening => {
                    let left = self.config.open_duration - self.phase_time;
                    if remaining < left {
                        self.phase_time += remaining;
                        return;
                    }
                    self.phase = BlinkPhase::Idle;
                    self.phase_time = 0.0;
                    return;
                }
            }
        }
    }

    fn start_blink(&mut self) {
        // Re-close from wherever the lids are, so the envelope stays continuous
        let level = self.level() as f64;
        self.phase = BlinkPhase::Closing;
        self.phase_time = if level > 0.0 {
            inverse_smoothstep(level) * self.config.close_duration
        } else {
            0.0
        };
        self.blinks += 1;
    }
}

impl MotionGenerator for BlinkGenerator {
    fn source(&self) -> MotionSource {
        MotionSource::Blink
    }

    fn advance(&mut self, dt: f64, out: &mut MotionOffsets) {
        let dt = sanitize_dt(dt);

        self.progress_envelope(dt);

        self.until_next -= dt;
        let scheduled = self.until_next <= 0.0;
        if scheduled {
            self.until_next += self.draw_interval();
            if self.until_next <= 0.0 {
                // The tick spanned several intervals; restart the schedule
                self.until_next = self.draw_interval();
            }
        }

        if scheduled {
            self.start_blink();
            debug!(next_in = self.until_next, "blink");
        } else if self.burst_remaining > 0.0 && self.phase == BlinkPhase::Idle {
            let p = self.burst_rate.probability(dt.min(self.burst_remaining));
            if p > 0.0 && self.rng.gen_bool(p.min(1.0)) {
                self.start_blink();
                self.extra_blinks += 1;
                debug!("extra blink");
            }
        }
        self.burst_remaining = (self.burst_remaining - dt).max(0.0);

        let level = self.level() * self.config.amplitude;
        if level > 0.0 {
            out.add(MotionSource::Blink, Channel::EyeWinkLeft, level);
            out.add(MotionSource::Blink, Channel::EyeWinkRight, level);
        }
    }

    fn on_emotion_change(&mut self, cue: &EmotionCue) {
        self.burst_remaining = if cue.rapid_blink {
            self.config.burst_window
        } else {
            0.0
        };
    }

    fn reset(&mut self) {
        self.phase = BlinkPhase::Idle;
        self.phase_time = 0.0;
        self.burst_remaining = 0.0;
        self.until_next = self.draw_interval();
    }
}

#[inline]
fn smoothstep(t: f64) -> f32 {
    let t = t.clamp(0.0, 1.0);
    (t * t * (3.0 - 2.0 * t)) as f32
}

/// Inverse of smoothstep on [0, 1]
#[inline]
fn inverse_smoothstep(y: f64) -> f64 {
    let y = y.clamp(0.0, 1.0);
    0.5 - ((1.0 - 2.0 * y).asin() / 3.0).sin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(gen: &mut BlinkGenerator, seconds: f64, dt: f64) -> Vec<f32> {
        let steps = (seconds / dt).round() as usize;
        let mut levels = Vec::with_capacity(steps);
        for _ in 0..steps {
            let mut out = MotionOffsets::new();
            gen.advance(dt, &mut out);
            levels.push(out.total(Channel::EyeWinkLeft));
        }
        levels
    }

    #[test]
    fn test_blink_envelope_phases() {
        let config = BlinkConfig {
            interval_min: 1.0,
            interval_max: 1.0,
            ..Default::default()
        };
        let mut gen = BlinkGenerator::new(config, 7).unwrap();
        assert_eq!(gen.phase(), BlinkPhase::Idle);

        let mut out = MotionOffsets::new();
        gen.advance(1.0, &mut out);
        assert_eq!(gen.phase(), BlinkPhase::Closing);
        assert_eq!(gen.blink_count(), 1);

        gen.advance(0.07, &mut out);
        assert_eq!(gen.phase(), BlinkPhase::Opening);

        gen.advance(0.2, &mut out);
        assert_eq!(gen.phase(), BlinkPhase::Idle);
    }

    #[test]
    fn test_offset_zero_outside_envelope() {
        let mut gen = BlinkGenerator::new(BlinkConfig::default(), 1).unwrap();
        let mut out = MotionOffsets::new();
        gen.advance(0.5, &mut out);
        // First blink is at least 2 s away
        assert!(out.is_empty());
    }

    #[test]
    fn test_levels_bounded() {
        let mut gen = BlinkGenerator::new(BlinkConfig::default(), 3).unwrap();
        let levels = run(&mut gen, 60.0, 1.0 / 60.0);
        assert!(levels.iter().all(|l| (0.0..=1.0).contains(l)));
        assert!(levels.iter().any(|l| *l > 0.9));
    }

    #[test]
    fn test_mean_interval_within_configured_range() {
        let config = BlinkConfig::default();
        for seed in 0..5 {
            let mut gen = BlinkGenerator::new(config.clone(), seed).unwrap();
            let seconds = 2000.0;
            run(&mut gen, seconds, 1.0 / 30.0);

            let mean = seconds / gen.blink_count() as f64;
            assert!(
                mean >= config.interval_min && mean <= config.interval_max,
                "seed {seed}: mean interval {mean}"
            );
            let expected = (config.interval_min + config.interval_max) / 2.0;
            assert!((mean - expected).abs() < 0.3, "seed {seed}: mean interval {mean}");
            assert_eq!(gen.extra_blink_count(), 0);
        }
    }

    #[test]
    fn test_rapid_blink_burst_only_in_window() {
        let config = BlinkConfig {
            burst_probability_per_tick: 0.5,
            ..Default::default()
        };
        let mut gen = BlinkGenerator::new(config, 11).unwrap();
        gen.on_emotion_change(&EmotionCue::new("confusion", true));
        assert!(gen.in_burst_window());

        run(&mut gen, 10.2, 0.04);
        assert!(gen.extra_blink_count() > 0);
        assert!(!gen.in_burst_window());

        let extra = gen.extra_blink_count();
        run(&mut gen, 30.0, 0.04);
        assert_eq!(gen.extra_blink_count(), extra);
    }

    #[test]
    fn test_non_rapid_emotion_closes_window() {
        let mut gen = BlinkGenerator::new(BlinkConfig::default(), 2).unwrap();
        gen.on_emotion_change(&EmotionCue::new("confusion", true));
        gen.on_emotion_change(&EmotionCue::new("joy", false));
        assert!(!gen.in_burst_window());
    }

    #[test]
    fn test_invalid_config() {
        let inverted = BlinkConfig {
            interval_min: 5.0,
            interval_max: 2.0,
            ..Default::default()
        };
        assert!(BlinkGenerator::new(inverted, 0).is_err());

        let overlapping = BlinkConfig {
            interval_min: 0.1,
            ..Default::default()
        };
        assert!(overlapping.validate().is_err());

        let bad_probability = BlinkConfig {
            burst_probability_per_tick: 1.5,
            ..Default::default()
        };
        assert!(bad_probability.validate().is_err());
    }

    #[test]
    fn test_infinite_dt_schedules_one_blink() {
        let mut gen = BlinkGenerator::new(BlinkConfig::default(), 4).unwrap();
        let mut out = MotionOffsets::new();
        gen.advance(f64::INFINITY, &mut out);
        assert_eq!(gen.blink_count(), 1);
        assert_eq!(gen.phase(), BlinkPhase::Closing);
        let next = gen.next_blink_in();
        assert!((2.0..=5.0).contains(&next), "next blink in {next}");

        gen.advance(1e300, &mut out);
        assert_eq!(gen.blink_count(), 2);
        assert!(gen.next_blink_in().is_finite());
    }

    #[test]
    fn test_long_tick_restarts_schedule() {
        let config = BlinkConfig {
            interval_min: 2.0,
            interval_max: 2.0,
            ..Default::default()
        };
        let mut gen = BlinkGenerator::new(config, 0).unwrap();
        let mut out = MotionOffsets::new();
        gen.advance(1e17, &mut out);
        assert_eq!(gen.blink_count(), 1);
        assert_eq!(gen.next_blink_in(), 2.0);
    }

    #[test]
    fn test_infinite_interval_rejected() {
        let config = BlinkConfig {
            interval_max: f64::INFINITY,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(BlinkGenerator::new(config, 0).is_err());
    }

    #[test]
    fn test_inverse_smoothstep() {
        for y in [0.0, 0.1, 0.5, 0.9, 1.0] {
            let t = inverse_smoothstep(y);
            assert!((smoothstep(t) as f64 - y).abs() < 1e-6);
        }
    }
}
