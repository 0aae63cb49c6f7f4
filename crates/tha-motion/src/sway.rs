//! Sway generator
//!
//! Head and body drift slowly toward a random target that is re-drawn every
//! few seconds and whenever the emotion changes. A small per-tick noise term
//! (microsway) sits on top so the character never looks frozen.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tha_core::{Channel, ThaError, ThaResult, TimeConstant};

use crate::{sanitize_dt, EmotionCue, MotionGenerator, MotionOffsets, MotionSource};

/// Channels moved by sway
pub const SWAY_CHANNELS: [Channel; 5] = [
    Channel::HeadX,
    Channel::HeadY,
    Channel::NeckZ,
    Channel::BodyY,
    Channel::BodyZ,
];

/// Sway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SwayConfig {
    /// Shortest time between target re-draws (seconds)
    pub interval_min: f64,
    /// Longest time between target re-draws (seconds)
    pub interval_max: f64,
    /// Largest absolute target offset
    pub max_random: f32,
    /// Largest absolute microsway noise per tick
    pub max_noise: f32,
    /// Fraction of the remaining distance covered per reference tick
    pub smoothing_step: f64,
    /// Tick duration `smoothing_step` was tuned at (seconds)
    pub reference_dt: f64,
}

impl Default for SwayConfig {
    fn default() -> Self {
        Self {
            interval_min: 5.0,
            interval_max: 10.0,
            max_random: 0.6,
            max_noise: 0.02,
            smoothing_step: 0.1,
            reference_dt: 0.04,
        }
    }
}

impl SwayConfig {
    pub fn validate(&self) -> ThaResult<()> {
        if !(self.interval_min > 0.0
            && self.interval_min <= self.interval_max
            && self.interval_max.is_finite())
        {
            return Err(ThaError::config(format!(
                "sway interval must satisfy 0 < min <= max < inf, got [{}, {}]",
                self.interval_min, self.interval_max
            )));
        }
        ThaError::check_range("sway_max_random", self.max_random as f64, 0.0, 1.0)?;
        ThaError::check_range("sway_max_noise", self.max_noise as f64, 0.0, 1.0)?;
        TimeConstant::from_reference_step(self.smoothing_step, self.reference_dt)?;
        Ok(())
    }
}

/// Sway generator
#[derive(Debug)]
pub struct SwayGenerator {
    config: SwayConfig,
    smoothing: TimeConstant,
    rng: StdRng,
    targets: [f32; 5],
    current: [f32; 5],
    until_retarget: f64,
    retargets: u64,
}

impl SwayGenerator {
    /// Create a new sway generator
    pub fn new(config: SwayConfig, seed: u64) -> ThaResult<Self> {
        config.validate()?;
        let smoothing = TimeConstant::from_reference_step(config.smoothing_step, config.reference_dt)?;
        let mut gen = Self {
            config,
            smoothing,
            rng: StdRng::seed_from_u64(seed),
            targets: [0.0; 5],
            current: [0.0; 5],
            until_retarget: 0.0,
            retargets: 0,
        };
        gen.retarget();
        Ok(gen)
    }

    pub fn reconfigure(&mut self, config: SwayConfig) -> ThaResult<()> {
        config.validate()?;
        self.smoothing = TimeConstant::from_reference_step(config.smoothing_step, config.reference_dt)?;
        self.config = config;
        self.retarget();
        Ok(())
    }

    pub fn config(&self) -> &SwayConfig {
        &self.config
    }

    /// Current smoothed offset of a sway channel (without noise)
    pub fn offset(&self, channel: Channel) -> Option<f32> {
        SWAY_CHANNELS
            .iter()
            .position(|c| *c == channel)
            .map(|i| self.current[i])
    }

    /// Current target of a sway channel
    pub fn target(&self, channel: Channel) -> Option<f32> {
        SWAY_CHANNELS
            .iter()
            .position(|c| *c == channel)
            .map(|i| self.targets[i])
    }

    pub fn retarget_count(&self) -> u64 {
        self.retargets
    }

    pub fn next_retarget_in(&self) -> f64 {
        self.until_retarget
    }

    fn retarget(&mut self) {
        let max = self.config.max_random;
        for target in self.targets.iter_mut() {
            *target = if max > 0.0 {
                self.rng.gen_range(-max..=max)
            } else {
                0.0
            };
        }
        self.until_retarget = self
            .rng
            .gen_range(self.config.interval_min..=self.config.interval_max);
        self.retargets += 1;
    }
}

impl MotionGenerator for SwayGenerator {
    fn source(&self) -> MotionSource {
        MotionSource::Sway
    }

    fn advance(&mut self, dt: f64, out: &mut MotionOffsets) {
        let dt = sanitize_dt(dt);

        self.until_retarget -= dt;
        if self.until_retarget <= 0.0 {
            let overdue = -self.until_retarget;
            self.retarget();
            // Carry the overshoot unless the tick spanned a whole interval
            if overdue < self.until_retarget {
                self.until_retarget -= overdue;
            }
            debug!(targets = ?self.targets, "sway retarget");
        }

        let decay = self.smoothing.decay(dt) as f32;
        let noise = self.config.max_noise;
        for (i, channel) in SWAY_CHANNELS.iter().enumerate() {
            let target = self.targets[i];
            self.current[i] = target + (self.current[i] - target) * decay;

            let jitter = if noise > 0.0 && dt > 0.0 {
                self.rng.gen_range(-noise..=noise)
            } else {
                0.0
            };
            out.add(MotionSource::Sway, *channel, self.current[i] + jitter);
        }
    }

    fn on_emotion_change(&mut self, cue: &EmotionCue) {
        self.retarget();
        debug!(emotion = %cue.name, "sway retarget on emotion change");
    }

    fn reset(&mut self) {
        self.current = [0.0; 5];
        self.retarget();
    }
}
