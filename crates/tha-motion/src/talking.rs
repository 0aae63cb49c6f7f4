//! Talking generator
//!
//! While speech is playing, the mouth flaps open and shut at random. Each
//! flap jumps away from the previous opening so consecutive flaps are
//! visibly different.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use tha_core::{Channel, ThaError, ThaResult};

use crate::{sanitize_dt, MotionGenerator, MotionOffsets, MotionSource};

/// Talking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TalkingConfig {
    /// Time between mouth flaps (seconds)
    pub flap_interval: f64,
}

impl Default for TalkingConfig {
    fn default() -> Self {
        Self {
            flap_interval: 0.08,
        }
    }
}

impl TalkingConfig {
    pub fn validate(&self) -> ThaResult<()> {
        if !(self.flap_interval.is_finite() && self.flap_interval > 0.0) {
            return Err(ThaError::config(format!(
                "flap interval must be positive, got {}",
                self.flap_interval
            )));
        }
        Ok(())
    }
}

/// Talking generator
#[derive(Debug)]
pub struct TalkingGenerator {
    config: TalkingConfig,
    rng: StdRng,
    talking: bool,
    opening: f32,
    until_flap: f64,
}

impl TalkingGenerator {
    /// Create a new talking generator
    pub fn new(config: TalkingConfig, seed: u64) -> ThaResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            talking: false,
            opening: 0.0,
            until_flap: 0.0,
        })
    }

    pub fn reconfigure(&mut self, config: TalkingConfig) -> ThaResult<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn set_talking(&mut self, talking: bool) {
        if talking && !self.talking {
            self.until_flap = 0.0;
        }
        if !talking {
            self.opening = 0.0;
        }
        self.talking = talking;
    }

    pub fn is_talking(&self) -> bool {
        self.talking
    }

    /// Current mouth opening contributed by speech
    pub fn opening(&self) -> f32 {
        self.opening
    }

    fn flap(&mut self) {
        let jitter: f32 = self.rng.gen_range(-2.0..=2.0);
        self.opening = ((1.0 - self.opening).abs() + jitter).clamp(0.0, 1.0);
    }
}

impl MotionGenerator for TalkingGenerator {
    fn source(&self) -> MotionSource {
        MotionSource::Talking
    }

    fn advance(&mut self, dt: f64, out: &mut MotionOffsets) {
        if !self.talking {
            return;
        }
        let dt = sanitize_dt(dt);
        self.until_flap -= dt;
        if self.until_flap <= 0.0 {
            self.flap();
            // At most one flap per tick; skip missed flaps
            self.until_flap = (self.until_flap + self.config.flap_interval).max(0.0);
        }
        out.add(MotionSource::Talking, Channel::MouthAaa, self.opening);
    }

    fn reset(&mut self) {
        self.talking = false;
        self.opening = 0.0;
        self.until_flap = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_emits_nothing() {
        let mut gen = TalkingGenerator::new(TalkingConfig::default(), 1).unwrap();
        let mut out = MotionOffsets::new();
        gen.advance(0.04, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_talking_flaps_in_range() {
        let mut gen = TalkingGenerator::new(TalkingConfig::default(), 4).unwrap();
        gen.set_talking(true);
        let mut distinct = std::collections::BTreeSet::new();
        for _ in 0..200 {
            let mut out = MotionOffsets::new();
            gen.advance(0.04, &mut out);
            let v = out.total(Channel::MouthAaa);
            assert!((0.0..=1.0).contains(&v));
            distinct.insert((v * 1000.0) as i32);
        }
        assert!(distinct.len() > 2);
    }

    #[test]
    fn test_stop_talking_closes_mouth() {
        let mut gen = TalkingGenerator::new(TalkingConfig::default(), 4).unwrap();
        gen.set_talking(true);
        let mut out = MotionOffsets::new();
        gen.advance(0.04, &mut out);
        gen.set_talking(false);
        assert_eq!(gen.opening(), 0.0);

        let mut out = MotionOffsets::new();
        gen.advance(0.04, &mut out);
        assert!(out.is_empty());
    }
}
