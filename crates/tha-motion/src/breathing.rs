//! Breathing generator

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use tha_core::{Channel, ThaError, ThaResult};

use crate::{sanitize_dt, MotionGenerator, MotionOffsets, MotionSource};

/// Breathing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreathingConfig {
    /// Duration of one full breath (seconds)
    pub cycle_duration: f64,
    /// Peak breathing offset
    pub amplitude: f32,
}

impl Default for BreathingConfig {
    fn default() -> Self {
        Self {
            cycle_duration: 4.0,
            amplitude: 1.0,
        }
    }
}

impl BreathingConfig {
    pub fn validate(&self) -> ThaResult<()> {
        if !(self.cycle_duration.is_finite() && self.cycle_duration > 0.0) {
            return Err(ThaError::config(format!(
                "breathing cycle must be positive, got {}",
                self.cycle_duration
            )));
        }
        ThaError::check_range("breathing_amplitude", self.amplitude as f64, 0.0, 1.0)
    }
}

/// Periodic breathing, `amplitude * sin²(π·phase)`
#[derive(Debug, Clone)]
pub struct BreathingGenerator {
    config: BreathingConfig,
    /// Cycle position in [0, 1)
    phase: f64,
}

impl BreathingGenerator {
    /// Create a new breathing generator
    pub fn new(config: BreathingConfig) -> ThaResult<Self> {
        config.validate()?;
        Ok(Self { config, phase: 0.0 })
    }

    pub fn reconfigure(&mut self, config: BreathingConfig) -> ThaResult<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &BreathingConfig {
        &self.config
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn value(&self) -> f32 {
        let s = (PI * self.phase).sin();
        (s * s) as f32 * self.config.amplitude
    }
}

impl MotionGenerator for BreathingGenerator {
    fn source(&self) -> MotionSource {
        MotionSource::Breathing
    }

    fn advance(&mut self, dt: f64, out: &mut MotionOffsets) {
        let dt = sanitize_dt(dt);
        self.phase = (self.phase + dt / self.config.cycle_duration).rem_euclid(1.0);
        // rem_euclid can round up to exactly 1.0
        if self.phase >= 1.0 {
            self.phase = 0.0;
        }
        out.add(MotionSource::Breathing, Channel::Breathing, self.value());
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breathing_cycle() {
        let mut gen = BreathingGenerator::new(BreathingConfig::default()).unwrap();
        let mut out = MotionOffsets::new();

        gen.advance(2.0, &mut out);
        assert!((gen.value() - 1.0).abs() < 1e-6);

        gen.advance(2.0, &mut out);
        assert!(gen.value().abs() < 1e-6);
        assert!(gen.phase() < 1.0);
    }

    #[test]
    fn test_phase_stays_in_unit_interval() {
        let mut gen = BreathingGenerator::new(BreathingConfig::default()).unwrap();
        for _ in 0..10_000 {
            let mut out = MotionOffsets::new();
            gen.advance(0.0371, &mut out);
            assert!((0.0..1.0).contains(&gen.phase()));
            let v = out.total(Channel::Breathing);
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_tick_rate_independent() {
        let mut coarse = BreathingGenerator::new(BreathingConfig::default()).unwrap();
        let mut fine = BreathingGenerator::new(BreathingConfig::default()).unwrap();
        let mut out = MotionOffsets::new();
        for _ in 0..10 {
            coarse.advance(0.1, &mut out);
        }
        for _ in 0..100 {
            fine.advance(0.01, &mut out);
        }
        assert!((coarse.value() - fine.value()).abs() < 1e-4);
    }

    #[test]
    fn test_infinite_dt_keeps_phase_finite() {
        let mut gen = BreathingGenerator::new(BreathingConfig::default()).unwrap();
        let mut out = MotionOffsets::new();
        gen.advance(f64::INFINITY, &mut out);
        assert!((0.0..1.0).contains(&gen.phase()));
        gen.advance(0.5, &mut out);
        assert!((0.0..1.0).contains(&gen.phase()));
        assert!(gen.value().is_finite());
    }

    #[test]
    fn test_invalid_config() {
        let config = BreathingConfig {
            cycle_duration: 0.0,
            ..Default::default()
        };
        assert!(BreathingGenerator::new(config).is_err());
    }
}
