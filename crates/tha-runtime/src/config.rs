//! Animator configuration
//!
//! One flat structure carries every tunable of a session. It deserializes
//! from JSON with defaults for anything omitted; unknown keys are rejected so
//! typos do not silently fall back to defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tha_core::{ThaError, ThaResult};
use tha_effects::EffectSpec;
use tha_motion::{BlinkConfig, BreathingConfig, MotionConfig, SwayConfig, TalkingConfig};
use tha_pose::InterpolatorConfig;
use tha_time::FramePacer;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnimatorConfig {
    /// Tick rate of the frame loop
    pub target_fps: f64,

    /// Postprocessing filters, in application order
    pub effect_chain: EffectSpec,

    // Blinking
    pub blink_interval_min: f64,
    pub blink_interval_max: f64,
    /// Chance of an extra blink per 25 fps tick, for rapid-blink emotions
    pub blink_probability_per_tick: f64,
    /// How long after a rapid-blink emotion is entered extra blinks may happen
    pub blink_burst_window: f64,

    // Sway
    pub sway_interval_min: f64,
    pub sway_interval_max: f64,
    pub sway_max_random: f32,
    pub sway_max_noise: f32,

    // Breathing
    pub breathing_cycle_duration: f64,

    // Talking
    pub talking_flap_interval: f64,

    /// Per-channel interpolation speeds
    pub interpolation: InterpolatorConfig,

    /// Convert linear output to sRGB after the effect chain
    pub gamma_correct: bool,

    /// Seconds between statistics log lines
    pub stats_interval: f64,

    /// Longest wall-clock gap a single tick may cover (seconds)
    pub max_tick: f64,

    /// Size of the placeholder frame emitted before the first render succeeds
    pub placeholder_width: usize,
    pub placeholder_height: usize,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        let blink = BlinkConfig::default();
        let sway = SwayConfig::default();
        Self {
            target_fps: 25.0,
            effect_chain: EffectSpec::empty(),
            blink_interval_min: blink.interval_min,
            blink_interval_max: blink.interval_max,
            blink_probability_per_tick: blink.burst_probability_per_tick,
            blink_burst_window: blink.burst_window,
            sway_interval_min: sway.interval_min,
            sway_interval_max: sway.interval_max,
            sway_max_random: sway.max_random,
            sway_max_noise: sway.max_noise,
            breathing_cycle_duration: BreathingConfig::default().cycle_duration,
            talking_flap_interval: TalkingConfig::default().flap_interval,
            interpolation: InterpolatorConfig::default(),
            gamma_correct: true,
            stats_interval: 5.0,
            max_tick: 0.25,
            placeholder_width: 512,
            placeholder_height: 512,
        }
    }
}

impl AnimatorConfig {
    /// Parse from JSON; missing keys take their defaults
    pub fn from_json_str(json: &str) -> ThaResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ThaError::config(format!("invalid animator config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ThaResult<()> {
        self.pacer()?;
        self.motion().validate()?;
        self.interpolation.validate()?;
        self.effect_chain.validate()?;
        self.stats_interval_duration()?;
        self.max_tick_duration()?;
        if self.placeholder_width == 0 || self.placeholder_height == 0 {
            return Err(ThaError::config("placeholder frame must not be empty"));
        }
        Ok(())
    }

    pub fn pacer(&self) -> ThaResult<FramePacer> {
        FramePacer::new(self.target_fps)
    }

    /// Longest `dt` a real-time tick may cover
    pub fn max_tick_duration(&self) -> ThaResult<Duration> {
        positive_duration("max_tick", self.max_tick)
    }

    /// Animation time between statistics reports
    pub fn stats_interval_duration(&self) -> ThaResult<Duration> {
        positive_duration("stats_interval", self.stats_interval)
    }

    /// Generator parameters derived from the flat options
    pub fn motion(&self) -> MotionConfig {
        MotionConfig {
            blink: BlinkConfig {
                interval_min: self.blink_interval_min,
                interval_max: self.blink_interval_max,
                burst_probability_per_tick: self.blink_probability_per_tick,
                burst_window: self.blink_burst_window,
                ..BlinkConfig::default()
            },
            sway: SwayConfig {
                interval_min: self.sway_interval_min,
                interval_max: self.sway_interval_max,
                max_random: self.sway_max_random,
                max_noise: self.sway_max_noise,
                ..SwayConfig::default()
            },
            breathing: BreathingConfig {
                cycle_duration: self.breathing_cycle_duration,
                ..BreathingConfig::default()
            },
            talking: TalkingConfig {
                flap_interval: self.talking_flap_interval,
            },
        }
    }
}

fn positive_duration(what: &str, seconds: f64) -> ThaResult<Duration> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(ThaError::config(format!(
            "{what} must be a positive duration in seconds, got {seconds}"
        ))),
    }
}
