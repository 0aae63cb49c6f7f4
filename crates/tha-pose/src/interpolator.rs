//! Interpolator - frame-rate independent approach toward the target pose
//!
//! Every channel decays exponentially toward its target with its own time
//! constant. The update is the closed-form solution for the elapsed time, so
//! one long tick lands exactly where many short ticks would have.
//!
//! Speeds are configured the way animators tune them: "move this fraction of
//! the remaining distance per frame at the reference frame rate". Each step
//! is converted once into a [`TimeConstant`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use tha_core::{Channel, ChannelGroup, PoseVector, ThaError, ThaResult, TimeConstant};

/// Interpolation speed configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterpolatorConfig {
    /// Frame duration the steps were tuned at (seconds)
    pub reference_dt: f64,

    /// Fraction of the remaining distance covered per reference frame
    pub default_step: f64,

    /// Per-group step overrides
    pub group_steps: BTreeMap<ChannelGroup, f64>,

    /// Per-channel step overrides (win over group steps)
    pub channel_steps: BTreeMap<Channel, f64>,
}

impl Default for InterpolatorConfig {
    fn default() -> Self {
        Self {
            reference_dt: 1.0 / 25.0,
            default_step: 0.1,
            group_steps: BTreeMap::from([(ChannelGroup::Mouth, 0.3)]),
            channel_steps: BTreeMap::new(),
        }
    }
}

impl InterpolatorConfig {
    /// Step that applies to `channel`
    pub fn step_for(&self, channel: Channel) -> f64 {
        self.channel_steps
            .get(&channel)
            .or_else(|| self.group_steps.get(&channel.group()))
            .copied()
            .unwrap_or(self.default_step)
    }

    pub fn validate(&self) -> ThaResult<()> {
        self.time_constants().map(|_| ())
    }

    fn time_constants(&self) -> ThaResult<[TimeConstant; Channel::COUNT]> {
        let mut taus = [TimeConstant::INSTANT; Channel::COUNT];
        for channel in Channel::ALL {
            taus[channel.index()] =
                TimeConstant::from_reference_step(self.step_for(channel), self.reference_dt)?;
        }
        Ok(taus)
    }
}

/// Current/target pose pair advanced by elapsed time
#[derive(Debug, Clone)]
pub struct Interpolator {
    config: InterpolatorConfig,
    taus: [TimeConstant; Channel::COUNT],
    current: PoseVector,
    target: PoseVector,
}

impl Interpolator {
    /// Create a new interpolator resting at `initial`
    pub fn new(config: InterpolatorConfig, initial: PoseVector) -> ThaResult<Self> {
        let taus = config.time_constants()?;
        Ok(Self {
            config,
            taus,
            current: initial,
            target: initial,
        })
    }

    /// Move every channel toward its target by `dt` seconds of decay.
    ///
    /// `dt = 0` changes nothing; `dt = ∞` lands on the target.
    pub fn advance(&mut self, dt: f64) -> ThaResult<()> {
        if dt.is_nan() {
            return Err(ThaError::config("time step is not a number"));
        }
        if dt < 0.0 {
            return Err(ThaError::NegativeTimeStep(dt));
        }
        if dt == 0.0 {
            return Ok(());
        }

        for channel in Channel::ALL {
            let tau = self.taus[channel.index()];
            let value = tau.approach(self.current.get(channel), self.target.get(channel), dt);
            self.current.set_clamped(channel, value);
        }
        trace!(dt, distance = self.distance_to_target(), "interpolator advanced");
        Ok(())
    }

    /// Replace the target. Takes effect from the next `advance`.
    pub fn set_target(&mut self, target: PoseVector) {
        self.target = target;
    }

    /// Jump straight to the target
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
    }

    /// Jump to an arbitrary pose, keeping the target
    pub fn set_current(&mut self, pose: PoseVector) {
        self.current = pose;
    }

    pub fn current(&self) -> &PoseVector {
        &self.current
    }

    pub fn target(&self) -> &PoseVector {
        &self.target
    }

    pub fn time_constant(&self, channel: Channel) -> TimeConstant {
        self.taus[channel.index()]
    }

    pub fn config(&self) -> &InterpolatorConfig {
        &self.config
    }

    /// Change speeds; current and target are kept
    pub fn reconfigure(&mut self, config: InterpolatorConfig) -> ThaResult<()> {
        self.taus = config.time_constants()?;
        self.config = config;
        Ok(())
    }

    /// Largest remaining per-channel distance
    pub fn distance_to_target(&self) -> f32 {
        self.current.max_abs_diff(&self.target)
    }
}
