//! Pose vectors - one complete, range-valid weight per channel

use std::fmt;

use crate::{Channel, ThaError, ThaResult};

/// Complete pose: exactly one weight per model channel.
///
/// INVARIANT: every weight lies within its channel's declared range.
#[derive(Clone, Copy, PartialEq)]
pub struct PoseVector {
    weights: [f32; Channel::COUNT],
}

impl PoseVector {
    /// Every channel at rest
    pub fn neutral() -> Self {
        let mut weights = [0.0; Channel::COUNT];
        for channel in Channel::ALL {
            weights[channel.index()] = channel.neutral();
        }
        Self { weights }
    }

    /// Same weight on every channel, clamped per channel
    pub fn uniform(value: f32) -> Self {
        let mut pose = Self::neutral();
        for channel in Channel::ALL {
            pose.set_clamped(channel, value);
        }
        pose
    }

    /// Build from named weights, starting from neutral.
    /// Unknown names and out-of-range weights are rejected.
    pub fn from_named<'a, I>(values: I) -> ThaResult<Self>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let mut pose = Self::neutral();
        for (name, value) in values {
            let channel = name.parse::<Channel>()?;
            pose.set(channel, value)?;
        }
        Ok(pose)
    }

    /// Build from raw model-order weights, clamping each into range
    pub fn from_slice_clamped(values: &[f32]) -> ThaResult<Self> {
        if values.len() != Channel::COUNT {
            return Err(ThaError::config(format!(
                "pose needs {} weights, got {}",
                Channel::COUNT,
                values.len()
            )));
        }
        let mut pose = Self::neutral();
        for (channel, value) in Channel::ALL.iter().zip(values) {
            pose.set_clamped(*channel, *value);
        }
        Ok(pose)
    }

    #[inline]
    pub fn get(&self, channel: Channel) -> f32 {
        self.weights[channel.index()]
    }

    /// Set a weight, rejecting values outside the channel range
    pub fn set(&mut self, channel: Channel, value: f32) -> ThaResult<()> {
        let range = channel.range();
        ThaError::check_range(channel.name(), value as f64, range.min as f64, range.max as f64)?;
        self.weights[channel.index()] = value;
        Ok(())
    }

    /// Set a weight, clamping into the channel range.
    /// Returns true if the value had to be clamped.
    pub fn set_clamped(&mut self, channel: Channel, value: f32) -> bool {
        let clamped = channel.range().clamp(value);
        self.weights[channel.index()] = clamped;
        clamped != value
    }

    /// Iterate `(channel, weight)` in model order
    pub fn iter(&self) -> impl Iterator<Item = (Channel, f32)> + '_ {
        Channel::ALL.iter().map(move |c| (*c, self.weights[c.index()]))
    }

    /// Model-order weights, ready to hand to the posing model
    pub fn as_slice(&self) -> &[f32] {
        &self.weights
    }

    /// Largest per-channel absolute difference
    pub fn max_abs_diff(&self, other: &PoseVector) -> f32 {
        self.weights
            .iter()
            .zip(other.weights.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }

    /// Does every weight lie within its declared range?
    pub fn is_range_valid(&self) -> bool {
        self.iter().all(|(c, v)| c.range().contains(v))
    }
}

impl Default for PoseVector {
    fn default() -> Self {
        Self::neutral()
    }
}

impl fmt::Debug for PoseVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only non-neutral channels, otherwise the output is 45 lines of zeros
        let mut map = f.debug_map();
        for (channel, value) in self.iter() {
            if value != channel.neutral() {
                map.entry(&channel.name(), &value);
            }
        }
        map.finish()
    }
}
