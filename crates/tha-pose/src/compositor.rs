//! Pose compositor - interpolated emotion pose + procedural offsets
//!
//! Each channel is combined according to its [`CombineRule`]. The result is
//! always complete and range-valid: anything that leaves the range is
//! clamped before it can reach the posing model.

use std::collections::BTreeMap;

use tracing::trace;

use tha_core::{Channel, CombineRule, PoseVector, ThaResult};
use tha_motion::MotionOffsets;

use crate::{ChannelPairs, EmotionTemplate};

/// An `Additive` channel that had to be clamped
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeViolation {
    pub channel: Channel,
    /// Value before clamping
    pub raw: f32,
    /// Value sent to inference
    pub clamped: f32,
}

/// Output of one composition
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub pose: PoseVector,
    pub violations: Vec<RangeViolation>,
}

/// Pose compositor
#[derive(Debug, Clone)]
pub struct PoseCompositor {
    /// Rules without template adjustments
    base_rules: [CombineRule; Channel::COUNT],

    /// Rules in effect for the active template
    rules: [CombineRule; Channel::COUNT],

    /// Logical key → left/right mapping for manual inputs
    pairs: ChannelPairs,
}

impl PoseCompositor {
    /// Create a new compositor. `rules` replace the channel defaults.
    pub fn new(rules: BTreeMap<Channel, CombineRule>) -> Self {
        let mut base_rules = [CombineRule::Override; Channel::COUNT];
        for channel in Channel::ALL {
            base_rules[channel.index()] = rules
                .get(&channel)
                .copied()
                .unwrap_or_else(|| channel.default_rule());
        }
        Self {
            base_rules,
            rules: base_rules,
            pairs: ChannelPairs::standard(),
        }
    }

    pub fn with_pairs(mut self, pairs: ChannelPairs) -> Self {
        self.pairs = pairs;
        self
    }

    pub fn pairs(&self) -> &ChannelPairs {
        &self.pairs
    }

    pub fn rule(&self, channel: Channel) -> CombineRule {
        self.rules[channel.index()]
    }

    /// Apply a template's override-only channels on top of the base rules
    pub fn set_rules_from_template(&mut self, template: &EmotionTemplate) {
        self.rules = self.base_rules;
        for channel in template.override_only() {
            self.rules[channel.index()] = CombineRule::Override;
        }
    }

    /// Resolve named manual inputs, expanding logical pair keys
    pub fn resolve_inputs<'a, I>(&self, inputs: I) -> ThaResult<BTreeMap<Channel, f32>>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        self.pairs.resolve(inputs)
    }

    /// Combine the interpolated pose with this tick's procedural offsets
    pub fn compose(&self, base: &PoseVector, offsets: &MotionOffsets) -> Composition {
        let mut pose = *base;
        let mut violations = Vec::new();

        for channel in Channel::ALL {
            let value = base.get(channel);
            match self.rule(channel) {
                CombineRule::Override => {}
                CombineRule::Additive => {
                    let raw = value + offsets.total(channel);
                    if pose.set_clamped(channel, raw) {
                        violations.push(RangeViolation {
                            channel,
                            raw,
                            clamped: pose.get(channel),
                        });
                    }
                }
                CombineRule::AdditiveClamped => {
                    pose.set_clamped(channel, value + offsets.total(channel));
                }
            }
        }

        if !violations.is_empty() {
            trace!(count = violations.len(), "clamped composed channels");
        }
        Composition { pose, violations }
    }
}

impl Default for PoseCompositor {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tha_motion::MotionSource;

    #[test]
    fn test_no_offsets_passthrough() {
        let compositor = PoseCompositor::default();
        let base = PoseVector::uniform(0.4);
        let out = compositor.compose(&base, &MotionOffsets::new());
        assert_eq!(out.pose, base);
        assert!(out.violations.is_empty());
    }

    #[test]
    fn test_rules() {
        let compositor = PoseCompositor::default();
        let mut base = PoseVector::neutral();
        base.set(Channel::EyebrowAngryLeft, 0.5).unwrap();
        base.set(Channel::EyeWinkLeft, 0.5).unwrap();
        base.set(Channel::HeadX, 0.8).unwrap();

        let mut offsets = MotionOffsets::new();
        // Override: ignored
        offsets.add(MotionSource::Sway, Channel::EyebrowAngryLeft, 0.3);
        // AdditiveClamped: saturates silently
        offsets.add(MotionSource::Blink, Channel::EyeWinkLeft, 1.0);
        // Additive: clamped and reported
        offsets.add(MotionSource::Sway, Channel::HeadX, 0.5);
        // Additive within range
        offsets.add(MotionSource::Sway, Channel::BodyY, -0.2);

        let out = compositor.compose(&base, &offsets);
        assert_eq!(out.pose.get(Channel::EyebrowAngryLeft), 0.5);
        assert_eq!(out.pose.get(Channel::EyeWinkLeft), 1.0);
        assert_eq!(out.pose.get(Channel::HeadX), 1.0);
        assert!((out.pose.get(Channel::BodyY) + 0.2).abs() < 1e-6);

        assert_eq!(out.violations.len(), 1);
        let violation = out.violations[0];
        assert_eq!(violation.channel, Channel::HeadX);
        assert!((violation.raw - 1.3).abs() < 1e-6);
        assert_eq!(violation.clamped, 1.0);
    }

    #[test]
    fn test_overlapping_offsets_sum_then_clamp() {
        let compositor = PoseCompositor::default();
        let mut offsets = MotionOffsets::new();
        offsets.add(MotionSource::Sway, Channel::BodyZ, 0.4);
        offsets.add(MotionSource::Breathing, Channel::BodyZ, 0.4);
        let out = compositor.compose(&PoseVector::neutral(), &offsets);
        assert!((out.pose.get(Channel::BodyZ) - 0.8).abs() < 1e-6);

        offsets.add(MotionSource::Talking, Channel::BodyZ, 0.4);
        let out = compositor.compose(&PoseVector::neutral(), &offsets);
        assert_eq!(out.pose.get(Channel::BodyZ), 1.0);
    }

    #[test]
    fn test_template_override_only() {
        let mut compositor = PoseCompositor::default();
        let template = EmotionTemplate::new("stare", BTreeMap::new())
            .unwrap()
            .with_override_only([Channel::EyeWinkLeft, Channel::EyeWinkRight]);
        compositor.set_rules_from_template(&template);
        assert_eq!(compositor.rule(Channel::EyeWinkLeft), CombineRule::Override);

        let mut offsets = MotionOffsets::new();
        offsets.add(MotionSource::Blink, Channel::EyeWinkLeft, 1.0);
        let out = compositor.compose(&PoseVector::neutral(), &offsets);
        assert_eq!(out.pose.get(Channel::EyeWinkLeft), 0.0);

        // Switching templates restores the base rules
        let plain = EmotionTemplate::new("plain", BTreeMap::new()).unwrap();
        compositor.set_rules_from_template(&plain);
        assert_eq!(compositor.rule(Channel::EyeWinkLeft), CombineRule::AdditiveClamped);
    }

    #[test]
    fn test_custom_rules() {
        let compositor =
            PoseCompositor::new(BTreeMap::from([(Channel::HeadX, CombineRule::Override)]));
        let mut offsets = MotionOffsets::new();
        offsets.add(MotionSource::Sway, Channel::HeadX, 0.5);
        let out = compositor.compose(&PoseVector::neutral(), &offsets);
        assert_eq!(out.pose.get(Channel::HeadX), 0.0);
    }

    #[test]
    fn test_resolve_inputs_uses_pairs() {
        let compositor = PoseCompositor::default();
        let inputs = compositor.resolve_inputs([("eyebrow_angry_index", 0.6)]).unwrap();
        assert_eq!(inputs.len(), 2);
        assert!(compositor.resolve_inputs([("nose_twitch", 0.1)]).is_err());
    }

    proptest! {
        #[test]
        fn test_output_always_range_valid(
            level in -1.0f32..1.0,
            raw in proptest::collection::vec((0usize..Channel::COUNT, -50.0f32..50.0), 0..64),
        ) {
            let compositor = PoseCompositor::default();
            let base = PoseVector::uniform(level);
            let mut offsets = MotionOffsets::new();
            for (index, value) in raw {
                let channel = Channel::ALL[index];
                offsets.add(MotionSource::Sway, channel, value);
            }
            let out = compositor.compose(&base, &offsets);
            prop_assert!(out.pose.is_range_valid());
            for v in &out.violations {
                prop_assert_eq!(v.channel.default_rule(), CombineRule::Additive);
            }
        }
    }
}
