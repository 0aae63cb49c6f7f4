//! Tagged channel offsets

use std::collections::BTreeSet;

use tha_core::Channel;

/// Origin of an offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionSource {
    Blink,
    Sway,
    Breathing,
    Talking,
}

impl MotionSource {
    pub fn name(self) -> &'static str {
        match self {
            MotionSource::Blink => "blink",
            MotionSource::Sway => "sway",
            MotionSource::Breathing => "breathing",
            MotionSource::Talking => "talking",
        }
    }
}

/// A single offset contribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    pub source: MotionSource,
    pub channel: Channel,
    pub value: f32,
}

/// Offsets contributed by all generators during one tick.
/// Same-channel contributions are summed.
#[derive(Debug, Clone)]
pub struct MotionOffsets {
    contributions: Vec<Contribution>,
    totals: [f32; Channel::COUNT],
}

impl MotionOffsets {
    pub fn new() -> Self {
        Self {
            contributions: Vec::with_capacity(16),
            totals: [0.0; Channel::COUNT],
        }
    }

    pub fn add(&mut self, source: MotionSource, channel: Channel, value: f32) {
        self.contributions.push(Contribution {
            source,
            channel,
            value,
        });
        self.totals[channel.index()] += value;
    }

    /// Sum of the contributions of one source to `channel`
    pub fn get(&self, source: MotionSource, channel: Channel) -> f32 {
        self.contributions
            .iter()
            .filter(|c| c.source == source && c.channel == channel)
            .map(|c| c.value)
            .sum()
    }

    /// Sum of all contributions to `channel`
    #[inline]
    pub fn total(&self, channel: Channel) -> f32 {
        self.totals[channel.index()]
    }

    /// Contributions from one source
    pub fn by_source(&self, source: MotionSource) -> impl Iterator<Item = &Contribution> + '_ {
        self.contributions.iter().filter(move |c| c.source == source)
    }

    /// Channels with at least one contribution
    pub fn touched(&self) -> BTreeSet<Channel> {
        self.contributions.iter().map(|c| c.channel).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contribution> + '_ {
        self.contributions.iter()
    }

    pub fn len(&self) -> usize {
        self.contributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }

    pub fn clear(&mut self) {
        self.contributions.clear();
        self.totals = [0.0; Channel::COUNT];
    }
}

impl Default for MotionOffsets {
    fn default() -> Self {
        Self::new()
    }
}
