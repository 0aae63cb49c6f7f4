//! THA Motion - Procedural idle motion
//!
//! Each generator is an independent timer-driven process. A generator never
//! writes a pose channel; it only contributes a tagged offset that the pose
//! compositor combines with the interpolated emotion pose.
//!
//! # Generators
//!
//! - Blink: randomly spaced close/open envelope on the eyelids
//! - Sway: slow random re-targeting of head and body, plus microsway noise
//! - Breathing: periodic chest motion
//! - Talking: random mouth flaps while speech is playing

pub mod blink;
pub mod breathing;
pub mod offsets;
pub mod stack;
pub mod sway;
pub mod talking;

pub use blink::*;
pub use breathing::*;
pub use offsets::*;
pub use stack::*;
pub use sway::*;
pub use talking::*;

/// What a generator needs to know about the active emotion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotionCue {
    /// Template name
    pub name: String,
    /// Does this emotion allow rapid blink bursts (e.g. confusion)?
    pub rapid_blink: bool,
}

impl EmotionCue {
    pub fn new(name: impl Into<String>, rapid_blink: bool) -> Self {
        Self {
            name: name.into(),
            rapid_blink,
        }
    }
}

/// A procedural motion process
pub trait MotionGenerator: Send {
    /// Tag attached to every contribution of this generator
    fn source(&self) -> MotionSource;

    fn name(&self) -> &'static str {
        self.source().name()
    }

    /// Advance internal timers by `dt` seconds and append this tick's offsets
    fn advance(&mut self, dt: f64, out: &mut MotionOffsets);

    /// Called when the target emotion changes
    fn on_emotion_change(&mut self, _cue: &EmotionCue) {}

    /// Return to the initial state (timers re-drawn)
    fn reset(&mut self);
}

/// Non-negative, finite elapsed time. NaN and negative values count as no
/// time, infinity as the longest representable span.
#[inline]
pub(crate) fn sanitize_dt(dt: f64) -> f64 {
    if dt.is_nan() || dt <= 0.0 {
        0.0
    } else {
        dt.min(f64::MAX)
    }
}
