//! THA Pose - Emotion-driven pose state
//!
//! The emotion pose pipeline, in tick order:
//!
//! 1. An [`EmotionLibrary`] maps an emotion name to an [`EmotionTemplate`]
//! 2. [`ChannelPairs`] resolves logical left/right keys in manual overrides
//! 3. The [`Interpolator`] moves the current pose toward the target using the
//!    closed-form exponential approach, so speed does not depend on tick rate
//! 4. The [`PoseCompositor`] layers procedural motion offsets on top and
//!    produces the complete, range-valid pose sent to inference

pub mod compositor;
pub mod emotion;
pub mod interpolator;
pub mod pairs;

pub use compositor::*;
pub use emotion::*;
pub use interpolator::*;
pub use pairs::*;
