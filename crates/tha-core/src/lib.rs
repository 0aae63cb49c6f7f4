//! THA Core - Fundamental types for the live pose animator
//!
//! This crate defines the types shared by every other crate in the workspace:
//! - The pose channel catalogue of the posing model (Channel, ChannelRange, CombineRule)
//! - Complete, range-valid pose vectors (PoseVector)
//! - Frame-rate independent exponential approach math (TimeConstant, EventRate)
//! - The error taxonomy (ThaError, InferenceError)

pub mod channel;
pub mod decay;
pub mod error;
pub mod pose;

pub use channel::*;
pub use decay::*;
pub use error::*;
pub use pose::*;
