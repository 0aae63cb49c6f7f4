//! THA Time - Wall-clock plumbing for the frame loop
//!
//! This crate implements:
//! - TickClock: monotonic elapsed time between ticks, with jump clamping
//! - FramePacer: target frame rate and tick interval
//! - RunningAverage: moving-window timing statistics for fps reports

pub mod clock;
pub mod pacer;
pub mod stats;

pub use clock::*;
pub use pacer::*;
pub use stats::*;
