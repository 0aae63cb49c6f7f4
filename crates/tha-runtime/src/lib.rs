//! THA Runtime - The realtime frame loop
//!
//! Each tick runs the same stages:
//! 1. Apply queued reconfiguration (emotion, effects, parameters, pause)
//! 2. Measure elapsed wall-clock time
//! 3. Advance the interpolator and the procedural motion generators
//! 4. Compose the final pose
//! 5. Render it through the inference adapter
//! 6. Run the effect chain and the sRGB conversion
//! 7. Emit the frame
//!
//! [`FrameDriver::tick`] runs the stages synchronously. [`FrameDriver::run`]
//! runs them on a tokio interval with rendering on a blocking worker, at
//! most one render in flight.

pub mod adapter;
pub mod config;
pub mod control;
pub mod driver;
pub mod stats;
pub mod telemetry;

pub use adapter::*;
pub use config::*;
pub use control::*;
pub use driver::*;
pub use stats::*;
pub use telemetry::*;
