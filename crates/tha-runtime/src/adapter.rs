//! Driver seams - the posing model on one side, the frame consumer on the other

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use tha_core::{InferenceError, PoseVector, ThaError, ThaResult};
use tha_effects::Frame;

/// The external posing model.
///
/// `render` is the dominant per-tick cost and may block; the async driver
/// calls it from a blocking worker and never has two calls outstanding.
pub trait InferenceAdapter: Send + 'static {
    fn render(&mut self, pose: &PoseVector) -> Result<Frame, InferenceError>;
}

impl<F> InferenceAdapter for F
where
    F: FnMut(&PoseVector) -> Result<Frame, InferenceError> + Send + 'static,
{
    fn render(&mut self, pose: &PoseVector) -> Result<Frame, InferenceError> {
        self(pose)
    }
}

/// A delivered frame
#[derive(Debug, Clone)]
pub struct EmittedFrame {
    /// Position in the output sequence, starting at 0
    pub sequence: u64,
    /// Postprocessed image
    pub frame: Arc<Frame>,
    /// True when the render for this tick failed and an older image was re-sent
    pub stale: bool,
    /// Pose the image was rendered from
    pub pose: PoseVector,
}

/// Where emitted frames go
pub trait FrameSink: Send {
    /// Deliver one frame. An error means the consumer is gone and the driver stops.
    fn emit(&mut self, frame: EmittedFrame) -> ThaResult<()>;
}

impl FrameSink for mpsc::UnboundedSender<EmittedFrame> {
    fn emit(&mut self, frame: EmittedFrame) -> ThaResult<()> {
        self.send(frame).map_err(|_| ThaError::DriverStopped)
    }
}

/// Latest-frame output: pollers see only the newest frame
impl FrameSink for watch::Sender<Option<EmittedFrame>> {
    fn emit(&mut self, frame: EmittedFrame) -> ThaResult<()> {
        self.send_replace(Some(frame));
        Ok(())
    }
}

/// Collects everything (tests and offline rendering)
impl FrameSink for Vec<EmittedFrame> {
    fn emit(&mut self, frame: EmittedFrame) -> ThaResult<()> {
        self.push(frame);
        Ok(())
    }
}
