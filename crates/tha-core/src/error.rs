//! Error types for the animator

use thiserror::Error;

/// Core animator errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThaError {
    // Configuration errors (rejected at construction or reconfiguration time)
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    #[error("{what} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        what: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Negative time step: {0}s")]
    NegativeTimeStep(f64),

    // Target-state errors
    #[error("Unknown emotion: {0}")]
    UnknownEmotion(String),

    // Inference errors
    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    // Driver errors
    #[error("Driver stopped")]
    DriverStopped,
}

impl ThaError {
    /// Shorthand for a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        ThaError::Configuration(msg.into())
    }

    /// Is this an error that must be rejected at construction/reconfiguration time?
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ThaError::Configuration(_)
                | ThaError::UnknownChannel(_)
                | ThaError::UnknownFilter(_)
                | ThaError::OutOfRange { .. }
        )
    }

    /// Check that `value` lies in `[min, max]`
    pub fn check_range(what: &str, value: f64, min: f64, max: f64) -> ThaResult<()> {
        if value.is_nan() || value < min || value > max {
            return Err(ThaError::OutOfRange {
                what: what.to_string(),
                value,
                min,
                max,
            });
        }
        Ok(())
    }
}

/// Failure reported by the external posing model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("invalid channel set: {0}")]
    InvalidChannelSet(String),

    /// The adapter cannot recover; the driver stops
    #[error("fatal adapter failure: {0}")]
    Fatal(String),
}

impl InferenceError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, InferenceError::Fatal(_))
    }
}

/// Result type for animator operations
pub type ThaResult<T> = Result<T, ThaError>;
