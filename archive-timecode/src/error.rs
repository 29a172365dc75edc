//! Error types for timecode operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for timecode operations.
pub type Result<T> = std::result::Result<T, TimecodeError>;

/// Errors that can occur during timecode operations.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimecodeError {
    /// Invalid timecode format in string.
    #[error("Invalid timecode format: {message}")]
    InvalidFormat {
        /// Description of the format error.
        message: String,
    },

    /// Invalid timecode component value.
    #[error("Invalid timecode component: {component} = {value} (max {max})")]
    InvalidComponent {
        /// Name of the invalid component (hours, minutes, seconds, frames).
        component: String,
        /// The invalid value that was provided.
        value: u32,
        /// The maximum allowed value for this component.
        max: u32,
    },

    /// Invalid frame rate.
    #[error("Invalid frame rate: {numerator}/{denominator}")]
    InvalidFrameRate {
        /// Frame rate numerator.
        numerator: u32,
        /// Frame rate denominator.
        denominator: u32,
    },

    /// Unsupported frame rate for operation.
    #[error("Unsupported frame rate for {operation}: {frame_rate}")]
    UnsupportedFrameRate {
        /// The operation that doesn't support this frame rate.
        operation: String,
        /// String representation of the unsupported frame rate.
        frame_rate: String,
    },

    /// Underflow during timecode arithmetic.
    #[error("Timecode underflow")]
    Underflow,

    /// Drop-frame timecode error.
    #[error("Drop-frame error: {message}")]
    DropFrameError {
        /// Description of the drop-frame error.
        message: String,
    },
}

impl TimecodeError {
    /// Create an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Create an invalid component error.
    pub fn invalid_component(component: impl Into<String>, value: u32, max: u32) -> Self {
        Self::InvalidComponent {
            component: component.into(),
            value,
            max,
        }
    }

    /// Create an invalid frame rate error.
    pub fn invalid_frame_rate(numerator: u32, denominator: u32) -> Self {
        Self::InvalidFrameRate {
            numerator,
            denominator,
        }
    }

    /// Create an unsupported frame rate error.
    pub fn unsupported_frame_rate(
        operation: impl Into<String>,
        frame_rate: impl Into<String>,
    ) -> Self {
        Self::UnsupportedFrameRate {
            operation: operation.into(),
            frame_rate: frame_rate.into(),
        }
    }

    /// Create a drop-frame error.
    pub fn drop_frame(message: impl Into<String>) -> Self {
        Self::DropFrameError {
            message: message.into(),
        }
    }
}
