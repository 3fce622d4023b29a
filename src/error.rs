//! Error handling for Vocal Master
//!
//! Every failure the engine can report maps to one of four user-actionable
//! categories: device, decode, precondition and render. Transport operations
//! never fail.

use thiserror::Error;

/// Result type alias for Vocal Master operations
pub type Result<T> = std::result::Result<T, VocalError>;

/// Why a capture device could not be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFailure {
    /// The user or OS refused microphone access
    PermissionDenied,
    /// No usable input device exists
    Unavailable,
    /// Another capture session already holds the device
    Busy,
}

impl std::fmt::Display for DeviceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceFailure::PermissionDenied => write!(f, "permission denied"),
            DeviceFailure::Unavailable => write!(f, "device unavailable"),
            DeviceFailure::Busy => write!(f, "device busy"),
        }
    }
}

/// Main error type for Vocal Master operations
#[derive(Error, Debug)]
pub enum VocalError {
    // Capture errors
    #[error("Capture device error ({kind}): {details}")]
    Device { kind: DeviceFailure, details: String },

    // Import errors
    #[error("Could not decode audio: {reason}")]
    Decode {
        reason: String,
        #[source]
        source: Option<hound::Error>,
    },

    // Caller errors
    #[error("Precondition failed: {reason}")]
    Precondition { reason: String },

    // Offline mixdown errors
    #[error("Render failed: {reason}")]
    Render { reason: String },

    #[error("Render cancelled after {frames_rendered} frames")]
    RenderCancelled { frames_rendered: usize },

    // Configuration errors
    #[error("Invalid configuration: {param} = {value} (expected {expected})")]
    InvalidConfig {
        param: String,
        value: String,
        expected: String,
    },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VocalError {
    /// Shorthand for a device failure
    pub fn device(kind: DeviceFailure, details: impl Into<String>) -> Self {
        VocalError::Device {
            kind,
            details: details.into(),
        }
    }

    /// Shorthand for a decode failure without an underlying codec error
    pub fn decode(reason: impl Into<String>) -> Self {
        VocalError::Decode {
            reason: reason.into(),
            source: None,
        }
    }

    /// Shorthand for a precondition failure
    pub fn precondition(reason: impl Into<String>) -> Self {
        VocalError::Precondition {
            reason: reason.into(),
        }
    }

    /// Shorthand for a render failure
    pub fn render(reason: impl Into<String>) -> Self {
        VocalError::Render {
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            VocalError::Device { .. } => "DEVICE_ERROR",
            VocalError::Decode { .. } => "DECODE_ERROR",
            VocalError::Precondition { .. } => "PRECONDITION_ERROR",
            VocalError::Render { .. } => "RENDER_ERROR",
            VocalError::RenderCancelled { .. } => "RENDER_CANCELLED",
            VocalError::InvalidConfig { .. } => "INVALID_CONFIG",
            VocalError::Io(_) => "IO_ERROR",
            VocalError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Returns a suggested recovery action for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            VocalError::Device {
                kind: DeviceFailure::PermissionDenied,
                ..
            } => "Grant microphone access and try recording again",
            VocalError::Device {
                kind: DeviceFailure::Busy,
                ..
            } => "Stop the current recording before starting a new one",
            VocalError::Device { .. } => "Connect a microphone and try again",
            VocalError::Decode { .. } => "Convert the file to WAV (PCM or float) and import it again",
            VocalError::Precondition { .. } => "Record or import a vocal track first",
            VocalError::Render { .. } => "Check the input tracks and try exporting again",
            VocalError::RenderCancelled { .. } => "Start the export again when ready",
            VocalError::InvalidConfig { .. } => "Fix the configuration value and reload",
            _ => "Check the error details and try again",
        }
    }
}
