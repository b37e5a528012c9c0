//! Media error types

use thiserror::Error;

/// Media operation result type
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors raised by audio capture or the media transport
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The user (or OS) refused microphone access
    #[error("Microphone permission denied")]
    PermissionDenied,

    /// No usable capture device, or it is held by another application
    #[error("Audio device unavailable: {message}")]
    DeviceUnavailable { message: String },

    /// The media transport could not produce or apply a negotiation payload
    #[error("Media negotiation failed: {message}")]
    Negotiation { message: String },

    /// The media transport failed to start or stop
    #[error("Media transport error: {message}")]
    Transport { message: String },

    /// An operation needed local audio that was never acquired
    #[error("No local audio acquired")]
    NotAcquired,
}

impl MediaError {
    /// Create a device-unavailable error
    pub fn device_unavailable(message: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            message: message.into(),
        }
    }

    /// Create a negotiation error
    pub fn negotiation(message: impl Into<String>) -> Self {
        Self::Negotiation {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Whether the error comes from acquiring the capture device
    pub fn is_capture_error(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::DeviceUnavailable { .. })
    }
}
