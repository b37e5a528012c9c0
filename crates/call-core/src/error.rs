//! Error types for call operations

use crate::types::CallState;
use std::time::Duration;
use thiserror::Error;
use voxlink_media_core::MediaError;
use voxlink_signaling_core::{SignalingError, UserId};

/// Result type for call operations
pub type CallResult<T> = Result<T, CallError>;

/// Errors surfaced by the call state machine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    /// Microphone permission denied or device unavailable; the call never
    /// reaches Active
    #[error("Local media error: {0}")]
    LocalMedia(#[from] MediaError),

    /// The relay could not find the peer
    #[error("Peer unreachable: {user_id}")]
    PeerUnreachable { user_id: UserId },

    /// The signaling connection dropped or refused a send
    #[error("Signaling transport error: {message}")]
    SignalingTransport { message: String },

    /// The callee did not answer in time
    #[error("No answer within {timeout:?}")]
    Timeout { timeout: Duration },

    /// A call is already in progress or being set up
    #[error("Already in a call")]
    Busy,

    /// The operation is not valid in the current state
    #[error("Cannot {operation} while {state}")]
    InvalidState { operation: String, state: CallState },

    /// The call target is not a valid peer
    #[error("Invalid call target: {target}")]
    InvalidTarget { target: UserId },

    /// Call setup was abandoned before it completed
    #[error("Call setup cancelled")]
    Cancelled,

    /// The state machine task is gone
    #[error("Call state machine is not running")]
    MachineStopped,

    /// Invalid configuration value
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl CallError {
    /// Create an invalid-state error
    pub fn invalid_state(operation: impl Into<String>, state: CallState) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state,
        }
    }

    /// Create a signaling transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::SignalingTransport {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl From<SignalingError> for CallError {
    fn from(err: SignalingError) -> Self {
        match err {
            SignalingError::NotFound { user_id } => Self::PeerUnreachable { user_id },
            other => Self::transport(other.to_string()),
        }
    }
}
