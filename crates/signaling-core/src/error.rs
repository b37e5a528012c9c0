//! Error types for signaling operations

use crate::types::UserId;
use thiserror::Error;

/// Result type for signaling operations
pub type SignalingResult<T> = Result<T, SignalingError>;

/// Errors that can occur while routing signaling envelopes
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignalingError {
    /// No live connection is registered for the user
    #[error("User not connected: {user_id}")]
    NotFound { user_id: UserId },

    /// The user's transport is gone (receiver dropped, socket closed)
    #[error("Transport closed for user {user_id}")]
    TransportClosed { user_id: UserId },

    /// The user's inbound queue is full; the envelope was not queued
    #[error("Inbound queue full for user {user_id}")]
    QueueFull { user_id: UserId },

    /// Envelope could not be encoded or decoded
    #[error("Codec error: {message}")]
    Codec { message: String },
}

impl SignalingError {
    /// Create a not-found error
    pub fn not_found(user_id: impl Into<UserId>) -> Self {
        Self::NotFound {
            user_id: user_id.into(),
        }
    }

    /// Create a transport-closed error
    pub fn transport_closed(user_id: impl Into<UserId>) -> Self {
        Self::TransportClosed {
            user_id: user_id.into(),
        }
    }

    /// Create a queue-full error
    pub fn queue_full(user_id: impl Into<UserId>) -> Self {
        Self::QueueFull {
            user_id: user_id.into(),
        }
    }

    /// Whether the error means the remote side can no longer be reached
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::TransportClosed { .. })
    }
}

impl From<serde_json::Error> for SignalingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec {
            message: err.to_string(),
        }
    }
}
