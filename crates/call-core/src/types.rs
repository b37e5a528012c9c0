//! Call state and outcome types

use serde::{Deserialize, Serialize};
use std::fmt;
use voxlink_signaling_core::RejectReason;

/// Phase of a participant's call, as observed from outside the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallState {
    /// No call
    Idle,
    /// Invite sent, waiting for the callee
    Calling,
    /// Invite received, waiting for the local user
    Incoming,
    /// Negotiated; audio flows
    Active,
    /// Cleanup in progress; always followed by Idle
    Ended,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Idle => "idle",
            CallState::Calling => "calling",
            CallState::Incoming => "incoming",
            CallState::Active => "active",
            CallState::Ended => "ended",
        }
    }

    /// Whether a call is set up or in progress
    pub fn is_in_call(&self) -> bool {
        matches!(self, CallState::Calling | CallState::Incoming | CallState::Active)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the call this participant is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallDirection {
    Outgoing,
    Incoming,
}

/// Why a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    /// This participant hung up (or shut down)
    LocalHangup,
    /// The peer hung up
    RemoteHangup,
    /// The call was refused; for the callee's own decline this is `user-declined`
    Rejected(RejectReason),
    /// The callee did not answer in time
    Timeout,
    /// Local audio could not be acquired or wired
    LocalMediaError,
    /// The signaling connection dropped
    TransportLost,
}

impl EndReason {
    /// The reject reason, if the call was refused
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            EndReason::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::LocalHangup => f.write_str("local-hangup"),
            EndReason::RemoteHangup => f.write_str("remote-hangup"),
            EndReason::Rejected(reason) => write!(f, "rejected ({})", reason),
            EndReason::Timeout => f.write_str("timeout"),
            EndReason::LocalMediaError => f.write_str("local-media-error"),
            EndReason::TransportLost => f.write_str("transport-lost"),
        }
    }
}
