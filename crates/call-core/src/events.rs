//! Events published by the call state machine
//!
//! Every transition is broadcast so UIs and tests can follow a call without
//! polling. Subscribe through [`CallHandle::subscribe`](crate::CallHandle::subscribe)
//! or consume them as a stream with [`CallHandle::events`](crate::CallHandle::events).

use crate::error::CallError;
use crate::types::{CallState, EndReason};
use chrono::{DateTime, Utc};
use std::time::Duration;
use voxlink_signaling_core::{CallId, UserId};

/// Call lifecycle events
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    /// The call moved between states
    StateChanged {
        call_id: CallId,
        old_state: CallState,
        new_state: CallState,
    },

    /// A peer is calling; answer with `accept` or `reject`
    IncomingCall {
        call_id: CallId,
        from: UserId,
        display_name: Option<String>,
    },

    /// Negotiation finished and audio is flowing
    CallActive {
        call_id: CallId,
        peer: UserId,
        active_since: DateTime<Utc>,
    },

    MuteChanged { call_id: CallId, muted: bool },

    /// An invite arrived while this participant was busy and was refused
    MissedCall { call_id: CallId, from: UserId },

    /// The call is over and local audio has been released
    CallEnded {
        call_id: CallId,
        peer: UserId,
        reason: EndReason,
        /// The one error surfaced for this call, if it ended abnormally
        error: Option<CallError>,
        duration: Option<Duration>,
    },
}

impl CallEvent {
    /// The call this event belongs to
    pub fn call_id(&self) -> CallId {
        match self {
            CallEvent::StateChanged { call_id, .. }
            | CallEvent::IncomingCall { call_id, .. }
            | CallEvent::CallActive { call_id, .. }
            | CallEvent::MuteChanged { call_id, .. }
            | CallEvent::MissedCall { call_id, .. }
            | CallEvent::CallEnded { call_id, .. } => *call_id,
        }
    }

    /// Short name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            CallEvent::StateChanged { .. } => "state_changed",
            CallEvent::IncomingCall { .. } => "incoming_call",
            CallEvent::CallActive { .. } => "call_active",
            CallEvent::MuteChanged { .. } => "mute_changed",
            CallEvent::MissedCall { .. } => "missed_call",
            CallEvent::CallEnded { .. } => "call_ended",
        }
    }
}
