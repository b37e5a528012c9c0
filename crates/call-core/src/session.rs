//! The record of one call between two participants

use crate::types::{CallDirection, CallState};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;
use voxlink_signaling_core::{CallId, UserId};

/// One call as seen by one participant
///
/// The caller and callee each hold their own copy under the same
/// `session_id`. Only the owning state machine mutates it; handles get
/// clones.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSession {
    pub session_id: CallId,
    pub caller_id: UserId,
    pub callee_id: UserId,
    pub direction: CallDirection,
    pub state: CallState,
    pub created_at: DateTime<Utc>,
    /// Set once, on the transition to Active
    pub active_since: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    active_clock: Option<Instant>,
}

impl CallSession {
    /// A call this participant placed; starts in Calling
    pub fn outgoing(session_id: CallId, caller_id: UserId, callee_id: UserId) -> Self {
        Self::new(session_id, caller_id, callee_id, CallDirection::Outgoing, CallState::Calling)
    }

    /// A call this participant received; starts in Incoming
    pub fn incoming(session_id: CallId, caller_id: UserId, callee_id: UserId) -> Self {
        Self::new(session_id, caller_id, callee_id, CallDirection::Incoming, CallState::Incoming)
    }

    fn new(
        session_id: CallId,
        caller_id: UserId,
        callee_id: UserId,
        direction: CallDirection,
        state: CallState,
    ) -> Self {
        Self {
            session_id,
            caller_id,
            callee_id,
            direction,
            state,
            created_at: Utc::now(),
            active_since: None,
            last_error: None,
            active_clock: None,
        }
    }

    /// The other participant
    pub fn peer(&self) -> &UserId {
        match self.direction {
            CallDirection::Outgoing => &self.callee_id,
            CallDirection::Incoming => &self.caller_id,
        }
    }

    /// This participant
    pub fn local(&self) -> &UserId {
        match self.direction {
            CallDirection::Outgoing => &self.caller_id,
            CallDirection::Incoming => &self.callee_id,
        }
    }

    /// Whether an envelope with this call id from this sender belongs here
    pub fn matches(&self, call_id: &CallId, from: &UserId) -> bool {
        self.session_id == *call_id && self.peer() == from
    }

    /// Move to Active and start the elapsed clock
    pub(crate) fn activate(&mut self) {
        self.state = CallState::Active;
        if self.active_clock.is_none() {
            self.active_since = Some(Utc::now());
            self.active_clock = Some(Instant::now());
        }
    }

    /// Time spent Active, if the call got that far
    pub fn elapsed(&self) -> Option<Duration> {
        self.active_clock.map(|started| started.elapsed())
    }

    pub fn is_active(&self) -> bool {
        self.state == CallState::Active
    }
}
