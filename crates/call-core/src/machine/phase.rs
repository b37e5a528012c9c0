//! Internal phases of the state machine
//!
//! Finer grained than [`CallState`]: the two acquisition phases exist so a
//! pending microphone prompt can be tracked and cancelled without blocking
//! the event loop.

use crate::error::CallResult;
use crate::session::CallSession;
use crate::types::CallState;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use voxlink_signaling_core::{CallId, OpaquePayload, UserId};

pub(crate) enum Phase {
    Idle,
    /// `initiate` accepted, local audio being acquired; nothing sent yet
    Preparing {
        call_id: CallId,
        target: UserId,
        acquisition: JoinHandle<()>,
        reply: oneshot::Sender<CallResult<CallId>>,
    },
    Calling {
        session: CallSession,
        deadline: Instant,
    },
    Incoming {
        session: CallSession,
        offer: OpaquePayload,
    },
    /// `accept` issued, local audio being acquired
    Accepting {
        session: CallSession,
        offer: OpaquePayload,
        acquisition: JoinHandle<()>,
        reply: oneshot::Sender<CallResult<()>>,
    },
    Active {
        session: CallSession,
    },
}

impl Phase {
    /// Externally visible state
    pub(crate) fn state(&self) -> CallState {
        match self {
            Phase::Idle | Phase::Preparing { .. } => CallState::Idle,
            Phase::Calling { .. } => CallState::Calling,
            Phase::Incoming { .. } | Phase::Accepting { .. } => CallState::Incoming,
            Phase::Active { .. } => CallState::Active,
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }

    pub(crate) fn session(&self) -> Option<&CallSession> {
        match self {
            Phase::Idle | Phase::Preparing { .. } => None,
            Phase::Calling { session, .. }
            | Phase::Incoming { session, .. }
            | Phase::Accepting { session, .. }
            | Phase::Active { session } => Some(session),
        }
    }

    /// Call id of the call being set up or in progress
    pub(crate) fn call_id(&self) -> Option<CallId> {
        match self {
            Phase::Preparing { call_id, .. } => Some(*call_id),
            other => other.session().map(|s| s.session_id),
        }
    }

    /// Whether an envelope belongs to the current call
    pub(crate) fn matches(&self, call_id: &CallId, from: &UserId) -> bool {
        self.session().is_some_and(|s| s.matches(call_id, from))
    }

    pub(crate) fn answer_deadline(&self) -> Option<Instant> {
        match self {
            Phase::Calling { deadline, .. } => Some(*deadline),
            _ => None,
        }
    }
}
