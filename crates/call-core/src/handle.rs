//! Cloneable front end to a running call state machine

use crate::error::{CallError, CallResult};
use crate::events::CallEvent;
use crate::session::CallSession;
use crate::types::CallState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_stream::wrappers::BroadcastStream;
use voxlink_media_core::MediaSessionManager;
use voxlink_signaling_core::{CallId, UserId};

/// Local actions, answered over a oneshot once the machine has handled them
pub(crate) enum Command {
    Initiate {
        target: UserId,
        reply: oneshot::Sender<CallResult<CallId>>,
    },
    Accept {
        reply: oneshot::Sender<CallResult<()>>,
    },
    Reject {
        reply: oneshot::Sender<CallResult<()>>,
    },
    End {
        reply: oneshot::Sender<CallResult<()>>,
    },
    ToggleMute {
        reply: oneshot::Sender<CallResult<bool>>,
    },
    Shutdown,
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Command::Initiate { .. } => "initiate",
            Command::Accept { .. } => "accept",
            Command::Reject { .. } => "reject",
            Command::End { .. } => "end",
            Command::ToggleMute { .. } => "toggle_mute",
            Command::Shutdown => "shutdown",
        }
    }
}

/// Latest observable state, published by the machine after every transition
#[derive(Debug, Clone, PartialEq)]
pub struct CallSnapshot {
    pub state: CallState,
    pub session: Option<CallSession>,
}

impl Default for CallSnapshot {
    fn default() -> Self {
        Self {
            state: CallState::Idle,
            session: None,
        }
    }
}

/// Handle to one participant's call state machine
///
/// Every action is queued to the machine's task and applied in order; the
/// returned future resolves once the machine has acted on it. Handles are
/// cheap to clone and can be used from any task.
#[derive(Clone)]
pub struct CallHandle {
    user_id: UserId,
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<CallEvent>,
    snapshot: watch::Receiver<CallSnapshot>,
    media: Arc<MediaSessionManager>,
}

impl CallHandle {
    pub(crate) fn new(
        user_id: UserId,
        commands: mpsc::Sender<Command>,
        events: broadcast::Sender<CallEvent>,
        snapshot: watch::Receiver<CallSnapshot>,
        media: Arc<MediaSessionManager>,
    ) -> Self {
        Self {
            user_id,
            commands,
            events,
            snapshot,
            media,
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<CallResult<T>>) -> Command) -> CallResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| CallError::MachineStopped)?;
        response.await.map_err(|_| CallError::MachineStopped)?
    }

    /// Call another user.
    ///
    /// Resolves once local audio is acquired and the invite is sent; the
    /// answer arrives later as [`CallEvent::CallActive`] or
    /// [`CallEvent::CallEnded`]. Fails with [`CallError::Busy`] when a call
    /// is already in progress and [`CallError::LocalMedia`] when the
    /// microphone cannot be opened, in which case nothing is sent.
    pub async fn initiate(&self, target: impl Into<UserId>) -> CallResult<CallId> {
        let target = target.into();
        self.request(|reply| Command::Initiate { target, reply }).await
    }

    /// Answer the incoming call
    pub async fn accept(&self) -> CallResult<()> {
        self.request(|reply| Command::Accept { reply }).await
    }

    /// Decline the incoming call
    pub async fn reject(&self) -> CallResult<()> {
        self.request(|reply| Command::Reject { reply }).await
    }

    /// Hang up. A no-op when idle.
    pub async fn end(&self) -> CallResult<()> {
        self.request(|reply| Command::End { reply }).await
    }

    /// Flip the microphone mute; returns the new mute state
    pub async fn toggle_mute(&self) -> CallResult<bool> {
        self.request(|reply| Command::ToggleMute { reply }).await
    }

    /// Current call state.
    ///
    /// While `initiate` is still waiting for local audio this reads `Idle`,
    /// since no session exists yet, but the machine already counts as busy:
    /// incoming invites are refused and a second `initiate` fails with
    /// [`CallError::Busy`]. Await `initiate` (or watch for `Calling`) before
    /// treating `Idle` as free.
    pub fn state(&self) -> CallState {
        self.snapshot.borrow().state
    }

    /// Current call session, if any
    pub fn session(&self) -> Option<CallSession> {
        self.snapshot.borrow().session.clone()
    }

    /// Time spent Active in the current call
    pub fn elapsed(&self) -> Option<Duration> {
        self.snapshot.borrow().session.as_ref().and_then(|s| s.elapsed())
    }

    pub fn is_muted(&self) -> bool {
        self.media.is_muted()
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn media(&self) -> &Arc<MediaSessionManager> {
        &self.media
    }

    /// Subscribe to call events
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.events.subscribe()
    }

    /// Call events as a stream
    pub fn events(&self) -> BroadcastStream<CallEvent> {
        BroadcastStream::new(self.events.subscribe())
    }

    /// Wait until the machine reports `state`
    pub async fn wait_for_state(&self, state: CallState, timeout: Duration) -> CallResult<()> {
        let mut snapshot = self.snapshot.clone();
        let reached = tokio::time::timeout(timeout, async {
            loop {
                if snapshot.borrow_and_update().state == state {
                    return true;
                }
                if snapshot.changed().await.is_err() {
                    return false;
                }
            }
        })
        .await;

        match reached {
            Ok(true) => Ok(()),
            Ok(false) => Err(CallError::MachineStopped),
            Err(_) => Err(CallError::Timeout { timeout }),
        }
    }

    /// Stop the machine, hanging up any call in progress, and wait for it to exit
    pub async fn shutdown(&self) {
        if self.commands.send(Command::Shutdown).await.is_ok() {
            self.commands.closed().await;
        }
    }

    /// Whether the machine task is still running
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

impl std::fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHandle")
            .field("user_id", &self.user_id)
            .field("state", &self.state())
            .finish()
    }
}
