//! The call state machine task
//!
//! All state lives in one task. Local commands, relayed envelopes, media
//! acquisition results and the answer deadline are multiplexed through a
//! single `select!`, so transitions are applied one at a time in arrival
//! order.

mod phase;
mod transitions;

use crate::config::CallConfig;
use crate::error::CallResult;
use crate::events::CallEvent;
use crate::handle::{CallHandle, CallSnapshot, Command};
use phase::Phase;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{Instrument, Level};
use voxlink_infra_common::LogContext;
use voxlink_media_core::{AudioHandle, MediaResult, MediaSessionManager};
use voxlink_signaling_core::{CallId, SignalingConnection, SignalingEnvelope, SignalingLink, SignalingRelay, UserId};

/// Outcome of a background capture attempt, tagged with the call it was for
type Acquisition = (CallId, MediaResult<AudioHandle>);

/// One participant's call state machine
pub struct CallStateMachine {
    user_id: UserId,
    link: Arc<dyn SignalingLink>,
    media: Arc<MediaSessionManager>,
    config: CallConfig,
    phase: Phase,
    link_up: bool,
    events: broadcast::Sender<CallEvent>,
    snapshot: watch::Sender<CallSnapshot>,
    acquired_tx: mpsc::Sender<Acquisition>,
}

impl CallStateMachine {
    /// Start a machine on an existing signaling connection
    pub fn spawn(
        connection: SignalingConnection,
        media: Arc<MediaSessionManager>,
        config: CallConfig,
    ) -> CallResult<CallHandle> {
        config.validate()?;

        let (user_id, link, inbound) = connection.into_parts();
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer);
        let (acquired_tx, acquired_rx) = mpsc::channel(4);
        let (events, _) = broadcast::channel(config.event_buffer);
        let (snapshot, snapshot_rx) = watch::channel(CallSnapshot::default());

        let handle = CallHandle::new(
            user_id.clone(),
            command_tx,
            events.clone(),
            snapshot_rx,
            media.clone(),
        );

        let span = LogContext::new("call-machine").for_user(user_id.as_str()).span(Level::INFO);
        let machine = Self {
            user_id,
            link,
            media,
            config,
            phase: Phase::Idle,
            link_up: true,
            events,
            snapshot,
            acquired_tx,
        };
        tokio::spawn(machine.run(command_rx, inbound, acquired_rx).instrument(span));

        Ok(handle)
    }

    /// Register `user_id` with an in-process relay and start its machine
    pub fn attach(
        relay: &Arc<SignalingRelay>,
        user_id: impl Into<UserId>,
        media: Arc<MediaSessionManager>,
        config: CallConfig,
    ) -> CallResult<CallHandle> {
        config.validate()?;
        let connection = SignalingConnection::attach(relay, user_id, config.inbound_buffer);
        Self::spawn(connection, media, config)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut inbound: mpsc::Receiver<SignalingEnvelope>,
        mut acquired: mpsc::Receiver<Acquisition>,
    ) {
        tracing::info!("Call state machine started for {}", self.user_id);

        loop {
            let deadline = self.phase.answer_deadline();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                envelope = inbound.recv(), if self.link_up => match envelope {
                    Some(envelope) => self.handle_envelope(envelope).await,
                    None => self.handle_transport_lost().await,
                },
                Some((call_id, result)) = acquired.recv() => {
                    self.handle_acquired(call_id, result).await;
                }
                _ = answer_deadline(deadline) => self.handle_answer_timeout().await,
            }
        }

        self.hang_up_on_exit().await;
        tracing::info!("Call state machine stopped for {}", self.user_id);
    }

    /// Publish an event; having no subscribers is fine
    fn emit(&self, event: CallEvent) {
        tracing::debug!("Call event: {}", event.event_type());
        let _ = self.events.send(event);
    }

    fn publish_snapshot(&self) {
        self.snapshot.send_replace(CallSnapshot {
            state: self.phase.state(),
            session: self.phase.session().cloned(),
        });
    }
}

async fn answer_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
