//! Transition handlers for [`CallStateMachine`]

use super::phase::Phase;
use super::CallStateMachine;
use crate::error::{CallError, CallResult};
use crate::events::CallEvent;
use crate::handle::{CallSnapshot, Command};
use crate::session::CallSession;
use crate::types::{CallState, EndReason};
use chrono::Utc;
use std::mem;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use voxlink_media_core::{AudioHandle, MediaResult, NegotiationPayload};
use voxlink_signaling_core::{CallId, OpaquePayload, RejectReason, SignalMessage, SignalingEnvelope, UserId};

impl CallStateMachine {
    pub(super) async fn handle_command(&mut self, command: Command) {
        tracing::debug!("Handling {} while {}", command.name(), self.phase.state());

        match command {
            Command::Initiate { target, reply } => self.initiate(target, reply),
            Command::Accept { reply } => self.accept(reply),
            Command::Reject { reply } => {
                let result = self.reject().await;
                let _ = reply.send(result);
            }
            Command::End { reply } => {
                self.end().await;
                let _ = reply.send(Ok(()));
            }
            Command::ToggleMute { reply } => {
                let _ = reply.send(self.toggle_mute());
            }
            Command::Shutdown => {}
        }
    }

    fn initiate(&mut self, target: UserId, reply: oneshot::Sender<CallResult<CallId>>) {
        if !self.phase.is_idle() {
            let _ = reply.send(Err(CallError::Busy));
            return;
        }
        if target == self.user_id || target.as_str().is_empty() {
            let _ = reply.send(Err(CallError::InvalidTarget { target }));
            return;
        }
        if !self.link_up {
            let _ = reply.send(Err(CallError::transport("signaling connection is closed")));
            return;
        }

        let call_id = CallId::new();
        tracing::info!("Placing call {} to {}", call_id, target);
        let acquisition = self.spawn_acquisition(call_id);
        self.phase = Phase::Preparing {
            call_id,
            target,
            acquisition,
            reply,
        };
    }

    fn accept(&mut self, reply: oneshot::Sender<CallResult<()>>) {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Incoming { session, offer } => {
                tracing::info!("Accepting call {} from {}", session.session_id, session.peer());
                let acquisition = self.spawn_acquisition(session.session_id);
                self.phase = Phase::Accepting {
                    session,
                    offer,
                    acquisition,
                    reply,
                };
            }
            other => {
                let state = other.state();
                self.phase = other;
                let _ = reply.send(Err(CallError::invalid_state("accept", state)));
            }
        }
    }

    async fn reject(&mut self) -> CallResult<()> {
        let envelope = match &self.phase {
            Phase::Incoming { session, .. } | Phase::Accepting { session, .. } => SignalingEnvelope::reject(
                session.session_id,
                self.user_id.clone(),
                session.peer().clone(),
                RejectReason::UserDeclined,
            ),
            other => return Err(CallError::invalid_state("reject", other.state())),
        };

        self.send_best_effort(envelope).await;
        self.finish(EndReason::Rejected(RejectReason::UserDeclined), None).await;
        Ok(())
    }

    async fn end(&mut self) {
        if self.phase.is_idle() {
            return;
        }

        let envelope = self
            .phase
            .session()
            .map(|s| SignalingEnvelope::end(s.session_id, self.user_id.clone(), s.peer().clone()));
        if let Some(envelope) = envelope {
            self.send_best_effort(envelope).await;
        }
        self.finish(EndReason::LocalHangup, None).await;
    }

    fn toggle_mute(&mut self) -> CallResult<bool> {
        let Phase::Active { session } = &self.phase else {
            return Err(CallError::invalid_state("toggle mute", self.phase.state()));
        };
        let call_id = session.session_id;

        let muted = !self.media.is_muted();
        self.media.set_muted(muted)?;
        tracing::info!("Microphone {} on call {}", if muted { "muted" } else { "unmuted" }, call_id);
        self.emit(CallEvent::MuteChanged { call_id, muted });
        Ok(muted)
    }

    fn spawn_acquisition(&self, call_id: CallId) -> JoinHandle<()> {
        let media = self.media.clone();
        let results = self.acquired_tx.clone();
        tokio::spawn(async move {
            let result = media.acquire_local_audio().await;
            let _ = results.send((call_id, result)).await;
        })
    }

    pub(super) async fn handle_acquired(&mut self, call_id: CallId, result: MediaResult<AudioHandle>) {
        let pending = matches!(self.phase, Phase::Preparing { .. } | Phase::Accepting { .. });
        if !pending || self.phase.call_id() != Some(call_id) {
            tracing::debug!("Ignoring audio acquisition for abandoned call {}", call_id);
            return;
        }

        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Preparing { call_id, target, reply, .. } => {
                let result = self.place_call(call_id, target, result).await;
                let _ = reply.send(result);
            }
            Phase::Accepting {
                session, offer, reply, ..
            } => {
                let result = self.answer_call(session, offer, result).await;
                let _ = reply.send(result);
            }
            other => self.phase = other,
        }
    }

    /// Second half of `initiate`, once local audio is settled
    async fn place_call(
        &mut self,
        call_id: CallId,
        target: UserId,
        audio: MediaResult<AudioHandle>,
    ) -> CallResult<CallId> {
        if let Err(e) = audio {
            tracing::warn!("Cannot call {}: {}", target, e);
            return Err(e.into());
        }

        let offer = match self.media.create_offer().await {
            Ok(offer) => offer,
            Err(e) => {
                tracing::warn!("Cannot create offer for {}: {}", target, e);
                self.media.release().await;
                return Err(e.into());
            }
        };

        self.phase = Phase::Calling {
            session: CallSession::outgoing(call_id, self.user_id.clone(), target.clone()),
            deadline: Instant::now() + self.config.answer_timeout,
        };
        self.announce(CallState::Idle);

        let invite = SignalingEnvelope::invite(
            call_id,
            self.user_id.clone(),
            target,
            OpaquePayload::new(offer.into_inner()),
            self.config.display_name.clone(),
        );
        if let Err(e) = self.link.send(invite).await {
            let error = CallError::transport(e.to_string());
            self.finish(EndReason::TransportLost, Some(error.clone())).await;
            return Err(error);
        }

        Ok(call_id)
    }

    /// Second half of `accept`, once local audio is settled
    async fn answer_call(
        &mut self,
        mut session: CallSession,
        offer: OpaquePayload,
        audio: MediaResult<AudioHandle>,
    ) -> CallResult<()> {
        let call_id = session.session_id;
        let peer = session.peer().clone();

        let wired = match audio {
            Ok(_) => self.wire_answer(call_id, &offer).await,
            Err(e) => Err(e),
        };
        let answer = match wired {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("Cannot answer call {}: {}", call_id, e);
                let reject = SignalingEnvelope::reject(
                    call_id,
                    self.user_id.clone(),
                    peer,
                    RejectReason::LocalMediaError,
                );
                self.send_best_effort(reject).await;

                let error = CallError::LocalMedia(e);
                self.phase = Phase::Incoming { session, offer };
                self.finish(EndReason::LocalMediaError, Some(error.clone())).await;
                return Err(error);
            }
        };

        session.activate();
        let active_since = session.active_since.unwrap_or_else(Utc::now);
        self.phase = Phase::Active { session };
        self.announce(CallState::Incoming);
        self.emit(CallEvent::CallActive {
            call_id,
            peer: peer.clone(),
            active_since,
        });

        let answer = SignalingEnvelope::answer(
            call_id,
            self.user_id.clone(),
            peer,
            OpaquePayload::new(answer.into_inner()),
        );
        if let Err(e) = self.link.send(answer).await {
            let error = CallError::transport(e.to_string());
            self.finish(EndReason::TransportLost, Some(error.clone())).await;
            return Err(error);
        }

        Ok(())
    }

    async fn wire_answer(&self, call_id: CallId, offer: &OpaquePayload) -> MediaResult<NegotiationPayload> {
        let answer = self
            .media
            .create_answer(&NegotiationPayload::new(offer.as_str()))
            .await?;
        self.media.attach(&call_id.to_string()).await?;
        Ok(answer)
    }

    pub(super) async fn handle_envelope(&mut self, envelope: SignalingEnvelope) {
        if envelope.to != self.user_id {
            tracing::debug!("Ignoring misaddressed {}", envelope);
            return;
        }
        tracing::debug!("Received {}", envelope);

        let SignalingEnvelope {
            call_id,
            from,
            message,
            ..
        } = envelope;

        match message {
            SignalMessage::Invite {
                offer_payload,
                display_name,
            } => self.on_invite(call_id, from, offer_payload, display_name).await,
            SignalMessage::NegotiationOffer { offer_payload } => self.on_offer(call_id, from, offer_payload),
            SignalMessage::NegotiationAnswer { answer_payload } => {
                self.on_answer(call_id, from, answer_payload).await
            }
            SignalMessage::Reject { reason } => self.on_reject(call_id, from, reason).await,
            SignalMessage::End => self.on_end(call_id, from).await,
        }
    }

    async fn on_invite(
        &mut self,
        call_id: CallId,
        from: UserId,
        offer: OpaquePayload,
        display_name: Option<String>,
    ) {
        if from == self.user_id || self.phase.call_id() == Some(call_id) {
            tracing::debug!("Ignoring invite {} from {}", call_id, from);
            return;
        }

        if !self.phase.is_idle() {
            tracing::info!("Busy, refusing call {} from {}", call_id, from);
            let reject = SignalingEnvelope::reject(call_id, self.user_id.clone(), from.clone(), RejectReason::Busy);
            self.send_best_effort(reject).await;
            self.emit(CallEvent::MissedCall { call_id, from });
            return;
        }

        tracing::info!("Incoming call {} from {}", call_id, from);
        self.phase = Phase::Incoming {
            session: CallSession::incoming(call_id, from.clone(), self.user_id.clone()),
            offer,
        };
        self.announce(CallState::Idle);
        self.emit(CallEvent::IncomingCall {
            call_id,
            from,
            display_name,
        });
    }

    fn on_offer(&mut self, call_id: CallId, from: UserId, payload: OpaquePayload) {
        match &mut self.phase {
            Phase::Incoming { session, offer } | Phase::Accepting { session, offer, .. }
                if session.matches(&call_id, &from) =>
            {
                tracing::debug!("Replacing offer for call {}", call_id);
                *offer = payload;
            }
            _ => tracing::debug!("Ignoring negotiation offer {} from {}", call_id, from),
        }
    }

    async fn on_answer(&mut self, call_id: CallId, from: UserId, answer: OpaquePayload) {
        let calling = matches!(&self.phase, Phase::Calling { session, .. } if session.matches(&call_id, &from));
        if !calling {
            tracing::debug!("Ignoring negotiation answer {} from {}", call_id, from);
            return;
        }

        let wired = match self
            .media
            .apply_answer(&NegotiationPayload::new(answer.into_inner()))
            .await
        {
            Ok(()) => self.media.attach(&call_id.to_string()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = wired {
            tracing::warn!("Cannot complete call {}: {}", call_id, e);
            self.send_best_effort(SignalingEnvelope::end(call_id, self.user_id.clone(), from))
                .await;
            self.finish(EndReason::LocalMediaError, Some(CallError::LocalMedia(e)))
                .await;
            return;
        }

        if let Phase::Calling { mut session, .. } = mem::replace(&mut self.phase, Phase::Idle) {
            session.activate();
            let active_since = session.active_since.unwrap_or_else(Utc::now);
            self.phase = Phase::Active { session };
            self.announce(CallState::Calling);
            self.emit(CallEvent::CallActive {
                call_id,
                peer: from,
                active_since,
            });
        }
    }

    async fn on_reject(&mut self, call_id: CallId, from: UserId, reason: RejectReason) {
        if !self.phase.matches(&call_id, &from) {
            tracing::debug!("Ignoring reject {} from {}", call_id, from);
            return;
        }

        let error = match reason {
            RejectReason::PeerUnreachable => Some(CallError::PeerUnreachable { user_id: from }),
            _ => None,
        };
        self.finish(EndReason::Rejected(reason), error).await;
    }

    async fn on_end(&mut self, call_id: CallId, from: UserId) {
        if !self.phase.matches(&call_id, &from) {
            tracing::debug!("Ignoring end {} from {}", call_id, from);
            return;
        }
        self.finish(EndReason::RemoteHangup, None).await;
    }

    pub(super) async fn handle_transport_lost(&mut self) {
        tracing::warn!("Signaling connection for {} closed", self.user_id);
        self.link_up = false;
        if !self.phase.is_idle() {
            let error = CallError::transport("signaling connection closed");
            self.finish(EndReason::TransportLost, Some(error)).await;
        }
    }

    pub(super) async fn handle_answer_timeout(&mut self) {
        let envelope = match &self.phase {
            Phase::Calling { session, .. } => {
                SignalingEnvelope::end(session.session_id, self.user_id.clone(), session.peer().clone())
            }
            _ => return,
        };

        tracing::info!("No answer within {:?}, giving up", self.config.answer_timeout);
        self.send_best_effort(envelope).await;
        let error = CallError::Timeout {
            timeout: self.config.answer_timeout,
        };
        self.finish(EndReason::Timeout, Some(error)).await;
    }

    pub(super) async fn hang_up_on_exit(&mut self) {
        if !self.phase.is_idle() {
            tracing::info!("Hanging up {} call on shutdown", self.phase.state());
            self.end().await;
        }
    }

    /// The one exit path of every call: Ended, release audio, Idle.
    async fn finish(&mut self, reason: EndReason, error: Option<CallError>) {
        let (mut session, old_state) = match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => return,
            Phase::Preparing {
                call_id,
                target,
                acquisition,
                reply,
            } => {
                tracing::info!("Abandoning call {} to {} before it was placed", call_id, target);
                cancel(acquisition).await;
                self.media.release().await;
                let _ = reply.send(Err(error.unwrap_or(CallError::Cancelled)));
                return;
            }
            Phase::Accepting {
                session,
                acquisition,
                reply,
                ..
            } => {
                cancel(acquisition).await;
                let _ = reply.send(Err(error.clone().unwrap_or(CallError::Cancelled)));
                (session, CallState::Incoming)
            }
            Phase::Calling { session, .. } => (session, CallState::Calling),
            Phase::Incoming { session, .. } => (session, CallState::Incoming),
            Phase::Active { session } => (session, CallState::Active),
        };

        let call_id = session.session_id;
        let peer = session.peer().clone();
        let duration = session.elapsed();
        session.state = CallState::Ended;
        session.last_error = error.as_ref().map(|e| e.to_string());
        tracing::info!("Call {} with {} ended: {}", call_id, peer, reason);

        self.snapshot.send_replace(CallSnapshot {
            state: CallState::Ended,
            session: Some(session),
        });
        self.emit(CallEvent::StateChanged {
            call_id,
            old_state,
            new_state: CallState::Ended,
        });

        self.media.release().await;

        self.publish_snapshot();
        self.emit(CallEvent::StateChanged {
            call_id,
            old_state: CallState::Ended,
            new_state: CallState::Idle,
        });
        self.emit(CallEvent::CallEnded {
            call_id,
            peer,
            reason,
            error,
            duration,
        });
    }

    /// Publish the current phase after a transition out of `old_state`
    fn announce(&self, old_state: CallState) {
        let new_state = self.phase.state();
        if let Some(call_id) = self.phase.call_id() {
            if old_state != new_state {
                self.emit(CallEvent::StateChanged {
                    call_id,
                    old_state,
                    new_state,
                });
            }
        }
        self.publish_snapshot();
    }

    /// Send a message whose loss is tolerable
    async fn send_best_effort(&self, envelope: SignalingEnvelope) {
        let summary = envelope.to_string();
        if let Err(e) = self.link.send(envelope).await {
            tracing::debug!("Could not send {}: {}", summary, e);
        }
    }
}

/// Stop a background capture and wait until it can no longer land
async fn cancel(acquisition: JoinHandle<()>) {
    acquisition.abort();
    let _ = acquisition.await;
}
