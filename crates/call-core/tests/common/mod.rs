//! Shared fixtures: an in-process relay and participants with mock media

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use voxlink_call_core::{CallConfig, CallError, CallEvent, CallHandle, CallId, CallStateMachine, EndReason};
use voxlink_media_core::mock::{CaptureBehavior, LoopbackTransport, MockAudioSource};
use voxlink_media_core::{MediaSessionManager, MediaStats};
use voxlink_signaling_core::{PresenceRegistry, SignalingRelay};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn relay() -> Arc<SignalingRelay> {
    Arc::new(SignalingRelay::new(Arc::new(PresenceRegistry::new())))
}

pub struct Peer {
    pub handle: CallHandle,
    pub source: Arc<MockAudioSource>,
    pub transport: Arc<LoopbackTransport>,
    pub events: broadcast::Receiver<CallEvent>,
}

pub fn peer(relay: &Arc<SignalingRelay>, name: &str) -> Peer {
    peer_with(relay, name, CallConfig::new(), CaptureBehavior::Grant)
}

pub fn peer_with(
    relay: &Arc<SignalingRelay>,
    name: &str,
    config: CallConfig,
    behavior: CaptureBehavior,
) -> Peer {
    let source = Arc::new(MockAudioSource::with_behavior(format!("{}-mic", name), behavior));
    let transport = Arc::new(LoopbackTransport::new());
    let media = Arc::new(MediaSessionManager::new(source.clone(), transport.clone()));
    let handle = CallStateMachine::attach(relay, name, media, config).unwrap();
    let events = handle.subscribe();

    Peer {
        handle,
        source,
        transport,
        events,
    }
}

impl Peer {
    /// Next event, failing the test if none arrives in time
    pub async fn next_event(&mut self) -> CallEvent {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for a call event")
            .expect("event channel closed")
    }

    /// Skip events until one matches
    pub async fn wait_for(&mut self, mut matches: impl FnMut(&CallEvent) -> bool) -> CallEvent {
        loop {
            let event = self.next_event().await;
            if matches(&event) {
                return event;
            }
        }
    }

    pub async fn incoming(&mut self) -> CallId {
        match self.wait_for(|e| matches!(e, CallEvent::IncomingCall { .. })).await {
            CallEvent::IncomingCall { call_id, .. } => call_id,
            _ => unreachable!(),
        }
    }

    pub async fn active(&mut self) -> CallId {
        match self.wait_for(|e| matches!(e, CallEvent::CallActive { .. })).await {
            CallEvent::CallActive { call_id, .. } => call_id,
            _ => unreachable!(),
        }
    }

    pub async fn ended(&mut self) -> (EndReason, Option<CallError>) {
        match self.wait_for(|e| matches!(e, CallEvent::CallEnded { .. })).await {
            CallEvent::CallEnded { reason, error, .. } => (reason, error),
            _ => unreachable!(),
        }
    }

    pub fn media_stats(&self) -> MediaStats {
        self.handle.media().stats()
    }

    /// No capture is left open
    pub fn assert_released(&self) {
        assert_eq!(self.source.live_tracks(), 0, "{} leaked a capture", self.handle.user_id());
        assert!(!self.handle.media().has_local_audio());
        assert!(!self.transport.is_running());
    }
}

/// Caller dials, callee accepts; returns once both sides are Active
pub async fn connect(caller: &mut Peer, callee: &mut Peer) -> CallId {
    let call_id = caller.handle.initiate(callee.handle.user_id().clone()).await.unwrap();
    assert_eq!(callee.incoming().await, call_id);
    callee.handle.accept().await.unwrap();
    assert_eq!(caller.active().await, call_id);
    assert_eq!(callee.active().await, call_id);
    call_id
}
