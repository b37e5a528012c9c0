//! Scripted call scenarios

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;
use voxlink_call_core::{CallConfig, CallEvent, CallHandle, CallId, CallStateMachine, EndReason};
use voxlink_media_core::mock::{CaptureBehavior, LoopbackTransport, MockAudioSource};
use voxlink_media_core::MediaSessionManager;
use voxlink_signaling_core::{PresenceRegistry, SignalingRelay};

/// How long to wait for an event that should follow promptly
const PROMPT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Bob answers, Alice hangs up
    Answer,
    /// Bob answers, then hangs up himself
    Hangup,
    /// Bob declines
    Decline,
    /// Bob is already talking to Carol
    Busy,
    /// Bob never answers
    Timeout,
    /// Alice calls a user who is not online
    Unreachable,
    /// Bob's microphone permission is denied when he answers
    MicDenied,
    /// Alice and Bob call each other at the same moment
    Glare,
}

impl Scenario {
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Answer => "answer",
            Scenario::Hangup => "hangup",
            Scenario::Decline => "decline",
            Scenario::Busy => "busy",
            Scenario::Timeout => "timeout",
            Scenario::Unreachable => "unreachable",
            Scenario::MicDenied => "mic-denied",
            Scenario::Glare => "glare",
        }
    }
}

/// How one participant's call ended
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub participant: String,
    pub call_id: CallId,
    pub reason: EndReason,
    pub error: Option<String>,
    pub talk_time_ms: Option<u128>,
}

/// A participant with mock media and an event subscription
struct Party {
    handle: CallHandle,
    events: broadcast::Receiver<CallEvent>,
}

impl Party {
    fn join(relay: &Arc<SignalingRelay>, name: &str, config: &CallConfig, behavior: CaptureBehavior) -> Result<Self> {
        let source = Arc::new(MockAudioSource::with_behavior(format!("{}-mic", name), behavior));
        let media = Arc::new(MediaSessionManager::new(source, Arc::new(LoopbackTransport::new())));
        let handle = CallStateMachine::attach(relay, name, media, config.clone())
            .with_context(|| format!("failed to start {}", name))?;
        let events = handle.subscribe();
        Ok(Self { handle, events })
    }

    fn name(&self) -> &str {
        self.handle.user_id().as_str()
    }

    async fn next_event(&mut self, within: Duration) -> Result<CallEvent> {
        let event = tokio::time::timeout(within, self.events.recv())
            .await
            .with_context(|| format!("{} saw nothing for {:?}", self.name(), within))?
            .with_context(|| format!("{} stopped publishing events", self.name()))?;
        Ok(event)
    }

    async fn incoming(&mut self) -> Result<CallId> {
        loop {
            if let CallEvent::IncomingCall {
                call_id,
                from,
                display_name,
            } = self.next_event(PROMPT).await?
            {
                info!(
                    "{} is ringing: {} ({})",
                    self.name(),
                    from,
                    display_name.as_deref().unwrap_or("no name")
                );
                return Ok(call_id);
            }
        }
    }

    async fn active(&mut self) -> Result<CallId> {
        loop {
            match self.next_event(PROMPT).await? {
                CallEvent::CallActive { call_id, peer, .. } => {
                    info!("{} is talking to {}", self.name(), peer);
                    return Ok(call_id);
                }
                CallEvent::CallEnded { reason, .. } => bail!("{}'s call ended before connecting: {}", self.name(), reason),
                _ => {}
            }
        }
    }

    async fn ended(&mut self, within: Duration) -> Result<Outcome> {
        loop {
            if let CallEvent::CallEnded {
                call_id,
                reason,
                error,
                duration,
                ..
            } = self.next_event(within).await?
            {
                return Ok(Outcome {
                    participant: self.name().to_string(),
                    call_id,
                    reason,
                    error: error.map(|e| e.to_string()),
                    talk_time_ms: duration.map(|d| d.as_millis()),
                });
            }
        }
    }
}

/// Play a scenario to completion
pub async fn run(scenario: Scenario, config: CallConfig, talk: Duration) -> Result<Vec<Outcome>> {
    let relay = Arc::new(SignalingRelay::new(Arc::new(PresenceRegistry::new())));
    info!("Playing scenario {}", scenario.name());

    let outcomes = match scenario {
        Scenario::Answer | Scenario::Hangup => {
            let mut alice = Party::join(&relay, "alice", &config, CaptureBehavior::Grant)?;
            let mut bob = Party::join(&relay, "bob", &config, CaptureBehavior::Grant)?;

            alice.handle.initiate("bob").await?;
            bob.incoming().await?;
            bob.handle.accept().await?;
            alice.active().await?;

            tokio::time::sleep(talk).await;
            if scenario == Scenario::Answer {
                alice.handle.end().await?;
            } else {
                bob.handle.end().await?;
            }
            vec![alice.ended(PROMPT).await?, bob.ended(PROMPT).await?]
        }
        Scenario::Decline => {
            let mut alice = Party::join(&relay, "alice", &config, CaptureBehavior::Grant)?;
            let mut bob = Party::join(&relay, "bob", &config, CaptureBehavior::Grant)?;

            alice.handle.initiate("bob").await?;
            bob.incoming().await?;
            bob.handle.reject().await?;
            vec![alice.ended(PROMPT).await?, bob.ended(PROMPT).await?]
        }
        Scenario::Busy => {
            let mut alice = Party::join(&relay, "alice", &config, CaptureBehavior::Grant)?;
            let mut bob = Party::join(&relay, "bob", &config, CaptureBehavior::Grant)?;
            let mut carol = Party::join(&relay, "carol", &config, CaptureBehavior::Grant)?;

            carol.handle.initiate("bob").await?;
            bob.incoming().await?;
            bob.handle.accept().await?;
            carol.active().await?;

            alice.handle.initiate("bob").await?;
            let refused = alice.ended(PROMPT).await?;

            carol.handle.end().await?;
            vec![refused, carol.ended(PROMPT).await?, bob.ended(PROMPT).await?]
        }
        Scenario::Timeout => {
            let mut alice = Party::join(&relay, "alice", &config, CaptureBehavior::Grant)?;
            let mut bob = Party::join(&relay, "bob", &config, CaptureBehavior::Grant)?;

            alice.handle.initiate("bob").await?;
            bob.incoming().await?;
            info!("Bob lets it ring for {:?}", config.answer_timeout);
            let within = config.answer_timeout + PROMPT;
            vec![alice.ended(within).await?, bob.ended(within).await?]
        }
        Scenario::Unreachable => {
            let mut alice = Party::join(&relay, "alice", &config, CaptureBehavior::Grant)?;
            alice.handle.initiate("nobody").await?;
            vec![alice.ended(PROMPT).await?]
        }
        Scenario::MicDenied => {
            let mut alice = Party::join(&relay, "alice", &config, CaptureBehavior::Grant)?;
            let mut bob = Party::join(&relay, "bob", &config, CaptureBehavior::Deny)?;

            alice.handle.initiate("bob").await?;
            bob.incoming().await?;
            if let Err(e) = bob.handle.accept().await {
                info!("Bob could not answer: {}", e);
            }
            vec![alice.ended(PROMPT).await?, bob.ended(PROMPT).await?]
        }
        Scenario::Glare => {
            let prompt = CaptureBehavior::GrantAfter(Duration::from_millis(50));
            let mut alice = Party::join(&relay, "alice", &config, prompt)?;
            let mut bob = Party::join(&relay, "bob", &config, prompt)?;

            let (a, b) = tokio::join!(alice.handle.initiate("bob"), bob.handle.initiate("alice"));
            a?;
            b?;

            let first = alice.ended(PROMPT).await?;
            // Alice may have been rung by Bob after her own call was refused.
            alice.handle.end().await?;
            bob.handle.end().await?;
            vec![first, bob.ended(PROMPT).await?]
        }
    };

    let stats = relay.stats();
    info!(
        "Relay forwarded {}, bounced {}, dropped {}, congested {}",
        stats.forwarded, stats.bounced, stats.dropped, stats.congested
    );
    Ok(outcomes)
}
