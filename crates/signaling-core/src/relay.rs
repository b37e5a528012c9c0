//! Stateless signaling relay
//!
//! The relay forwards envelopes verbatim to the recipient's live connection.
//! It never looks at payloads and keeps no per-call state, so every
//! session-lifetime rule has to be enforced by the endpoints themselves.

use crate::envelope::{RejectReason, SignalMessage, SignalingEnvelope};
use crate::error::{SignalingError, SignalingResult};
use crate::presence::PresenceRegistry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What happened to a routed envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Forwarded to the recipient
    Delivered,
    /// Recipient unreachable; a `reject(peer-unreachable)` went back to the sender
    Bounced,
    /// Recipient unreachable and the envelope was a `reject`, which is never bounced
    Dropped,
}

/// Relay counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub forwarded: u64,
    pub bounced: u64,
    pub dropped: u64,
    /// Deliveries refused because the recipient's queue was full
    pub congested: u64,
}

#[derive(Debug, Default)]
struct RelayCounters {
    forwarded: AtomicU64,
    bounced: AtomicU64,
    dropped: AtomicU64,
    congested: AtomicU64,
}

/// Routes envelopes between connected users
#[derive(Debug)]
pub struct SignalingRelay {
    registry: Arc<PresenceRegistry>,
    counters: RelayCounters,
}

impl SignalingRelay {
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self {
            registry,
            counters: RelayCounters::default(),
        }
    }

    /// Presence registry used for lookups
    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.registry
    }

    /// Route one envelope.
    ///
    /// A recipient whose queue is full is treated as unreachable for this
    /// envelope but keeps its registration.
    ///
    /// Fails only when the recipient is unreachable and the sender cannot be
    /// reached either to be told so.
    pub async fn route(&self, envelope: SignalingEnvelope) -> SignalingResult<RouteOutcome> {
        match self.registry.lookup(envelope.to.as_str()) {
            Ok(target) => match target.transport.deliver(envelope.clone()).await {
                Ok(()) => {
                    self.counters.forwarded.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("Relayed {}", envelope);
                    Ok(RouteOutcome::Delivered)
                }
                Err(e @ SignalingError::QueueFull { .. }) => {
                    self.counters.congested.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Delivery of {} failed ({}), recipient not draining", envelope, e);
                    self.bounce(envelope).await
                }
                Err(e) => {
                    tracing::warn!("Delivery of {} failed ({}), evicting stale connection", envelope, e);
                    self.registry
                        .unregister_connection(target.user_id.as_str(), target.connection_id);
                    self.bounce(envelope).await
                }
            },
            Err(_) => self.bounce(envelope).await,
        }
    }

    /// Tell the sender its recipient cannot be reached
    async fn bounce(&self, envelope: SignalingEnvelope) -> SignalingResult<RouteOutcome> {
        if matches!(envelope.message, SignalMessage::Reject { .. }) {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Dropping {}: recipient unreachable", envelope);
            return Ok(RouteOutcome::Dropped);
        }

        let sender = self.registry.lookup(envelope.from.as_str())?;
        sender
            .transport
            .deliver(envelope.reply_reject(RejectReason::PeerUnreachable))
            .await?;
        self.counters.bounced.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Bounced {}: {} is unreachable", envelope, envelope.to);
        Ok(RouteOutcome::Bounced)
    }

    /// Snapshot of the relay counters
    pub fn stats(&self) -> RelayStats {
        RelayStats {
            forwarded: self.counters.forwarded.load(Ordering::Relaxed),
            bounced: self.counters.bounced.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            congested: self.counters.congested.load(Ordering::Relaxed),
        }
    }
}
