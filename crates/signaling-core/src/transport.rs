//! Seams between clients, the relay and the network
//!
//! Two directions, two traits:
//!
//! - [`TransportHandle`] is what the registry stores per user: the relay
//!   calls `deliver` to push an envelope down to that client.
//! - [`SignalingLink`] is what a client holds to push envelopes up to the
//!   relay.
//!
//! [`SignalingConnection`] bundles a client's link with its inbound queue and
//! is handed, as an owned value, to the call state machine.

use crate::envelope::SignalingEnvelope;
use crate::error::{SignalingError, SignalingResult};
use crate::presence::ClientConnection;
use crate::relay::SignalingRelay;
use crate::types::{ConnectionId, UserId};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Downstream handle to one connected client
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Deliver an envelope to the client.
    ///
    /// Must not wait for the client to make room; a congested client fails
    /// with [`SignalingError::QueueFull`].
    async fn deliver(&self, envelope: SignalingEnvelope) -> SignalingResult<()>;

    /// Whether the client side is gone
    fn is_closed(&self) -> bool;
}

/// Upstream link from a client to the relay
#[async_trait]
pub trait SignalingLink: Send + Sync {
    /// Send an envelope towards its recipient
    async fn send(&self, envelope: SignalingEnvelope) -> SignalingResult<()>;
}

/// In-process transport backed by a tokio mpsc queue
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    user_id: UserId,
    tx: mpsc::Sender<SignalingEnvelope>,
}

impl ChannelTransport {
    /// Create a transport and the receiver the client reads from
    pub fn pair(user_id: impl Into<UserId>, capacity: usize) -> (Self, mpsc::Receiver<SignalingEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                user_id: user_id.into(),
                tx,
            },
            rx,
        )
    }
}

#[async_trait]
impl TransportHandle for ChannelTransport {
    async fn deliver(&self, envelope: SignalingEnvelope) -> SignalingResult<()> {
        // Never wait on a slow reader: the relay runs inside the sender's task
        self.tx.try_send(envelope).map_err(|e| match e {
            TrySendError::Full(_) => SignalingError::queue_full(&self.user_id),
            TrySendError::Closed(_) => SignalingError::transport_closed(&self.user_id),
        })
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Link that hands envelopes straight to an in-process relay
#[derive(Clone)]
pub struct RelayLink {
    relay: Arc<SignalingRelay>,
}

impl RelayLink {
    pub fn new(relay: Arc<SignalingRelay>) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl SignalingLink for RelayLink {
    async fn send(&self, envelope: SignalingEnvelope) -> SignalingResult<()> {
        self.relay.route(envelope).await.map(|_| ())
    }
}

/// A client's owned signaling connection: outbound link plus inbound queue
pub struct SignalingConnection {
    user_id: UserId,
    connection_id: Option<ConnectionId>,
    link: Arc<dyn SignalingLink>,
    inbound: mpsc::Receiver<SignalingEnvelope>,
}

impl SignalingConnection {
    /// Assemble a connection from an arbitrary link and inbound queue
    pub fn new(
        user_id: impl Into<UserId>,
        link: Arc<dyn SignalingLink>,
        inbound: mpsc::Receiver<SignalingEnvelope>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            connection_id: None,
            link,
            inbound,
        }
    }

    /// Connect a user to an in-process relay.
    ///
    /// Registers a [`ChannelTransport`] in the relay's presence registry
    /// (replacing any previous connection of the user).
    pub fn attach(relay: &Arc<SignalingRelay>, user_id: impl Into<UserId>, capacity: usize) -> Self {
        let user_id = user_id.into();
        let (transport, inbound) = ChannelTransport::pair(user_id.clone(), capacity);
        let ClientConnection { connection_id, .. } = relay.registry().register(user_id.clone(), Arc::new(transport));

        Self {
            user_id,
            connection_id: Some(connection_id),
            link: Arc::new(RelayLink::new(relay.clone())),
            inbound,
        }
    }

    /// Owner of the connection
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Registry connection id, when attached to a relay
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_id
    }

    /// Outbound link
    pub fn link(&self) -> &Arc<dyn SignalingLink> {
        &self.link
    }

    /// Receive the next inbound envelope; `None` once the transport is gone
    pub async fn recv(&mut self) -> Option<SignalingEnvelope> {
        self.inbound.recv().await
    }

    /// Split into owner, outbound link and inbound queue
    pub fn into_parts(self) -> (UserId, Arc<dyn SignalingLink>, mpsc::Receiver<SignalingEnvelope>) {
        (self.user_id, self.link, self.inbound)
    }
}
