//! # Signaling Core
//!
//! Routing layer for peer-to-peer voice calls. Clients keep one persistent
//! connection each; this crate tracks who is reachable and moves signaling
//! envelopes between them without ever looking inside a negotiation payload.
//!
//! ```text
//! caller ──► SignalingLink ──► SignalingRelay ──► PresenceRegistry ──► callee transport
//!                                   │
//!                                   └── target absent: reject(peer-unreachable) back to caller
//! ```
//!
//! - [`presence`]: user id → live transport handle
//! - [`relay`]: stateless router with unreachable-peer bounce
//! - [`envelope`]: the typed signaling messages
//! - [`wire`]: JSON encoding of envelopes for real transports
//! - [`transport`]: the seams between clients, relay and the network
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use voxlink_signaling_core::{
//!     CallId, OpaquePayload, PresenceRegistry, SignalingConnection, SignalingEnvelope, SignalingRelay,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let relay = Arc::new(SignalingRelay::new(Arc::new(PresenceRegistry::new())));
//! let alice = SignalingConnection::attach(&relay, "alice", 16);
//! let mut bob = SignalingConnection::attach(&relay, "bob", 16);
//!
//! let invite = SignalingEnvelope::invite(
//!     CallId::new(),
//!     "alice".into(),
//!     "bob".into(),
//!     OpaquePayload::new("offer"),
//!     None,
//! );
//! alice.link().send(invite.clone()).await?;
//! assert_eq!(bob.recv().await, Some(invite));
//! # Ok(())
//! # }
//! ```

pub mod envelope;
pub mod error;
pub mod presence;
pub mod relay;
pub mod transport;
pub mod types;
pub mod wire;

pub use envelope::{OpaquePayload, RejectReason, SignalKind, SignalMessage, SignalingEnvelope};
pub use error::{SignalingError, SignalingResult};
pub use presence::{ClientConnection, ConnectionEvent, PresenceRegistry};
pub use relay::{RelayStats, RouteOutcome, SignalingRelay};
pub use transport::{ChannelTransport, RelayLink, SignalingConnection, SignalingLink, TransportHandle};
pub use types::{CallId, ConnectionId, UserId};

/// Default capacity of a client's inbound envelope queue
pub const DEFAULT_INBOUND_CAPACITY: usize = 64;
