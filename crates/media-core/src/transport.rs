//! Media transport abstraction

use crate::error::MediaResult;
use crate::types::{AudioHandle, NegotiationPayload};
use async_trait::async_trait;

/// The peer-to-peer media transport (e.g. a WebRTC peer connection).
///
/// It produces and consumes negotiation payloads and carries audio once both
/// sides have negotiated; session semantics stay with the call layer.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Produce a local offer
    async fn create_offer(&self) -> MediaResult<NegotiationPayload>;

    /// Produce an answer to a remote offer
    async fn create_answer(&self, offer: &NegotiationPayload) -> MediaResult<NegotiationPayload>;

    /// Apply the remote answer to our earlier offer
    async fn apply_answer(&self, answer: &NegotiationPayload) -> MediaResult<()>;

    /// Start sending the local track and playing remote audio for a session
    async fn start(&self, session: &str, local: &AudioHandle) -> MediaResult<()>;

    /// Stop sending and detach from the playback sink
    async fn stop(&self) -> MediaResult<()>;
}
