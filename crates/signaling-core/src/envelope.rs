//! Typed signaling envelopes
//!
//! An envelope is addressed (`from`/`to`), tagged with the call it belongs
//! to, and carries exactly one [`SignalMessage`]. Negotiation payloads are
//! opaque: they are produced and consumed by the media transport library and
//! only ever copied here.

use crate::types::{CallId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque negotiation blob (offer or answer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaquePayload(String);

impl OpaquePayload {
    /// Wrap a payload produced by the media layer
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    /// Borrow the raw payload
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the raw payload
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Why a call was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// The callee declined
    UserDeclined,
    /// The callee is already in (or setting up) another call
    Busy,
    /// The callee could not open its audio device
    LocalMediaError,
    /// The relay has no live connection for the target
    PeerUnreachable,
}

impl RejectReason {
    /// Wire name of the reason
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::UserDeclined => "user-declined",
            RejectReason::Busy => "busy",
            RejectReason::LocalMediaError => "local-media-error",
            RejectReason::PeerUnreachable => "peer-unreachable",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signaling message body, tagged by `type` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalMessage {
    /// Caller → callee: start a call, carrying the caller's offer
    #[serde(rename_all = "camelCase")]
    Invite {
        offer_payload: OpaquePayload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    },

    /// Caller → callee: replacement offer for a call that is still ringing
    #[serde(rename_all = "camelCase")]
    NegotiationOffer { offer_payload: OpaquePayload },

    /// Callee → caller: the callee's answer, completing negotiation
    #[serde(rename_all = "camelCase")]
    NegotiationAnswer { answer_payload: OpaquePayload },

    /// Either direction: the call is refused
    Reject { reason: RejectReason },

    /// Either direction: the call is over
    End,
}

/// Discriminant of a [`SignalMessage`], handy for logs and counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Invite,
    NegotiationOffer,
    NegotiationAnswer,
    Reject,
    End,
}

impl SignalKind {
    /// Wire name of the message type
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Invite => "invite",
            SignalKind::NegotiationOffer => "negotiation-offer",
            SignalKind::NegotiationAnswer => "negotiation-answer",
            SignalKind::Reject => "reject",
            SignalKind::End => "end",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SignalMessage {
    /// The message type
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalMessage::Invite { .. } => SignalKind::Invite,
            SignalMessage::NegotiationOffer { .. } => SignalKind::NegotiationOffer,
            SignalMessage::NegotiationAnswer { .. } => SignalKind::NegotiationAnswer,
            SignalMessage::Reject { .. } => SignalKind::Reject,
            SignalMessage::End => SignalKind::End,
        }
    }
}

/// A routed signaling message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalingEnvelope {
    /// Call the message belongs to
    pub call_id: CallId,
    /// Sender
    #[serde(rename = "fromUserId")]
    pub from: UserId,
    /// Recipient
    #[serde(rename = "toUserId")]
    pub to: UserId,
    /// Message body
    #[serde(flatten)]
    pub message: SignalMessage,
}

impl SignalingEnvelope {
    /// Build an envelope from parts
    pub fn new(call_id: CallId, from: UserId, to: UserId, message: SignalMessage) -> Self {
        Self {
            call_id,
            from,
            to,
            message,
        }
    }

    /// `invite` carrying the caller's offer
    pub fn invite(
        call_id: CallId,
        from: UserId,
        to: UserId,
        offer: OpaquePayload,
        display_name: Option<String>,
    ) -> Self {
        Self::new(
            call_id,
            from,
            to,
            SignalMessage::Invite {
                offer_payload: offer,
                display_name,
            },
        )
    }

    /// `negotiation-offer` replacing an earlier offer
    pub fn offer(call_id: CallId, from: UserId, to: UserId, offer: OpaquePayload) -> Self {
        Self::new(call_id, from, to, SignalMessage::NegotiationOffer { offer_payload: offer })
    }

    /// `negotiation-answer` carrying the callee's answer
    pub fn answer(call_id: CallId, from: UserId, to: UserId, answer: OpaquePayload) -> Self {
        Self::new(
            call_id,
            from,
            to,
            SignalMessage::NegotiationAnswer {
                answer_payload: answer,
            },
        )
    }

    /// `reject` with a reason
    pub fn reject(call_id: CallId, from: UserId, to: UserId, reason: RejectReason) -> Self {
        Self::new(call_id, from, to, SignalMessage::Reject { reason })
    }

    /// `end`
    pub fn end(call_id: CallId, from: UserId, to: UserId) -> Self {
        Self::new(call_id, from, to, SignalMessage::End)
    }

    /// A `reject` addressed back to this envelope's sender, for the same call
    pub fn reply_reject(&self, reason: RejectReason) -> Self {
        Self::reject(self.call_id, self.to.clone(), self.from.clone(), reason)
    }

    /// The message type
    pub fn kind(&self) -> SignalKind {
        self.message.kind()
    }
}

impl fmt::Display for SignalingEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {} [{}]", self.kind(), self.from, self.to, self.call_id)
    }
}
