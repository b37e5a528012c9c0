//! JSON wire format for signaling envelopes
//!
//! Envelopes travel as flat JSON objects:
//!
//! ```json
//! {"callId":"…","fromUserId":"alice","toUserId":"bob","type":"invite","offerPayload":"…","displayName":"Alice"}
//! ```

use crate::envelope::SignalingEnvelope;
use crate::error::SignalingResult;

/// Encode an envelope as a JSON string
pub fn encode(envelope: &SignalingEnvelope) -> SignalingResult<String> {
    Ok(serde_json::to_string(envelope)?)
}

/// Encode an envelope as JSON bytes
pub fn encode_to_vec(envelope: &SignalingEnvelope) -> SignalingResult<Vec<u8>> {
    Ok(serde_json::to_vec(envelope)?)
}

/// Decode an envelope from a JSON string
pub fn decode(text: &str) -> SignalingResult<SignalingEnvelope> {
    Ok(serde_json::from_str(text)?)
}

/// Decode an envelope from JSON bytes
pub fn decode_slice(bytes: &[u8]) -> SignalingResult<SignalingEnvelope> {
    Ok(serde_json::from_slice(bytes)?)
}
