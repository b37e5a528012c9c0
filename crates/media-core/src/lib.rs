//! # Media Core
//!
//! Owns the local side of a call's media: the captured audio track and its
//! attachment to the media transport. Negotiation payloads pass through
//! here untouched; what they contain is the transport library's business.
//!
//! ```text
//! AudioSource ──acquire──► AudioHandle ──attach──► MediaTransport
//!                              │                        │
//!                         set_muted                  playback
//!                              └──────── release ───────┘
//! ```
//!
//! Every successful [`MediaSessionManager::acquire_local_audio`] must be
//! paired with a [`MediaSessionManager::release`], whichever way the call
//! ends; `release` is idempotent so callers can invoke it unconditionally.

pub mod device;
pub mod error;
pub mod manager;
pub mod transport;
pub mod types;

#[cfg(feature = "device-mock")]
pub mod mock;

pub use device::{AudioSource, AudioTrack};
pub use error::{MediaError, MediaResult};
pub use manager::MediaSessionManager;
pub use transport::MediaTransport;
pub use types::{AudioFormat, AudioHandle, MediaStats, NegotiationPayload};

/// Default sample rate for voice capture (Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default frame duration (ms)
pub const DEFAULT_FRAME_SIZE_MS: u32 = 20;
