//! # Call Core
//!
//! One [`CallStateMachine`] per participant drives the whole life of a voice
//! call: invite, accept or reject, negotiation, the active period and
//! teardown. It reacts to two inputs, local actions issued through a
//! [`CallHandle`] and envelopes relayed from the peer, and both are
//! serialized through a single task so no two transitions ever race.
//!
//! ```text
//!            initiate                 answer
//!   Idle ───────────────► Calling ───────────────► Active
//!    │ ▲                     │                        │
//!    │ │        reject/timeout/end                    │ end
//!    │ └──── Ended ◄─────────┴────────────────────────┘
//!    │         ▲
//!    │ invite  │ reject/end
//!    └──────► Incoming ──── accept ────► Active
//! ```
//!
//! A participant is in at most one call. Local audio is only acquired after
//! that check passes (on `initiate`, or on `accept` for the callee), and it
//! is released exactly once whichever way the call ends.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voxlink_call_core::{CallConfig, CallStateMachine};
//! use voxlink_media_core::MediaSessionManager;
//! use voxlink_signaling_core::{PresenceRegistry, SignalingRelay};
//!
//! # async fn example(media: Arc<MediaSessionManager>) -> Result<(), Box<dyn std::error::Error>> {
//! let relay = Arc::new(SignalingRelay::new(Arc::new(PresenceRegistry::new())));
//! let alice = CallStateMachine::attach(&relay, "alice", media, CallConfig::new())?;
//!
//! let call_id = alice.initiate("bob").await?;
//! println!("ringing bob on {}", call_id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod handle;
pub mod machine;
pub mod session;
pub mod types;

pub use config::CallConfig;
pub use error::{CallError, CallResult};
pub use events::CallEvent;
pub use handle::{CallHandle, CallSnapshot};
pub use machine::CallStateMachine;
pub use session::CallSession;
pub use types::{CallDirection, CallState, EndReason};

pub use voxlink_signaling_core::{CallId, RejectReason, UserId};

/// How long a caller waits for an answer before giving up
pub const DEFAULT_ANSWER_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
