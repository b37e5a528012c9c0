//! Capture device abstraction
//!
//! Platform capture (cpal, a browser `getUserMedia` bridge, …) lives behind
//! these traits; the rest of the stack never talks to a device directly.

use crate::error::MediaResult;
use crate::types::AudioHandle;
use async_trait::async_trait;

/// Something that can hand out a local audio capture.
///
/// `open_capture` may wait on a permission prompt for as long as the user
/// takes, possibly forever; callers must not block other work on it.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Open the capture device and return a live track
    async fn open_capture(&self) -> MediaResult<AudioHandle>;
}

/// A live local audio track
pub trait AudioTrack: Send + Sync {
    /// Enable or disable sending captured audio (mute without renegotiation)
    fn set_enabled(&self, enabled: bool);

    /// Whether captured audio is currently sent
    fn is_enabled(&self) -> bool;

    /// Stop capturing and free the device. Calling it twice is harmless.
    fn stop(&self);

    /// Whether the track has been stopped
    fn is_stopped(&self) -> bool;
}
