//! Media data types

use crate::device::AudioTrack;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque offer/answer blob produced by the media transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationPayload(String);

impl NegotiationPayload {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Audio format specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Frame size in milliseconds
    pub frame_size_ms: u32,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16, frame_size_ms: u32) -> Self {
        Self {
            sample_rate,
            channels,
            frame_size_ms,
        }
    }

    /// Mono voice at the default rate and frame size
    pub fn default_voice() -> Self {
        Self::new(crate::DEFAULT_SAMPLE_RATE, 1, crate::DEFAULT_FRAME_SIZE_MS)
    }

    /// Samples per channel in one frame
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate as usize * self.frame_size_ms as usize) / 1000
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::default_voice()
    }
}

/// A captured local audio source
#[derive(Clone)]
pub struct AudioHandle {
    /// Unique id of this capture
    pub id: Uuid,
    /// Name of the device the track comes from
    pub device_name: String,
    /// Capture format
    pub format: AudioFormat,
    /// The live track
    pub track: Arc<dyn AudioTrack>,
}

impl AudioHandle {
    pub fn new(device_name: impl Into<String>, format: AudioFormat, track: Arc<dyn AudioTrack>) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_name: device_name.into(),
            format,
            track,
        }
    }
}

impl fmt::Debug for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioHandle")
            .field("id", &self.id)
            .field("device_name", &self.device_name)
            .field("format", &self.format)
            .field("stopped", &self.track.is_stopped())
            .finish()
    }
}

/// Lifetime counters of a media session manager
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaStats {
    /// Successful local audio acquisitions
    pub acquisitions: u64,
    /// Failed acquisition attempts
    pub acquisition_failures: u64,
    /// Times local audio was attached to the transport
    pub attachments: u64,
    /// Calls to `release`, whether or not anything was held
    pub releases: u64,
}
