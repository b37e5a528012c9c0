//! Media session manager
//!
//! Tracks the one local capture a participant may hold and its attachment to
//! the media transport. State sits behind a `parking_lot` mutex that is never
//! held across an await: values are taken out first, then the transport is
//! driven.

use crate::device::AudioSource;
use crate::error::{MediaError, MediaResult};
use crate::transport::MediaTransport;
use crate::types::{AudioHandle, MediaStats, NegotiationPayload};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct MediaState {
    local: Option<AudioHandle>,
    attached_to: Option<String>,
    muted: bool,
    stats: MediaStats,
}

/// Manages the local audio capture and its wiring to the media transport
pub struct MediaSessionManager {
    source: Arc<dyn AudioSource>,
    transport: Arc<dyn MediaTransport>,
    state: Mutex<MediaState>,
}

impl MediaSessionManager {
    pub fn new(source: Arc<dyn AudioSource>, transport: Arc<dyn MediaTransport>) -> Self {
        Self {
            source,
            transport,
            state: Mutex::new(MediaState::default()),
        }
    }

    /// Acquire the local audio capture.
    ///
    /// If a capture is already held it is returned as is; the device is not
    /// opened twice.
    pub async fn acquire_local_audio(&self) -> MediaResult<AudioHandle> {
        if let Some(existing) = self.state.lock().local.clone() {
            tracing::debug!("Local audio already held ({})", existing.id);
            return Ok(existing);
        }

        match self.source.open_capture().await {
            Ok(handle) => {
                let mut state = self.state.lock();
                if let Some(existing) = state.local.clone() {
                    // Lost a race with a concurrent acquisition; keep the first.
                    handle.track.stop();
                    return Ok(existing);
                }
                state.local = Some(handle.clone());
                state.stats.acquisitions += 1;
                tracing::info!("Acquired local audio from {} ({})", handle.device_name, handle.id);
                Ok(handle)
            }
            Err(e) => {
                self.state.lock().stats.acquisition_failures += 1;
                tracing::warn!("Local audio acquisition failed: {}", e);
                Err(e)
            }
        }
    }

    /// Wire local and remote audio for a negotiated session
    pub async fn attach(&self, session: &str) -> MediaResult<()> {
        let (local, muted) = {
            let state = self.state.lock();
            (state.local.clone().ok_or(MediaError::NotAcquired)?, state.muted)
        };

        local.track.set_enabled(!muted);
        self.transport.start(session, &local).await?;

        let mut state = self.state.lock();
        state.attached_to = Some(session.to_string());
        state.stats.attachments += 1;
        tracing::info!("Attached local audio {} to session {}", local.id, session);
        Ok(())
    }

    /// Enable or disable the local track without renegotiating
    pub fn set_muted(&self, muted: bool) -> MediaResult<()> {
        let mut state = self.state.lock();
        let local = state.local.as_ref().ok_or(MediaError::NotAcquired)?;
        local.track.set_enabled(!muted);
        state.muted = muted;
        tracing::debug!("Local audio {}", if muted { "muted" } else { "unmuted" });
        Ok(())
    }

    /// Whether the local track is muted
    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    /// Whether a local capture is currently held
    pub fn has_local_audio(&self) -> bool {
        self.state.lock().local.is_some()
    }

    /// Session the media is attached to, if any
    pub fn attached_session(&self) -> Option<String> {
        self.state.lock().attached_to.clone()
    }

    /// Stop all tracks and detach from playback.
    ///
    /// Safe to call on every exit path; returns whether anything was held.
    /// A transport failure while detaching is logged, the capture is still
    /// stopped.
    pub async fn release(&self) -> bool {
        let (local, attached_to) = {
            let mut state = self.state.lock();
            state.stats.releases += 1;
            state.muted = false;
            (state.local.take(), state.attached_to.take())
        };

        if let Some(session) = &attached_to {
            if let Err(e) = self.transport.stop().await {
                tracing::warn!("Failed to detach media for session {}: {}", session, e);
            }
        }

        match local {
            Some(handle) => {
                handle.track.stop();
                tracing::info!("Released local audio {}", handle.id);
                true
            }
            None => attached_to.is_some(),
        }
    }

    /// Create the local offer
    pub async fn create_offer(&self) -> MediaResult<NegotiationPayload> {
        self.transport.create_offer().await
    }

    /// Answer a remote offer
    pub async fn create_answer(&self, offer: &NegotiationPayload) -> MediaResult<NegotiationPayload> {
        self.transport.create_answer(offer).await
    }

    /// Apply the remote answer
    pub async fn apply_answer(&self, answer: &NegotiationPayload) -> MediaResult<()> {
        self.transport.apply_answer(answer).await
    }

    /// Lifetime counters
    pub fn stats(&self) -> MediaStats {
        self.state.lock().stats
    }
}
