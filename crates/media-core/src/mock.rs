//! In-memory audio source and media transport
//!
//! Used by tests and the demo binary. The source can be scripted to grant,
//! deny or never answer a capture request, and counts what it hands out so
//! leaks show up as `live_tracks() > 0`.

use crate::device::{AudioSource, AudioTrack};
use crate::error::{MediaError, MediaResult};
use crate::transport::MediaTransport;
use crate::types::{AudioFormat, AudioHandle, NegotiationPayload};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How the mock source answers the next capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureBehavior {
    /// Open a track
    Grant,
    /// Open a track after a delay (a slow permission prompt)
    GrantAfter(Duration),
    /// Fail with `PermissionDenied`
    Deny,
    /// Fail with `DeviceUnavailable`
    Unavailable,
    /// Never resolve (a prompt nobody answers)
    Hang,
}

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicUsize,
    stopped: AtomicUsize,
}

/// Track handed out by [`MockAudioSource`]
#[derive(Debug)]
pub struct MockTrack {
    enabled: AtomicBool,
    stopped: AtomicBool,
    counters: Arc<Counters>,
}

impl AudioTrack for MockTrack {
    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.counters.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Scriptable capture device
#[derive(Debug)]
pub struct MockAudioSource {
    name: String,
    behavior: Mutex<CaptureBehavior>,
    requests: AtomicUsize,
    counters: Arc<Counters>,
}

impl MockAudioSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behavior: Mutex::new(CaptureBehavior::Grant),
            requests: AtomicUsize::new(0),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Source with a preset behavior
    pub fn with_behavior(name: impl Into<String>, behavior: CaptureBehavior) -> Self {
        let source = Self::new(name);
        source.set_behavior(behavior);
        source
    }

    /// Change how subsequent requests are answered
    pub fn set_behavior(&self, behavior: CaptureBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Capture requests received, including failed and pending ones
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Tracks successfully opened
    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Tracks stopped
    pub fn stopped(&self) -> usize {
        self.counters.stopped.load(Ordering::SeqCst)
    }

    /// Tracks opened but not yet stopped
    pub fn live_tracks(&self) -> usize {
        self.opened().saturating_sub(self.stopped())
    }

    fn open_track(&self) -> AudioHandle {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let track = MockTrack {
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
            counters: self.counters.clone(),
        };
        AudioHandle::new(self.name.clone(), AudioFormat::default_voice(), Arc::new(track))
    }
}

#[async_trait]
impl AudioSource for MockAudioSource {
    async fn open_capture(&self) -> MediaResult<AudioHandle> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock();
        match behavior {
            CaptureBehavior::Grant => Ok(self.open_track()),
            CaptureBehavior::GrantAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.open_track())
            }
            CaptureBehavior::Deny => Err(MediaError::PermissionDenied),
            CaptureBehavior::Unavailable => Err(MediaError::device_unavailable(format!("{} is busy", self.name))),
            CaptureBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Media transport that fabricates payloads and records what it was asked to do
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    offers: AtomicUsize,
    answers_applied: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    running: AtomicBool,
    last_remote: Mutex<Option<NegotiationPayload>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether audio is currently flowing
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of `start` calls
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of `stop` calls
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Number of offers produced
    pub fn offers(&self) -> usize {
        self.offers.load(Ordering::SeqCst)
    }

    /// Number of remote answers applied
    pub fn answers_applied(&self) -> usize {
        self.answers_applied.load(Ordering::SeqCst)
    }

    /// Last remote payload seen (offer answered or answer applied)
    pub fn last_remote(&self) -> Option<NegotiationPayload> {
        self.last_remote.lock().clone()
    }
}

#[async_trait]
impl MediaTransport for LoopbackTransport {
    async fn create_offer(&self) -> MediaResult<NegotiationPayload> {
        let n = self.offers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(NegotiationPayload::new(format!("loopback-offer-{}", n)))
    }

    async fn create_answer(&self, offer: &NegotiationPayload) -> MediaResult<NegotiationPayload> {
        if offer.as_str().is_empty() {
            return Err(MediaError::negotiation("empty offer"));
        }
        *self.last_remote.lock() = Some(offer.clone());
        Ok(NegotiationPayload::new(format!("loopback-answer-to-{}", offer.as_str())))
    }

    async fn apply_answer(&self, answer: &NegotiationPayload) -> MediaResult<()> {
        self.answers_applied.fetch_add(1, Ordering::SeqCst);
        *self.last_remote.lock() = Some(answer.clone());
        Ok(())
    }

    async fn start(&self, session: &str, local: &AudioHandle) -> MediaResult<()> {
        tracing::debug!("Loopback media started for {} from {}", session, local.device_name);
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> MediaResult<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}
