//! In-memory platform for headless hosts and tests.
//!
//! Elements are fed by calling [`MemoryMediaElement::play`], the output
//! device records everything monitored, and the clock is advanced by hand.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::clock::ManualClock;
use crate::models::audio_models::{ContextId, ElementId, MediaKind};
use crate::models::error::CaptureError;
use crate::traits::audio_platform::{AudioPlatform, OutputDevice, RenderClock};
use crate::traits::media_element::{AudioBufferCallback, Document, MediaElement};

/// A media element whose audio is pushed by the host.
pub struct MemoryMediaElement {
    id: ElementId,
    kind: MediaKind,
    label: String,
    sample_rate: f64,
    channels: u16,
    owner: Mutex<Option<(ContextId, AudioBufferCallback)>>,
}

impl MemoryMediaElement {
    pub fn new(id: ElementId, kind: MediaKind, label: impl Into<String>) -> Self {
        Self::with_format(id, kind, label, 48000.0, 2)
    }

    pub fn with_format(
        id: ElementId,
        kind: MediaKind,
        label: impl Into<String>,
        sample_rate: f64,
        channels: u16,
    ) -> Self {
        Self {
            id,
            kind,
            label: label.into(),
            sample_rate,
            channels,
            owner: Mutex::new(None),
        }
    }

    /// Decode one buffer of interleaved audio in the element's native format.
    ///
    /// Returns false when no context has captured the element; the audio
    /// then goes nowhere.
    pub fn play(&self, samples: &[f32]) -> bool {
        let callback = self.owner.lock().as_ref().map(|(_, cb)| Arc::clone(cb));
        match callback {
            Some(callback) => {
                callback(samples, self.sample_rate, self.channels);
                true
            }
            None => false,
        }
    }

    /// Play `frames` frames of a constant level on every channel.
    pub fn play_constant(&self, level: f32, frames: usize) -> bool {
        self.play(&vec![level; frames * self.channels as usize])
    }

    pub fn owner(&self) -> Option<ContextId> {
        self.owner.lock().as_ref().map(|(owner, _)| *owner)
    }
}

impl MediaElement for MemoryMediaElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn capture(&self, owner: ContextId, callback: AudioBufferCallback) -> Result<(), CaptureError> {
        let mut slot = self.owner.lock();
        if slot.is_some() {
            return Err(CaptureError::AlreadyBoundElsewhere { element: self.id });
        }
        *slot = Some((owner, callback));
        Ok(())
    }

    fn release(&self, owner: ContextId) {
        let mut slot = self.owner.lock();
        if matches!(slot.as_ref(), Some((current, _)) if *current == owner) {
            *slot = None;
        }
    }
}

/// A mutable document holding memory elements in insertion order.
#[derive(Default)]
pub struct MemoryDocument {
    elements: Mutex<Vec<Arc<MemoryMediaElement>>>,
    next_id: AtomicU64,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, kind: MediaKind, label: impl Into<String>) -> Arc<MemoryMediaElement> {
        let id = ElementId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.insert(Arc::new(MemoryMediaElement::new(id, kind, label)))
    }

    pub fn add_video(&self, label: impl Into<String>) -> Arc<MemoryMediaElement> {
        self.add(MediaKind::Video, label)
    }

    pub fn add_audio(&self, label: impl Into<String>) -> Arc<MemoryMediaElement> {
        self.add(MediaKind::Audio, label)
    }

    /// Insert a prebuilt element (e.g. one with a custom format).
    pub fn insert(&self, element: Arc<MemoryMediaElement>) -> Arc<MemoryMediaElement> {
        self.elements.lock().push(Arc::clone(&element));
        element
    }

    pub fn remove(&self, id: ElementId) {
        self.elements.lock().retain(|e| e.id != id);
    }
}

impl Document for MemoryDocument {
    fn media_elements(&self) -> Vec<Arc<dyn MediaElement>> {
        self.elements
            .lock()
            .iter()
            .map(|e| Arc::clone(e) as Arc<dyn MediaElement>)
            .collect()
    }
}

/// Output device that records what it is asked to play.
#[derive(Default)]
pub struct MemoryOutputDevice {
    played: Mutex<Vec<f32>>,
}

impl MemoryOutputDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything played so far.
    pub fn take(&self) -> Vec<f32> {
        std::mem::take(&mut *self.played.lock())
    }
}

impl OutputDevice for MemoryOutputDevice {
    fn write(&self, samples: &[f32], _channels: u16) {
        self.played.lock().extend_from_slice(samples);
    }
}

/// Platform with a host-controlled activation flag and manual clocks.
pub struct MemoryPlatform {
    activated: AtomicBool,
    output: Arc<MemoryOutputDevice>,
    clocks: Mutex<Vec<Arc<ManualClock>>>,
}

impl MemoryPlatform {
    /// A platform still waiting for its first user gesture.
    pub fn new() -> Self {
        Self {
            activated: AtomicBool::new(false),
            output: Arc::new(MemoryOutputDevice::new()),
            clocks: Mutex::new(Vec::new()),
        }
    }

    /// A platform where the user gesture already happened.
    pub fn activated() -> Self {
        let platform = Self::new();
        platform.grant_activation();
        platform
    }

    pub fn grant_activation(&self) {
        self.activated.store(true, Ordering::SeqCst);
    }

    pub fn output(&self) -> Arc<MemoryOutputDevice> {
        Arc::clone(&self.output)
    }

    /// Advance every clock handed out by this platform by `frames` frames.
    pub fn advance(&self, frames: usize) {
        let clocks = self.clocks.lock().clone();
        for clock in clocks {
            clock.advance(frames);
        }
    }
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPlatform for MemoryPlatform {
    fn has_user_activation(&self) -> bool {
        self.activated.load(Ordering::SeqCst)
    }

    fn output_device(&self) -> Arc<dyn OutputDevice> {
        Arc::clone(&self.output) as Arc<dyn OutputDevice>
    }

    fn clock(&self) -> Arc<dyn RenderClock> {
        let clock = Arc::new(ManualClock::new());
        self.clocks.lock().push(Arc::clone(&clock));
        clock
    }
}
