use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{ContextId, StreamId};
use crate::models::error::CaptureError;
use crate::processing::ring_buffer::RingBuffer;

struct StreamInner {
    id: StreamId,
    context_id: ContextId,
    sample_rate: f64,
    channels: u16,
    buffer: Mutex<RingBuffer>,
    live: AtomicBool,
    frames_written: AtomicU64,
}

/// Shared handle to the mixed real-time stream of one context.
///
/// Clones refer to the same underlying stream; equality is stream identity.
/// Consumers only read. The stream stays valid until its context closes.
#[derive(Clone)]
pub struct CapturedStream {
    inner: Arc<StreamInner>,
}

impl CapturedStream {
    pub(crate) fn new(
        context_id: ContextId,
        sample_rate: f64,
        channels: u16,
        capacity_frames: usize,
    ) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                id: StreamId::new(),
                context_id,
                sample_rate,
                channels,
                buffer: Mutex::new(RingBuffer::new(capacity_frames, channels)),
                live: AtomicBool::new(true),
                frames_written: AtomicU64::new(0),
            }),
        }
    }

    pub fn id(&self) -> StreamId {
        self.inner.id
    }

    /// The context that renders into this stream.
    pub fn context_id(&self) -> ContextId {
        self.inner.context_id
    }

    pub fn sample_rate(&self) -> f64 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::Acquire)
    }

    /// Total frames mixed into the stream since creation, read or not.
    pub fn frames_written(&self) -> u64 {
        self.inner.frames_written.load(Ordering::Relaxed)
    }

    pub fn frames_available(&self) -> usize {
        self.inner.buffer.lock().frames_available()
    }

    /// Frames lost because nobody read them in time.
    pub fn dropped_frames(&self) -> u64 {
        self.inner.buffer.lock().dropped_frames()
    }

    /// Take up to `max_frames` frames of interleaved mixed audio.
    ///
    /// Returns fewer frames (possibly none) if the graph has not rendered
    /// them yet. Fails once the owning context has closed.
    pub fn read(&self, max_frames: usize) -> Result<Vec<f32>, CaptureError> {
        if !self.is_live() {
            return Err(CaptureError::StreamInvalidated);
        }
        Ok(self.inner.buffer.lock().read(max_frames))
    }

    pub(crate) fn push(&self, samples: &[f32]) {
        if !self.is_live() {
            return;
        }
        self.inner.buffer.lock().write(samples);
        let frames = samples.len() / self.inner.channels as usize;
        self.inner.frames_written.fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub(crate) fn invalidate(&self) {
        self.inner.live.store(false, Ordering::Release);
        self.inner.buffer.lock().clear();
    }
}

impl PartialEq for CapturedStream {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for CapturedStream {}

impl fmt::Debug for CapturedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedStream")
            .field("id", &self.inner.id)
            .field("sample_rate", &self.inner.sample_rate)
            .field("channels", &self.inner.channels)
            .field("live", &self.is_live())
            .finish()
    }
}
