use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::stream::CapturedStream;
use crate::models::audio_models::StreamId;
use crate::models::events::CaptureStarted;

/// Listener notified once per successful publish.
pub type PublishListener = Arc<dyn Fn(&CaptureStarted) + Send + Sync>;

/// Access point where the current captured stream is published for
/// external consumers (transport, recording, analysis).
///
/// A single shared slot: the last publish wins. One writer per session is
/// expected; concurrent sessions sharing a publisher are unsupported and
/// simply overwrite each other.
pub struct StreamPublisher {
    slot: Mutex<Option<CapturedStream>>,
    listeners: Mutex<Vec<PublishListener>>,
    mirror_global: bool,
}

impl StreamPublisher {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            mirror_global: false,
        }
    }

    /// A publisher that also mirrors every publish into [`compat`].
    pub fn mirrored() -> Self {
        Self {
            mirror_global: true,
            ..Self::new()
        }
    }

    pub fn on_publish(&self, listener: PublishListener) {
        self.listeners.lock().push(listener);
    }

    /// Store `stream`, replacing whatever was published before, and notify
    /// listeners. `source_count` is the number of elements feeding it.
    pub fn publish(&self, stream: CapturedStream, source_count: usize) -> CaptureStarted {
        let event = CaptureStarted::new(
            stream.id(),
            stream.context_id(),
            source_count,
            stream.sample_rate(),
            stream.channels(),
        );

        if self.mirror_global {
            compat::mirror(&stream);
        }
        *self.slot.lock() = Some(stream);

        log::info!(
            "Audio stream captured: {} from context {} ({} source(s))",
            event.stream_id,
            event.context_id,
            event.source_count
        );
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener(&event);
        }
        event
    }

    /// The most recently published stream, or `None` once its session ended.
    pub fn current_stream(&self) -> Option<CapturedStream> {
        self.slot.lock().clone().filter(|stream| stream.is_live())
    }

    /// Whether `stream` is what this publisher currently exposes.
    pub fn is_current(&self, stream: &CapturedStream) -> bool {
        self.slot.lock().as_ref() == Some(stream)
    }

    /// Clear the slot if it still holds `stream_id`. A newer publish from
    /// someone else is left alone. Returns whether the slot was cleared.
    pub fn retract(&self, stream_id: StreamId) -> bool {
        if self.mirror_global {
            compat::retract(stream_id);
        }
        let mut slot = self.slot.lock();
        if slot.as_ref().map(|s| s.id()) == Some(stream_id) {
            *slot = None;
            return true;
        }
        false
    }
}

impl Default for StreamPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide published-stream slot for legacy callers that cannot be
/// handed a [`StreamPublisher`]. New code should hold the session's
/// publisher instead.
pub mod compat {
    use parking_lot::Mutex;

    use crate::graph::stream::CapturedStream;
    use crate::models::audio_models::StreamId;

    static CURRENT: Mutex<Option<CapturedStream>> = parking_lot::const_mutex(None);

    /// The most recent stream published by any mirrored publisher.
    pub fn current_stream() -> Option<CapturedStream> {
        CURRENT.lock().clone().filter(|stream| stream.is_live())
    }

    pub(crate) fn mirror(stream: &CapturedStream) {
        *CURRENT.lock() = Some(stream.clone());
    }

    pub(crate) fn retract(stream_id: StreamId) {
        let mut current = CURRENT.lock();
        if current.as_ref().map(|s| s.id()) == Some(stream_id) {
            *current = None;
        }
    }
}
