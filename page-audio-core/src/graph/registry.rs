use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::binding::{MediaElementHandle, SourceBinding};
use crate::graph::context::GraphCore;
use crate::models::audio_models::BindingId;
use crate::models::error::CaptureError;
use crate::processing::ring_buffer::RingBuffer;
use crate::traits::media_element::{AudioBufferCallback, Document};

/// Single-pass discovery of the media elements present in a document.
///
/// The element list is snapshotted when discovery starts; elements added
/// later are not seen. Each element appears once, in document order. The
/// iterator cannot be restarted: discover again to re-scan.
#[derive(Debug)]
pub struct Discovery {
    elements: std::vec::IntoIter<MediaElementHandle>,
}

impl Discovery {
    fn snapshot(document: &dyn Document) -> Self {
        let mut seen = HashSet::new();
        let elements: Vec<MediaElementHandle> = document
            .media_elements()
            .into_iter()
            .map(MediaElementHandle::new)
            .filter(|handle| seen.insert(handle.id()))
            .collect();
        Self {
            elements: elements.into_iter(),
        }
    }
}

impl Iterator for Discovery {
    type Item = MediaElementHandle;

    fn next(&mut self) -> Option<Self::Item> {
        self.elements.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.elements.size_hint()
    }
}

impl ExactSizeIterator for Discovery {}

/// Maps each captured media element to its graph source node.
///
/// Holds the at-most-one-binding-per-element invariant for its context:
/// binding an element twice returns the first binding untouched.
pub struct ElementBindingRegistry {
    core: Arc<GraphCore>,
    next_id: AtomicU64,
}

impl ElementBindingRegistry {
    pub(crate) fn new(core: Arc<GraphCore>) -> Self {
        Self {
            core,
            next_id: AtomicU64::new(1),
        }
    }

    /// Enumerate the playable elements currently in `document`.
    pub fn discover(&self, document: &dyn Document) -> Result<Discovery, CaptureError> {
        self.core.ensure_open()?;
        let discovery = Discovery::snapshot(document);
        log::debug!("Discovered {} media element(s)", discovery.len());
        Ok(discovery)
    }

    /// Return the existing binding for `handle`, or capture the element and
    /// register a new source node for it.
    ///
    /// Fails with `AlreadyBoundElsewhere` when another context owns the element.
    pub fn bind_or_reuse(&self, handle: &MediaElementHandle) -> Result<SourceBinding, CaptureError> {
        self.core.ensure_open()?;
        let mut routing = self.core.routing.lock();

        if let Some(existing) = routing
            .by_element
            .get(&handle.id())
            .and_then(|id| routing.sources.get(id))
        {
            return Ok(existing.clone());
        }

        let config = &self.core.config;
        let capacity = config.frames_for_secs(config.source_buffer_secs);
        let buffer = Arc::new(Mutex::new(RingBuffer::new(capacity, config.channels)));

        let callback: AudioBufferCallback = {
            let buffer = Arc::clone(&buffer);
            let mixer = self.core.mixer.clone();
            let resampler = Mutex::new(mixer.resampler());
            let callbacks = Arc::clone(&self.core.source_callbacks);
            let rejected = Arc::clone(&self.core.rejected_buffers);
            let element = handle.id();
            Arc::new(move |samples: &[f32], sample_rate: f64, channels: u16| {
                callbacks.fetch_add(1, Ordering::Relaxed);
                match mixer.conform(&mut resampler.lock(), samples, sample_rate, channels) {
                    Ok(conformed) => buffer.lock().write(&conformed),
                    Err(e) => {
                        if rejected.fetch_add(1, Ordering::Relaxed) == 0 {
                            log::warn!("Dropping audio from {}: {}", element, e);
                        }
                    }
                }
            })
        };

        if let Err(e) = handle.element().capture(self.core.id, callback) {
            log::warn!("Cannot capture {} ({}): {}", handle.label(), handle.id(), e);
            return Err(e);
        }

        let id = BindingId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let binding = SourceBinding::new(id, self.core.id, handle.clone(), buffer);
        routing.by_element.insert(handle.id(), id);
        routing.sources.insert(id, binding.clone());

        log::debug!("Bound {} ({}) as source {:?}", handle.label(), handle.id(), id);
        Ok(binding)
    }

    /// The binding for `handle`, if one exists.
    pub fn binding_for(&self, handle: &MediaElementHandle) -> Option<SourceBinding> {
        let routing = self.core.routing.lock();
        routing
            .by_element
            .get(&handle.id())
            .and_then(|id| routing.sources.get(id))
            .cloned()
    }

    /// Disconnect and remove the binding for `handle` and give the element
    /// back. No-op for an unbound handle.
    pub fn release(&self, handle: &MediaElementHandle) {
        let removed = {
            let mut routing = self.core.routing.lock();
            let id = routing.by_element.get(&handle.id()).copied();
            id.and_then(|id| routing.remove(id))
        };

        if let Some(binding) = removed {
            binding.mark_released();
            handle.element().release(self.core.id);
            log::debug!("Released {} ({})", handle.label(), handle.id());
        }
    }

    /// All live bindings, in creation order.
    pub fn bindings(&self) -> Vec<SourceBinding> {
        self.core.routing.lock().sources.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.core.routing.lock().sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
