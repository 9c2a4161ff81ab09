use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{BindingId, ContextId, ElementId, MediaKind};
use crate::processing::ring_buffer::RingBuffer;
use crate::traits::media_element::MediaElement;

/// A media element found during discovery.
///
/// Identity (equality and hashing) is the element id. Immutable once taken.
#[derive(Clone)]
pub struct MediaElementHandle {
    id: ElementId,
    kind: MediaKind,
    element: Arc<dyn MediaElement>,
}

impl MediaElementHandle {
    pub fn new(element: Arc<dyn MediaElement>) -> Self {
        Self {
            id: element.id(),
            kind: element.kind(),
            element,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn label(&self) -> String {
        self.element.label()
    }

    pub(crate) fn element(&self) -> &Arc<dyn MediaElement> {
        &self.element
    }
}

impl PartialEq for MediaElementHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MediaElementHandle {}

impl Hash for MediaElementHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for MediaElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaElementHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

pub(crate) struct SourceNode {
    pub(crate) id: BindingId,
    pub(crate) owner: ContextId,
    pub(crate) element: MediaElementHandle,
    pub(crate) buffer: Arc<Mutex<RingBuffer>>,
    pub(crate) released: AtomicBool,
}

/// The graph source node of one captured element.
///
/// Cheap to clone; clones are the same binding.
#[derive(Clone)]
pub struct SourceBinding {
    pub(crate) node: Arc<SourceNode>,
}

impl SourceBinding {
    pub(crate) fn new(id: BindingId, owner: ContextId, element: MediaElementHandle, buffer: Arc<Mutex<RingBuffer>>) -> Self {
        Self {
            node: Arc::new(SourceNode {
                id,
                owner,
                element,
                buffer,
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> BindingId {
        self.node.id
    }

    pub fn owner(&self) -> ContextId {
        self.node.owner
    }

    pub fn element(&self) -> &MediaElementHandle {
        &self.node.element
    }

    pub fn is_released(&self) -> bool {
        self.node.released.load(Ordering::Acquire)
    }

    /// Audio buffered from the element and not yet rendered.
    pub fn pending_frames(&self) -> usize {
        self.node.buffer.lock().frames_available()
    }

    pub(crate) fn mark_released(&self) {
        self.node.released.store(true, Ordering::Release);
        self.node.buffer.lock().clear();
    }
}

impl PartialEq for SourceBinding {
    fn eq(&self, other: &Self) -> bool {
        self.node.owner == other.node.owner && self.node.id == other.node.id
    }
}

impl Eq for SourceBinding {}

impl fmt::Debug for SourceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceBinding")
            .field("id", &self.node.id)
            .field("element", &self.node.element.id)
            .field("released", &self.is_released())
            .finish()
    }
}
