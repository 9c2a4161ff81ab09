use std::sync::Arc;

use crate::models::audio_models::{ContextId, ElementId, MediaKind};
use crate::models::error::CaptureError;

/// Callback invoked when a captured element produces audio.
///
/// Parameters:
/// - `samples`: Interleaved f32 samples.
/// - `sample_rate`: The element's native sample rate.
/// - `channels`: Number of interleaved channels.
pub type AudioBufferCallback = Arc<dyn Fn(&[f32], f64, u16) + Send + Sync + 'static>;

/// A playable element (video or audio) present in the document.
///
/// Read-only from the graph's point of view: capturing reroutes the element's
/// decoded audio but never changes playback, volume or ordering.
pub trait MediaElement: Send + Sync {
    /// Stable identity within the document.
    fn id(&self) -> ElementId;

    fn kind(&self) -> MediaKind;

    /// Human-readable description for logs (e.g. `video#intro`).
    fn label(&self) -> String;

    /// Route this element's audio to `callback` on behalf of `owner`.
    ///
    /// An element may be captured by only one context at a time. Capturing
    /// an element already owned by any context must fail with
    /// `CaptureError::AlreadyBoundElsewhere`.
    fn capture(&self, owner: ContextId, callback: AudioBufferCallback) -> Result<(), CaptureError>;

    /// Stop routing audio to `owner`. No-op if `owner` does not hold it.
    fn release(&self, owner: ContextId);
}

/// A queryable document tree.
pub trait Document: Send + Sync {
    /// Playable media elements present right now, in document order.
    fn media_elements(&self) -> Vec<Arc<dyn MediaElement>>;
}
