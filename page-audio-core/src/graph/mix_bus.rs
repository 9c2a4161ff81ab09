use std::sync::Arc;

use crate::graph::binding::SourceBinding;
use crate::graph::context::GraphCore;
use crate::graph::stream::CapturedStream;
use crate::models::error::CaptureError;

/// Aggregation point summing every connected source into the context's
/// single captured stream.
pub struct MixBus {
    core: Arc<GraphCore>,
}

impl MixBus {
    pub(crate) fn new(core: Arc<GraphCore>) -> Self {
        Self { core }
    }

    /// Add `binding` as an input. Connecting an already connected binding
    /// is a no-op. Returns whether a new edge was added.
    pub fn connect(&self, binding: &SourceBinding) -> Result<bool, CaptureError> {
        self.core.check_binding(binding)?;
        let added = self.core.routing.lock().connected.insert(binding.id());
        if added {
            log::debug!("Connected source {:?} to mix bus", binding.id());
        }
        Ok(added)
    }

    /// Remove `binding` as an input. Returns whether an edge was removed.
    pub fn disconnect(&self, binding: &SourceBinding) -> Result<bool, CaptureError> {
        self.core.check_owner(binding)?;
        let removed = self.core.routing.lock().connected.remove(&binding.id());
        if removed {
            log::debug!("Disconnected source {:?} from mix bus", binding.id());
        }
        Ok(removed)
    }

    pub fn is_connected(&self, binding: &SourceBinding) -> bool {
        binding.owner() == self.core.id && self.core.routing.lock().connected.contains(&binding.id())
    }

    pub fn input_count(&self) -> usize {
        self.core.routing.lock().connected.len()
    }

    /// The context's captured stream. Always the same stream for this
    /// context, silent while nothing is connected.
    pub fn get_stream(&self) -> Result<CapturedStream, CaptureError> {
        self.core.ensure_open()?;
        Ok(self.core.stream.clone())
    }
}
