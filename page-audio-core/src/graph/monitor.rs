use std::sync::Arc;

use crate::graph::binding::SourceBinding;
use crate::graph::context::GraphCore;
use crate::models::error::CaptureError;

/// Optional pass-through of bound sources to the live output device.
///
/// Independent of MixBus membership. Sources start unmonitored unless the
/// session is configured with `monitor_by_default`.
pub struct MonitorSink {
    core: Arc<GraphCore>,
}

impl MonitorSink {
    pub(crate) fn new(core: Arc<GraphCore>) -> Self {
        Self { core }
    }

    pub fn enable(&self, binding: &SourceBinding) -> Result<(), CaptureError> {
        self.core.check_binding(binding)?;
        if self.core.routing.lock().monitored.insert(binding.id()) {
            log::debug!("Monitoring source {:?}", binding.id());
        }
        Ok(())
    }

    pub fn disable(&self, binding: &SourceBinding) -> Result<(), CaptureError> {
        self.core.check_owner(binding)?;
        if self.core.routing.lock().monitored.remove(&binding.id()) {
            log::debug!("Stopped monitoring source {:?}", binding.id());
        }
        Ok(())
    }

    pub fn is_enabled(&self, binding: &SourceBinding) -> bool {
        binding.owner() == self.core.id && self.core.routing.lock().monitored.contains(&binding.id())
    }
}
