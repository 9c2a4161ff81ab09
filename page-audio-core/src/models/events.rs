use serde::{Deserialize, Serialize};

use super::audio_models::{ContextId, StreamId};

/// Notification emitted once per successful publish.
///
/// Serializable so logging collaborators can forward it as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureStarted {
    pub stream_id: StreamId,
    /// Context whose MixBus produces the stream.
    pub context_id: ContextId,
    /// Media elements feeding the stream at publish time.
    pub source_count: usize,
    pub sample_rate: f64,
    pub channels: u16,
    pub started_at: String,
}

impl CaptureStarted {
    pub fn new(
        stream_id: StreamId,
        context_id: ContextId,
        source_count: usize,
        sample_rate: f64,
        channels: u16,
    ) -> Self {
        Self {
            stream_id,
            context_id,
            source_count,
            sample_rate,
            channels,
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| format!("failed to serialize event: {}", e))
    }
}
