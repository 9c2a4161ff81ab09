use std::sync::Arc;

use crate::models::error::CaptureError;

/// Render callback registered with a clock. Receives the number of frames
/// to produce for this quantum.
pub type RenderCallback = Arc<dyn Fn(usize) + Send + Sync + 'static>;

/// The real-time clock driving a context's render path.
pub trait RenderClock: Send + Sync {
    /// Begin invoking `render` once per quantum. Replaces any previous callback.
    fn start(&self, render: RenderCallback) -> Result<(), CaptureError>;

    /// Stop invoking the render callback. Safe to call when not started.
    fn stop(&self);
}

/// The live output device (speakers) used for monitoring.
pub trait OutputDevice: Send + Sync {
    /// Play one quantum of interleaved samples.
    fn write(&self, samples: &[f32], channels: u16);
}

/// The audio runtime hosting capture sessions.
pub trait AudioPlatform: Send + Sync {
    /// Whether the user gesture required to start audio has happened.
    fn has_user_activation(&self) -> bool;

    fn output_device(&self) -> Arc<dyn OutputDevice>;

    /// Clock for a new context. Called once per context.
    fn clock(&self) -> Arc<dyn RenderClock>;
}
