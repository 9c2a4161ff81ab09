//! # page-audio-core
//!
//! Captures the combined audio of every media element on a page as one
//! continuously updating mixed stream.
//!
//! The browser runtime is abstracted behind traits (`Document`,
//! `MediaElement`, `AudioPlatform`); `backend::memory` implements them for
//! headless hosts and tests.
//!
//! ## Architecture
//!
//! ```text
//! page-audio-core (this crate)
//! ├── traits/       ← Document, MediaElement, AudioPlatform, RenderClock, CaptureDelegate
//! ├── models/       ← CaptureError, ContextState/SessionState, CaptureConfiguration, ids, events
//! ├── processing/   ← Mixer (format conversion, summing, metering), Resampler, RingBuffer
//! ├── graph/        ← AudioGraphContext, ElementBindingRegistry, MixBus, MonitorSink, CapturedStream
//! ├── session/      ← CaptureSession (orchestrator), StreamPublisher (+ compat global slot)
//! └── backend/      ← in-memory platform
//! ```
//!
//! Data flow per render quantum:
//! ```text
//! [element] → conform → [source RingBuffer] ─┬→ MixBus ─→ [CapturedStream]
//!                                            └→ MonitorSink ─→ [OutputDevice]
//! ```

pub mod backend;
pub mod graph;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use graph::binding::{MediaElementHandle, SourceBinding};
pub use graph::clock::{ManualClock, ThreadedClock};
pub use graph::context::{Activation, AudioGraphContext};
pub use graph::mix_bus::MixBus;
pub use graph::monitor::MonitorSink;
pub use graph::registry::{Discovery, ElementBindingRegistry};
pub use graph::stream::CapturedStream;
pub use models::audio_models::{BindingId, ContextId, ElementId, GraphDiagnostics, MediaKind, MixLevels, StreamId};
pub use models::config::CaptureConfiguration;
pub use models::error::CaptureError;
pub use models::events::CaptureStarted;
pub use models::state::{ContextState, SessionState};
pub use processing::mixer::Mixer;
pub use processing::resampler::Resampler;
pub use processing::ring_buffer::RingBuffer;
pub use session::capture::{CaptureReport, CaptureSession};
pub use session::publisher::{compat, PublishListener, StreamPublisher};
pub use traits::audio_platform::{AudioPlatform, OutputDevice, RenderCallback, RenderClock};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::media_element::{AudioBufferCallback, Document, MediaElement};
