use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::graph::binding::SourceBinding;
use crate::graph::mix_bus::MixBus;
use crate::graph::monitor::MonitorSink;
use crate::graph::registry::ElementBindingRegistry;
use crate::graph::stream::CapturedStream;
use crate::models::audio_models::{BindingId, ContextId, ElementId, GraphDiagnostics, MixLevels};
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::state::ContextState;
use crate::processing::mixer::Mixer;
use crate::traits::audio_platform::{AudioPlatform, OutputDevice, RenderClock};

/// Edges of the graph. One lock covers all of them so a release can never
/// leave a dangling MixBus or monitor edge behind.
#[derive(Default)]
pub(crate) struct Routing {
    pub(crate) sources: BTreeMap<BindingId, SourceBinding>,
    pub(crate) by_element: HashMap<ElementId, BindingId>,
    pub(crate) connected: BTreeSet<BindingId>,
    pub(crate) monitored: BTreeSet<BindingId>,
}

impl Routing {
    pub(crate) fn remove(&mut self, id: BindingId) -> Option<SourceBinding> {
        let binding = self.sources.remove(&id)?;
        self.by_element.remove(&binding.element().id());
        self.connected.remove(&id);
        self.monitored.remove(&id);
        Some(binding)
    }
}

#[derive(Default)]
struct RenderStats {
    levels: MixLevels,
    render_cycles: u64,
    frames_rendered: u64,
}

/// State shared by the context, its components and the render callback.
pub(crate) struct GraphCore {
    pub(crate) id: ContextId,
    pub(crate) config: CaptureConfiguration,
    pub(crate) mixer: Mixer,
    pub(crate) state: RwLock<ContextState>,
    pub(crate) routing: Mutex<Routing>,
    pub(crate) stream: CapturedStream,
    pub(crate) source_callbacks: Arc<AtomicU64>,
    pub(crate) rejected_buffers: Arc<AtomicU64>,
    output: Arc<dyn OutputDevice>,
    stats: Mutex<RenderStats>,
}

impl GraphCore {
    pub(crate) fn ensure_open(&self) -> Result<(), CaptureError> {
        if self.state.read().is_closed() {
            return Err(CaptureError::ContextClosed);
        }
        Ok(())
    }

    /// Validate that `binding` was created by this open context. Released
    /// bindings pass, so edges can always be torn down.
    pub(crate) fn check_owner(&self, binding: &SourceBinding) -> Result<(), CaptureError> {
        self.ensure_open()?;
        if binding.owner() != self.id {
            return Err(CaptureError::ForeignBinding);
        }
        Ok(())
    }

    /// Validate that `binding` is a live binding of this context.
    pub(crate) fn check_binding(&self, binding: &SourceBinding) -> Result<(), CaptureError> {
        self.check_owner(binding)?;
        if binding.is_released() {
            return Err(CaptureError::BindingReleased);
        }
        Ok(())
    }

    /// Produce one render quantum: drain every bound source once, sum the
    /// connected ones into the captured stream and the monitored ones into
    /// the output device.
    fn render_quantum(&self, frames: usize) {
        if *self.state.read() != ContextState::Running || frames == 0 {
            return;
        }

        let channels = self.mixer.channels;
        let len = frames * channels as usize;
        let mut mix = vec![0.0f32; len];
        let mut monitor_mix = vec![0.0f32; len];
        let mut any_monitored = false;

        {
            let routing = self.routing.lock();
            for (id, binding) in &routing.sources {
                let samples = binding.node.buffer.lock().read_padded(frames);
                if routing.connected.contains(id) {
                    Mixer::accumulate(&mut mix, &samples);
                }
                if routing.monitored.contains(id) {
                    Mixer::accumulate(&mut monitor_mix, &samples);
                    any_monitored = true;
                }
            }
        }

        Mixer::clamp(&mut mix);
        self.stream.push(&mix);

        if any_monitored {
            Mixer::clamp(&mut monitor_mix);
            self.output.write(&monitor_mix, channels);
        }

        let mut stats = self.stats.lock();
        stats.levels = MixLevels {
            rms: Mixer::rms_level(&mix),
            peak: Mixer::peak_level(&mix),
        };
        stats.render_cycles += 1;
        stats.frames_rendered += frames as u64;
    }
}

/// Outcome of trying to start a context.
///
/// `Blocked` means the platform wants a user gesture first; retry after it.
pub enum Activation {
    Ready(Arc<AudioGraphContext>),
    Blocked,
}

impl Activation {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked)
    }

    pub fn into_context(self) -> Result<Arc<AudioGraphContext>, CaptureError> {
        match self {
            Self::Ready(context) => Ok(context),
            Self::Blocked => Err(CaptureError::ContextBlocked),
        }
    }
}

/// The audio processing graph of one capture session.
///
/// Owns the sample clock, the binding registry, the MixBus and the monitor
/// sink. Rendering is driven by the platform clock; there is no tick API.
pub struct AudioGraphContext {
    core: Arc<GraphCore>,
    clock: Arc<dyn RenderClock>,
    registry: ElementBindingRegistry,
    bus: MixBus,
    monitor: MonitorSink,
}

impl AudioGraphContext {
    /// Build a running context, or report `Blocked` if the platform still
    /// needs a user activation.
    pub fn activate(
        platform: &dyn AudioPlatform,
        config: CaptureConfiguration,
    ) -> Result<Activation, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;

        if !platform.has_user_activation() {
            log::warn!("Audio context blocked until user activation");
            return Ok(Activation::Blocked);
        }

        let mixer = Mixer::new(config.sample_rate, config.channels);
        let stream_frames = config.frames_for_secs(config.stream_buffer_secs);
        let id = ContextId::new();
        let core = Arc::new(GraphCore {
            id,
            stream: CapturedStream::new(id, config.sample_rate, config.channels, stream_frames),
            mixer,
            state: RwLock::new(ContextState::Running),
            routing: Mutex::new(Routing::default()),
            source_callbacks: Arc::new(AtomicU64::new(0)),
            rejected_buffers: Arc::new(AtomicU64::new(0)),
            output: platform.output_device(),
            stats: Mutex::new(RenderStats::default()),
            config,
        });

        let clock = platform.clock();
        let weak: Weak<GraphCore> = Arc::downgrade(&core);
        clock.start(Arc::new(move |frames: usize| {
            if let Some(core) = weak.upgrade() {
                core.render_quantum(frames);
            }
        }))?;

        log::info!(
            "Audio context {} running at {} Hz, {} channel(s)",
            core.id,
            core.config.sample_rate,
            core.config.channels
        );

        Ok(Activation::Ready(Arc::new(Self {
            registry: ElementBindingRegistry::new(Arc::clone(&core)),
            bus: MixBus::new(Arc::clone(&core)),
            monitor: MonitorSink::new(Arc::clone(&core)),
            clock,
            core,
        })))
    }

    pub fn id(&self) -> ContextId {
        self.core.id
    }

    pub fn state(&self) -> ContextState {
        *self.core.state.read()
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.core.config
    }

    pub fn registry(&self) -> &ElementBindingRegistry {
        &self.registry
    }

    pub fn mix_bus(&self) -> &MixBus {
        &self.bus
    }

    pub fn monitor(&self) -> &MonitorSink {
        &self.monitor
    }

    /// Sample clock: frames rendered since the context started.
    pub fn sample_clock(&self) -> u64 {
        self.core.stats.lock().frames_rendered
    }

    /// Sample clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.sample_clock() as f64 / self.core.config.sample_rate
    }

    pub fn levels(&self) -> MixLevels {
        self.core.stats.lock().levels
    }

    pub fn diagnostics(&self) -> GraphDiagnostics {
        let (bound, connected, monitored) = {
            let routing = self.core.routing.lock();
            (routing.sources.len(), routing.connected.len(), routing.monitored.len())
        };
        let stats = self.core.stats.lock();
        GraphDiagnostics {
            render_cycles: stats.render_cycles,
            frames_rendered: stats.frames_rendered,
            source_callbacks: self.core.source_callbacks.load(Ordering::Relaxed),
            rejected_buffers: self.core.rejected_buffers.load(Ordering::Relaxed),
            bound_sources: bound,
            connected_sources: connected,
            monitored_sources: monitored,
        }
    }

    /// Pause rendering. The sample clock stops; bindings are kept.
    pub fn suspend(&self) -> Result<(), CaptureError> {
        let mut state = self.core.state.write();
        match *state {
            ContextState::Closed => Err(CaptureError::ContextClosed),
            _ => {
                *state = ContextState::Suspended;
                Ok(())
            }
        }
    }

    pub fn resume(&self) -> Result<(), CaptureError> {
        let mut state = self.core.state.write();
        match *state {
            ContextState::Closed => Err(CaptureError::ContextClosed),
            _ => {
                *state = ContextState::Running;
                Ok(())
            }
        }
    }

    /// Release every binding and invalidate the captured stream.
    /// Closing twice is a no-op.
    pub fn close(&self) {
        {
            let mut state = self.core.state.write();
            if state.is_closed() {
                return;
            }
            *state = ContextState::Closed;
        }
        self.clock.stop();

        let released = {
            let mut routing = self.core.routing.lock();
            let released: Vec<SourceBinding> = routing.sources.values().cloned().collect();
            *routing = Routing::default();
            released
        };
        for binding in &released {
            binding.mark_released();
            binding.element().element().release(self.core.id);
        }

        self.core.stream.invalidate();
        log::info!(
            "Audio context {} closed, released {} source(s)",
            self.core.id,
            released.len()
        );
    }
}

impl Drop for AudioGraphContext {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryDocument, MemoryMediaElement, MemoryPlatform};
    use crate::models::audio_models::MediaKind;
    use approx::assert_abs_diff_eq;

    fn test_config() -> CaptureConfiguration {
        CaptureConfiguration {
            source_buffer_secs: 1.0,
            stream_buffer_secs: 1.0,
            publish_global: false,
            ..Default::default()
        }
    }

    fn running(platform: &MemoryPlatform) -> Arc<AudioGraphContext> {
        AudioGraphContext::activate(platform, test_config())
            .unwrap()
            .into_context()
            .unwrap()
    }

    fn bind_all(context: &AudioGraphContext, doc: &MemoryDocument) -> Vec<SourceBinding> {
        let registry = context.registry();
        registry
            .discover(doc)
            .unwrap()
            .map(|handle| registry.bind_or_reuse(&handle).unwrap())
            .collect()
    }

    #[test]
    fn activation_blocked_without_user_gesture() {
        let platform = MemoryPlatform::new();

        let activation = AudioGraphContext::activate(&platform, test_config()).unwrap();

        assert!(activation.is_blocked());
        assert_eq!(activation.into_context().err(), Some(CaptureError::ContextBlocked));
    }

    #[test]
    fn invalid_config_is_rejected_before_activation() {
        let platform = MemoryPlatform::activated();
        let config = CaptureConfiguration {
            channels: 0,
            ..test_config()
        };

        let err = AudioGraphContext::activate(&platform, config).err();
        assert!(matches!(err, Some(CaptureError::ConfigurationFailed(_))));
    }

    #[test]
    fn one_binding_per_element_and_rebinding_adds_none() {
        let platform = MemoryPlatform::activated();
        let context = running(&platform);
        let doc = MemoryDocument::new();
        doc.add_video("video#a");
        doc.add_video("video#b");
        doc.add_audio("audio#c");

        let first = bind_all(&context, &doc);
        let second = bind_all(&context, &doc);

        assert_eq!(first.len(), 3);
        assert_ne!(first[0], first[1]);
        assert_ne!(first[1], first[2]);
        assert_eq!(first, second);
        assert_eq!(context.registry().len(), 3);
    }

    #[test]
    fn discovery_is_a_snapshot() {
        let platform = MemoryPlatform::activated();
        let context = running(&platform);
        let doc = MemoryDocument::new();
        doc.add_video("video#a");

        let discovery = context.registry().discover(&doc).unwrap();
        doc.add_audio("audio#late");

        assert_eq!(discovery.len(), 1);
        assert_eq!(discovery.count(), 1);
    }

    #[test]
    fn stream_identity_is_stable() {
        let platform = MemoryPlatform::activated();
        let context = running(&platform);

        let a = context.mix_bus().get_stream().unwrap();
        let b = context.mix_bus().get_stream().unwrap();

        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn stream_without_sources_is_silent() {
        let platform = MemoryPlatform::activated();
        let context = running(&platform);
        let stream = context.mix_bus().get_stream().unwrap();

        platform.advance(4);

        assert_eq!(stream.read(16).unwrap(), vec![0.0; 8]);
        assert_eq!(context.levels(), MixLevels::default());
        assert_eq!(context.sample_clock(), 4);
    }

    #[test]
    fn connected_sources_are_summed() {
        let platform = MemoryPlatform::activated();
        let context = running(&platform);
        let doc = MemoryDocument::new();
        let a = doc.add_video("video#a");
        let b = doc.add_audio("audio#b");
        for binding in bind_all(&context, &doc) {
            assert!(context.mix_bus().connect(&binding).unwrap());
        }
        let stream = context.mix_bus().get_stream().unwrap();

        a.play_constant(0.25, 4);
        b.play_constant(0.5, 4);
        platform.advance(4);

        let mixed = stream.read(4).unwrap();
        assert_eq!(mixed.len(), 8);
        for sample in mixed {
            assert_abs_diff_eq!(sample, 0.75, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(context.levels().peak, 0.75, epsilon = 1e-6);
    }

    #[test]
    fn connect_twice_is_a_noop() {
        let platform = MemoryPlatform::activated();
        let context = running(&platform);
        let doc = MemoryDocument::new();
        let a = doc.add_video("video#a");
        let binding = bind_all(&context, &doc).remove(0);

        assert!(context.mix_bus().connect(&binding).unwrap());
        assert!(!context.mix_bus().connect(&binding).unwrap());
        assert_eq!(context.mix_bus().input_count(), 1);

        a.play_constant(0.25, 2);
        platform.advance(2);
        let mixed = context.mix_bus().get_stream().unwrap().read(2).unwrap();
        assert_eq!(mixed, vec![0.25; 4]);
    }

    #[test]
    fn disconnect_removes_only_that_source() {
        let platform = MemoryPlatform::activated();
        let context = running(&platform);
        let doc = MemoryDocument::new();
        let a = doc.add_video("video#a");
        let b = doc.add_video("video#b");
        let bindings = bind_all(&context, &doc);
        for binding in &bindings {
            context.mix_bus().connect(binding).unwrap();
        }
        let stream = context.mix_bus().get_stream().unwrap();

        assert!(context.mix_bus().disconnect(&bindings[0]).unwrap());
        a.play_constant(0.25, 4);
        b.play_constant(0.5, 4);
        platform.advance(4);

        assert_eq!(stream.read(4).unwrap(), vec![0.5; 8]);
        assert!(!context.mix_bus().is_connected(&bindings[0]));
        assert!(context.mix_bus().is_connected(&bindings[1]));
    }

    #[test]
    fn monitor_is_independent_of_mix_membership() {
        let platform = MemoryPlatform::activated();
        let output = platform.output();
        let context = running(&platform);
        let doc = MemoryDocument::new();
        let a = doc.add_video("video#a");
        let b = doc.add_audio("audio#b");
        let bindings = bind_all(&context, &doc);
        for binding in &bindings {
            context.mix_bus().connect(binding).unwrap();
        }
        let stream = context.mix_bus().get_stream().unwrap();

        context.monitor().enable(&bindings[0]).unwrap();
        a.play_constant(0.25, 2);
        b.play_constant(0.5, 2);
        platform.advance(2);

        assert_eq!(output.take(), vec![0.25; 4]);
        assert_eq!(stream.read(2).unwrap(), vec![0.75; 4]);

        context.monitor().disable(&bindings[0]).unwrap();
        a.play_constant(0.25, 2);
        b.play_constant(0.5, 2);
        platform.advance(2);

        assert!(output.take().is_empty());
        assert_eq!(stream.read(2).unwrap(), vec![0.75; 4]);
        assert!(!context.monitor().is_enabled(&bindings[0]));
    }

    #[test]
    fn element_owned_by_another_context_is_reported() {
        let doc = MemoryDocument::new();
        doc.add_video("video#shared");
        let first_platform = MemoryPlatform::activated();
        let second_platform = MemoryPlatform::activated();
        let first = running(&first_platform);
        let second = running(&second_platform);

        let handle = first.registry().discover(&doc).unwrap().next().unwrap();
        first.registry().bind_or_reuse(&handle).unwrap();

        let err = second.registry().bind_or_reuse(&handle).unwrap_err();
        assert_eq!(err, CaptureError::AlreadyBoundElsewhere { element: handle.id() });
        assert!(second.registry().is_empty());

        first.registry().release(&handle);
        assert!(second.registry().bind_or_reuse(&handle).is_ok());
    }

    #[test]
    fn release_disconnects_and_is_idempotent() {
        let platform = MemoryPlatform::activated();
        let context = running(&platform);
        let doc = MemoryDocument::new();
        let a = doc.add_video("video#a");
        let binding = bind_all(&context, &doc).remove(0);
        context.mix_bus().connect(&binding).unwrap();
        context.monitor().enable(&binding).unwrap();

        context.registry().release(binding.element());
        context.registry().release(binding.element());

        assert!(binding.is_released());
        assert_eq!(a.owner(), None);
        assert_eq!(context.mix_bus().input_count(), 0);
        assert_eq!(context.diagnostics().monitored_sources, 0);
        assert_eq!(context.mix_bus().connect(&binding), Err(CaptureError::BindingReleased));
        assert_eq!(context.mix_bus().disconnect(&binding), Ok(false));
        assert_eq!(context.monitor().disable(&binding), Ok(()));
        assert!(context.registry().binding_for(binding.element()).is_none());
    }

    #[test]
    fn binding_from_another_context_is_rejected() {
        let doc = MemoryDocument::new();
        doc.add_audio("audio#a");
        let platform = MemoryPlatform::activated();
        let first = running(&platform);
        let second = running(&platform);
        let binding = bind_all(&first, &doc).remove(0);

        assert_eq!(second.mix_bus().connect(&binding), Err(CaptureError::ForeignBinding));
        assert_eq!(second.monitor().enable(&binding), Err(CaptureError::ForeignBinding));
        assert_eq!(second.mix_bus().disconnect(&binding), Err(CaptureError::ForeignBinding));
        assert_eq!(second.monitor().disable(&binding), Err(CaptureError::ForeignBinding));
    }

    #[test]
    fn sources_are_conformed_to_graph_format() {
        let platform = MemoryPlatform::activated();
        let context = running(&platform);
        let doc = MemoryDocument::new();
        let element = doc.insert(Arc::new(MemoryMediaElement::with_format(
            crate::models::audio_models::ElementId(40),
            MediaKind::Audio,
            "audio#mono",
            24000.0,
            1,
        )));
        let binding = bind_all(&context, &doc).remove(0);

        element.play(&[0.4, 0.4, 0.4]);
        assert_eq!(binding.pending_frames(), 4);

        element.play(&[0.4, 0.4, 0.4]);
        assert_eq!(binding.pending_frames(), 10);
        assert_eq!(context.diagnostics().source_callbacks, 2);
    }

    #[test]
    fn unusable_source_rate_is_dropped_and_counted() {
        let platform = MemoryPlatform::activated();
        let context = running(&platform);
        let doc = MemoryDocument::new();
        let element = doc.insert(Arc::new(MemoryMediaElement::with_format(
            crate::models::audio_models::ElementId(41),
            MediaKind::Audio,
            "audio#broken",
            0.0,
            2,
        )));
        let binding = bind_all(&context, &doc).remove(0);

        element.play(&[0.4, 0.4]);
        element.play(&[0.4, 0.4]);

        let diagnostics = context.diagnostics();
        assert_eq!(binding.pending_frames(), 0);
        assert_eq!(diagnostics.source_callbacks, 2);
        assert_eq!(diagnostics.rejected_buffers, 2);
    }

    #[test]
    fn suspended_context_does_not_render() {
        let platform = MemoryPlatform::activated();
        let context = running(&platform);
        let stream = context.mix_bus().get_stream().unwrap();

        context.suspend().unwrap();
        platform.advance(8);
        assert_eq!(context.state(), ContextState::Suspended);
        assert_eq!(context.sample_clock(), 0);
        assert_eq!(stream.frames_written(), 0);

        context.resume().unwrap();
        platform.advance(8);
        assert_eq!(context.sample_clock(), 8);
        assert_abs_diff_eq!(context.current_time(), 8.0 / 48000.0);
    }

    #[test]
    fn close_releases_everything_and_is_terminal() {
        let platform = MemoryPlatform::activated();
        let context = running(&platform);
        let doc = MemoryDocument::new();
        let a = doc.add_video("video#a");
        let binding = bind_all(&context, &doc).remove(0);
        context.mix_bus().connect(&binding).unwrap();
        let stream = context.mix_bus().get_stream().unwrap();

        context.close();
        context.close();

        assert_eq!(context.state(), ContextState::Closed);
        assert_eq!(a.owner(), None);
        assert!(binding.is_released());
        assert_eq!(stream.read(1), Err(CaptureError::StreamInvalidated));
        assert_eq!(context.mix_bus().get_stream().err(), Some(CaptureError::ContextClosed));
        assert_eq!(context.resume(), Err(CaptureError::ContextClosed));
        assert!(context.registry().discover(&doc).is_err());
        assert!(!a.play_constant(0.5, 1));
    }

    #[test]
    fn diagnostics_track_graph_shape() {
        let platform = MemoryPlatform::activated();
        let context = running(&platform);
        let doc = MemoryDocument::new();
        doc.add_video("video#a");
        doc.add_video("video#b");
        let bindings = bind_all(&context, &doc);
        context.mix_bus().connect(&bindings[0]).unwrap();
        context.monitor().enable(&bindings[1]).unwrap();
        platform.advance(10);
        platform.advance(10);

        let diagnostics = context.diagnostics();
        assert_eq!(diagnostics.bound_sources, 2);
        assert_eq!(diagnostics.connected_sources, 1);
        assert_eq!(diagnostics.monitored_sources, 1);
        assert_eq!(diagnostics.render_cycles, 2);
        assert_eq!(diagnostics.frames_rendered, 20);
    }
}
