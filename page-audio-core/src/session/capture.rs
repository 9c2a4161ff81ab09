use std::sync::Arc;

use crate::graph::binding::{MediaElementHandle, SourceBinding};
use crate::graph::context::{Activation, AudioGraphContext};
use crate::graph::stream::CapturedStream;
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::state::SessionState;
use crate::session::publisher::StreamPublisher;
use crate::traits::audio_platform::AudioPlatform;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::media_element::Document;

/// Result of one discovery-and-bind pass.
///
/// A report with no sources is a valid outcome ("nothing to capture"),
/// distinct from a failed capture, which is an `Err`.
#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub stream: CapturedStream,
    /// Bindings of every element seen by this pass, in document order.
    pub bindings: Vec<SourceBinding>,
    /// How many of those bindings were created by this pass.
    pub newly_bound: usize,
}

impl CaptureReport {
    /// True when discovery found no media elements. The stream is valid
    /// but silent.
    pub fn is_silent(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Turn "nothing to capture" into `CaptureError::NoElementsFound` for
    /// callers that need audio.
    pub fn require_sources(self) -> Result<Self, CaptureError> {
        if self.is_silent() {
            return Err(CaptureError::NoElementsFound);
        }
        Ok(self)
    }
}

/// Capture session orchestrator.
///
/// Owns at most one audio graph context and the publisher its stream is
/// exposed through. Runs on a single control thread:
/// ```text
/// discover → bind_or_reuse → MixBus.connect (→ monitor) → publish once
/// ```
pub struct CaptureSession<P: AudioPlatform> {
    platform: Arc<P>,
    config: CaptureConfiguration,
    context: Option<Arc<AudioGraphContext>>,
    publisher: Arc<StreamPublisher>,
    state: SessionState,
    delegate: Option<Arc<dyn CaptureDelegate>>,
}

impl<P: AudioPlatform> CaptureSession<P> {
    pub fn new(platform: Arc<P>, config: CaptureConfiguration) -> Result<Self, CaptureError> {
        let publisher = if config.publish_global {
            StreamPublisher::mirrored()
        } else {
            StreamPublisher::new()
        };
        Self::with_publisher(platform, config, Arc::new(publisher))
    }

    /// Build a session that publishes through a caller-owned publisher.
    pub fn with_publisher(
        platform: Arc<P>,
        config: CaptureConfiguration,
        publisher: Arc<StreamPublisher>,
    ) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(Self {
            platform,
            config,
            context: None,
            publisher,
            state: SessionState::Uninitialized,
            delegate: None,
        })
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    pub fn context(&self) -> Option<&Arc<AudioGraphContext>> {
        self.context.as_ref()
    }

    pub fn publisher(&self) -> &Arc<StreamPublisher> {
        &self.publisher
    }

    /// The stream this session currently exposes, if any.
    pub fn current_stream(&self) -> Option<CapturedStream> {
        self.publisher.current_stream()
    }

    /// Start the context, or return the running one.
    ///
    /// `Blocked` leaves the session retryable; call again after the user
    /// gesture. Fails with `ContextClosed` once the session has closed.
    pub fn activate(&mut self) -> Result<Activation, CaptureError> {
        if self.state.is_terminal() {
            return self.fail(CaptureError::ContextClosed);
        }
        if let Some(context) = &self.context {
            return Ok(Activation::Ready(Arc::clone(context)));
        }

        let activation = match AudioGraphContext::activate(&*self.platform, self.config.clone()) {
            Ok(activation) => activation,
            Err(e) => return self.fail(e),
        };
        match &activation {
            Activation::Ready(context) => {
                self.context = Some(Arc::clone(context));
                self.set_state(SessionState::Running);
            }
            Activation::Blocked => self.set_state(SessionState::Blocked),
        }
        Ok(activation)
    }

    /// Like [`activate`](Self::activate) but reports `Blocked` as
    /// `CaptureError::ContextBlocked`.
    pub fn create_context(&mut self) -> Result<Arc<AudioGraphContext>, CaptureError> {
        match self.activate()?.into_context() {
            Ok(context) => Ok(context),
            Err(e) => self.fail(e),
        }
    }

    /// Discover the document's media elements, bind each one (reusing
    /// existing bindings), connect them to the MixBus and publish the
    /// stream if it is not published yet.
    ///
    /// Stops at the first binding error; bindings made before it stay in
    /// place.
    pub fn capture(&mut self, document: &dyn Document) -> Result<CaptureReport, CaptureError> {
        let context = self.create_context()?;
        match self.capture_into(&context, document) {
            Ok(report) => Ok(report),
            Err(e) => self.fail(e),
        }
    }

    fn capture_into(
        &self,
        context: &AudioGraphContext,
        document: &dyn Document,
    ) -> Result<CaptureReport, CaptureError> {
        let registry = context.registry();
        let before = registry.len();

        let mut bindings = Vec::new();
        for handle in registry.discover(document)? {
            let binding = registry.bind_or_reuse(&handle)?;
            let newly_connected = context.mix_bus().connect(&binding)?;
            if newly_connected && self.config.monitor_by_default {
                context.monitor().enable(&binding)?;
            }
            bindings.push(binding);
        }

        let stream = context.mix_bus().get_stream()?;
        if bindings.is_empty() {
            log::info!("No media elements found; publishing silent stream");
        }
        if !self.publisher.is_current(&stream) {
            let event = self.publisher.publish(stream.clone(), bindings.len());
            if let Some(ref delegate) = self.delegate {
                delegate.on_capture_started(&event);
            }
        }

        Ok(CaptureReport {
            stream,
            newly_bound: registry.len().saturating_sub(before),
            bindings,
        })
    }

    /// Release one element's binding. No-op if it was never bound or no
    /// context is running.
    pub fn release(&self, handle: &MediaElementHandle) {
        if let Some(context) = &self.context {
            context.registry().release(handle);
        }
    }

    /// End the session: close the context, invalidate its stream and take
    /// it off the publisher. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if let Some(context) = self.context.take() {
            if let Ok(stream) = context.mix_bus().get_stream() {
                self.publisher.retract(stream.id());
            }
            context.close();
        }
        self.set_state(SessionState::Closed);
    }

    // --- Internal helpers ---

    fn set_state(&mut self, new_state: SessionState) {
        if self.state == new_state {
            return;
        }
        log::debug!("Capture session {} -> {}", self.state.as_str(), new_state.as_str());
        self.state = new_state;
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&new_state);
        }
    }

    fn fail<T>(&self, error: CaptureError) -> Result<T, CaptureError> {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(&error);
        }
        Err(error)
    }
}

impl<P: AudioPlatform> Drop for CaptureSession<P> {
    fn drop(&mut self) {
        self.close();
    }
}
