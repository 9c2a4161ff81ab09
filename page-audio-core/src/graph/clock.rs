use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::traits::audio_platform::{RenderCallback, RenderClock};

/// Real-time clock backed by a dedicated render thread.
///
/// Wakes on quantum deadlines measured from the start instant and renders
/// every frame owed since the last wake, so the sample clock tracks wall
/// time even when a wake runs late or a render is slow. Owed frames are
/// rendered in chunks of at most one quantum.
pub struct ThreadedClock {
    frames_per_quantum: usize,
    sample_rate: f64,
    interval: Duration,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ThreadedClock {
    pub fn new(config: &CaptureConfiguration) -> Self {
        Self {
            frames_per_quantum: config.quantum_frames().max(1),
            sample_rate: config.sample_rate,
            interval: Duration::from_millis(config.render_quantum_ms.max(1)),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl RenderClock for ThreadedClock {
    fn start(&self, render: RenderCallback) -> Result<(), CaptureError> {
        self.stop();
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let quantum = self.frames_per_quantum as u64;
        let sample_rate = self.sample_rate;
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("audio-render".into())
            .spawn(move || {
                let started = Instant::now();
                let mut rendered: u64 = 0;
                let mut deadline = started;
                while running.load(Ordering::SeqCst) {
                    deadline += interval;
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    }

                    let due = (started.elapsed().as_secs_f64() * sample_rate) as u64;
                    while rendered < due && running.load(Ordering::SeqCst) {
                        let chunk = (due - rendered).min(quantum);
                        render(chunk as usize);
                        rendered += chunk;
                    }
                }
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::Backend(format!("failed to spawn render thread: {}", e))
            })?;

        *self.handle.lock() = Some(handle);
        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::error!("Audio render thread panicked");
            }
        }
    }
}

impl Drop for ThreadedClock {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Clock advanced explicitly by the host.
///
/// Used by headless hosts and tests that need deterministic rendering.
#[derive(Default)]
pub struct ManualClock {
    render: Mutex<Option<RenderCallback>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `frames` frames now. Returns false if the clock is stopped.
    pub fn advance(&self, frames: usize) -> bool {
        let render = self.render.lock().clone();
        match render {
            Some(render) => {
                render(frames);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.render.lock().is_some()
    }
}

impl RenderClock for ManualClock {
    fn start(&self, render: RenderCallback) -> Result<(), CaptureError> {
        *self.render.lock() = Some(render);
        Ok(())
    }

    fn stop(&self) {
        self.render.lock().take();
    }
}
