// SPDX-License-Identifier: GPL-3.0-only

//! Surface lifecycle coordination
//!
//! Windowing signals arrive on the host thread. They are pushed into an
//! unbounded channel, so the host never waits, and a dispatcher thread turns
//! them into render loop starts, resizes and stops. At most one render loop
//! exists at any time.

use super::render_loop::{RenderLoop, RenderStatus};
use super::{Drawable, SurfaceSize};
use crate::frame_store::FrameStore;
use crate::stats::StatsSink;
use futures::StreamExt;
use futures::channel::mpsc;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How often [`SurfaceLifecycleCoordinator::wait_for_frames`] polls
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How a wait on the coordinator ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The target count was both processed and presented
    Reached,
    /// The render loop stopped or its context could not be created
    RenderEnded,
    /// The deadline passed first
    TimedOut,
    /// The caller asked to stop waiting
    Interrupted,
}

/// Signals from the windowing system and the host
pub enum SurfaceSignal<D> {
    /// A drawable surface exists
    Available(D),
    /// The surface changed size
    Resized(SurfaceSize),
    /// The surface is gone
    Destroyed,
    /// The host is shutting down, with or without a prior `Destroyed`
    HostStopped,
}

impl<D> fmt::Debug for SurfaceSignal<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceSignal::Available(_) => write!(f, "Available"),
            SurfaceSignal::Resized(size) => write!(f, "Resized({})", size),
            SurfaceSignal::Destroyed => write!(f, "Destroyed"),
            SurfaceSignal::HostStopped => write!(f, "HostStopped"),
        }
    }
}

#[derive(Debug, Default)]
struct CoordinatorStatus {
    current: Mutex<Option<RenderStatus>>,
    loops_started: AtomicU64,
}

/// Drives render loop transitions from surface signals
pub struct SurfaceLifecycleCoordinator<D: Drawable> {
    sender: mpsc::UnboundedSender<SurfaceSignal<D>>,
    dispatcher: Option<JoinHandle<()>>,
    status: Arc<CoordinatorStatus>,
}

/// State owned by the dispatcher thread
struct Dispatcher {
    store: Arc<FrameStore>,
    sink: Arc<dyn StatsSink>,
    clear_color: [f32; 4],
    status: Arc<CoordinatorStatus>,
    current: Option<RenderLoop>,
}

impl<D> SurfaceLifecycleCoordinator<D>
where
    D: Drawable,
    D::Context: 'static,
{
    /// Spawn the dispatcher thread
    pub fn new(
        store: Arc<FrameStore>,
        sink: Arc<dyn StatsSink>,
        clear_color: [f32; 4],
    ) -> std::io::Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded::<SurfaceSignal<D>>();
        let status = Arc::new(CoordinatorStatus::default());
        let mut dispatcher = Dispatcher {
            store,
            sink,
            clear_color,
            status: Arc::clone(&status),
            current: None,
        };

        let handle = std::thread::Builder::new()
            .name("surface-lifecycle".to_string())
            .spawn(move || {
                futures::executor::block_on(async {
                    while let Some(signal) = receiver.next().await {
                        debug!(signal = ?signal, "Surface signal");
                        if !dispatcher.dispatch(signal) {
                            break;
                        }
                    }
                });
                // Channel closed or host stopped: nothing may outlive the coordinator
                dispatcher.stop_current();
                debug!("Surface lifecycle dispatcher exiting");
            })?;

        Ok(Self {
            sender,
            dispatcher: Some(handle),
            status,
        })
    }

    /// Forward a signal without blocking
    pub fn signal(&self, signal: SurfaceSignal<D>) {
        if self.sender.unbounded_send(signal).is_err() {
            warn!("Surface lifecycle dispatcher is gone, signal dropped");
        }
    }

    pub fn surface_available(&self, drawable: D) {
        self.signal(SurfaceSignal::Available(drawable));
    }

    pub fn surface_resized(&self, width: u32, height: u32) {
        self.signal(SurfaceSignal::Resized(SurfaceSize::new(width, height)));
    }

    pub fn surface_destroyed(&self) {
        self.signal(SurfaceSignal::Destroyed);
    }

    /// Status of the current render loop, if one exists
    pub fn render_status(&self) -> Option<RenderStatus> {
        self.status
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Block until `frames` frames have been published to `store` and presented
    ///
    /// Signals are handled on the dispatcher thread, so right after
    /// [`surface_available`](Self::surface_available) there may be no render
    /// status yet; that counts as no progress, not as an ended loop.
    /// `progress` gets (processed, presented) on every poll.
    pub fn wait_for_frames(
        &self,
        store: &FrameStore,
        frames: u64,
        timeout: Duration,
        interrupted: impl Fn() -> bool,
        mut progress: impl FnMut(u64, u64),
    ) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            if interrupted() {
                return WaitOutcome::Interrupted;
            }

            let processed = store.latest_sequence();
            let status = self.render_status();
            let presented = status.as_ref().map_or(0, RenderStatus::presented_frames);
            if processed >= frames && presented >= frames {
                return WaitOutcome::Reached;
            }
            if status.is_some_and(|s| s.has_ended()) {
                return WaitOutcome::RenderEnded;
            }
            if Instant::now() >= deadline {
                return WaitOutcome::TimedOut;
            }

            progress(processed, presented);
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    /// Render loops started over the coordinator's lifetime
    pub fn loops_started(&self) -> u64 {
        self.status.loops_started.load(Ordering::SeqCst)
    }

    /// Tear everything down and wait for the dispatcher to exit
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.dispatcher.take() {
            info!("Shutting down surface lifecycle");
            // A closed channel means the dispatcher already stopped on its own
            let _ = self.sender.unbounded_send(SurfaceSignal::HostStopped);
            if handle.join().is_err() {
                warn!("Surface lifecycle dispatcher panicked");
            }
        }
    }
}

impl<D: Drawable> Drop for SurfaceLifecycleCoordinator<D> {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatcher.take() {
            let _ = self.sender.unbounded_send(SurfaceSignal::HostStopped);
            let _ = handle.join();
        }
    }
}

impl Dispatcher {
    /// Handle one signal; returns false once the host has stopped
    fn dispatch<D>(&mut self, signal: SurfaceSignal<D>) -> bool
    where
        D: Drawable,
        D::Context: 'static,
    {
        match signal {
            SurfaceSignal::Available(drawable) => {
                if self.current.is_some() {
                    warn!("Surface available while a render loop is live, replacing it");
                    self.stop_current();
                }
                let render = RenderLoop::start(
                    drawable,
                    Arc::clone(&self.store),
                    Arc::clone(&self.sink),
                    self.clear_color,
                );
                *self.status.current.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(render.status());
                self.status.loops_started.fetch_add(1, Ordering::SeqCst);
                self.current = Some(render);
                true
            }
            SurfaceSignal::Resized(size) => {
                match &self.current {
                    Some(render) => render.resize(size),
                    None => debug!(size = %size, "Resize without a surface, ignored"),
                }
                true
            }
            SurfaceSignal::Destroyed => {
                self.stop_current();
                true
            }
            SurfaceSignal::HostStopped => {
                info!("Host stopped");
                false
            }
        }
    }

    fn stop_current(&mut self) {
        if let Some(mut render) = self.current.take() {
            render.stop();
            info!(state = %render.state(), "Render loop stopped");
        }
    }
}
