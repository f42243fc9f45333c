// SPDX-License-Identifier: GPL-3.0-only

//! The render loop
//!
//! Runs on its own thread for exactly one surface lifetime. The graphics
//! context is created at the top of that thread and destroyed at the bottom,
//! on every exit path, and never leaves it.

use super::{Drawable, GraphicsContext, SurfaceSize};
use crate::backends::camera::{LoopAction, LoopController};
use crate::errors::{PipelineError, PipelineResult};
use crate::frame_store::FrameStore;
use crate::geometry::{QuadGeometry, compute_quad};
use crate::stats::StatsSink;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// Lifecycle state of a render loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// No context yet, or context creation failed
    Uninitialized,
    /// Context live, loop presenting
    Running,
    /// Loop exited and context destroyed
    Stopped,
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderState::Uninitialized => write!(f, "uninitialized"),
            RenderState::Running => write!(f, "running"),
            RenderState::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<RenderState>,
    pending_resize: Mutex<Option<SurfaceSize>>,
    presented: AtomicU64,
    context_failed: AtomicBool,
}

impl Shared {
    fn set_state(&self, state: RenderState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn state(&self) -> RenderState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_resize(&self) -> Option<SurfaceSize> {
        self.pending_resize
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Read-only view of a render loop, cheap to clone across threads
#[derive(Debug, Clone)]
pub struct RenderStatus {
    shared: Arc<Shared>,
}

impl RenderStatus {
    pub fn state(&self) -> RenderState {
        self.shared.state()
    }

    /// Frames presented since the loop started
    pub fn presented_frames(&self) -> u64 {
        self.shared.presented.load(Ordering::SeqCst)
    }

    /// Whether the graphics context could not be created
    pub fn context_failed(&self) -> bool {
        self.shared.context_failed.load(Ordering::SeqCst)
    }

    /// Whether this loop will never present again
    pub fn has_ended(&self) -> bool {
        self.context_failed() || self.state() == RenderState::Stopped
    }
}

/// Handle to a render thread
pub struct RenderLoop {
    controller: LoopController,
    shared: Arc<Shared>,
}

/// Everything the render thread owns for one surface lifetime
struct RenderSession<C: GraphicsContext> {
    context: Option<C>,
    store: Arc<FrameStore>,
    sink: Arc<dyn StatsSink>,
    shared: Arc<Shared>,
    clear_color: [f32; 4],
    uploaded_sequence: u64,
    source_size: Option<(u32, u32)>,
    geometry: Option<QuadGeometry>,
}

impl RenderLoop {
    /// Spawn the render thread for `drawable`
    ///
    /// The state moves to [`RenderState::Running`] once the context exists.
    /// If creation fails a `ContextCreationFailure` is reported to `sink`
    /// and the state stays [`RenderState::Uninitialized`].
    pub fn start<D>(
        drawable: D,
        store: Arc<FrameStore>,
        sink: Arc<dyn StatsSink>,
        clear_color: [f32; 4],
    ) -> Self
    where
        D: Drawable,
        D::Context: 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(RenderState::Uninitialized),
            pending_resize: Mutex::new(None),
            presented: AtomicU64::new(0),
            context_failed: AtomicBool::new(false),
        });
        let session_shared = Arc::clone(&shared);

        let controller = LoopController::start_with_init(
            "render-loop",
            move || {
                let context = match drawable.create_context() {
                    Ok(context) => context,
                    Err(e) => {
                        error!(error = %e, "Failed to create graphics context");
                        session_shared.context_failed.store(true, Ordering::SeqCst);
                        sink.report_error(&e);
                        return Err(e.to_string());
                    }
                };
                info!(size = %context.surface_size(), "Graphics context created");
                session_shared.set_state(RenderState::Running);
                Ok(RenderSession {
                    context: Some(context),
                    store,
                    sink,
                    shared: session_shared,
                    clear_color,
                    uploaded_sequence: 0,
                    source_size: None,
                    geometry: None,
                })
            },
            RenderSession::step,
        );

        Self { controller, shared }
    }

    pub fn state(&self) -> RenderState {
        self.shared.state()
    }

    pub fn status(&self) -> RenderStatus {
        RenderStatus {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Queue a resize; applied before the next presented frame
    pub fn resize(&self, size: SurfaceSize) {
        debug!(size = %size, "Resize queued");
        *self
            .shared
            .pending_resize
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(size);
    }

    /// Whether the render thread is alive
    pub fn is_active(&self) -> bool {
        self.controller.is_running()
    }

    /// Stop the loop and wait until the context is destroyed
    pub fn stop(&mut self) {
        self.controller.stop();
        if self.shared.state() == RenderState::Running {
            self.shared.set_state(RenderState::Stopped);
        }
    }
}

impl<C: GraphicsContext> RenderSession<C> {
    fn step(&mut self) -> LoopAction {
        match self.render_frame() {
            Ok(()) => {
                self.shared.presented.fetch_add(1, Ordering::SeqCst);
                LoopAction::Continue
            }
            Err(e) => {
                error!(error = %e, "Render loop failed, ending surface session");
                self.sink.report_error(&e);
                LoopAction::Stop
            }
        }
    }

    /// Clear, draw the freshest frame if there is one, present
    ///
    /// Before the first publish only the clear color is presented.
    fn render_frame(&mut self) -> PipelineResult<()> {
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| PipelineError::RenderFailure("context already destroyed".to_string()))?;

        if let Some(size) = self.shared.take_resize() {
            context.resize(size)?;
            self.geometry = None;
        }

        context.clear(self.clear_color);

        if let Ok(frame) = self.store.consume() {
            if frame.sequence != self.uploaded_sequence {
                context.upload_texture(&frame)?;
                self.uploaded_sequence = frame.sequence;
            }

            let source = (frame.width, frame.height);
            if self.source_size != Some(source) {
                self.source_size = Some(source);
                self.geometry = None;
            }
            if self.geometry.is_none() {
                let surface = context.surface_size();
                self.geometry = compute_quad(surface.width, surface.height, frame.width, frame.height);
            }
            if let Some(geometry) = &self.geometry {
                context.draw_quad(geometry)?;
            }
        }

        context.present()
    }
}

impl<C: GraphicsContext> Drop for RenderSession<C> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            debug!("Destroying graphics context");
            if let Err(e) = context.destroy() {
                let e = match e {
                    PipelineError::ResourceReleaseError(_) => e,
                    other => PipelineError::ResourceReleaseError(other.to_string()),
                };
                warn!(error = %e, "Graphics context teardown incomplete");
                self.sink.report_error(&e);
            }
        }
        self.shared.set_state(RenderState::Stopped);
    }
}
