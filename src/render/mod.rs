// SPDX-License-Identifier: GPL-3.0-only

//! Rendering: graphics contexts, the render loop and surface lifecycle
//!
//! A [`Drawable`] is what the windowing side hands over when a surface
//! becomes available. The render thread turns it into a [`GraphicsContext`]
//! and is the only thread that ever touches that context.
//!
//! ```text
//!  host thread                    render thread
//! ┌──────────────────────┐ signal ┌──────────────────────────────┐
//! │ SurfaceLifecycle-    │ ─────▶ │ RenderLoop                   │
//! │ Coordinator          │        │  create_context → loop →     │
//! └──────────────────────┘        │  destroy                     │
//!                                 └──────────────────────────────┘
//! ```
//!
//! Backends:
//! - [`gpu`]: wgpu render-to-texture surface with readback
//! - [`terminal`]: ratatui half-block rasterizer

pub mod gpu;
pub mod lifecycle;
pub mod render_loop;
pub mod terminal;

pub use lifecycle::{SurfaceLifecycleCoordinator, SurfaceSignal, WaitOutcome};
pub use render_loop::{RenderLoop, RenderState, RenderStatus};

use crate::errors::PipelineResult;
use crate::frame_store::ProcessedFrame;
use crate::geometry::QuadGeometry;
use std::fmt;

/// Size of a drawable surface in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for SurfaceSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A live binding to a drawable surface, confined to the render thread
///
/// One iteration of the render loop calls `clear`, then optionally
/// `upload_texture` and `draw_quad`, then `present`.
pub trait GraphicsContext {
    /// Current surface size in pixels
    fn surface_size(&self) -> SurfaceSize;

    /// Follow a surface resize
    fn resize(&mut self, size: SurfaceSize) -> PipelineResult<()>;

    /// Clear the target to an RGBA color
    fn clear(&mut self, color: [f32; 4]);

    /// Replace the texture contents with a processed frame
    fn upload_texture(&mut self, frame: &ProcessedFrame) -> PipelineResult<()>;

    /// Draw the current texture on the given quad
    fn draw_quad(&mut self, geometry: &QuadGeometry) -> PipelineResult<()>;

    /// Show what was drawn since the last clear
    fn present(&mut self) -> PipelineResult<()>;

    /// Release all resources in reverse creation order
    ///
    /// Called exactly once, on the render thread. The context is consumed so
    /// it cannot be used afterwards.
    fn destroy(self) -> PipelineResult<()>
    where
        Self: Sized;
}

/// A surface handed over by the windowing side
///
/// `create_context` runs on the render thread, so the context type itself
/// does not need to be `Send`.
pub trait Drawable: Send + 'static {
    type Context: GraphicsContext;

    fn create_context(self) -> PipelineResult<Self::Context>;
}

/// Test doubles shared by the render tests
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::errors::PipelineError;
    use std::sync::{Arc, Mutex};

    /// A call made on a [`RecordingContext`]
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Resize(SurfaceSize),
        Clear,
        Upload(u64),
        Draw(QuadGeometry),
        Present,
        Destroy,
    }

    /// Shared log of context calls and the threads they came from
    #[derive(Debug, Default, Clone)]
    pub struct CallLog {
        pub calls: Arc<Mutex<Vec<Call>>>,
        pub threads: Arc<Mutex<Vec<String>>>,
    }

    impl CallLog {
        pub fn record(&self, call: Call) {
            let name = std::thread::current().name().unwrap_or("").to_string();
            self.calls.lock().unwrap().push(call);
            self.threads.lock().unwrap().push(name);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, matcher: impl Fn(&Call) -> bool) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| matcher(c)).count()
        }
    }

    pub struct RecordingSurface {
        pub size: SurfaceSize,
        pub log: CallLog,
        pub fail_create: bool,
        pub fail_destroy: bool,
    }

    impl RecordingSurface {
        pub fn new(width: u32, height: u32, log: &CallLog) -> Self {
            Self {
                size: SurfaceSize::new(width, height),
                log: log.clone(),
                fail_create: false,
                fail_destroy: false,
            }
        }
    }

    pub struct RecordingContext {
        size: SurfaceSize,
        log: CallLog,
        fail_destroy: bool,
    }

    impl Drawable for RecordingSurface {
        type Context = RecordingContext;

        fn create_context(self) -> PipelineResult<RecordingContext> {
            if self.fail_create {
                return Err(PipelineError::ContextCreationFailure(
                    "no display".to_string(),
                ));
            }
            Ok(RecordingContext {
                size: self.size,
                log: self.log,
                fail_destroy: self.fail_destroy,
            })
        }
    }

    impl GraphicsContext for RecordingContext {
        fn surface_size(&self) -> SurfaceSize {
            self.size
        }

        fn resize(&mut self, size: SurfaceSize) -> PipelineResult<()> {
            self.size = size;
            self.log.record(Call::Resize(size));
            Ok(())
        }

        fn clear(&mut self, _color: [f32; 4]) {
            self.log.record(Call::Clear);
        }

        fn upload_texture(&mut self, frame: &ProcessedFrame) -> PipelineResult<()> {
            self.log.record(Call::Upload(frame.sequence));
            Ok(())
        }

        fn draw_quad(&mut self, geometry: &QuadGeometry) -> PipelineResult<()> {
            self.log.record(Call::Draw(*geometry));
            Ok(())
        }

        fn present(&mut self) -> PipelineResult<()> {
            self.log.record(Call::Present);
            // Stand-in for vsync so tests don't spin a core
            std::thread::sleep(std::time::Duration::from_millis(1));
            Ok(())
        }

        fn destroy(self) -> PipelineResult<()> {
            self.log.record(Call::Destroy);
            if self.fail_destroy {
                return Err(PipelineError::RenderFailure("device lost".to_string()));
            }
            Ok(())
        }
    }
}
