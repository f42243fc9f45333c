// SPDX-License-Identifier: GPL-3.0-only

//! Edge Viewer - live camera edge detection with a dedicated render thread
//!
//! Frames flow one way through three threads that share nothing but a
//! single-slot [`FrameStore`]:
//!
//! ```text
//! capture thread                         render thread
//! ┌───────────────┐  ┌───────────────┐   ┌───────────────┐
//! │ CaptureDriver │─▶│  Processing-  │──▶│  FrameStore   │──▶ RenderLoop
//! │               │  │  Invoker      │   │ (latest only) │
//! └───────────────┘  └───────────────┘   └───────────────┘
//! ```
//!
//! # Architecture
//!
//! - [`backends`]: Capture drivers and the shared worker-thread controller
//! - [`processing`]: Luma extraction and the edge detector
//! - [`frame_store`]: Latest-frame exchange between capture and render
//! - [`render`]: Graphics contexts, render loop and surface lifecycle
//! - [`pipeline`]: Wires a capture driver to processing
//! - [`config`]: User configuration handling
//! - [`snapshot`]: PNG snapshots of processed frames
//! - [`terminal`]: Interactive terminal viewer

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod frame_store;
pub mod geometry;
pub mod pipeline;
pub mod processing;
pub mod render;
pub mod snapshot;
pub mod stats;
pub mod terminal;

// Re-export commonly used types
pub use config::{CaptureSource, Config};
pub use errors::{AppError, AppResult, PipelineError, PipelineResult, TransformError};
pub use frame_store::{FrameStore, ProcessedFrame};
pub use geometry::{QuadGeometry, compute_quad};
pub use pipeline::Pipeline;
pub use processing::{EdgeDetector, FrameTransform, ProcessingInvoker};
pub use render::{
    RenderLoop, RenderState, SurfaceLifecycleCoordinator, SurfaceSignal, SurfaceSize, WaitOutcome,
};
pub use stats::{FrameStats, SharedStatsSink, StatsSink, TracingStatsSink};
