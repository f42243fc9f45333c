// SPDX-License-Identifier: GPL-3.0-only

//! Capture driver abstraction
//!
//! A capture driver delivers [`RawCaptureFrame`]s on its own thread through a
//! callback. Frames are on loan: the driver gets them back when the consumer
//! releases or drops them, which is how it bounds the number of buffers in
//! flight.
//!
//! ```text
//! ┌──────────────────┐   callback    ┌────────────────────┐
//! │  CaptureDriver   │ ────────────▶ │ ProcessingInvoker  │
//! │ (driver thread)  │ ◀──────────── │                    │
//! └──────────────────┘    release    └────────────────────┘
//! ```

pub mod frame_loop;
pub mod pool;
pub mod synthetic;
pub mod types;
#[cfg(target_os = "linux")]
pub mod v4l2;

pub use frame_loop::{LoopAction, LoopController};
pub use pool::BufferPool;
pub use synthetic::SyntheticCamera;
pub use types::*;
#[cfg(target_os = "linux")]
pub use v4l2::V4l2Camera;

use crate::config::{CaptureSource, Config};
use crate::errors::CaptureError;

/// Callback invoked once per delivered frame, on the driver's thread
pub type FrameCallback = Box<dyn FnMut(RawCaptureFrame) + Send>;

/// A source of raw camera frames
pub trait CaptureDriver: Send {
    /// Human-readable driver name for logging
    fn name(&self) -> &str;

    /// Start delivering frames to `on_frame`
    ///
    /// Fails with [`CaptureError::DeviceNotFound`] when there is no backing
    /// device; in that case no frames are ever delivered.
    fn start(&mut self, on_frame: FrameCallback) -> CaptureResult<()>;

    /// Stop delivering frames and join the driver thread
    ///
    /// The callback may still run while this call is in progress.
    fn stop(&mut self);

    /// Whether the driver thread is delivering frames
    fn is_running(&self) -> bool;
}

/// Create the driver selected by the configuration
pub fn create_driver(config: &Config) -> CaptureResult<Box<dyn CaptureDriver>> {
    match &config.source {
        CaptureSource::Synthetic => Ok(Box::new(SyntheticCamera::new(
            config.capture_width,
            config.capture_height,
            config.synthetic_fps,
        ))),
        #[cfg(target_os = "linux")]
        CaptureSource::V4l2 { path } => Ok(Box::new(V4l2Camera::new(
            path,
            config.capture_width,
            config.capture_height,
        ))),
        #[cfg(not(target_os = "linux"))]
        CaptureSource::V4l2 { path } => Err(CaptureError::DeviceNotFound(format!(
            "{}: V4L2 is only available on Linux",
            path
        ))),
        CaptureSource::Disabled => Err(CaptureError::DeviceNotFound(
            "capture source disabled in configuration".to_string(),
        )),
    }
}
