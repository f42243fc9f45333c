// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 capture
//!
//! Opens a `/dev/video*` node with the v4l crate, negotiates packed YUYV at
//! the requested size and streams memory-mapped buffers on a dedicated
//! thread. Each buffer is copied into a pooled frame so the mmap slot can be
//! requeued immediately.

use super::pool::BufferPool;
use super::types::{CaptureResult, PixelLayout, Plane, RawCaptureFrame};
use super::{CaptureDriver, FrameCallback};
use crate::constants::{
    CAPTURE_BUFFER_COUNT, V4L2_BUFFER_COUNT, V4L2_MAX_CONSECUTIVE_ERRORS, V4L2_RETRY_DELAY,
};
use crate::errors::CaptureError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

pub struct V4l2Camera {
    path: String,
    width: u32,
    height: u32,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl V4l2Camera {
    pub fn new(path: &str, width: u32, height: u32) -> Self {
        Self {
            path: path.to_string(),
            width,
            height,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Open the device and negotiate YUYV at the configured size
    fn open(&self) -> CaptureResult<(Device, Format)> {
        let dev = Device::with_path(&self.path)
            .map_err(|e| CaptureError::DeviceNotFound(format!("{}: {}", self.path, e)))?;

        let yuyv = FourCC::new(b"YUYV");
        let requested = Format::new(self.width, self.height, yuyv);
        let actual = dev
            .set_format(&requested)
            .map_err(|e| CaptureError::Io(format!("Failed to set format: {}", e)))?;

        info!(
            path = %self.path,
            width = actual.width,
            height = actual.height,
            stride = actual.stride,
            fourcc = ?actual.fourcc,
            "V4L2 format configured"
        );

        if actual.fourcc != yuyv {
            return Err(CaptureError::FormatNotSupported(format!(
                "{} does not support YUYV (got {:?})",
                self.path, actual.fourcc
            )));
        }
        if actual.width != self.width || actual.height != self.height {
            return Err(CaptureError::FormatNotSupported(format!(
                "{} offers {}x{} instead of {}x{}",
                self.path, actual.width, actual.height, self.width, self.height
            )));
        }

        Ok((dev, actual))
    }
}

impl CaptureDriver for V4l2Camera {
    fn name(&self) -> &str {
        "v4l2"
    }

    fn start(&mut self, on_frame: FrameCallback) -> CaptureResult<()> {
        if self.thread_handle.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }

        let (dev, format) = self.open()?;
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let path = self.path.clone();

        let handle = std::thread::Builder::new()
            .name("v4l2-capture".to_string())
            .spawn(move || {
                if let Err(e) = capture_loop(dev, format, on_frame, running) {
                    error!(path = %path, error = %e, "V4L2 capture loop failed");
                }
            })
            .map_err(|e| CaptureError::Io(format!("Failed to spawn capture thread: {}", e)))?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            info!(path = %self.path, "Stopping V4L2 capture");
            match handle.join() {
                Ok(_) => debug!("V4L2 capture thread stopped"),
                Err(_) => warn!("V4L2 capture thread panicked"),
            }
        }
    }

    fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for V4l2Camera {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run of consecutive dequeue failures
#[derive(Debug, Default)]
struct ErrorStreak {
    count: u32,
}

impl ErrorStreak {
    /// Count one failure; true once the device should be given up on
    fn fail(&mut self) -> bool {
        self.count += 1;
        self.count >= V4L2_MAX_CONSECUTIVE_ERRORS
    }

    fn reset(&mut self) {
        if self.count > 0 {
            debug!(failures = self.count, "V4L2 capture recovered");
        }
        self.count = 0;
    }
}

/// Capture loop running on the driver thread
fn capture_loop(
    dev: Device,
    format: Format,
    mut on_frame: FrameCallback,
    running: Arc<AtomicBool>,
) -> CaptureResult<()> {
    let stride = (format.stride as usize).max(format.width as usize * 2);
    let frame_size = stride * format.height as usize;
    let pool = BufferPool::new(CAPTURE_BUFFER_COUNT, || {
        vec![Plane::new(vec![0; frame_size], stride)]
    });

    let mut stream = Stream::with_buffers(&dev, Type::VideoCapture, V4L2_BUFFER_COUNT)
        .map_err(|e| CaptureError::Io(format!("Failed to create stream: {}", e)))?;

    info!("V4L2 capture stream started");

    let mut errors = ErrorStreak::default();
    while running.load(Ordering::SeqCst) {
        let (buf, meta) = match stream.next() {
            Ok(frame) => {
                errors.reset();
                frame
            }
            Err(e) => {
                if errors.count == 0 {
                    warn!(error = %e, "Failed to capture frame");
                }
                if errors.fail() {
                    return Err(CaptureError::DeviceNotFound(format!(
                        "{} consecutive capture failures, last: {}",
                        errors.count, e
                    )));
                }
                std::thread::sleep(V4L2_RETRY_DELAY);
                continue;
            }
        };

        let Some(mut planes) = pool.acquire() else {
            debug!(sequence = meta.sequence, "All capture buffers on loan, skipping frame");
            continue;
        };

        // Drivers may report fewer bytes than stride * height for the last row
        let plane = &mut planes[0];
        let used = buf.len().min(plane.data.len());
        plane.data[..used].copy_from_slice(&buf[..used]);
        plane.data[used..].fill(0);

        let frame = RawCaptureFrame::new(format.width, format.height, PixelLayout::Yuyv, planes)
            .with_release(pool.release_hook());
        on_frame(frame);
    }

    info!("V4L2 capture loop stopped");
    Ok(())
}
