// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera producing a moving test pattern
//!
//! Frames are YUV 4:2:0 planar with rows padded to
//! [`SYNTHETIC_ROW_ALIGNMENT`] bytes, matching what phone camera HALs hand
//! out, so the whole pipeline can run without hardware.

use super::frame_loop::{LoopAction, LoopController};
use super::pool::BufferPool;
use super::types::{CaptureResult, PixelLayout, Plane, RawCaptureFrame};
use super::{CaptureDriver, FrameCallback};
use crate::constants::{CAPTURE_BUFFER_COUNT, SYNTHETIC_ROW_ALIGNMENT};
use crate::errors::CaptureError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Value written into row padding; never a valid part of the picture
pub const PADDING_FILL: u8 = 0xAB;

pub struct SyntheticCamera {
    width: u32,
    height: u32,
    fps: u32,
    controller: Option<LoopController>,
}

struct SyntheticState {
    width: u32,
    height: u32,
    pool: Arc<BufferPool>,
    on_frame: FrameCallback,
    frame_index: u64,
    interval: Duration,
    next_frame_at: Instant,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps: fps.max(1),
            controller: None,
        }
    }

    /// Row stride of the luma plane
    pub fn luma_stride(width: u32) -> usize {
        (width as usize).next_multiple_of(SYNTHETIC_ROW_ALIGNMENT)
    }

    /// Row stride of each chroma plane
    pub fn chroma_stride(width: u32) -> usize {
        (width as usize).div_ceil(2).next_multiple_of(SYNTHETIC_ROW_ALIGNMENT)
    }

    fn allocate_planes(width: u32, height: u32) -> Vec<Plane> {
        let luma_stride = Self::luma_stride(width);
        let chroma_stride = Self::chroma_stride(width);
        let chroma_rows = (height as usize).div_ceil(2);
        vec![
            Plane::new(vec![PADDING_FILL; luma_stride * height as usize], luma_stride),
            Plane::new(vec![128; chroma_stride * chroma_rows], chroma_stride),
            Plane::new(vec![128; chroma_stride * chroma_rows], chroma_stride),
        ]
    }
}

/// Draw a diagonal gradient with a bright box sweeping across it
fn fill_test_pattern(luma: &mut Plane, width: u32, height: u32, frame_index: u64) {
    let w = width as usize;
    let h = height as usize;
    let box_size = (w.min(h) / 4).max(1);
    let travel = w.saturating_sub(box_size).max(1);
    let box_x = (frame_index as usize * 4) % travel;
    let box_y = h.saturating_sub(box_size) / 2;
    let shift = (frame_index % 256) as usize;

    for y in 0..h {
        let row = &mut luma.data[y * luma.stride..y * luma.stride + w];
        for (x, pixel) in row.iter_mut().enumerate() {
            let in_box = x >= box_x && x < box_x + box_size && y >= box_y && y < box_y + box_size;
            *pixel = if in_box {
                235
            } else {
                (((x + y + shift) % 256) / 2 + 16) as u8
            };
        }
    }
}

impl SyntheticState {
    fn step(&mut self) -> LoopAction {
        let now = Instant::now();
        if now < self.next_frame_at {
            std::thread::sleep((self.next_frame_at - now).min(Duration::from_millis(5)));
            return LoopAction::Continue;
        }
        self.next_frame_at += self.interval;
        // Fell behind (e.g. a slow consumer): resynchronize instead of bursting
        if self.next_frame_at < now {
            self.next_frame_at = now + self.interval;
        }

        let Some(mut planes) = self.pool.acquire() else {
            debug!("All capture buffers on loan, skipping frame");
            return LoopAction::Continue;
        };
        fill_test_pattern(&mut planes[0], self.width, self.height, self.frame_index);
        self.frame_index += 1;

        let frame = RawCaptureFrame::new(self.width, self.height, PixelLayout::Yuv420Planar, planes)
            .with_release(self.pool.release_hook());
        (self.on_frame)(frame);
        LoopAction::Continue
    }
}

impl CaptureDriver for SyntheticCamera {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn start(&mut self, on_frame: FrameCallback) -> CaptureResult<()> {
        if self.controller.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::FormatNotSupported(format!(
                "{}x{}",
                self.width, self.height
            )));
        }

        info!(
            width = self.width,
            height = self.height,
            fps = self.fps,
            "Starting synthetic camera"
        );

        let (width, height) = (self.width, self.height);
        let interval = Duration::from_secs_f64(1.0 / self.fps as f64);
        let controller = LoopController::start_with_init(
            "synthetic-capture",
            move || {
                let pool = BufferPool::new(CAPTURE_BUFFER_COUNT, || {
                    SyntheticCamera::allocate_planes(width, height)
                });
                Ok(SyntheticState {
                    width,
                    height,
                    pool,
                    on_frame,
                    frame_index: 0,
                    interval,
                    next_frame_at: Instant::now(),
                })
            },
            SyntheticState::step,
        );
        self.controller = Some(controller);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            info!("Stopping synthetic camera");
            controller.stop();
        }
    }

    fn is_running(&self) -> bool {
        self.controller
            .as_ref()
            .map(LoopController::is_running)
            .unwrap_or(false)
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.stop();
    }
}
