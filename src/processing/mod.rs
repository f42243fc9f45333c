// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame processing on the capture thread
//!
//! The [`ProcessingInvoker`] receives every raw frame from the capture
//! driver, extracts its luma plane, gives the frame back, runs the
//! [`FrameTransform`] and publishes the RGBA result into the
//! [`FrameStore`]. Failures drop the frame and are reported to the
//! [`StatsSink`]; the next frame is processed normally.

pub mod edges;
pub mod luma;
pub mod transform;

pub use edges::EdgeDetector;
pub use transform::{EdgeToggle, FrameTransform, Passthrough};

use crate::backends::camera::{FrameCallback, RawCaptureFrame};
use crate::errors::{PipelineError, PipelineResult};
use crate::frame_store::FrameStore;
use crate::stats::{FpsCounter, FrameStats, StatsSink};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Drives one [`FrameTransform`] over the frames of one capture session
pub struct ProcessingInvoker<T: FrameTransform> {
    transform: T,
    width: u32,
    height: u32,
    luma: Vec<u8>,
    rgba: Vec<u8>,
    store: Arc<FrameStore>,
    running: Arc<AtomicBool>,
    sink: Arc<dyn StatsSink>,
    fps: FpsCounter,
    last_latency_ms: f32,
    published: u64,
}

impl<T: FrameTransform> ProcessingInvoker<T> {
    /// Configure `transform` for `width x height` and allocate the buffers
    pub fn new(
        mut transform: T,
        width: u32,
        height: u32,
        store: Arc<FrameStore>,
        running: Arc<AtomicBool>,
        sink: Arc<dyn StatsSink>,
        stats_interval: Duration,
    ) -> PipelineResult<Self> {
        transform.configure(width, height)?;
        let pixels = width as usize * height as usize;
        Ok(Self {
            transform,
            width,
            height,
            luma: vec![0; pixels],
            rgba: vec![0; pixels * 4],
            store,
            running,
            sink,
            fps: FpsCounter::new(stats_interval),
            last_latency_ms: 0.0,
            published: 0,
        })
    }

    /// Process one raw frame
    ///
    /// The frame is released on every path, before the transform runs.
    pub fn handle(&mut self, frame: RawCaptureFrame) {
        let extracted = self.extract(&frame);
        frame.release();

        match extracted.and_then(|()| self.transform_and_publish()) {
            Ok(Some(sequence)) => self.after_publish(sequence),
            Ok(None) => {}
            Err(e) => self.sink.report_error(&e),
        }
    }

    /// Frames published by this invoker
    pub fn published_frames(&self) -> u64 {
        self.published
    }

    fn extract(&mut self, frame: &RawCaptureFrame) -> PipelineResult<()> {
        if frame.width != self.width || frame.height != self.height {
            return Err(PipelineError::InvalidFrame(format!(
                "got {}x{} frame, configured for {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        luma::extract_luma(frame, &mut self.luma)
    }

    fn transform_and_publish(&mut self) -> PipelineResult<Option<u64>> {
        let started = Instant::now();
        let reported_ms = self.transform.transform(&self.luma, &mut self.rgba)?;
        let latency_ms = started.elapsed().as_secs_f32() * 1000.0;
        trace!(reported_ms, latency_ms, "Frame transformed");
        self.last_latency_ms = latency_ms;

        // A stop requested mid-transform wins: nothing is published after it
        if !self.running.load(Ordering::SeqCst) {
            debug!("Pipeline stopping, discarding processed frame");
            return Ok(None);
        }

        let sequence = self.store.publish(
            Arc::from(self.rgba.as_slice()),
            self.width,
            self.height,
            latency_ms,
        );
        Ok(Some(sequence))
    }

    fn after_publish(&mut self, sequence: u64) {
        self.published += 1;
        trace!(sequence, "Frame published");
        let Some(fps) = self.fps.tick(Instant::now()) else {
            return;
        };
        self.sink.report_stats(&FrameStats {
            fps,
            processing_latency_ms: self.last_latency_ms,
            width: self.width,
            height: self.height,
            dropped_frames: self.store.dropped_frames(),
        });
    }
}

impl<T: FrameTransform + 'static> ProcessingInvoker<T> {
    /// Turn the invoker into a driver callback
    pub fn into_callback(mut self) -> FrameCallback {
        Box::new(move |frame| self.handle(frame))
    }
}
