// SPDX-License-Identifier: GPL-3.0-only

//! Test doubles shared by the integration tests

#![allow(dead_code)]

use edge_viewer::backends::camera::{
    CaptureDriver, CaptureResult, FrameCallback, PixelLayout, Plane, RawCaptureFrame,
};
use edge_viewer::render::{Drawable, GraphicsContext, SurfaceSize};
use edge_viewer::{PipelineResult, ProcessedFrame, QuadGeometry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

/// Uniform gray frame with two bytes of row padding
pub fn gray_frame(width: u32, height: u32, value: u8) -> RawCaptureFrame {
    let stride = width as usize + 2;
    let data = vec![value; stride * height as usize];
    RawCaptureFrame::new(width, height, PixelLayout::Gray8, vec![Plane::new(data, stride)])
}

/// Driver that delivers whatever frames the test sends it
pub struct ScriptedDriver {
    frames: Option<Receiver<RawCaptureFrame>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ScriptedDriver {
    pub fn new(frames: Receiver<RawCaptureFrame>) -> Self {
        Self {
            frames: Some(frames),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl CaptureDriver for ScriptedDriver {
    fn name(&self) -> &str {
        "scripted"
    }

    fn start(&mut self, mut on_frame: FrameCallback) -> CaptureResult<()> {
        let frames = self.frames.take().expect("scripted driver started twice");
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);
        self.handle = Some(std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                match frames.recv_timeout(Duration::from_millis(5)) {
                    Ok(frame) => on_frame(frame),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().expect("scripted driver thread panicked");
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// What a [`RecorderContext`] saw: uploads as (sequence, first RGBA pixel)
#[derive(Debug, Default)]
pub struct Recorder {
    pub uploads: Mutex<Vec<(u64, [u8; 4])>>,
    pub presents: Mutex<u64>,
    pub destroyed: Mutex<u64>,
}

impl Recorder {
    pub fn uploads(&self) -> Vec<(u64, [u8; 4])> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn presents(&self) -> u64 {
        *self.presents.lock().unwrap()
    }

    pub fn destroyed(&self) -> u64 {
        *self.destroyed.lock().unwrap()
    }
}

pub struct RecorderSurface {
    pub size: SurfaceSize,
    pub recorder: Arc<Recorder>,
}

pub struct RecorderContext {
    size: SurfaceSize,
    recorder: Arc<Recorder>,
}

impl Drawable for RecorderSurface {
    type Context = RecorderContext;

    fn create_context(self) -> PipelineResult<RecorderContext> {
        Ok(RecorderContext {
            size: self.size,
            recorder: self.recorder,
        })
    }
}

impl GraphicsContext for RecorderContext {
    fn surface_size(&self) -> SurfaceSize {
        self.size
    }

    fn resize(&mut self, size: SurfaceSize) -> PipelineResult<()> {
        self.size = size;
        Ok(())
    }

    fn clear(&mut self, _color: [f32; 4]) {}

    fn upload_texture(&mut self, frame: &ProcessedFrame) -> PipelineResult<()> {
        let first = [frame.pixels[0], frame.pixels[1], frame.pixels[2], frame.pixels[3]];
        assert!(frame.pixels.chunks_exact(4).all(|px| px == first));
        self.recorder.uploads.lock().unwrap().push((frame.sequence, first));
        Ok(())
    }

    fn draw_quad(&mut self, _geometry: &QuadGeometry) -> PipelineResult<()> {
        Ok(())
    }

    fn present(&mut self) -> PipelineResult<()> {
        *self.recorder.presents.lock().unwrap() += 1;
        std::thread::sleep(Duration::from_millis(1));
        Ok(())
    }

    fn destroy(self) -> PipelineResult<()> {
        *self.recorder.destroyed.lock().unwrap() += 1;
        Ok(())
    }
}
