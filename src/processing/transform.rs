// SPDX-License-Identifier: GPL-3.0-only

//! The frame transformation seam
//!
//! A [`FrameTransform`] turns a row-packed 8-bit luma image into a row-packed
//! RGBA image of the same size. It is configured once with the frame size and
//! then called for every frame with caller-owned buffers.

use super::edges::EdgeDetector;
use crate::errors::TransformError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Luma in, RGBA out
pub trait FrameTransform: Send {
    /// Prepare for frames of `width x height`; may be called again on resize
    fn configure(&mut self, width: u32, height: u32) -> Result<(), TransformError>;

    /// Transform `input` (`width * height` bytes) into `output`
    /// (`width * height * 4` bytes), returning the time spent in milliseconds
    fn transform(&mut self, input: &[u8], output: &mut [u8]) -> Result<f32, TransformError>;
}

impl<T: FrameTransform + ?Sized> FrameTransform for Box<T> {
    fn configure(&mut self, width: u32, height: u32) -> Result<(), TransformError> {
        (**self).configure(width, height)
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8]) -> Result<f32, TransformError> {
        (**self).transform(input, output)
    }
}

/// Configured frame size shared by the transforms in this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDims {
    pub width: usize,
    pub height: usize,
}

impl FrameDims {
    pub fn new(width: u32, height: u32) -> Result<Self, TransformError> {
        if width == 0 || height == 0 {
            return Err(TransformError::Failed(format!(
                "cannot configure for {}x{}",
                width, height
            )));
        }
        Ok(Self {
            width: width as usize,
            height: height as usize,
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Validate caller buffers against this size
    pub fn check(&self, input: &[u8], output: &[u8]) -> Result<(), TransformError> {
        let expected_input = self.pixel_count();
        let expected_output = expected_input * 4;
        if input.len() != expected_input || output.len() != expected_output {
            return Err(TransformError::DimensionMismatch {
                expected_input,
                expected_output,
                input: input.len(),
                output: output.len(),
            });
        }
        Ok(())
    }
}

/// Expand a luma buffer into opaque grey RGBA
pub fn gray_to_rgba(input: &[u8], output: &mut [u8]) {
    for (rgba, &value) in output.chunks_exact_mut(4).zip(input) {
        rgba.copy_from_slice(&[value, value, value, 255]);
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> f32 {
    started.elapsed().as_secs_f32() * 1000.0
}

/// Shows the camera image unprocessed, as grey
#[derive(Debug, Default)]
pub struct Passthrough {
    dims: Option<FrameDims>,
}

impl Passthrough {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameTransform for Passthrough {
    fn configure(&mut self, width: u32, height: u32) -> Result<(), TransformError> {
        self.dims = Some(FrameDims::new(width, height)?);
        Ok(())
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8]) -> Result<f32, TransformError> {
        let started = Instant::now();
        let dims = self.dims.ok_or(TransformError::NotConfigured)?;
        dims.check(input, output)?;
        gray_to_rgba(input, output);
        Ok(elapsed_ms(started))
    }
}

/// Switches between edge detection and passthrough at runtime
///
/// The flag is shared with the host so a key press can flip it while the
/// capture thread keeps calling `transform`.
#[derive(Debug)]
pub struct EdgeToggle {
    edges: EdgeDetector,
    raw: Passthrough,
    show_edges: Arc<AtomicBool>,
}

impl EdgeToggle {
    pub fn new(edges: EdgeDetector, show_edges: bool) -> Self {
        Self {
            edges,
            raw: Passthrough::new(),
            show_edges: Arc::new(AtomicBool::new(show_edges)),
        }
    }

    /// Handle for flipping the mode from another thread
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.show_edges)
    }
}

impl FrameTransform for EdgeToggle {
    fn configure(&mut self, width: u32, height: u32) -> Result<(), TransformError> {
        self.edges.configure(width, height)?;
        self.raw.configure(width, height)
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8]) -> Result<f32, TransformError> {
        if self.show_edges.load(Ordering::Relaxed) {
            self.edges.transform(input, output)
        } else {
            self.raw.transform(input, output)
        }
    }
}
