// SPDX-License-Identifier: GPL-3.0-only

//! Canny-style edge detection on an 8-bit luma image
//!
//! Sobel gradients with an L1 magnitude, non-maximum suppression along the
//! quantized gradient direction, then hysteresis between a low and a high
//! threshold. Edge pixels come out white, everything else black, always
//! opaque. The one-pixel border never carries an edge.

use super::transform::{FrameDims, FrameTransform, elapsed_ms};
use crate::constants::{DEFAULT_EDGE_HIGH_THRESHOLD, DEFAULT_EDGE_LOW_THRESHOLD};
use crate::errors::TransformError;
use std::time::Instant;

const NOT_EDGE: u8 = 0;
const WEAK: u8 = 1;
const EDGE: u8 = 2;

/// Gradient direction, quantized to the neighbor pair it is compared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Direction {
    /// Left and right
    #[default]
    Horizontal,
    /// Up-left and down-right
    Diagonal,
    /// Up and down
    Vertical,
    /// Up-right and down-left
    AntiDiagonal,
}

impl Direction {
    /// Quantize `(gx, gy)` to one of four sectors (tan 22.5° ≈ 0.4142)
    fn from_gradient(gx: i32, gy: i32) -> Self {
        let ax = gx.abs();
        let ay = gy.abs();
        if ay * 10_000 <= ax * 4_142 {
            Direction::Horizontal
        } else if ay * 4_142 >= ax * 10_000 {
            Direction::Vertical
        } else if (gx > 0) == (gy > 0) {
            Direction::Diagonal
        } else {
            Direction::AntiDiagonal
        }
    }

    /// Index offsets of the two neighbors along the gradient
    fn neighbor_offsets(self, width: isize) -> (isize, isize) {
        match self {
            Direction::Horizontal => (-1, 1),
            Direction::Diagonal => (-width - 1, width + 1),
            Direction::Vertical => (-width, width),
            Direction::AntiDiagonal => (-width + 1, width - 1),
        }
    }
}

/// Edge detector with its scratch buffers
#[derive(Debug)]
pub struct EdgeDetector {
    low_threshold: u16,
    high_threshold: u16,
    dims: Option<FrameDims>,
    magnitude: Vec<u16>,
    direction: Vec<Direction>,
    state: Vec<u8>,
    stack: Vec<usize>,
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_EDGE_LOW_THRESHOLD, DEFAULT_EDGE_HIGH_THRESHOLD)
    }
}

impl EdgeDetector {
    /// Create a detector; thresholds are on the L1 gradient magnitude
    pub fn new(low_threshold: u16, high_threshold: u16) -> Self {
        Self {
            low_threshold: low_threshold.min(high_threshold),
            high_threshold: high_threshold.max(low_threshold),
            dims: None,
            magnitude: Vec::new(),
            direction: Vec::new(),
            state: Vec::new(),
            stack: Vec::new(),
        }
    }

    pub fn thresholds(&self) -> (u16, u16) {
        (self.low_threshold, self.high_threshold)
    }

    fn compute_gradients(&mut self, input: &[u8], dims: FrameDims) {
        let w = dims.width;
        self.magnitude.fill(0);
        if w < 3 || dims.height < 3 {
            return;
        }
        let px = |x: usize, y: usize| input[y * w + x] as i32;

        for y in 1..dims.height - 1 {
            for x in 1..w - 1 {
                let gx = (px(x + 1, y - 1) + 2 * px(x + 1, y) + px(x + 1, y + 1))
                    - (px(x - 1, y - 1) + 2 * px(x - 1, y) + px(x - 1, y + 1));
                let gy = (px(x - 1, y + 1) + 2 * px(x, y + 1) + px(x + 1, y + 1))
                    - (px(x - 1, y - 1) + 2 * px(x, y - 1) + px(x + 1, y - 1));
                let i = y * w + x;
                self.magnitude[i] = (gx.abs() + gy.abs()) as u16;
                self.direction[i] = Direction::from_gradient(gx, gy);
            }
        }
    }

    /// Keep local maxima along the gradient and classify them
    fn suppress_non_maxima(&mut self, dims: FrameDims) {
        let w = dims.width;
        self.state.fill(NOT_EDGE);
        self.stack.clear();
        if w < 3 || dims.height < 3 {
            return;
        }

        for y in 1..dims.height - 1 {
            for x in 1..w - 1 {
                let i = y * w + x;
                let m = self.magnitude[i];
                if m <= self.low_threshold {
                    continue;
                }
                let (before, after) = self.direction[i].neighbor_offsets(w as isize);
                let n1 = self.magnitude[i.wrapping_add_signed(before)];
                let n2 = self.magnitude[i.wrapping_add_signed(after)];
                // Ties go to the first pixel along the gradient so plateaus stay one pixel wide
                if m > n1 && m >= n2 {
                    if m > self.high_threshold {
                        self.state[i] = EDGE;
                        self.stack.push(i);
                    } else {
                        self.state[i] = WEAK;
                    }
                }
            }
        }
    }

    fn trace_hysteresis(&mut self, dims: FrameDims) {
        trace_connected(&mut self.state, &mut self.stack, dims.width, dims.height);
    }
}

/// Promote weak pixels 8-connected to an edge pixel
///
/// `stack` must hold the indices of all pixels already marked as edges.
fn trace_connected(state: &mut [u8], stack: &mut Vec<usize>, width: usize, height: usize) {
    while let Some(i) = stack.pop() {
        let x = i % width;
        let y = i / width;
        for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                let n = ny * width + nx;
                if state[n] == WEAK {
                    state[n] = EDGE;
                    stack.push(n);
                }
            }
        }
    }
}

impl FrameTransform for EdgeDetector {
    fn configure(&mut self, width: u32, height: u32) -> Result<(), TransformError> {
        let dims = FrameDims::new(width, height)?;
        let count = dims.pixel_count();
        self.magnitude = vec![0; count];
        self.direction = vec![Direction::default(); count];
        self.state = vec![NOT_EDGE; count];
        self.stack = Vec::with_capacity(count / 8);
        self.dims = Some(dims);
        Ok(())
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8]) -> Result<f32, TransformError> {
        let started = Instant::now();
        let dims = self.dims.ok_or(TransformError::NotConfigured)?;
        dims.check(input, output)?;

        self.compute_gradients(input, dims);
        self.suppress_non_maxima(dims);
        self.trace_hysteresis(dims);

        for (rgba, &state) in output.chunks_exact_mut(4).zip(&self.state) {
            let value = if state == EDGE { 255 } else { 0 };
            rgba.copy_from_slice(&[value, value, value, 255]);
        }

        Ok(elapsed_ms(started))
    }
}
