// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for capture drivers

use crate::errors::CaptureError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Result type alias for capture drivers
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Pixel layout of a raw capture frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelLayout {
    /// Single 8-bit luma plane
    Gray8,
    /// YUV 4:2:0 with separate Y, U and V planes (Android YUV_420_888, I420)
    Yuv420Planar,
    /// YUV 4:2:0 with a Y plane and an interleaved UV plane
    Nv12,
    /// Packed YUV 4:2:2: Y0 U Y1 V
    Yuyv,
}

impl PixelLayout {
    /// Bytes of luma-carrying data per pixel in the first plane
    pub fn luma_bytes_per_pixel(&self) -> usize {
        match self {
            PixelLayout::Gray8 | PixelLayout::Yuv420Planar | PixelLayout::Nv12 => 1,
            PixelLayout::Yuyv => 2,
        }
    }

    /// Number of planes a well-formed frame carries
    pub fn plane_count(&self) -> usize {
        match self {
            PixelLayout::Gray8 | PixelLayout::Yuyv => 1,
            PixelLayout::Nv12 => 2,
            PixelLayout::Yuv420Planar => 3,
        }
    }
}

impl fmt::Display for PixelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelLayout::Gray8 => write!(f, "GRAY8"),
            PixelLayout::Yuv420Planar => write!(f, "I420"),
            PixelLayout::Nv12 => write!(f, "NV12"),
            PixelLayout::Yuyv => write!(f, "YUYV"),
        }
    }
}

/// One image plane: its bytes and the row stride in bytes
#[derive(Debug, Clone, Default)]
pub struct Plane {
    pub data: Vec<u8>,
    /// Bytes per row, may exceed the logical row width
    pub stride: usize,
}

impl Plane {
    pub fn new(data: Vec<u8>, stride: usize) -> Self {
        Self { data, stride }
    }
}

/// Hook that hands a frame's planes back to the driver that produced them
pub type ReleaseHook = Box<dyn FnOnce(Vec<Plane>) + Send>;

/// A frame as delivered by a capture driver
///
/// The frame is on loan from the driver. It is returned exactly once, either
/// through [`RawCaptureFrame::release`] or when the frame is dropped, so every
/// exit path of a consumer gives it back.
pub struct RawCaptureFrame {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    planes: Vec<Plane>,
    pub captured_at: Instant,
    release: Option<ReleaseHook>,
}

impl RawCaptureFrame {
    /// Create a frame that owns its planes outright
    pub fn new(width: u32, height: u32, layout: PixelLayout, planes: Vec<Plane>) -> Self {
        Self {
            width,
            height,
            layout,
            planes,
            captured_at: Instant::now(),
            release: None,
        }
    }

    /// Attach a hook that runs when the frame is released
    pub fn with_release(mut self, hook: ReleaseHook) -> Self {
        self.release = Some(hook);
        self
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn plane(&self, index: usize) -> Option<&Plane> {
        self.planes.get(index)
    }

    /// Give the frame back to its driver
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for RawCaptureFrame {
    fn drop(&mut self) {
        if let Some(hook) = self.release.take() {
            hook(std::mem::take(&mut self.planes));
        }
    }
}

impl fmt::Debug for RawCaptureFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCaptureFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field(
                "strides",
                &self.planes.iter().map(|p| p.stride).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_release_runs_once_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let frame = RawCaptureFrame::new(2, 2, PixelLayout::Gray8, vec![Plane::new(vec![0; 4], 2)])
            .with_release(Box::new(move |planes| {
                assert_eq!(planes.len(), 1);
                counter.fetch_add(1, Ordering::SeqCst);
            }));

        frame.release();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_plane_counts() {
        assert_eq!(PixelLayout::Yuv420Planar.plane_count(), 3);
        assert_eq!(PixelLayout::Yuyv.luma_bytes_per_pixel(), 2);
        assert_eq!(PixelLayout::Nv12.to_string(), "NV12");
    }
}
