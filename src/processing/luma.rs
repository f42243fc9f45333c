// SPDX-License-Identifier: GPL-3.0-only
//! Luma extraction from raw capture frames
//!
//! Converts the brightness component of a raw frame into a row-packed
//! `width * height` buffer. Row stride is always honored: padding bytes at
//! the end of each row are skipped and never read as pixels.

use crate::backends::camera::types::{PixelLayout, RawCaptureFrame};
use crate::errors::{PipelineError, PipelineResult};

/// Copy the luma plane of `frame` into `dst`
///
/// `dst` must be exactly `width * height` bytes. For each row at most
/// `stride` bytes are consumed from the source plane, of which only the
/// first `width` luma samples are kept. The last row may be shorter than
/// `stride` (camera HALs often omit its padding).
pub fn extract_luma(frame: &RawCaptureFrame, dst: &mut [u8]) -> PipelineResult<()> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidFrame(format!(
            "empty frame {}x{}",
            width, height
        )));
    }
    if dst.len() != width * height {
        return Err(PipelineError::InvalidFrame(format!(
            "destination holds {} bytes, frame needs {}",
            dst.len(),
            width * height
        )));
    }

    let plane = frame
        .plane(0)
        .ok_or_else(|| PipelineError::InvalidFrame("frame has no planes".to_string()))?;
    let bytes_per_pixel = frame.layout.luma_bytes_per_pixel();
    let row_bytes = width * bytes_per_pixel;
    if plane.stride < row_bytes {
        return Err(PipelineError::InvalidFrame(format!(
            "stride {} is smaller than a {} row of {} pixels",
            plane.stride, frame.layout, width
        )));
    }

    let mut offset = 0;
    for (row, out) in dst.chunks_exact_mut(width).enumerate() {
        let available = plane.data.len().saturating_sub(offset);
        let bytes_to_read = plane.stride.min(available);
        if bytes_to_read < row_bytes {
            return Err(PipelineError::InvalidFrame(format!(
                "luma plane truncated at row {} ({} of {} bytes)",
                row, bytes_to_read, row_bytes
            )));
        }
        let src = &plane.data[offset..offset + row_bytes];

        match frame.layout {
            PixelLayout::Gray8 | PixelLayout::Yuv420Planar | PixelLayout::Nv12 => {
                out.copy_from_slice(src);
            }
            PixelLayout::Yuyv => {
                // Y0 U Y1 V: luma sits on even bytes
                for (pixel, pair) in out.iter_mut().zip(src.chunks_exact(2)) {
                    *pixel = pair[0];
                }
            }
        }

        offset += bytes_to_read;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::Plane;

    const SENTINEL: u8 = 0xEE;

    /// Plane whose pixels are `(row * width + col) % 200` and padding is the sentinel
    fn padded_plane(width: usize, height: usize, stride: usize, last_row_padded: bool) -> Plane {
        let mut data = Vec::new();
        for row in 0..height {
            for col in 0..width {
                data.push(((row * width + col) % 200) as u8);
            }
            if row + 1 < height || last_row_padded {
                data.extend(std::iter::repeat_n(SENTINEL, stride - width));
            }
        }
        Plane::new(data, stride)
    }

    #[test]
    fn test_stride_padding_is_discarded() {
        let (width, height, stride) = (10, 6, 16);
        let frame = RawCaptureFrame::new(
            width as u32,
            height as u32,
            PixelLayout::Yuv420Planar,
            vec![padded_plane(width, height, stride, true)],
        );
        let mut dst = vec![0u8; width * height];

        extract_luma(&frame, &mut dst).unwrap();

        assert!(!dst.contains(&SENTINEL));
        for (i, &value) in dst.iter().enumerate() {
            assert_eq!(value, (i % 200) as u8);
        }
    }

    #[test]
    fn test_last_row_without_padding() {
        let (width, height, stride) = (5, 3, 8);
        let frame = RawCaptureFrame::new(
            width as u32,
            height as u32,
            PixelLayout::Gray8,
            vec![padded_plane(width, height, stride, false)],
        );
        let mut dst = vec![0u8; width * height];

        extract_luma(&frame, &mut dst).unwrap();
        assert!(!dst.contains(&SENTINEL));
        assert_eq!(dst[width * 2..], [10, 11, 12, 13, 14]);
    }

    #[test]
    fn test_yuyv_takes_even_bytes() {
        // 2x2 frame, stride 6 (4 bytes of pixels + 2 padding)
        let data = vec![
            10, 128, 20, 128, SENTINEL, SENTINEL, //
            30, 128, 40, 128, SENTINEL, SENTINEL,
        ];
        let frame = RawCaptureFrame::new(2, 2, PixelLayout::Yuyv, vec![Plane::new(data, 6)]);
        let mut dst = vec![0u8; 4];

        extract_luma(&frame, &mut dst).unwrap();
        assert_eq!(dst, [10, 20, 30, 40]);
    }

    #[test]
    fn test_truncated_plane_is_rejected() {
        let frame = RawCaptureFrame::new(4, 3, PixelLayout::Gray8, vec![Plane::new(vec![1; 10], 4)]);
        let mut dst = vec![0u8; 12];
        assert!(matches!(
            extract_luma(&frame, &mut dst),
            Err(PipelineError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_stride_smaller_than_row_is_rejected() {
        let frame = RawCaptureFrame::new(4, 2, PixelLayout::Yuyv, vec![Plane::new(vec![0; 16], 4)]);
        let mut dst = vec![0u8; 8];
        assert!(extract_luma(&frame, &mut dst).is_err());
    }

    #[test]
    fn test_destination_size_must_match() {
        let frame = RawCaptureFrame::new(4, 2, PixelLayout::Gray8, vec![Plane::new(vec![0; 8], 4)]);
        let mut dst = vec![0u8; 9];
        assert!(extract_luma(&frame, &mut dst).is_err());
    }
}
