// SPDX-License-Identifier: GPL-3.0-only

//! Aspect-preserving quad geometry
//!
//! Maps a source image onto a drawable surface in normalized device
//! coordinates, shrinking one axis so the image is letterboxed or pillarboxed
//! and never cropped or stretched.

/// A single quad vertex as uploaded to the GPU vertex buffer
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    /// Position in normalized device coordinates (-1..1, +y up)
    pub position: [f32; 2],
    /// Texture coordinates (0..1, row 0 at the top)
    pub tex_coords: [f32; 2],
}

/// Centered quad covering the visible part of the surface
///
/// Vertices are in triangle-strip order: bottom-left, bottom-right,
/// top-left, top-right.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QuadGeometry {
    pub vertices: [QuadVertex; 4],
    /// Half-width of the quad in NDC
    pub x_scale: f32,
    /// Half-height of the quad in NDC
    pub y_scale: f32,
}

impl QuadGeometry {
    /// Quad with the given half extents
    pub fn with_scale(x_scale: f32, y_scale: f32) -> Self {
        let vertices = [
            QuadVertex {
                position: [-x_scale, -y_scale],
                tex_coords: [0.0, 1.0],
            },
            QuadVertex {
                position: [x_scale, -y_scale],
                tex_coords: [1.0, 1.0],
            },
            QuadVertex {
                position: [-x_scale, y_scale],
                tex_coords: [0.0, 0.0],
            },
            QuadVertex {
                position: [x_scale, y_scale],
                tex_coords: [1.0, 0.0],
            },
        ];
        Self {
            vertices,
            x_scale,
            y_scale,
        }
    }

    /// Quad covering the whole surface
    pub fn full_surface() -> Self {
        Self::with_scale(1.0, 1.0)
    }

    /// Texture coordinate at an NDC position, or `None` outside the quad
    pub fn uv_at(&self, ndc_x: f32, ndc_y: f32) -> Option<(f32, f32)> {
        if self.x_scale <= 0.0 || self.y_scale <= 0.0 {
            return None;
        }
        if ndc_x.abs() > self.x_scale || ndc_y.abs() > self.y_scale {
            return None;
        }
        let u = (ndc_x / self.x_scale + 1.0) * 0.5;
        let v = (1.0 - ndc_y / self.y_scale) * 0.5;
        Some((u.clamp(0.0, 1.0), v.clamp(0.0, 1.0)))
    }

    /// Raw vertex bytes for a vertex buffer upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

impl Default for QuadGeometry {
    fn default() -> Self {
        Self::full_surface()
    }
}

/// Compute the aspect-preserving quad for a source drawn on a surface
///
/// Returns `None` when any dimension is zero, in which case the ratios are
/// undefined and the caller should keep its previous geometry.
pub fn compute_quad(
    surface_width: u32,
    surface_height: u32,
    source_width: u32,
    source_height: u32,
) -> Option<QuadGeometry> {
    if surface_width == 0 || surface_height == 0 || source_width == 0 || source_height == 0 {
        return None;
    }

    let screen_ratio = surface_width as f64 / surface_height as f64;
    let image_ratio = source_width as f64 / source_height as f64;

    let (x_scale, y_scale) = if image_ratio > screen_ratio {
        // Image is wider than the surface: letterbox
        (1.0, screen_ratio / image_ratio)
    } else {
        // Image is taller (or equal): pillarbox
        (image_ratio / screen_ratio, 1.0)
    };

    Some(QuadGeometry::with_scale(x_scale as f32, y_scale as f32))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-4;

    /// Aspect ratio of the quad in surface pixels
    fn drawn_aspect(quad: &QuadGeometry, surface_width: u32, surface_height: u32) -> f64 {
        (quad.x_scale as f64 * surface_width as f64) / (quad.y_scale as f64 * surface_height as f64)
    }

    #[test]
    fn test_equal_ratios_fill_surface() {
        let quad = compute_quad(1280, 960, 640, 480).unwrap();
        assert_eq!(quad.x_scale, 1.0);
        assert_eq!(quad.y_scale, 1.0);
        assert_eq!(quad, QuadGeometry::full_surface());
    }

    #[test]
    fn test_wide_source_is_letterboxed() {
        // 16:9 source on a 4:3 surface
        let quad = compute_quad(800, 600, 1920, 1080).unwrap();
        assert_eq!(quad.x_scale, 1.0);
        assert!(quad.y_scale < 1.0);
        assert!((drawn_aspect(&quad, 800, 600) - 1920.0 / 1080.0).abs() < EPSILON);
    }

    #[test]
    fn test_tall_source_is_pillarboxed() {
        // Portrait phone surface with a landscape sensor rotated to 480x640
        let quad = compute_quad(1920, 1080, 480, 640).unwrap();
        assert_eq!(quad.y_scale, 1.0);
        assert!(quad.x_scale < 1.0);
        assert!((drawn_aspect(&quad, 1920, 1080) - 480.0 / 640.0).abs() < EPSILON);
    }

    #[test]
    fn test_scales_bounded_and_aspect_preserved_across_sizes() {
        let sizes = [1u32, 2, 3, 7, 64, 480, 640, 1080, 1920, 4096];
        for &sw in &sizes {
            for &sh in &sizes {
                for &iw in &sizes {
                    for &ih in &sizes {
                        let quad = compute_quad(sw, sh, iw, ih).unwrap();
                        assert!(quad.x_scale <= 1.0 && quad.x_scale > 0.0);
                        assert!(quad.y_scale <= 1.0 && quad.y_scale > 0.0);
                        assert!(quad.x_scale == 1.0 || quad.y_scale == 1.0);
                        let expected = iw as f64 / ih as f64;
                        let actual = drawn_aspect(&quad, sw, sh);
                        assert!(
                            ((actual - expected) / expected).abs() < EPSILON,
                            "surface {}x{} source {}x{}: aspect {} != {}",
                            sw,
                            sh,
                            iw,
                            ih,
                            actual,
                            expected
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_zero_dimensions_are_rejected() {
        assert!(compute_quad(640, 0, 640, 480).is_none());
        assert!(compute_quad(640, 480, 640, 0).is_none());
        assert!(compute_quad(0, 480, 640, 480).is_none());
    }

    #[test]
    fn test_uv_mapping() {
        let quad = QuadGeometry::with_scale(0.5, 1.0);
        assert_eq!(quad.uv_at(0.75, 0.0), None);
        let (u, v) = quad.uv_at(-0.5, 1.0).unwrap();
        assert!(u.abs() < 1e-6 && v.abs() < 1e-6);
        let (u, v) = quad.uv_at(0.0, 0.0).unwrap();
        assert!((u - 0.5).abs() < 1e-6 && (v - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_vertex_layout() {
        let quad = QuadGeometry::full_surface();
        assert_eq!(quad.as_bytes().len(), 4 * std::mem::size_of::<QuadVertex>());
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
    }
}
