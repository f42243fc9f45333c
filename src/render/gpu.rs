// SPDX-License-Identifier: GPL-3.0-only

//! wgpu render-to-texture backend
//!
//! The drawable surface is an offscreen `Rgba8Unorm` texture. Presenting
//! submits the frame's commands and reads the target back into a
//! [`PresentedImage`], which headless runs and tests inspect.

use super::{Drawable, GraphicsContext, SurfaceSize};
use crate::errors::{PipelineError, PipelineResult};
use crate::frame_store::ProcessedFrame;
use crate::geometry::{QuadGeometry, QuadVertex};
use image::RgbaImage;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

/// The fixed quad shader
pub const QUAD_SHADER: &str = include_str!("quad_shader.wgsl");

/// Last image presented by a [`GpuContext`], shared with other threads
#[derive(Debug, Clone, Default)]
pub struct PresentedImage {
    image: Arc<Mutex<Option<RgbaImage>>>,
}

impl PresentedImage {
    pub fn latest(&self) -> Option<RgbaImage> {
        self.image
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, image: RgbaImage) {
        *self.image.lock().unwrap_or_else(PoisonError::into_inner) = Some(image);
    }
}

/// Offscreen surface; the device is created on the render thread
#[derive(Debug, Clone)]
pub struct GpuSurface {
    size: SurfaceSize,
    presented: PresentedImage,
}

impl GpuSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: SurfaceSize::new(width, height),
            presented: PresentedImage::default(),
        }
    }

    /// Handle to the images this surface presents
    pub fn presented(&self) -> PresentedImage {
        self.presented.clone()
    }
}

struct FrameTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    readback: wgpu::Buffer,
    padded_bytes_per_row: u32,
}

/// Live wgpu state for one surface lifetime
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    vertex_buffer: wgpu::Buffer,
    target: RenderTarget,
    frame: Option<FrameTexture>,
    size: SurfaceSize,
    clear_color: wgpu::Color,
    draw_pending: bool,
    presented: PresentedImage,
}

fn create_target(device: &wgpu::Device, size: SurfaceSize) -> RenderTarget {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("edge-viewer render target"),
        size: wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let padded_bytes_per_row =
        (size.width * 4).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("edge-viewer readback"),
        size: padded_bytes_per_row as u64 * size.height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    RenderTarget {
        texture,
        view,
        readback,
        padded_bytes_per_row,
    }
}

impl Drawable for GpuSurface {
    type Context = GpuContext;

    fn create_context(self) -> PipelineResult<GpuContext> {
        if self.size.is_empty() {
            return Err(PipelineError::ContextCreationFailure(format!(
                "empty surface {}",
                self.size
            )));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| PipelineError::ContextCreationFailure(format!("no GPU adapter: {}", e)))?;

        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "GPU adapter selected for rendering"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("edge-viewer"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        }))
        .map_err(|e| {
            PipelineError::ContextCreationFailure(format!("failed to create GPU device: {}", e))
        })?;

        let max_dimension = device.limits().max_texture_dimension_2d;
        if self.size.width > max_dimension || self.size.height > max_dimension {
            return Err(PipelineError::ContextCreationFailure(format!(
                "surface {} exceeds the {} pixel texture limit",
                self.size, max_dimension
            )));
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("edge-viewer quad shader"),
            source: wgpu::ShaderSource::Wgsl(QUAD_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("edge-viewer frame bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("edge-viewer quad pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("edge-viewer quad pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &VERTEX_ATTRIBUTES,
                }],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });

        // Nearest keeps binary edge maps crisp when magnified
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("edge-viewer frame sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("edge-viewer quad vertices"),
            size: std::mem::size_of::<[QuadVertex; 4]>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let target = create_target(&device, self.size);

        Ok(GpuContext {
            device,
            queue,
            pipeline,
            bind_group_layout,
            sampler,
            vertex_buffer,
            target,
            frame: None,
            size: self.size,
            clear_color: wgpu::Color::BLACK,
            draw_pending: false,
            presented: self.presented,
        })
    }
}

impl GpuContext {
    /// Make sure the frame texture matches the source size
    fn ensure_frame_texture(&mut self, width: u32, height: u32) -> PipelineResult<()> {
        let reuse = matches!(&self.frame, Some(f) if f.width == width && f.height == height);
        if !reuse {
            let max_dimension = self.device.limits().max_texture_dimension_2d;
            if width > max_dimension || height > max_dimension {
                return Err(PipelineError::RenderFailure(format!(
                    "{}x{} frame exceeds the {} pixel texture limit",
                    width, height, max_dimension
                )));
            }
            if let Some(old) = self.frame.take() {
                old.texture.destroy();
            }
            debug!(width, height, "Allocating frame texture");

            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("edge-viewer frame texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("edge-viewer frame bind group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            self.frame = Some(FrameTexture {
                texture,
                bind_group,
                width,
                height,
            });
        }
        Ok(())
    }

    /// Copy the target into the readback buffer and wait for it
    fn read_back(&self) -> PipelineResult<RgbaImage> {
        let slice = self.target.readback.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| PipelineError::RenderFailure(format!("device poll failed: {}", e)))?;
        pollster::block_on(rx)
            .map_err(|_| PipelineError::RenderFailure("readback cancelled".to_string()))?
            .map_err(|e| PipelineError::RenderFailure(format!("readback failed: {}", e)))?;

        let row_bytes = self.size.width as usize * 4;
        let mut pixels = Vec::with_capacity(row_bytes * self.size.height as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped
                .chunks(self.target.padded_bytes_per_row as usize)
                .take(self.size.height as usize)
            {
                pixels.extend_from_slice(&row[..row_bytes]);
            }
        }
        self.target.readback.unmap();

        RgbaImage::from_raw(self.size.width, self.size.height, pixels)
            .ok_or_else(|| PipelineError::RenderFailure("readback size mismatch".to_string()))
    }
}

impl GraphicsContext for GpuContext {
    fn surface_size(&self) -> SurfaceSize {
        self.size
    }

    fn resize(&mut self, size: SurfaceSize) -> PipelineResult<()> {
        if size.is_empty() {
            debug!(size = %size, "Ignoring resize to an empty surface");
            return Ok(());
        }
        if size == self.size {
            return Ok(());
        }
        let max_dimension = self.device.limits().max_texture_dimension_2d;
        if size.width > max_dimension || size.height > max_dimension {
            return Err(PipelineError::RenderFailure(format!(
                "surface {} exceeds the {} pixel texture limit",
                size, max_dimension
            )));
        }
        let old = std::mem::replace(&mut self.target, create_target(&self.device, size));
        old.readback.destroy();
        old.texture.destroy();
        self.size = size;
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.clear_color = wgpu::Color {
            r: color[0] as f64,
            g: color[1] as f64,
            b: color[2] as f64,
            a: color[3] as f64,
        };
        self.draw_pending = false;
    }

    fn upload_texture(&mut self, frame: &ProcessedFrame) -> PipelineResult<()> {
        let expected = frame.width as usize * frame.height as usize * 4;
        if frame.pixels.len() != expected {
            return Err(PipelineError::InvalidFrame(format!(
                "{}x{} frame carries {} bytes, expected {}",
                frame.width,
                frame.height,
                frame.pixels.len(),
                expected
            )));
        }

        self.ensure_frame_texture(frame.width, frame.height)?;
        let Some(frame_texture) = &self.frame else {
            return Err(PipelineError::RenderFailure("frame texture missing".to_string()));
        };
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &frame_texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(frame.width * 4),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn draw_quad(&mut self, geometry: &QuadGeometry) -> PipelineResult<()> {
        if self.frame.is_none() {
            return Err(PipelineError::RenderFailure(
                "draw before any texture upload".to_string(),
            ));
        }
        self.queue
            .write_buffer(&self.vertex_buffer, 0, geometry.as_bytes());
        self.draw_pending = true;
        Ok(())
    }

    fn present(&mut self) -> PipelineResult<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("edge-viewer frame"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("edge-viewer quad pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let (true, Some(frame)) = (self.draw_pending, &self.frame) {
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &frame.bind_group, &[]);
                pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                pass.draw(0..4, 0..1);
            }
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.target.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.target.padded_bytes_per_row),
                    rows_per_image: Some(self.size.height),
                },
            },
            wgpu::Extent3d {
                width: self.size.width,
                height: self.size.height,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(Some(encoder.finish()));
        self.draw_pending = false;

        let image = self.read_back()?;
        self.presented.store(image);
        Ok(())
    }

    fn destroy(self) -> PipelineResult<()> {
        // Reverse creation order: frame texture, target, vertex buffer, device
        if let Some(frame) = self.frame {
            frame.texture.destroy();
        }
        self.target.readback.destroy();
        self.target.texture.destroy();
        self.vertex_buffer.destroy();
        self.device.destroy();
        debug!("GPU context destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_shader(name: &str, source: &str) {
        let result = naga::front::wgsl::parse_str(source);
        match result {
            Ok(module) => {
                let info = naga::valid::Validator::new(
                    naga::valid::ValidationFlags::all(),
                    naga::valid::Capabilities::all(),
                )
                .validate(&module);

                if let Err(e) = info {
                    panic!("Shader '{}' validation failed: {:?}", name, e);
                }
            }
            Err(e) => {
                panic!("Shader '{}' parse failed: {:?}", name, e);
            }
        }
    }

    #[test]
    fn test_quad_shader_validates() {
        validate_shader("quad", QUAD_SHADER);
    }

    #[test]
    fn test_vertex_layout_matches_geometry() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
        assert_eq!(QuadGeometry::full_surface().as_bytes().len(), 64);
    }

    #[test]
    fn test_empty_surface_is_rejected() {
        let result = GpuSurface::new(0, 10).create_context();
        assert!(matches!(
            result,
            Err(PipelineError::ContextCreationFailure(_))
        ));
    }

    #[test]
    fn test_clear_and_draw_roundtrip() {
        // This test requires a GPU, so it may be skipped in CI
        let surface = GpuSurface::new(4, 2);
        let presented = surface.presented();
        let mut context = match surface.create_context() {
            Ok(context) => context,
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
                return;
            }
        };

        context.clear([1.0, 0.0, 0.0, 1.0]);
        context.present().unwrap();
        let image = presented.latest().unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(3, 1).0, [255, 0, 0, 255]);

        // Left texel green, right texel blue, stretched over the whole target
        let frame = ProcessedFrame {
            pixels: Arc::from(vec![0, 255, 0, 255, 0, 0, 255, 255]),
            width: 2,
            height: 1,
            latency_ms: 0.0,
            sequence: 1,
        };
        context.clear([0.0, 0.0, 0.0, 1.0]);
        context.upload_texture(&frame).unwrap();
        context.draw_quad(&QuadGeometry::full_surface()).unwrap();
        context.present().unwrap();

        let image = presented.latest().unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [0, 255, 0, 255]);
        assert_eq!(image.get_pixel(3, 1).0, [0, 0, 255, 255]);

        context.resize(SurfaceSize::new(8, 8)).unwrap();
        context.clear([0.0, 0.0, 0.0, 1.0]);
        context.present().unwrap();
        assert_eq!(presented.latest().unwrap().dimensions(), (8, 8));

        context.destroy().unwrap();
    }

    #[test]
    fn test_oversized_resize_is_rejected() {
        // This test requires a GPU, so it may be skipped in CI
        let mut context = match GpuSurface::new(4, 4).create_context() {
            Ok(context) => context,
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
                return;
            }
        };

        let too_wide = context.device.limits().max_texture_dimension_2d + 1;
        let result = context.resize(SurfaceSize::new(too_wide, 4));
        assert!(matches!(result, Err(PipelineError::RenderFailure(_))));
        assert_eq!(context.surface_size(), SurfaceSize::new(4, 4));

        context.clear([0.0, 0.0, 0.0, 1.0]);
        context.present().unwrap();
        context.destroy().unwrap();
    }
}
