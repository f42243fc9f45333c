// SPDX-License-Identifier: GPL-3.0-only

//! Terminal render backend
//!
//! The terminal is the drawable surface. Each cell shows two vertical pixels
//! with the upper half-block character (foreground = top pixel, background =
//! bottom pixel), so the surface is `columns x (rows - 1) * 2` pixels with
//! the last row kept for a status bar. Presenting draws the canvas through
//! ratatui and then waits out the rest of the frame budget, which plays the
//! role of vsync.

use super::{Drawable, GraphicsContext, SurfaceSize};
use crate::errors::{PipelineError, PipelineResult};
use crate::frame_store::ProcessedFrame;
use crate::geometry::QuadGeometry;
use ratatui::backend::Backend;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::Widget;
use ratatui::Terminal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Rows reserved below the picture
pub const STATUS_ROWS: u16 = 1;

/// Produces the status bar text on every present
pub type StatusLine = Arc<dyn Fn() -> String + Send + Sync>;

/// Pixel size of the picture area for a terminal of `columns x rows` cells
pub fn surface_size_for(columns: u16, rows: u16) -> SurfaceSize {
    SurfaceSize::new(
        columns as u32,
        rows.saturating_sub(STATUS_ROWS) as u32 * 2,
    )
}

fn render_failure(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::RenderFailure(e.to_string())
}

/// A terminal handed to the render thread
pub struct TerminalSurface<B: Backend + Send + 'static> {
    backend: B,
    status: Option<StatusLine>,
    frame_budget: Duration,
}

impl<B: Backend + Send + 'static> TerminalSurface<B> {
    pub fn new(backend: B, frame_budget: Duration) -> Self {
        Self {
            backend,
            status: None,
            frame_budget,
        }
    }

    pub fn with_status(mut self, status: StatusLine) -> Self {
        self.status = Some(status);
        self
    }
}

/// Live terminal binding for one surface lifetime
pub struct TerminalContext<B: Backend> {
    terminal: Terminal<B>,
    canvas: Vec<[u8; 3]>,
    size: SurfaceSize,
    texture: Option<ProcessedFrame>,
    status: Option<StatusLine>,
    frame_budget: Duration,
    last_present: Option<Instant>,
}

impl<B: Backend + Send + 'static> Drawable for TerminalSurface<B> {
    type Context = TerminalContext<B>;

    fn create_context(self) -> PipelineResult<TerminalContext<B>> {
        let mut terminal = Terminal::new(self.backend)
            .map_err(|e| PipelineError::ContextCreationFailure(e.to_string()))?;
        let area = terminal
            .size()
            .map_err(|e| PipelineError::ContextCreationFailure(e.to_string()))?;
        terminal
            .clear()
            .map_err(|e| PipelineError::ContextCreationFailure(e.to_string()))?;
        let size = surface_size_for(area.width, area.height);
        debug!(columns = area.width, rows = area.height, size = %size, "Terminal surface ready");

        Ok(TerminalContext {
            terminal,
            canvas: vec![[0; 3]; size.width as usize * size.height as usize],
            size,
            texture: None,
            status: self.status,
            frame_budget: self.frame_budget,
            last_present: None,
        })
    }
}

fn to_rgb(color: [f32; 4]) -> [u8; 3] {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    [channel(color[0]), channel(color[1]), channel(color[2])]
}

impl<B: Backend> TerminalContext<B> {
    /// Nearest-neighbor texel lookup
    fn sample(texture: &ProcessedFrame, u: f32, v: f32) -> [u8; 3] {
        let x = ((u * texture.width as f32) as u32).min(texture.width - 1) as usize;
        let y = ((v * texture.height as f32) as u32).min(texture.height - 1) as usize;
        let i = (y * texture.width as usize + x) * 4;
        [texture.pixels[i], texture.pixels[i + 1], texture.pixels[i + 2]]
    }

    fn pace(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_present {
            let due = last + self.frame_budget;
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.last_present = Some(Instant::now());
    }
}

impl<B: Backend> GraphicsContext for TerminalContext<B> {
    fn surface_size(&self) -> SurfaceSize {
        self.size
    }

    fn resize(&mut self, size: SurfaceSize) -> PipelineResult<()> {
        self.size = size;
        self.canvas = vec![[0; 3]; size.width as usize * size.height as usize];
        self.terminal.autoresize().map_err(render_failure)?;
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.canvas.fill(to_rgb(color));
    }

    fn upload_texture(&mut self, frame: &ProcessedFrame) -> PipelineResult<()> {
        let expected = frame.width as usize * frame.height as usize * 4;
        if frame.width == 0 || frame.height == 0 || frame.pixels.len() != expected {
            return Err(PipelineError::InvalidFrame(format!(
                "{}x{} frame carries {} bytes",
                frame.width,
                frame.height,
                frame.pixels.len()
            )));
        }
        self.texture = Some(frame.clone());
        Ok(())
    }

    fn draw_quad(&mut self, geometry: &QuadGeometry) -> PipelineResult<()> {
        let texture = self
            .texture
            .as_ref()
            .ok_or_else(|| render_failure("draw before any texture upload"))?;
        let width = self.size.width as usize;
        let height = self.size.height as usize;
        if width == 0 || height == 0 {
            return Ok(());
        }

        for (py, row) in self.canvas.chunks_exact_mut(width).enumerate() {
            let ndc_y = 1.0 - (py as f32 + 0.5) / height as f32 * 2.0;
            for (px, pixel) in row.iter_mut().enumerate() {
                let ndc_x = (px as f32 + 0.5) / width as f32 * 2.0 - 1.0;
                if let Some((u, v)) = geometry.uv_at(ndc_x, ndc_y) {
                    *pixel = Self::sample(texture, u, v);
                }
            }
        }
        Ok(())
    }

    fn present(&mut self) -> PipelineResult<()> {
        let status = self.status.as_ref().map(|line| line()).unwrap_or_default();
        let canvas = CanvasWidget {
            pixels: &self.canvas,
            width: self.size.width as usize,
            height: self.size.height as usize,
        };

        self.terminal
            .draw(|f| {
                let area = f.area();
                let picture_rows = area.height.saturating_sub(STATUS_ROWS);
                let picture = Rect {
                    height: picture_rows,
                    ..area
                };
                let status_area = Rect {
                    y: area.y + picture_rows,
                    height: area.height - picture_rows,
                    ..area
                };
                f.render_widget(canvas, picture);
                f.render_widget(StatusBar { message: &status }, status_area);
            })
            .map_err(render_failure)?;

        self.pace();
        Ok(())
    }

    fn destroy(mut self) -> PipelineResult<()> {
        self.texture = None;
        let cleared = self.terminal.clear();
        let cursor = self.terminal.show_cursor();
        cleared
            .and(cursor)
            .map_err(|e| PipelineError::ResourceReleaseError(e.to_string()))
    }
}

/// Half-block rendering of the canvas
struct CanvasWidget<'a> {
    pixels: &'a [[u8; 3]],
    width: usize,
    height: usize,
}

impl Widget for CanvasWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let rows = area.height.min((self.height / 2) as u16);
        let columns = area.width.min(self.width as u16);
        let rgb = |p: [u8; 3]| Color::Rgb(p[0], p[1], p[2]);

        for ty in 0..rows {
            for tx in 0..columns {
                let top = self.pixels[(ty as usize * 2) * self.width + tx as usize];
                let bottom = self.pixels[(ty as usize * 2 + 1) * self.width + tx as usize];
                if let Some(cell) = buf.cell_mut((area.x + tx, area.y + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(rgb(top));
                    cell.set_bg(rgb(bottom));
                }
            }
        }
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}
