use image::{Rgba, RgbaImage};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::fonts::TextRasterizer;
use crate::layout::{Color, DrawInstruction};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template surface is empty ({width}x{height})")]
    EmptyTemplate { width: u32, height: u32 },
    #[error("Failed to load template image: {0}")]
    Load(#[from] image::ImageError),
}

/// The base image shared read-only by every render of a batch.
#[derive(Debug, Clone)]
pub struct Template {
    image: Arc<RgbaImage>,
}

impl Template {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// Decodes an image file (PNG or JPEG) into an RGBA template.
    pub fn open(path: &Path) -> Result<Self, RenderError> {
        let image = image::open(path)?.to_rgba8();
        Ok(Self::new(image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// One composited surface: the template with a row's text drawn on top.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResult {
    image: RgbaImage,
}

impl RenderResult {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Composites text onto copies of a template.
#[derive(Clone)]
pub struct RenderEngine {
    rasterizer: Arc<dyn TextRasterizer>,
}

impl RenderEngine {
    pub fn new(rasterizer: Arc<dyn TextRasterizer>) -> Self {
        Self { rasterizer }
    }

    /// Renders `text` onto a fresh copy of `template`.
    ///
    /// Every call allocates its own surface, so calls never share mutable state.
    pub fn render_row(
        &self,
        template: &Template,
        instruction: &DrawInstruction,
        text: &str,
    ) -> Result<RenderResult, RenderError> {
        if template.is_empty() {
            return Err(RenderError::EmptyTemplate {
                width: template.width(),
                height: template.height(),
            });
        }

        let mut surface = template.image().clone();
        let size = instruction.style.font_size_px;
        let metrics = self.rasterizer.metrics(size);
        let width = self.rasterizer.measure(text, size);
        let origin = (
            instruction.origin_x(width),
            instruction.baseline_y(metrics.ascent, metrics.descent),
        );

        let color = instruction.style.color;
        let (w, h) = (surface.width() as i64, surface.height() as i64);
        self.rasterizer.draw(text, size, origin, &mut |x, y, coverage| {
            if x < 0 || y < 0 || x >= w || y >= h {
                return;
            }
            let pixel = surface.get_pixel_mut(x as u32, y as u32);
            blend(pixel, color, coverage);
        });

        Ok(RenderResult::new(surface))
    }
}

// Source-over compositing with straight alpha.
fn blend(dst: &mut Rgba<u8>, color: Color, coverage: f32) {
    let src_a = (color.a as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if src_a <= 0.0 {
        return;
    }
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return;
    }

    let channel = |src: u8, dst: u8| {
        let v = (src as f32 * src_a + dst as f32 * dst_a * (1.0 - src_a)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    *dst = Rgba([
        channel(color.r, dst[0]),
        channel(color.g, dst[1]),
        channel(color.b, dst[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ]);
}
