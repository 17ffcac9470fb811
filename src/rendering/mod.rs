//! Scene rendering
//!
//! A render loads a scene onto a fresh drawing surface: WebP sources are
//! swapped for decodable fallbacks, nodes are laid out, embedded images are
//! loaded, and the resulting paint commands are rasterized at the requested
//! scale.

pub mod layout;
pub mod paint;
pub mod raster;
pub mod resources;

use async_trait::async_trait;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, Pixel, RgbImage, Rgba, RgbaImage};

use crate::scene::{fallback, SceneGraph};
use crate::{CanvasSize, Error, RenderConfig, Result};
use resources::ResourceLoader;

/// A rendered raster image
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: RgbaImage,
}

impl Bitmap {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            width: pixels.width(),
            height: pixels.height(),
            pixels,
        }
    }

    /// Preview-quality PNG: fast compression, alpha kept
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, CompressionType::Fast, PngFilter::Adaptive).write_image(
            self.pixels.as_raw(),
            self.width,
            self.height,
            ExtendedColorType::Rgba8,
        )?;
        Ok(out)
    }

    /// Opaque RGB pixels with transparency composited over `backdrop`
    pub fn flatten(&self, backdrop: Rgba<u8>) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let mut px = backdrop;
            px.blend(self.pixels.get_pixel(x, y));
            px.to_rgb()
        })
    }
}

/// Logical canvas plus the factor it is rendered at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSize {
    pub canvas: CanvasSize,
    pub scale: f64,
}

impl RenderSize {
    /// One pixel per logical unit
    pub fn full(canvas: CanvasSize) -> Self {
        Self { canvas, scale: 1.0 }
    }

    /// Fit the canvas inside `width`×`height`, keeping its aspect ratio
    pub fn thumbnail(canvas: CanvasSize, width: u32, height: u32) -> Self {
        let scale = if canvas.width == 0 || canvas.height == 0 {
            0.0
        } else {
            (width as f64 / canvas.width as f64).min(height as f64 / canvas.height as f64)
        };
        Self { canvas, scale }
    }

    /// Output pixel dimensions: `floor(canvas × scale)` per axis
    pub fn output_dimensions(&self) -> (u32, u32) {
        let axis = |len: u32| (len as f64 * self.scale + 1e-9).floor().max(0.0) as u32;
        (axis(self.canvas.width), axis(self.canvas.height))
    }
}

/// Turns a scene graph into a bitmap
#[async_trait]
pub trait SceneRenderer: Send + Sync {
    async fn render(&self, scene: &SceneGraph, size: RenderSize) -> Result<Bitmap>;

    /// Parse and render a serialized document
    async fn render_document(&self, document: &str, size: RenderSize) -> Result<Bitmap> {
        let scene = SceneGraph::parse(document)?;
        self.render(&scene, size).await
    }
}

/// The built-in renderer: layout, paint and rasterize on a CPU surface
#[derive(Debug, Clone)]
pub struct CanvasRenderer {
    loader: ResourceLoader,
}

impl CanvasRenderer {
    pub fn new(config: &RenderConfig) -> Result<Self> {
        Ok(Self {
            loader: ResourceLoader::new(config)?,
        })
    }
}

#[async_trait]
impl SceneRenderer for CanvasRenderer {
    async fn render(&self, scene: &SceneGraph, size: RenderSize) -> Result<Bitmap> {
        let (width, height) = size.output_dimensions();
        if width == 0 || height == 0 {
            return Err(Error::RenderFailure(format!(
                "target surface is empty ({}x{})",
                width, height
            )));
        }

        let mut scene = scene.clone();
        let rewritten = fallback::rewrite_unsupported_images(&mut scene);
        if rewritten > 0 {
            log::debug!("Rewrote {} image source(s) to fallbacks", rewritten);
        }

        let nodes = layout::layout_scene(&scene);
        let images = self.loader.load_all(&layout::image_sources(&nodes)).await;
        let commands = paint::paint_nodes(&nodes, &images);
        let background = scene.background().and_then(paint::parse_color);

        log::debug!(
            "Rasterizing {} node(s) as {} command(s) at {}x{}",
            nodes.len(),
            commands.len(),
            width,
            height
        );
        let pixels = raster::rasterize(&commands, width, height, size.scale as f32, background);
        Ok(Bitmap::new(pixels))
    }
}
