//! Rendering contract and a reference raster renderer.
//!
//! Rasterization proper is an external collaborator. The core calls
//! [`Renderer::draw`] with a map and gets an [`Image`] back; renderers read
//! map and layer state but never change it.

use crate::definition::LayerStatus;
use crate::geometry::Rect;
use crate::map::MapHandle;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use thiserror::Error;

/// Largest width or height a renderer will allocate.
pub const MAX_IMAGE_DIMENSION: u32 = 8192;

/// Errors raised while drawing or encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("Invalid image size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("Map extent has zero width or height")]
    EmptyExtent,

    #[error("Unsupported output format '{0}'")]
    UnsupportedFormat(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),
}

/// A drawn map.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pixels: RgbaImage,
    format: String,
}

impl Image {
    pub fn new(pixels: RgbaImage, format: impl Into<String>) -> Self {
        Self {
            pixels,
            format: format.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Output format name, from the map's `image_type`.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Encodes the image in its output format.
    pub fn encode(&self) -> Result<Vec<u8>, RenderError> {
        let format = match self.format.as_str() {
            "png" => ImageFormat::Png,
            other => return Err(RenderError::UnsupportedFormat(other.to_string())),
        };
        let mut cursor = Cursor::new(Vec::new());
        self.pixels
            .write_to(&mut cursor, format)
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

/// Draws maps.
pub trait Renderer: Send + Sync {
    fn draw(&self, map: &MapHandle) -> Result<Image, RenderError>;
}

/// Paints the background and outlines each visible layer's result bounds.
#[derive(Debug, Clone, Copy)]
pub struct RasterRenderer {
    background: Rgba<u8>,
    highlight: Rgba<u8>,
}

impl Default for RasterRenderer {
    fn default() -> Self {
        Self {
            background: Rgba([255, 255, 255, 255]),
            highlight: Rgba([255, 0, 0, 255]),
        }
    }
}

impl RasterRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_colors(mut self, background: Rgba<u8>, highlight: Rgba<u8>) -> Self {
        self.background = background;
        self.highlight = highlight;
        self
    }
}

impl Renderer for RasterRenderer {
    fn draw(&self, map: &MapHandle) -> Result<Image, RenderError> {
        let (width, height) = map.size();
        if width == 0 || height == 0 || width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION
        {
            return Err(RenderError::InvalidSize { width, height });
        }
        let extent = map.extent();
        if extent.width() <= 0.0 || extent.height() <= 0.0 {
            return Err(RenderError::EmptyExtent);
        }

        let mut pixels = RgbaImage::from_pixel(width, height, self.background);
        let view = Viewport::new(extent, width, height);
        for layer in map.layers() {
            if layer.definition().status == LayerStatus::Off {
                continue;
            }
            if let Some(bounds) = layer.results().bounds() {
                if bounds.intersects(&extent) {
                    outline(&mut pixels, &view, &bounds, self.highlight);
                }
            }
        }

        Ok(Image::new(pixels, map.definition().image_type.clone()))
    }
}

/// Map-to-pixel transform; y grows downwards in pixel space.
struct Viewport {
    extent: Rect,
    width: u32,
    height: u32,
}

impl Viewport {
    fn new(extent: Rect, width: u32, height: u32) -> Self {
        Self {
            extent,
            width,
            height,
        }
    }

    fn to_pixel(&self, x: f64, y: f64) -> (u32, u32) {
        let fx = (x - self.extent.minx) / self.extent.width();
        let fy = (self.extent.maxy - y) / self.extent.height();
        let px = (fx * f64::from(self.width - 1)).round();
        let py = (fy * f64::from(self.height - 1)).round();
        (
            px.clamp(0.0, f64::from(self.width - 1)) as u32,
            py.clamp(0.0, f64::from(self.height - 1)) as u32,
        )
    }
}

fn outline(pixels: &mut RgbaImage, view: &Viewport, bounds: &Rect, color: Rgba<u8>) {
    let (x0, y0) = view.to_pixel(bounds.minx, bounds.maxy);
    let (x1, y1) = view.to_pixel(bounds.maxx, bounds.miny);
    for x in x0..=x1 {
        pixels.put_pixel(x, y0, color);
        pixels.put_pixel(x, y1, color);
    }
    for y in y0..=y1 {
        pixels.put_pixel(x0, y, color);
        pixels.put_pixel(x1, y, color);
    }
}
