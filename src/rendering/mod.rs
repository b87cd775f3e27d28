//! Element rasterization.
//!
//! Turns a placed [`Element`] into an encoded raster image sized to its
//! placement rectangle. Ink strokes and typed signatures are drawn with the
//! pure-Rust `tiny-skia` library and encoded as PNG with alpha; image
//! elements pass their encoded bytes through unchanged.
//!
//! ## Example
//!
//! ```
//! use pdf_stamper::document::{Element, InkSignature, InkStroke};
//! use pdf_stamper::geometry::{Point, Rect};
//! use pdf_stamper::rendering::ElementRasterizer;
//!
//! let stroke = InkStroke::new(vec![Point::new(10.0, 10.0), Point::new(90.0, 40.0)]);
//! let element = Element::ink(
//!     InkSignature::new(vec![stroke], 100.0, 50.0),
//!     Rect::new(0.0, 0.0, 100.0, 50.0),
//! );
//! let image = ElementRasterizer::new(2.0).rasterize(&element).unwrap().unwrap();
//! assert_eq!((image.width, image.height), (200, 100));
//! ```

mod ink_rasterizer;
mod text_rasterizer;

pub use ink_rasterizer::InkRasterizer;
pub use text_rasterizer::TextRasterizer;

use std::io::Cursor;

use crate::document::{Element, ElementKind, ImageElement, InkColor};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use tiny_skia::{Color, Paint, Pixmap};

/// Encoding of a [`RasterImage`]'s bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    /// PNG, possibly with alpha
    Png,
    /// Baseline or progressive JPEG
    Jpeg,
}

/// An encoded image ready to be embedded.
#[derive(Clone, PartialEq)]
pub struct RasterImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Encoding of `data`
    pub format: RasterFormat,
    /// Encoded bytes
    pub data: Vec<u8>,
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("data", &format_args!("{} bytes", self.data.len()))
            .finish()
    }
}

impl RasterImage {
    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Rasterizes elements at a fixed pixel density.
#[derive(Debug, Clone)]
pub struct ElementRasterizer {
    pixel_density: f32,
    ink: InkRasterizer,
    text: TextRasterizer,
}

impl ElementRasterizer {
    /// Create a rasterizer; `pixel_density` is pixels per view unit.
    pub fn new(pixel_density: f32) -> Self {
        let pixel_density = if pixel_density.is_finite() && pixel_density > 0.0 {
            pixel_density
        } else {
            log::warn!("Invalid pixel density {}, using 1.0", pixel_density);
            1.0
        };
        Self {
            pixel_density,
            ink: InkRasterizer::new(),
            text: TextRasterizer::new(),
        }
    }

    /// Pixels per view unit.
    pub fn pixel_density(&self) -> f32 {
        self.pixel_density
    }

    /// Render `element` to an encoded image.
    ///
    /// Returns `Ok(None)` when the element has nothing to draw; callers skip
    /// such elements. Undecodable images and unusable fonts are errors.
    pub fn rasterize(&self, element: &Element) -> Result<Option<RasterImage>> {
        if !element.kind.has_payload() {
            return Ok(None);
        }
        let Some((width, height)) = pixel_size(&element.placement, self.pixel_density) else {
            log::warn!(
                "Skipping {} element with degenerate placement {:?}",
                element.kind.label(),
                element.placement
            );
            return Ok(None);
        };

        match &element.kind {
            ElementKind::Image(image) => passthrough(image).map(Some),
            ElementKind::FreeHand(ink) => {
                let pixmap = self.ink.render(ink, width, height)?;
                pixmap.map(encode_pixmap).transpose()
            },
            ElementKind::TypedText(typed) => {
                let pixmap = self.text.render(typed, width, height, self.pixel_density)?;
                pixmap.map(encode_pixmap).transpose()
            },
        }
    }
}

impl Default for ElementRasterizer {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Render `element` at `pixel_density` pixels per view unit.
pub fn rasterize(element: &Element, pixel_density: f32) -> Result<Option<RasterImage>> {
    ElementRasterizer::new(pixel_density).rasterize(element)
}

/// Pixel dimensions for a placement, or `None` when nothing can be drawn.
fn pixel_size(placement: &Rect, pixel_density: f32) -> Option<(u32, u32)> {
    if !placement.is_drawable() {
        return None;
    }
    let width = (placement.width * pixel_density).round().max(1.0);
    let height = (placement.height * pixel_density).round().max(1.0);
    if width > u32::MAX as f32 || height > u32::MAX as f32 {
        return None;
    }
    Some((width as u32, height as u32))
}

/// Create an anti-aliased paint in the given ink.
pub(crate) fn ink_paint(color: InkColor) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba8(color.r, color.g, color.b, 255));
    paint.anti_alias = true;
    paint
}

fn encode_pixmap(pixmap: Pixmap) -> Result<RasterImage> {
    let data = pixmap
        .encode_png()
        .map_err(|e| Error::ProcessingError(format!("PNG encoding failed: {}", e)))?;
    Ok(RasterImage {
        width: pixmap.width(),
        height: pixmap.height(),
        format: RasterFormat::Png,
        data,
    })
}

fn passthrough(image: &ImageElement) -> Result<RasterImage> {
    let reader = image::io::Reader::new(Cursor::new(&image.data))
        .with_guessed_format()
        .map_err(|e| Error::ProcessingError(format!("Cannot read image: {}", e)))?;
    let format = match reader.format() {
        Some(image::ImageFormat::Png) => RasterFormat::Png,
        Some(image::ImageFormat::Jpeg) => RasterFormat::Jpeg,
        Some(other) => {
            log::debug!("Re-encoding {:?} image as PNG", other);
            return reencode_png(reader);
        },
        None => return Err(Error::ProcessingError("Unrecognized image data".into())),
    };
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| Error::ProcessingError(format!("Cannot read image: {}", e)))?;
    Ok(RasterImage {
        width,
        height,
        format,
        data: image.data.clone(),
    })
}

/// Decode any other supported format and store it as PNG.
fn reencode_png(reader: image::io::Reader<Cursor<&Vec<u8>>>) -> Result<RasterImage> {
    let decoded = reader
        .decode()
        .map_err(|e| Error::ProcessingError(format!("Cannot decode image: {}", e)))?;
    let mut data = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut data), image::ImageOutputFormat::Png)
        .map_err(|e| Error::ProcessingError(format!("PNG encoding failed: {}", e)))?;
    Ok(RasterImage {
        width: decoded.width(),
        height: decoded.height(),
        format: RasterFormat::Png,
        data,
    })
}
