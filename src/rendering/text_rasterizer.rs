//! Text rasterizer - renders typed signatures using rustybuzz and tiny-skia.
//!
//! The text is shaped as a single left-to-right run, glyph outlines are
//! collected into one path, and the result is scaled down if needed so the
//! whole run fits the pixmap. The run is centered both ways.

use super::ink_paint;
use crate::document::TypedSignature;
use crate::error::{Error, Result};

use rustybuzz::ttf_parser;
use rustybuzz::UnicodeBuffer;
use tiny_skia::{FillRule, PathBuilder, Pixmap, Transform};

/// Fraction of the pixmap kept free around the text.
const MARGIN: f32 = 0.05;

/// Rasterizer for typed signatures.
#[derive(Debug, Clone, Default)]
pub struct TextRasterizer {}

impl TextRasterizer {
    /// Create a new text rasterizer.
    pub fn new() -> Self {
        Self {}
    }

    /// Draw `typed` into a transparent `width` x `height` pixmap.
    ///
    /// `pixel_density` converts the signature's font size from view units to
    /// pixels. Returns `None` for blank text.
    pub fn render(
        &self,
        typed: &TypedSignature,
        width: u32,
        height: u32,
        pixel_density: f32,
    ) -> Result<Option<Pixmap>> {
        let text = typed.text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let face = rustybuzz::Face::from_slice(&typed.font, 0)
            .ok_or_else(|| Error::ProcessingError("Cannot parse signature font".into()))?;
        let units_per_em = face.units_per_em() as f32;
        let ascender = face.ascender() as f32;
        let descender = face.descender() as f32;

        let mut buffer = UnicodeBuffer::new();
        buffer.push_str(text);
        buffer.guess_segment_properties();
        let output = rustybuzz::shape(&face, &[], buffer);

        // Glyph outlines in font units, y up, pen starting at the origin.
        let mut pen = GlyphPath::new();
        let mut advance = 0.0f32;
        for (info, pos) in output.glyph_infos().iter().zip(output.glyph_positions()) {
            let Ok(glyph_id) = u16::try_from(info.glyph_id) else {
                continue;
            };
            pen.origin = (advance + pos.x_offset as f32, pos.y_offset as f32);
            face.outline_glyph(ttf_parser::GlyphId(glyph_id), &mut pen);
            advance += pos.x_advance as f32;
        }
        let Some(path) = pen.builder.finish() else {
            log::debug!("Typed signature {:?} has no visible glyphs", text);
            return Ok(None);
        };

        let run_width = advance.max(1.0);
        let run_height = (ascender - descender).max(1.0);
        let usable_w = width as f32 * (1.0 - 2.0 * MARGIN);
        let usable_h = height as f32 * (1.0 - 2.0 * MARGIN);

        let requested = typed.font_size * pixel_density / units_per_em;
        let scale = requested.min(usable_w / run_width).min(usable_h / run_height);
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::ProcessingError(format!(
                "Cannot fit typed signature at font size {}",
                typed.font_size
            )));
        }

        let left = (width as f32 - run_width * scale) / 2.0;
        let baseline = (height as f32 + (ascender + descender) * scale) / 2.0;
        // Flip font units (y up) into pixmap space (y down).
        let transform = Transform::from_row(scale, 0.0, 0.0, -scale, left, baseline);

        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| Error::ProcessingError(format!("Cannot allocate {}x{} pixmap", width, height)))?;
        pixmap.fill_path(&path, &ink_paint(typed.color), FillRule::Winding, transform, None);
        Ok(Some(pixmap))
    }
}

/// Collects glyph outlines into one path, offset by the current pen origin.
struct GlyphPath {
    builder: PathBuilder,
    origin: (f32, f32),
}

impl GlyphPath {
    fn new() -> Self {
        Self {
            builder: PathBuilder::new(),
            origin: (0.0, 0.0),
        }
    }
}

impl ttf_parser::OutlineBuilder for GlyphPath {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x + self.origin.0, y + self.origin.1);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(x + self.origin.0, y + self.origin.1);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (ox, oy) = self.origin;
        self.builder.quad_to(x1 + ox, y1 + oy, x + ox, y + oy);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (ox, oy) = self.origin;
        self.builder
            .cubic_to(x1 + ox, y1 + oy, x2 + ox, y2 + oy, x + ox, y + oy);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}
