//! Ink rasterizer - renders hand-drawn strokes using tiny-skia.

use super::ink_paint;
use crate::document::InkSignature;
use crate::error::{Error, Result};
use tiny_skia::{FillRule, LineCap, LineJoin, PathBuilder, Pixmap, Stroke, Transform};

/// Rasterizer for ink signatures.
#[derive(Debug, Clone, Default)]
pub struct InkRasterizer {}

impl InkRasterizer {
    /// Create a new ink rasterizer.
    pub fn new() -> Self {
        Self {}
    }

    /// Draw `ink` into a transparent `width` x `height` pixmap.
    ///
    /// Strokes are scaled from the capture canvas to the pixmap. A stroke
    /// with a single sample becomes a dot of the pen's diameter. Returns
    /// `None` when no stroke has any point.
    pub fn render(&self, ink: &InkSignature, width: u32, height: u32) -> Result<Option<Pixmap>> {
        if ink.strokes.iter().all(|s| s.points.is_empty()) {
            return Ok(None);
        }
        if !(ink.canvas_width > 0.0 && ink.canvas_height > 0.0) {
            return Err(Error::ProcessingError(format!(
                "Invalid ink canvas size {}x{}",
                ink.canvas_width, ink.canvas_height
            )));
        }

        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| Error::ProcessingError(format!("Cannot allocate {}x{} pixmap", width, height)))?;
        let transform = Transform::from_scale(
            width as f32 / ink.canvas_width,
            height as f32 / ink.canvas_height,
        );
        let paint = ink_paint(ink.color);
        let stroke = Stroke {
            width: ink.stroke_width.max(0.1),
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };

        for points in ink.strokes.iter().map(|s| &s.points) {
            match points.as_slice() {
                [] => {},
                [dot] => {
                    if let Some(path) = PathBuilder::from_circle(dot.x, dot.y, stroke.width / 2.0) {
                        pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
                    }
                },
                [first, rest @ ..] => {
                    let mut builder = PathBuilder::new();
                    builder.move_to(first.x, first.y);
                    for p in rest {
                        builder.line_to(p.x, p.y);
                    }
                    if let Some(path) = builder.finish() {
                        pixmap.stroke_path(&path, &paint, &stroke, transform, None);
                    }
                },
            }
        }

        Ok(Some(pixmap))
    }
}
