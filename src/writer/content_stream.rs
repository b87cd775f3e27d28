//! PDF content stream builder.
//!
//! Builds the small content streams the stamper appends to pages and uses
//! for signature appearances, per ISO 32000-1:2008 Section 8.

use crate::error::{Error, Result};
use std::io::Write;

use super::image_handler::ImagePlacement;

/// Operations that can be added to a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentStreamOp {
    /// Save graphics state (q)
    SaveState,
    /// Restore graphics state (Q)
    RestoreState,
    /// Set transformation matrix (cm)
    Transform(f32, f32, f32, f32, f32, f32),
    /// Paint XObject (Do)
    PaintXObject(String),
}

/// Accumulates content stream operators.
#[derive(Debug, Clone, Default)]
pub struct ContentStreamBuilder {
    operations: Vec<ContentStreamOp>,
}

impl ContentStreamBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    fn op(&mut self, op: ContentStreamOp) -> &mut Self {
        self.operations.push(op);
        self
    }

    /// Save the current graphics state.
    pub fn save_state(&mut self) -> &mut Self {
        self.op(ContentStreamOp::SaveState)
    }

    /// Restore the previous graphics state.
    pub fn restore_state(&mut self) -> &mut Self {
        self.op(ContentStreamOp::RestoreState)
    }

    /// Apply a transformation matrix.
    ///
    /// Matrix is specified as [a b c d e f] where:
    /// - a, d: scaling
    /// - b, c: rotation/skewing
    /// - e, f: translation
    pub fn transform(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> &mut Self {
        self.op(ContentStreamOp::Transform(a, b, c, d, e, f))
    }

    /// Draw an image XObject at the specified position and size.
    ///
    /// # Arguments
    /// * `resource_id` - The XObject resource name (e.g., "StIm1")
    /// * `x` - X position (left edge)
    /// * `y` - Y position (bottom edge)
    /// * `width` - Display width
    /// * `height` - Display height
    pub fn draw_image(
        &mut self,
        resource_id: &str,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> &mut Self {
        self.save_state();
        self.transform(width, 0.0, 0.0, height, x, y);
        self.op(ContentStreamOp::PaintXObject(resource_id.to_string()));
        self.restore_state()
    }

    /// Draw an image using an [`ImagePlacement`].
    pub fn draw_image_at(&mut self, resource_id: &str, placement: &ImagePlacement) -> &mut Self {
        self.draw_image(resource_id, placement.x, placement.y, placement.width, placement.height)
    }

    /// True when no operator has been added.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Operators added so far.
    pub fn operations(&self) -> &[ContentStreamOp] {
        &self.operations
    }

    /// Build the content stream to bytes.
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();

        for op in &self.operations {
            write_op(&mut buf, op)
                .and_then(|_| writeln!(buf))
                .map_err(|e| Error::ProcessingError(format!("content stream: {}", e)))?;
        }

        Ok(buf)
    }
}

/// Write a single operation to the buffer.
fn write_op<W: Write>(w: &mut W, op: &ContentStreamOp) -> std::io::Result<()> {
    match op {
        ContentStreamOp::SaveState => write!(w, "q"),
        ContentStreamOp::RestoreState => write!(w, "Q"),
        ContentStreamOp::Transform(a, b, c, d, e, f) => {
            write!(w, "{} {} {} {} {} {} cm", a, b, c, d, e, f)
        },
        ContentStreamOp::PaintXObject(name) => write!(w, "/{} Do", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_builder() {
        let builder = ContentStreamBuilder::new();
        assert!(builder.is_empty());
        assert!(builder.build().unwrap().is_empty());
    }

    #[test]
    fn test_draw_image_is_isolated() {
        let mut builder = ContentStreamBuilder::new();
        builder.draw_image("StIm1", 95.0, 722.0, 30.0, 30.0);
        let content = String::from_utf8(builder.build().unwrap()).unwrap();
        assert_eq!(content, "q\n30 0 0 30 95 722 cm\n/StIm1 Do\nQ\n");
    }

    #[test]
    fn test_draw_image_at_placement() {
        let mut builder = ContentStreamBuilder::new();
        builder.draw_image_at("Img", &ImagePlacement::new(0.5, 1.0, 10.0, 20.0));
        assert_eq!(
            builder.operations()[1],
            ContentStreamOp::Transform(10.0, 0.0, 0.0, 20.0, 0.5, 1.0)
        );
        assert_eq!(builder.operations().len(), 4);
    }
}
