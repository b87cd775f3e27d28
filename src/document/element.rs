//! Placed elements: ink signatures, images and typed signatures.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect, ViewTransform};

/// Ink color offered by the signature pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InkColor {
    /// Red component
    pub r: u8,
    /// Green component
    pub g: u8,
    /// Blue component
    pub b: u8,
}

impl InkColor {
    /// Black ink
    pub const BLACK: InkColor = InkColor::rgb(0, 0, 0);
    /// Red ink
    pub const RED: InkColor = InkColor::rgb(0xD3, 0x2F, 0x2F);
    /// Blue ink
    pub const BLUE: InkColor = InkColor::rgb(0x19, 0x4E, 0xB8);
    /// Green ink
    pub const GREEN: InkColor = InkColor::rgb(0x2E, 0x7D, 0x32);

    /// Create a color from RGB components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Look up a preset by name (`black`, `red`, `blue`, `green`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "black" => Some(Self::BLACK),
            "red" => Some(Self::RED),
            "blue" => Some(Self::BLUE),
            "green" => Some(Self::GREEN),
            _ => None,
        }
    }
}

impl Default for InkColor {
    fn default() -> Self {
        Self::BLACK
    }
}

/// One continuous pen stroke, in signature pad canvas coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InkStroke {
    /// Sampled pen positions, in drawing order
    pub points: Vec<Point>,
}

impl InkStroke {
    /// Create a stroke from points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }
}

/// A hand-drawn signature.
#[derive(Debug, Clone, PartialEq)]
pub struct InkSignature {
    /// Strokes in drawing order
    pub strokes: Vec<InkStroke>,
    /// Width of the canvas the strokes were captured on
    pub canvas_width: f32,
    /// Height of the canvas the strokes were captured on
    pub canvas_height: f32,
    /// Ink color
    pub color: InkColor,
    /// Pen width in canvas units
    pub stroke_width: f32,
}

impl InkSignature {
    /// Create a signature captured on a canvas of the given size.
    pub fn new(strokes: Vec<InkStroke>, canvas_width: f32, canvas_height: f32) -> Self {
        Self {
            strokes,
            canvas_width,
            canvas_height,
            color: InkColor::BLACK,
            stroke_width: 3.0,
        }
    }

    /// Set the ink color.
    pub fn with_color(mut self, color: InkColor) -> Self {
        self.color = color;
        self
    }

    /// Set the pen width.
    pub fn with_stroke_width(mut self, width: f32) -> Self {
        self.stroke_width = width;
        self
    }
}

/// An encoded raster image (PNG or JPEG) placed as-is.
#[derive(Clone, PartialEq)]
pub struct ImageElement {
    /// Encoded image bytes
    pub data: Vec<u8>,
}

impl ImageElement {
    /// Wrap encoded image bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl fmt::Debug for ImageElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageElement")
            .field("data", &format_args!("{} bytes", self.data.len()))
            .finish()
    }
}

/// A signature typed with the keyboard and rendered in a handwriting font.
#[derive(Clone, PartialEq)]
pub struct TypedSignature {
    /// Signature text
    pub text: String,
    /// TrueType/OpenType font file
    pub font: Arc<[u8]>,
    /// Font size in view units
    pub font_size: f32,
    /// Ink color
    pub color: InkColor,
}

impl TypedSignature {
    /// Create a typed signature rendered with `font`.
    pub fn new(text: impl Into<String>, font: Arc<[u8]>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            font,
            font_size,
            color: InkColor::BLACK,
        }
    }

    /// Set the ink color.
    pub fn with_color(mut self, color: InkColor) -> Self {
        self.color = color;
        self
    }
}

impl fmt::Debug for TypedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedSignature")
            .field("text", &self.text)
            .field("font", &format_args!("{} bytes", self.font.len()))
            .field("font_size", &self.font_size)
            .field("color", &self.color)
            .finish()
    }
}

/// What an element draws.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    /// Hand-drawn ink signature
    FreeHand(InkSignature),
    /// Picture
    Image(ImageElement),
    /// Typed signature
    TypedText(TypedSignature),
}

impl ElementKind {
    /// Short label used in log output.
    pub fn label(&self) -> &'static str {
        match self {
            ElementKind::FreeHand(_) => "ink",
            ElementKind::Image(_) => "image",
            ElementKind::TypedText(_) => "typed-text",
        }
    }

    /// False when there is nothing to draw.
    pub fn has_payload(&self) -> bool {
        match self {
            ElementKind::FreeHand(ink) => ink.strokes.iter().any(|s| !s.points.is_empty()),
            ElementKind::Image(image) => !image.data.is_empty(),
            ElementKind::TypedText(typed) => !typed.text.trim().is_empty(),
        }
    }
}

/// A visual element placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Payload
    pub kind: ElementKind,
    /// Bounds in view space (top-left origin)
    pub placement: Rect,
    /// Viewer zoom and pan at the moment of placement
    pub view_transform: ViewTransform,
}

impl Element {
    /// Create an element placed at `placement` under `view_transform`.
    pub fn new(kind: ElementKind, placement: Rect, view_transform: ViewTransform) -> Self {
        Self {
            kind,
            placement,
            view_transform,
        }
    }

    /// Ink signature placed with no zoom or pan.
    pub fn ink(signature: InkSignature, placement: Rect) -> Self {
        Self::new(ElementKind::FreeHand(signature), placement, ViewTransform::IDENTITY)
    }

    /// Image placed with no zoom or pan.
    pub fn image(data: Vec<u8>, placement: Rect) -> Self {
        Self::new(
            ElementKind::Image(ImageElement::new(data)),
            placement,
            ViewTransform::IDENTITY,
        )
    }

    /// Typed signature placed with no zoom or pan.
    pub fn typed(signature: TypedSignature, placement: Rect) -> Self {
        Self::new(ElementKind::TypedText(signature), placement, ViewTransform::IDENTITY)
    }

    /// Replace the view transform snapshot.
    pub fn with_view_transform(mut self, view_transform: ViewTransform) -> Self {
        self.view_transform = view_transform;
        self
    }
}
