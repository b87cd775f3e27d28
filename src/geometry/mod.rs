//! Geometric primitives and the view-to-page coordinate transform.
//!
//! Elements are placed in *view space*: a top-left-origin coordinate system
//! that has been zoomed and panned by the viewer. PDF *user space* has a
//! bottom-left origin and is measured in points. [`view_rect_to_page`] maps
//! between the two.

use serde::{Deserialize, Serialize};

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

impl Point {
    /// Create a new point.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_stamper::geometry::Point;
    ///
    /// let point = Point::new(10.0, 20.0);
    /// assert_eq!(point.x, 10.0);
    /// assert_eq!(point.y, 20.0);
    /// ```
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle.
///
/// In view space `(x, y)` is the top-left corner; in page space it is the
/// bottom-left corner. The type itself carries no orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// X coordinate of the origin corner
    pub x: f32,
    /// Y coordinate of the origin corner
    pub y: f32,
    /// Width of rectangle
    pub width: f32,
    /// Height of rectangle
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle from position and dimensions.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_stamper::geometry::Rect;
    ///
    /// let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
    /// assert_eq!(rect.width, 100.0);
    /// assert_eq!(rect.height, 50.0);
    /// ```
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from two corner points.
    pub fn from_points(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    /// Get the right edge x-coordinate.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Get the far edge y-coordinate (`y + height`).
    pub fn far_y(&self) -> f32 {
        self.y + self.height
    }

    /// True when the rectangle has a positive, finite area.
    pub fn is_drawable(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }

    /// Move the rectangle by `(dx, dy)`.
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// PDF rectangle array order: `[llx lly urx ury]`.
    pub fn to_pdf_array(&self) -> [f32; 4] {
        [self.x, self.y, self.right(), self.far_y()]
    }
}

/// Zoom and pan of the viewer when an element was placed.
///
/// A view coordinate `v` relates to an unscaled page coordinate `p` by
/// `v = p * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    /// Uniform zoom factor
    pub scale: f32,
    /// Horizontal pan in view units
    pub offset_x: f32,
    /// Vertical pan in view units
    pub offset_y: f32,
}

impl ViewTransform {
    /// The identity transform (no zoom, no pan).
    pub const IDENTITY: ViewTransform = ViewTransform {
        scale: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    /// Create a transform from zoom and pan.
    pub fn new(scale: f32, offset_x: f32, offset_y: f32) -> Self {
        Self {
            scale,
            offset_x,
            offset_y,
        }
    }

    /// A transform is usable only with a finite, positive scale and finite offsets.
    pub fn is_valid(&self) -> bool {
        self.scale.is_finite()
            && self.scale > 0.0
            && self.offset_x.is_finite()
            && self.offset_y.is_finite()
    }

    /// Map a view point back to unscaled page coordinates (still top-left origin).
    pub fn unapply(&self, point: Point) -> Point {
        Point::new(
            (point.x - self.offset_x) / self.scale,
            (point.y - self.offset_y) / self.scale,
        )
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Convert a view-space placement rectangle into a PDF page-space rectangle.
///
/// The view transform captured at placement time is undone first, then the
/// y axis is flipped against `page_height`. The returned rectangle's `(x, y)`
/// is its bottom-left corner in points.
///
/// # Examples
///
/// ```
/// use pdf_stamper::geometry::{view_rect_to_page, Rect, ViewTransform};
///
/// let page = view_rect_to_page(
///     &Rect::new(50.0, 40.0, 120.0, 30.0),
///     &ViewTransform::IDENTITY,
///     792.0,
/// );
/// assert_eq!(page, Rect::new(50.0, 722.0, 120.0, 30.0));
/// ```
pub fn view_rect_to_page(view_rect: &Rect, transform: &ViewTransform, page_height: f32) -> Rect {
    let top_left = transform.unapply(Point::new(view_rect.x, view_rect.y));
    let width = view_rect.width / transform.scale;
    let height = view_rect.height / transform.scale;
    let bottom = page_height - (top_left.y + height);
    Rect::new(top_left.x, bottom, width, height)
}
