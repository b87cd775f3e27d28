//! PDF writing module for stamping existing documents.
//!
//! ## Architecture
//!
//! ```text
//! RasterImage
//!     ↓
//! [ImageData] (PNG/JPEG → Image XObject + soft mask)
//!     ↓
//! [ContentStreamBuilder] (placement → q/cm/Do/Q operators)
//!     ↓
//! [ContentWriter] (page resources, content wrapping, single rewrite)
//!     ↓
//! PDF bytes
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use pdf_stamper::writer::ContentWriter;
//!
//! let mut writer = ContentWriter::open(&source_bytes)?;
//! writer.draw_image(1, &raster, &page_rect)?;
//! let bytes = writer.save()?;
//! ```

mod content_stream;
mod content_writer;
mod image_handler;

pub use content_stream::{ContentStreamBuilder, ContentStreamOp};
pub use content_writer::ContentWriter;
pub use image_handler::{ColorSpace, ImageData, ImageEncoding, ImageError, ImagePlacement};
