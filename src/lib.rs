// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::should_implement_trait)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]
#![cfg_attr(test, allow(unused_variables))]

//! # PDF Stamper
//!
//! Place images, hand-drawn ink and typed signatures onto the pages of an
//! existing PDF, either flattened into the page content or as the visible
//! appearance of a detached CAdES signature over the whole file.
//!
//! ## Pipeline
//!
//! - **Document model**: pages with their native media boxes and an ordered
//!   list of elements placed in view coordinates
//! - **Transform**: view rectangles are mapped back to PDF user space
//! - **Rasterizer**: every element kind becomes one encoded image
//! - **Stamper**: images are drawn into page content through one writer
//! - **Signatures**: optional visible signature fields sharing one CMS
//!   container, with keys held in a keystore
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_stamper::{Document, Element, PageStamper, Rect, StampConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut doc = Document::open("contract.pdf")?;
//! let png = std::fs::read("initials.png")?;
//! doc.page_mut(0)
//!     .ok_or("empty document")?
//!     .push_element(Element::image(png, Rect::new(50.0, 40.0, 120.0, 30.0)));
//!
//! let stamper = PageStamper::new(StampConfig::new("/home/me/Documents"));
//! let path = stamper.stamp(&doc, "contract-signed.pdf", None)?;
//! println!("{}", path.display());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Coordinates and the view transform
pub mod geometry;

// Page/element model
pub mod document;

// Element rasterization
pub mod rendering;

// Content stream rewriting
pub mod writer;

// Detached signatures
pub mod signatures;

// Per-page stamping loop
pub mod stamper;

// Output directory and atomic writes
pub mod output;

// Background stamping job
pub mod job;

// Re-exports
pub use config::StampConfig;
pub use document::{Document, Element, ElementKind, Page};
pub use error::{Error, Result};
pub use geometry::{view_rect_to_page, Rect, ViewTransform};
pub use job::{StampJob, StampStatus};
pub use output::OutputLocation;
pub use signatures::{Credential, KeyStore, MemoryKeyStore, SignOptions};
pub use stamper::{PageStamper, StampOutcome};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
