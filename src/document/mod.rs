//! In-memory document model: source bytes, pages and placed elements.
//!
//! The page list is fixed once a document is loaded. Elements are appended by
//! the caller in drawing order; the stamping pipeline only reads them.

mod element;
mod reader;

pub use element::{
    Element, ElementKind, ImageElement, InkColor, InkSignature, InkStroke, TypedSignature,
};
pub use reader::SourceReader;

pub(crate) use reader::{load_document, media_box, page_ancestry};

use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::geometry::Rect;

/// One page of a loaded document.
#[derive(Debug, Clone)]
pub struct Page {
    index: usize,
    media_box: Rect,
    elements: Vec<Element>,
}

impl Page {
    /// 0-based page index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// 1-based page number as used for PDF addressing.
    pub fn number(&self) -> u32 {
        self.index as u32 + 1
    }

    /// Native media box in points.
    pub fn media_box(&self) -> Rect {
        self.media_box
    }

    /// Page width in points.
    pub fn width(&self) -> f32 {
        self.media_box.width
    }

    /// Page height in points.
    pub fn height(&self) -> f32 {
        self.media_box.height
    }

    /// Elements in drawing order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Place an element on top of the existing ones.
    pub fn push_element(&mut self, element: Element) {
        self.elements.push(element);
    }
}

/// A source PDF plus the elements placed on its pages.
#[derive(Debug, Clone)]
pub struct Document {
    source: Arc<[u8]>,
    pages: Vec<Page>,
}

impl Document {
    /// Load a document from PDF bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes: Vec<u8> = bytes.into();
        let reader = SourceReader::parse(&bytes)?;
        let pages = (0..reader.page_count())
            .map(|index| {
                Ok(Page {
                    index,
                    media_box: reader.media_box(index as u32 + 1)?,
                    elements: Vec::new(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            source: Arc::from(bytes),
            pages,
        })
    }

    /// Load a document from a file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| Error::InvalidDocument(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(bytes)
    }

    /// The untouched source bytes.
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All pages in order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Page at 0-based `index`.
    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    /// Mutable page at 0-based `index`.
    pub fn page_mut(&mut self, index: usize) -> Option<&mut Page> {
        self.pages.get_mut(index)
    }

    /// Total number of placed elements across all pages.
    pub fn element_count(&self) -> usize {
        self.pages.iter().map(|p| p.elements.len()).sum()
    }
}
