//! Read-only access to a source PDF's page tree.
//!
//! The stamper only needs page count and per-page geometry from the source;
//! the rewrite pass parses the bytes again through [`crate::writer::ContentWriter`].

use lopdf::{Dictionary, Document as LoDocument, Object, ObjectId};
use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};
use crate::geometry::Rect;

/// US Letter, used when a page tree carries no MediaBox at all.
const FALLBACK_MEDIA_BOX: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 612.0,
    height: 792.0,
};

/// Deepest page tree walked when looking up inherited attributes.
const MAX_TREE_DEPTH: usize = 64;

/// Parsed source document, addressed by 1-based page numbers.
pub struct SourceReader {
    doc: LoDocument,
    pages: BTreeMap<u32, ObjectId>,
}

impl SourceReader {
    /// Parse `bytes` as a PDF.
    ///
    /// Fails with [`Error::InvalidDocument`] when the bytes are not a PDF,
    /// are encrypted, or contain no pages.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let doc = load_document(bytes)?;
        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(Error::InvalidDocument("document has no pages".into()));
        }
        log::debug!("Parsed source document with {} pages", pages.len());
        Ok(Self { doc, pages })
    }

    /// Number of pages in the source.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Native media box of page `page_number` (1-based).
    pub fn media_box(&self, page_number: u32) -> Result<Rect> {
        let page_id = self.pages.get(&page_number).copied().ok_or_else(|| {
            Error::InvalidDocument(format!("page {} does not exist", page_number))
        })?;
        Ok(media_box(&self.doc, page_id))
    }
}

/// Load a PDF with lopdf and reject what cannot be rewritten.
pub(crate) fn load_document(bytes: &[u8]) -> Result<LoDocument> {
    if bytes.is_empty() {
        return Err(Error::InvalidDocument("empty input".into()));
    }
    let doc = LoDocument::load_mem(bytes).map_err(|e| Error::InvalidDocument(e.to_string()))?;
    if doc.is_encrypted() {
        return Err(Error::InvalidDocument("encrypted documents are not supported".into()));
    }
    Ok(doc)
}

/// MediaBox of a page, inherited through `/Parent` when the page itself has none.
pub(crate) fn media_box(doc: &LoDocument, page_id: ObjectId) -> Rect {
    for dict in page_ancestry(doc, page_id) {
        if let Some(rect) = extract_media_box(doc, dict) {
            return rect;
        }
    }
    log::warn!("Page {:?} has no MediaBox, assuming US Letter", page_id);
    FALLBACK_MEDIA_BOX
}

/// A page dictionary followed by its `/Parent` chain, nearest first.
///
/// Stops at a missing object, a node already seen, or after
/// `MAX_TREE_DEPTH` nodes.
pub(crate) fn page_ancestry(doc: &LoDocument, page_id: ObjectId) -> Vec<&Dictionary> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(page_id);
    while let Some(id) = current {
        if !seen.insert(id) || chain.len() >= MAX_TREE_DEPTH {
            log::warn!("Page tree above {:?} is cyclic or too deep", page_id);
            break;
        }
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };
        chain.push(dict);
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    chain
}

fn extract_media_box(doc: &LoDocument, dict: &Dictionary) -> Option<Rect> {
    let raw = dict.get(b"MediaBox").ok()?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let llx = number(&arr[0])?;
    let lly = number(&arr[1])?;
    let urx = number(&arr[2])?;
    let ury = number(&arr[3])?;
    Some(Rect::from_points(llx, lly, urx, ury))
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::sample_pdf;

    #[test]
    fn test_parse_reports_page_count() {
        let reader = SourceReader::parse(&sample_pdf(3, [0.0, 0.0, 612.0, 792.0])).unwrap();
        assert_eq!(reader.page_count(), 3);
    }

    #[test]
    fn test_media_box_is_inherited_from_page_tree() {
        let reader = SourceReader::parse(&sample_pdf(1, [0.0, 0.0, 595.0, 842.0])).unwrap();
        assert_eq!(reader.media_box(1).unwrap(), Rect::new(0.0, 0.0, 595.0, 842.0));
    }

    #[test]
    fn test_media_box_with_offset_origin() {
        let reader = SourceReader::parse(&sample_pdf(1, [10.0, 20.0, 310.0, 420.0])).unwrap();
        assert_eq!(reader.media_box(1).unwrap(), Rect::new(10.0, 20.0, 300.0, 400.0));
    }

    #[test]
    fn test_missing_page_number() {
        let reader = SourceReader::parse(&sample_pdf(1, [0.0, 0.0, 612.0, 792.0])).unwrap();
        assert!(matches!(reader.media_box(0), Err(Error::InvalidDocument(_))));
        assert!(matches!(reader.media_box(2), Err(Error::InvalidDocument(_))));
    }

    #[test]
    fn test_cyclic_parent_chain_terminates() {
        let mut doc = LoDocument::with_version("1.5");
        let page_id = doc.new_object_id();
        let node_id = doc.new_object_id();
        doc.objects.insert(
            page_id,
            Object::Dictionary(lopdf::dictionary! { "Type" => "Page", "Parent" => node_id }),
        );
        doc.objects.insert(
            node_id,
            Object::Dictionary(lopdf::dictionary! { "Type" => "Pages", "Parent" => page_id }),
        );
        assert_eq!(page_ancestry(&doc, page_id).len(), 2);
        assert_eq!(media_box(&doc, page_id), FALLBACK_MEDIA_BOX);
    }

    #[test]
    fn test_garbage_is_invalid_document() {
        assert!(matches!(
            SourceReader::parse(b"not a pdf at all"),
            Err(Error::InvalidDocument(_))
        ));
        assert!(matches!(SourceReader::parse(b""), Err(Error::InvalidDocument(_))));
    }
}
