//! Single-pass rewrite of a source document with stamped content.
//!
//! A [`ContentWriter`] owns one parsed copy of the source. Images are added
//! as XObjects immediately; page content is accumulated per page and
//! installed when the writer is saved, so every touched page gets exactly
//! one `q` prefix and one overlay stream no matter how many elements it has.

use std::collections::{BTreeMap, HashSet};

use lopdf::{dictionary, Dictionary, Document as LoDocument, Object, ObjectId, Stream};

use super::content_stream::ContentStreamBuilder;
use super::image_handler::{ImageData, ImagePlacement};
use crate::document::{load_document, media_box, page_ancestry};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::rendering::RasterImage;

/// Prefix of XObject resource names added by the writer.
const IMAGE_RESOURCE_PREFIX: &str = "StIm";

#[derive(Debug, Default)]
struct PageOverlay {
    content: ContentStreamBuilder,
    xobjects: Vec<(String, ObjectId)>,
}

/// Where a page's resource dictionary lives.
#[derive(Debug, Clone, Copy)]
enum DictSlot {
    /// Inline in the page dictionary under `/Resources`
    Inline(ObjectId),
    /// A separate indirect object
    Indirect(ObjectId),
}

/// Rewrites a source PDF with stamped images and signature fields.
pub struct ContentWriter {
    doc: LoDocument,
    pages: BTreeMap<u32, ObjectId>,
    overlays: BTreeMap<u32, PageOverlay>,
    next_image: u32,
    images_drawn: usize,
}

impl ContentWriter {
    /// Parse `source` for rewriting.
    pub fn open(source: &[u8]) -> Result<Self> {
        let doc = load_document(source)?;
        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(Error::InvalidDocument("document has no pages".into()));
        }
        Ok(Self {
            doc,
            pages,
            overlays: BTreeMap::new(),
            next_image: 1,
            images_drawn: 0,
        })
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Object id of page `page_number` (1-based).
    pub fn page_id(&self, page_number: u32) -> Result<ObjectId> {
        self.pages.get(&page_number).copied().ok_or_else(|| {
            Error::ProcessingError(format!("page {} does not exist", page_number))
        })
    }

    /// Media box of page `page_number` (1-based).
    pub fn media_box(&self, page_number: u32) -> Result<Rect> {
        Ok(media_box(&self.doc, self.page_id(page_number)?))
    }

    /// Number of images drawn into page content so far.
    pub fn images_drawn(&self) -> usize {
        self.images_drawn
    }

    pub(crate) fn document(&self) -> &LoDocument {
        &self.doc
    }

    pub(crate) fn document_mut(&mut self) -> &mut LoDocument {
        &mut self.doc
    }

    /// Add `image` (and its soft mask) as XObjects; returns the image's id.
    pub fn embed_image(&mut self, image: &ImageData) -> ObjectId {
        let mask_id = image.build_soft_mask().map(|mask| self.doc.add_object(mask));
        self.doc.add_object(image.build_xobject(mask_id))
    }

    /// Draw `raster` into the content of page `page_number` (1-based).
    ///
    /// `target` is in page space (bottom-left origin). The image is scaled
    /// uniformly to fit, centered horizontally and resting on the bottom edge.
    pub fn draw_image(&mut self, page_number: u32, raster: &RasterImage, target: &Rect) -> Result<()> {
        if !target.is_drawable() {
            return Err(Error::ProcessingError(format!(
                "cannot draw into degenerate rectangle {:?}",
                target
            )));
        }
        let page_id = self.page_id(page_number)?;
        let image = ImageData::from_raster(raster)?;
        let image_id = self.embed_image(&image);
        let name = self.allocate_resource_name(page_number, page_id);
        let placement = ImagePlacement::bottom_centered(&image, target);

        log::debug!(
            "Drawing {}x{} image as /{} on page {} at {:?}",
            image.width,
            image.height,
            name,
            page_number,
            placement
        );

        let overlay = self.overlays.entry(page_number).or_default();
        overlay.content.draw_image_at(&name, &placement);
        overlay.xobjects.push((name, image_id));
        self.images_drawn += 1;
        Ok(())
    }

    /// Append `annot_id` to the `/Annots` of page `page_number` (1-based).
    pub(crate) fn add_annotation(&mut self, page_number: u32, annot_id: ObjectId) -> Result<()> {
        let page_id = self.page_id(page_number)?;
        let annots = self.doc.get_dictionary(page_id)?.get(b"Annots").ok().cloned();
        match annots {
            Some(Object::Reference(array_id)) => {
                self.doc
                    .get_object_mut(array_id)?
                    .as_array_mut()?
                    .push(Object::Reference(annot_id));
            },
            Some(Object::Array(mut items)) => {
                items.push(Object::Reference(annot_id));
                self.doc.get_dictionary_mut(page_id)?.set("Annots", items);
            },
            _ => {
                self.doc
                    .get_dictionary_mut(page_id)?
                    .set("Annots", vec![Object::Reference(annot_id)]);
            },
        }
        Ok(())
    }

    /// Object id of the document catalog.
    pub(crate) fn catalog_id(&self) -> Result<ObjectId> {
        Ok(self.doc.trailer.get(b"Root")?.as_reference()?)
    }

    /// Install accumulated page content and serialize the document.
    pub fn save(mut self) -> Result<Vec<u8>> {
        let overlays = std::mem::take(&mut self.overlays);
        for (page_number, overlay) in overlays {
            let page_id = self.page_id(page_number)?;
            self.register_xobjects(page_id, &overlay.xobjects)?;
            let content = overlay.content.build()?;
            self.append_content(page_id, content)?;
        }

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| Error::ProcessingError(format!("Cannot serialize document: {}", e)))?;
        log::debug!(
            "Serialized document: {} bytes, {} images drawn",
            out.len(),
            self.images_drawn
        );
        Ok(out)
    }

    fn allocate_resource_name(&mut self, page_number: u32, page_id: ObjectId) -> String {
        let mut taken = self.existing_xobject_names(page_id);
        if let Some(overlay) = self.overlays.get(&page_number) {
            taken.extend(overlay.xobjects.iter().map(|(n, _)| n.as_bytes().to_vec()));
        }
        loop {
            let name = format!("{}{}", IMAGE_RESOURCE_PREFIX, self.next_image);
            self.next_image += 1;
            if !taken.contains(name.as_bytes()) {
                return name;
            }
        }
    }

    fn existing_xobject_names(&self, page_id: ObjectId) -> HashSet<Vec<u8>> {
        let Some(resources) = self.inherited_resources(page_id) else {
            return HashSet::new();
        };
        let resources = match resources {
            Object::Reference(id) => self.doc.get_dictionary(id).ok(),
            Object::Dictionary(ref d) => Some(d),
            _ => None,
        };
        let xobjects = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| match x {
                Object::Reference(id) => self.doc.get_dictionary(*id).ok(),
                Object::Dictionary(d) => Some(d),
                _ => None,
            });
        xobjects
            .map(|d| d.iter().map(|(k, _)| k.clone()).collect())
            .unwrap_or_default()
    }

    /// `/Resources` of a page, looked up through `/Parent` when not on the page.
    fn inherited_resources(&self, page_id: ObjectId) -> Option<Object> {
        page_ancestry(&self.doc, page_id)
            .into_iter()
            .find_map(|dict| dict.get(b"Resources").ok().cloned())
    }

    /// Make sure the page has its own `/Resources` entry and report where it is.
    fn resources_slot(&mut self, page_id: ObjectId) -> Result<DictSlot> {
        let own = self.doc.get_dictionary(page_id)?.get(b"Resources").ok().cloned();
        let resources = match own {
            Some(obj) => obj,
            None => {
                // Inherited resources are copied down so the page keeps them
                // once it carries its own entry.
                let inherited = self
                    .inherited_resources(page_id)
                    .unwrap_or_else(|| Object::Dictionary(Dictionary::new()));
                self.doc
                    .get_dictionary_mut(page_id)?
                    .set("Resources", inherited.clone());
                inherited
            },
        };
        match resources {
            Object::Reference(id) => Ok(DictSlot::Indirect(id)),
            Object::Dictionary(_) => Ok(DictSlot::Inline(page_id)),
            _ => Err(Error::ProcessingError(format!(
                "page {:?} has malformed /Resources",
                page_id
            ))),
        }
    }

    fn resources_mut(&mut self, slot: DictSlot) -> Result<&mut Dictionary> {
        Ok(match slot {
            DictSlot::Inline(page_id) => self
                .doc
                .get_dictionary_mut(page_id)?
                .get_mut(b"Resources")?
                .as_dict_mut()?,
            DictSlot::Indirect(id) => self.doc.get_dictionary_mut(id)?,
        })
    }

    fn register_xobjects(&mut self, page_id: ObjectId, xobjects: &[(String, ObjectId)]) -> Result<()> {
        let slot = self.resources_slot(page_id)?;
        let existing = self.resources_mut(slot)?.get(b"XObject").ok().cloned();
        match existing {
            Some(Object::Reference(xobject_id)) => {
                let dict = self.doc.get_dictionary_mut(xobject_id)?;
                for (name, id) in xobjects {
                    dict.set(name.as_str(), *id);
                }
            },
            Some(Object::Dictionary(mut dict)) => {
                for (name, id) in xobjects {
                    dict.set(name.as_str(), *id);
                }
                self.resources_mut(slot)?.set("XObject", dict);
            },
            Some(_) => {
                return Err(Error::ProcessingError(format!(
                    "page {:?} has malformed /XObject resources",
                    page_id
                )))
            },
            None => {
                let mut dict = Dictionary::new();
                for (name, id) in xobjects {
                    dict.set(name.as_str(), *id);
                }
                self.resources_mut(slot)?.set("XObject", dict);
            },
        }
        Ok(())
    }

    /// Wrap the page's existing content in `q … Q` and append `overlay`.
    fn append_content(&mut self, page_id: ObjectId, overlay: Vec<u8>) -> Result<()> {
        let current = self.doc.get_dictionary(page_id)?.get(b"Contents").ok().cloned();
        let existing: Vec<Object> = match current {
            Some(Object::Reference(id)) => match self.doc.get_object(id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(id)],
            },
            Some(Object::Array(items)) => items,
            _ => Vec::new(),
        };

        let mut contents = Vec::with_capacity(existing.len() + 2);
        let body = if existing.is_empty() {
            overlay
        } else {
            let open_id = self.doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
            contents.push(Object::Reference(open_id));
            contents.extend(existing);
            let mut body = b"\nQ\n".to_vec();
            body.extend(overlay);
            body
        };
        let overlay_id = self.doc.add_object(Stream::new(dictionary! {}, body));
        contents.push(Object::Reference(overlay_id));

        self.doc.get_dictionary_mut(page_id)?.set("Contents", contents);
        Ok(())
    }
}
