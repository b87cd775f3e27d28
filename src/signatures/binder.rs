//! Binding stamped images to a detached document signature.
//!
//! Every signature element becomes a visible widget whose appearance is the
//! element's image. All widgets share one signature dictionary, so the
//! document carries a single CMS container covering the whole file.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use lopdf::{dictionary, Dictionary, Document as LoDocument, Object, ObjectId};

use super::appearance::{graphic_appearance, pdf_rect};
use super::byterange::ByteRangeCalculator;
use super::signer::{signer_common_name, text_string, PdfSigner};
use super::types::{Credential, SignOptions};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::rendering::RasterImage;
use crate::writer::{ContentWriter, ImageData};

/// Widget annotation flags: Print | Locked.
const WIDGET_FLAGS: i64 = 4 | 128;
/// AcroForm /SigFlags: SignaturesExist | AppendOnly.
const SIG_FLAGS: i64 = 3;

#[derive(Debug)]
struct PendingSignature {
    sig_dict_id: ObjectId,
    signing_time: DateTime<Utc>,
    fields: Vec<String>,
}

/// Stages signature widgets and seals the document once it is written.
#[derive(Debug)]
pub struct SignatureBinder {
    signer: PdfSigner,
    pending: Option<PendingSignature>,
    taken_names: Option<HashSet<String>>,
}

impl SignatureBinder {
    /// Create a binder with the given options.
    pub fn new(options: SignOptions) -> Self {
        Self {
            signer: PdfSigner::new(options),
            pending: None,
            taken_names: None,
        }
    }

    /// Number of signature fields staged so far.
    pub fn field_count(&self) -> usize {
        self.pending.as_ref().map_or(0, |p| p.fields.len())
    }

    /// Add a visible signature field named `field_name` showing `image` at
    /// `rect` (page space) on page `page_number` (1-based).
    ///
    /// The key is unlocked to check the credential and dropped again before
    /// returning; signing happens in [`finish`](Self::finish).
    pub fn sign(
        &mut self,
        writer: &mut ContentWriter,
        image: &RasterImage,
        rect: &Rect,
        page_number: u32,
        field_name: &str,
        credential: &Credential,
    ) -> Result<()> {
        if !rect.is_drawable() {
            return Err(Error::ProcessingError(format!(
                "cannot place signature in degenerate rectangle {:?}",
                rect
            )));
        }
        let page_id = writer.page_id(page_number)?;

        let signer_name = {
            let material = credential.retrieve()?;
            let leaf = material
                .leaf()
                .ok_or_else(|| Error::CredentialError("empty certificate chain".into()))?;
            signer_common_name(leaf)
        };

        self.reserve_name(writer.document(), field_name)?;

        let sig_dict_id = match self.pending.as_ref().map(|p| p.sig_dict_id) {
            Some(id) => id,
            None => {
                let signing_time = Utc::now();
                let dict = self
                    .signer
                    .build_signature_dictionary(signer_name.as_deref(), signing_time);
                let sig_dict_id = writer.document_mut().add_object(dict);
                log::debug!("Created signature dictionary {:?}", sig_dict_id);
                self.pending = Some(PendingSignature {
                    sig_dict_id,
                    signing_time,
                    fields: Vec::new(),
                });
                sig_dict_id
            },
        };

        let image_data = ImageData::from_raster(image)?;
        let image_id = writer.embed_image(&image_data);
        let appearance = graphic_appearance(&image_data, image_id, rect.width, rect.height)?;
        let appearance_id = writer.document_mut().add_object(appearance);

        let widget = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Sig",
            "T" => text_string(field_name),
            "V" => sig_dict_id,
            "Rect" => pdf_rect(rect),
            "F" => Object::Integer(WIDGET_FLAGS),
            "P" => page_id,
            "AP" => dictionary! { "N" => appearance_id },
        };
        let widget_id = writer.document_mut().add_object(widget);
        writer.add_annotation(page_number, widget_id)?;
        register_field(writer, widget_id)?;

        log::debug!(
            "Staged signature field '{}' on page {} at {:?}",
            field_name,
            page_number,
            rect
        );
        if let Some(ref mut pending) = self.pending {
            pending.fields.push(field_name.to_string());
        }
        Ok(())
    }

    /// Write the document and embed the detached signature.
    ///
    /// Without staged fields this is a plain [`ContentWriter::save`].
    pub fn finish(self, writer: ContentWriter, credential: &Credential) -> Result<Vec<u8>> {
        let Some(pending) = self.pending else {
            return writer.save();
        };
        let mut pdf = writer.save()?;

        let calc: &ByteRangeCalculator = self.signer.byte_range_calculator();
        let location = calc.locate(&pdf)?;
        let byte_range = self.signer.calculate_byte_range(pdf.len(), location.contents_offset);
        ByteRangeCalculator::validate_byte_range(&byte_range, pdf.len())?;
        ByteRangeCalculator::write_byte_range(&mut pdf, &location, &byte_range)?;

        let signed_bytes = PdfSigner::extract_signed_bytes(&pdf, &byte_range)?;
        let digest = self.signer.compute_digest(&signed_bytes);

        let container = {
            let material = credential.retrieve()?;
            self.signer
                .create_signature(&digest, &material, pending.signing_time)?
        };
        log::debug!(
            "CMS container is {} of {} reserved bytes",
            container.len(),
            calc.capacity()
        );
        self.signer
            .insert_signature(&mut pdf, location.contents_offset, &container)?;

        let check = self
            .signer
            .compute_digest(&PdfSigner::extract_signed_bytes(&pdf, &byte_range)?);
        if check != digest {
            return Err(Error::ProcessingError(
                "signed byte range changed while embedding the signature".into(),
            ));
        }

        log::info!(
            "Signed document with {} signature field(s), ByteRange {}",
            pending.fields.len(),
            ByteRangeCalculator::format_byte_range(&byte_range)
        );
        Ok(pdf)
    }

    fn reserve_name(&mut self, doc: &LoDocument, field_name: &str) -> Result<()> {
        if field_name.is_empty() {
            return Err(Error::ProcessingError("signature field name is empty".into()));
        }
        let taken = self
            .taken_names
            .get_or_insert_with(|| existing_field_names(doc));
        if !taken.insert(field_name.to_string()) {
            return Err(Error::ProcessingError(format!(
                "duplicate signature field name '{}'",
                field_name
            )));
        }
        Ok(())
    }
}

/// Names of the fields already in the document's AcroForm (top level).
fn existing_field_names(doc: &LoDocument) -> HashSet<String> {
    let mut names = HashSet::new();
    let Ok(catalog) = doc.catalog() else {
        return names;
    };
    let Some(acroform) = catalog.get(b"AcroForm").ok().and_then(|o| resolve_dict(doc, o)) else {
        return names;
    };
    let fields = match acroform.get(b"Fields") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    for field in &fields {
        if let Some(name) = resolve_dict(doc, field)
            .and_then(|d| d.get(b"T").ok())
            .and_then(|t| t.as_str().ok())
        {
            names.insert(String::from_utf8_lossy(name).into_owned());
        }
    }
    names
}

fn resolve_dict<'a>(doc: &'a LoDocument, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(d) => Some(d),
        _ => None,
    }
}

/// Add `field_id` to the AcroForm, creating it if needed, and set /SigFlags.
fn register_field(writer: &mut ContentWriter, field_id: ObjectId) -> Result<()> {
    let catalog_id = writer.catalog_id()?;
    let doc = writer.document_mut();

    let acroform_id = match doc.get_dictionary(catalog_id)?.get(b"AcroForm").ok().cloned() {
        Some(Object::Reference(id)) => id,
        Some(Object::Dictionary(dict)) => {
            // Move an inline form out so it can be edited in one place.
            let id = doc.add_object(dict);
            doc.get_dictionary_mut(catalog_id)?.set("AcroForm", id);
            id
        },
        _ => {
            let id = doc.add_object(dictionary! { "Fields" => Vec::<Object>::new() });
            doc.get_dictionary_mut(catalog_id)?.set("AcroForm", id);
            id
        },
    };

    let fields = doc.get_dictionary(acroform_id)?.get(b"Fields").ok().cloned();
    match fields {
        Some(Object::Reference(array_id)) => {
            doc.get_object_mut(array_id)?
                .as_array_mut()?
                .push(Object::Reference(field_id));
        },
        Some(Object::Array(mut items)) => {
            items.push(Object::Reference(field_id));
            doc.get_dictionary_mut(acroform_id)?.set("Fields", items);
        },
        _ => {
            doc.get_dictionary_mut(acroform_id)?
                .set("Fields", vec![Object::Reference(field_id)]);
        },
    }
    doc.get_dictionary_mut(acroform_id)?
        .set("SigFlags", Object::Integer(SIG_FLAGS));
    Ok(())
}
