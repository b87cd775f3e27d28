//! Page stamper: walks the document model and writes every element.
//!
//! For each page, in order, and each element, in insertion order:
//!
//! 1. read the page's media box from the source
//! 2. rasterize the element (empty elements are skipped)
//! 3. map its view rectangle into page space
//! 4. draw the image into the page content, or stage a signature widget
//!    when a credential is supplied
//!
//! One [`ContentWriter`] is opened lazily and shared by the whole loop; the
//! document is rewritten once at the end. When nothing was drawn the source
//! bytes are returned unchanged.

use std::path::PathBuf;

use crate::config::StampConfig;
use crate::document::{Document, Element, Page, SourceReader};
use crate::error::{Error, Result};
use crate::geometry::{view_rect_to_page, Rect};
use crate::output::OutputLocation;
use crate::rendering::ElementRasterizer;
use crate::signatures::{Credential, SignatureBinder};
use crate::writer::ContentWriter;

/// Message reported for a successful write.
pub const SUCCESS_MESSAGE: &str = "PDF document saved successfully";

/// Result of one stamping run, for callers that only report pass/fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampOutcome {
    /// Whether the file was written
    pub success: bool,
    /// Human-readable message
    pub message: String,
    /// Written file, on success
    pub path: Option<PathBuf>,
}

impl StampOutcome {
    fn from_result(result: Result<PathBuf>) -> Self {
        match result {
            Ok(path) => Self {
                success: true,
                message: SUCCESS_MESSAGE.to_string(),
                path: Some(path),
            },
            Err(err) => Self {
                success: false,
                message: err.to_string(),
                path: None,
            },
        }
    }

    /// Failure outcome with `message`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            path: None,
        }
    }
}

/// Applies a document's elements to its pages and writes the result.
#[derive(Debug, Clone)]
pub struct PageStamper {
    config: StampConfig,
    rasterizer: ElementRasterizer,
    output: OutputLocation,
}

impl PageStamper {
    /// Create a stamper for `config`.
    pub fn new(config: StampConfig) -> Self {
        let rasterizer = ElementRasterizer::new(config.pixel_density);
        let output = OutputLocation::from_config(&config);
        Self {
            config,
            rasterizer,
            output,
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &StampConfig {
        &self.config
    }

    /// Output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output.dir().to_path_buf()
    }

    /// Stamp `document` and write it as `file_name` in the output directory.
    ///
    /// An existing file of that name is replaced. On failure no file is left
    /// at the target path.
    pub fn stamp(&self, document: &Document, file_name: &str, credential: Option<&Credential>) -> Result<PathBuf> {
        let target = self.output.prepare(file_name)?;
        let bytes = self.stamp_to_bytes(document, credential)?;
        self.output.write(&target, &bytes)?;
        log::info!("Wrote {} ({} bytes)", target.display(), bytes.len());
        Ok(target)
    }

    /// [`stamp`](Self::stamp), reduced to a success flag and message.
    pub fn run(&self, document: &Document, file_name: &str, credential: Option<&Credential>) -> StampOutcome {
        let result = self.stamp(document, file_name, credential);
        if let Err(ref err) = result {
            log::warn!("Stamping {} failed: {}", file_name, err);
        }
        StampOutcome::from_result(result)
    }

    /// Stamp `document` and return the output bytes.
    pub fn stamp_to_bytes(&self, document: &Document, credential: Option<&Credential>) -> Result<Vec<u8>> {
        let reader = SourceReader::parse(document.source())?;
        let mut writer: Option<ContentWriter> = None;
        let mut binder = credential.map(|_| SignatureBinder::new(self.config.sign_options.clone()));

        log::debug!(
            "Stamping {} elements over {} pages{}",
            document.element_count(),
            document.page_count(),
            if credential.is_some() { " (signed)" } else { "" }
        );

        for page in document.pages() {
            let media_box = reader.media_box(page.number())?;
            for (j, element) in page.elements().iter().enumerate() {
                let Some(raster) = self
                    .rasterizer
                    .rasterize(element)
                    .map_err(|e| in_element(e, page, j))?
                else {
                    log::warn!(
                        "Skipping empty {} element {} on page {}",
                        element.kind.label(),
                        j,
                        page.index()
                    );
                    continue;
                };
                let rect = page_rect(element, &media_box).map_err(|e| in_element(e, page, j))?;

                if writer.is_none() {
                    writer = Some(ContentWriter::open(document.source())?);
                }
                let Some(w) = writer.as_mut() else {
                    continue;
                };

                match (binder.as_mut(), credential) {
                    (Some(binder), Some(credential)) => {
                        let field_name = format!("sig_p{}_e{}", page.index(), j);
                        binder.sign(w, &raster, &rect, page.number(), &field_name, credential)
                    },
                    _ => w.draw_image(page.number(), &raster, &rect),
                }
                .map_err(|e| in_element(e, page, j))?;
                log::debug!(
                    "Stamped {} element {} on page {} at {:?}",
                    element.kind.label(),
                    j,
                    page.index(),
                    rect
                );
            }
        }

        let Some(writer) = writer else {
            log::debug!("No element produced an image, keeping source bytes");
            return Ok(document.source().to_vec());
        };
        match (binder, credential) {
            (Some(binder), Some(credential)) => binder.finish(writer, credential),
            _ => writer.save(),
        }
    }
}

/// Page-space rectangle of `element` on a page with `media_box`.
fn page_rect(element: &Element, media_box: &Rect) -> Result<Rect> {
    if !element.view_transform.is_valid() {
        return Err(Error::ProcessingError(format!(
            "invalid view transform {:?}",
            element.view_transform
        )));
    }
    let rect = view_rect_to_page(&element.placement, &element.view_transform, media_box.height);
    Ok(rect.translate(media_box.x, media_box.y))
}

/// Prefix processing errors with the element's position.
fn in_element(err: Error, page: &Page, element: usize) -> Error {
    match err {
        Error::ProcessingError(msg) => {
            Error::ProcessingError(format!("page {}, element {}: {}", page.index(), element, msg))
        },
        other => other,
    }
}
