use crate::config::RotationRule;
use crate::error::ProcessingError;
use crate::pdf_utils::{load_pdf_mem, page_dimensions, page_rotation, to_bytes};
use lopdf::{Document, Object};
use std::fs;
use std::path::Path;
use log::{debug, info, warn};

/// Rotates scanned pages that were captured sideways
///
/// With `RotationRule::PortraitPages` a page narrower than it is tall gets
/// /Rotate += 90. This mirrors the legacy intake tool, which rotates pages that
/// already look portrait; it is kept for output compatibility and is most
/// likely an inverted comparison. `LandscapePages` applies the opposite test.
pub struct OrientationNormalizer {
    rule: RotationRule,
}

/// Outcome of normalizing a file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeReport {
    /// Document parsed; the listed 1-based pages were rotated
    Rotated(Vec<u32>),
    /// Document could not be parsed and was copied through unchanged
    PassedThrough(String),
}

impl OrientationNormalizer {
    pub fn new(rule: RotationRule) -> Self {
        OrientationNormalizer { rule }
    }

    fn needs_rotation(&self, width: f32, height: f32) -> bool {
        match self.rule {
            RotationRule::PortraitPages => width < height,
            RotationRule::LandscapePages => width > height,
            RotationRule::Disabled => false,
        }
    }

    /// Rotate qualifying pages in place, returning their 1-based numbers
    ///
    /// Page count and order are untouched.
    pub fn normalize_document(&self, document: &mut Document) -> Vec<u32> {
        let mut rotated = Vec::new();

        for (page_number, page_id) in document.get_pages() {
            let (width, height) = page_dimensions(document, page_id);
            if !self.needs_rotation(width, height) {
                continue;
            }

            let degrees = (page_rotation(document, page_id) + 90) % 360;
            match document.get_object_mut(page_id).and_then(|object| object.as_dict_mut()) {
                Ok(page) => {
                    page.set("Rotate", Object::Integer(degrees));
                    debug!("Page {} ({}x{}) rotated to {}°", page_number, width, height, degrees);
                    rotated.push(page_number);
                }
                Err(e) => warn!("Page {} could not be rotated: {}", page_number, e),
            }
        }

        rotated
    }

    /// Normalize PDF bytes; unparseable input is returned unchanged
    pub fn normalize_bytes(&self, item: &str, data: &[u8]) -> (Vec<u8>, NormalizeReport) {
        let mut document = match load_pdf_mem(item, data) {
            Ok(document) => document,
            Err(e) => {
                warn!("Skipping orientation for {}: {}", item, e);
                return (data.to_vec(), NormalizeReport::PassedThrough(e.to_string()));
            }
        };

        let rotated = self.normalize_document(&mut document);
        match to_bytes(&mut document, item) {
            Ok(bytes) => (bytes, NormalizeReport::Rotated(rotated)),
            Err(e) => {
                warn!("Skipping orientation for {}: {}", item, e);
                (data.to_vec(), NormalizeReport::PassedThrough(e.to_string()))
            }
        }
    }

    /// Normalize `source` into `destination`
    ///
    /// Only I/O failures are errors; a PDF that cannot be parsed is copied as is.
    pub fn normalize_file(&self, source: &Path, destination: &Path) -> Result<NormalizeReport, ProcessingError> {
        let data = fs::read(source).map_err(|e| ProcessingError::io(source, e))?;
        let item = source.display().to_string();
        let (output, report) = self.normalize_bytes(&item, &data);

        fs::write(destination, output).map_err(|e| ProcessingError::io(destination, e))?;
        info!("Normalized {} -> {} ({:?})", source.display(), destination.display(), report);
        Ok(report)
    }
}
