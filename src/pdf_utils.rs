// lopdf helpers shared by the pipeline stages
use crate::error::ProcessingError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;

/// Page trees deeper than this are treated as malformed
const MAX_TREE_DEPTH: usize = 32;

/// US Letter, used when neither the page nor its ancestors carry a MediaBox
const DEFAULT_MEDIA_BOX: (f32, f32) = (612.0, 792.0);

/// Parse a PDF held in memory
pub fn load_pdf_mem(item: &str, data: &[u8]) -> Result<Document, ProcessingError> {
    Document::load_mem(data).map_err(|e| ProcessingError::parse(item, e))
}

/// Parse a PDF from disk
pub fn load_pdf(path: &Path) -> Result<Document, ProcessingError> {
    Document::load(path).map_err(|e| ProcessingError::parse(path.display().to_string(), e))
}

/// Serialize a document into a byte buffer
pub fn to_bytes(document: &mut Document, item: &str) -> Result<Vec<u8>, ProcessingError> {
    let mut buffer = Vec::new();
    document
        .save_to(&mut buffer)
        .map_err(|e| ProcessingError::SerializeError {
            item: item.to_string(),
            reason: e.to_string(),
        })?;
    Ok(buffer)
}

/// Build a new document holding only the given 1-based pages
///
/// Pages keep their original objects; nothing is re-rendered. Page order
/// follows the source document.
pub fn page_subset(document: &Document, keep: &[u32], item: &str) -> Result<Vec<u8>, ProcessingError> {
    let mut subset = document.clone();
    let dropped: Vec<u32> = subset
        .get_pages()
        .keys()
        .copied()
        .filter(|number| !keep.contains(number))
        .collect();

    subset.delete_pages(&dropped);
    subset.prune_objects();
    to_bytes(&mut subset, item)
}

/// Width and height of a page from its (possibly inherited) MediaBox
pub fn page_dimensions(document: &Document, page_id: ObjectId) -> (f32, f32) {
    let Some(Object::Array(bounds)) = inherited_attribute(document, page_id, b"MediaBox") else {
        return DEFAULT_MEDIA_BOX;
    };

    let values: Vec<f32> = bounds
        .iter()
        .filter_map(|value| resolve(document, value).as_float().ok())
        .collect();

    if values.len() != 4 {
        return DEFAULT_MEDIA_BOX;
    }

    ((values[2] - values[0]).abs(), (values[3] - values[1]).abs())
}

/// Effective /Rotate of a page, normalized into 0..360
pub fn page_rotation(document: &Document, page_id: ObjectId) -> i64 {
    inherited_attribute(document, page_id, b"Rotate")
        .and_then(|value| value.as_i64().ok())
        .map(|degrees| degrees.rem_euclid(360))
        .unwrap_or(0)
}

/// Look up a page attribute, walking up the page tree for inheritable keys
fn inherited_attribute<'a>(document: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node: &Dictionary = document.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(resolve(document, value));
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = document.get_dictionary(parent).ok()?;
    }

    None
}

fn resolve<'a>(document: &'a Document, value: &'a Object) -> &'a Object {
    match value {
        Object::Reference(id) => document.get_object(*id).unwrap_or(value),
        _ => value,
    }
}
