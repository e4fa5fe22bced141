use lopdf::Document;
use regex::Regex;
use log::{debug, warn};

/// Text layer extraction for single pages
///
/// Scanned intake packets frequently carry no text layer at all, so this never
/// fails: a page without extractable text yields the empty string and the
/// classifier treats it as unclassifiable.
pub struct PageTextExtractor {
    cleanup_regex: Regex,
}

impl PageTextExtractor {
    pub fn new() -> Self {
        // Cleanup regex: collapses runs of whitespace left by text operators
        let cleanup_regex = Regex::new(r"\s+").expect("Invalid cleanup regex");

        PageTextExtractor {
            cleanup_regex,
        }
    }

    /// Extract and clean text from a 1-based page of a document
    pub fn extract_page_text(&self, document: &Document, page_number: u32) -> String {
        debug!("Extracting text from page {}", page_number);

        let raw_text = match document.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                warn!("Page {} has no usable text layer: {}", page_number, e);
                return String::new();
            }
        };

        if raw_text.trim().is_empty() {
            warn!("Page {} has no text layer", page_number);
            return String::new();
        }

        let cleaned_text = self.cleanup_text(&raw_text);

        debug!("Extracted {} characters from page {}", cleaned_text.len(), page_number);
        cleaned_text
    }

    /// Replace whitespace runs with single spaces and trim the edges
    fn cleanup_text(&self, text: &str) -> String {
        let normalized = self.cleanup_regex.replace_all(text, " ");
        normalized.trim().to_string()
    }
}

impl Default for PageTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}
