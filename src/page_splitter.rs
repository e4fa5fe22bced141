use crate::error::ProcessingError;
use crate::pdf_utils::page_subset;
use lopdf::Document;
use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, error, info};

/// Marker placed between the source stem and the page number
pub const PAGE_MARKER: &str = "pagina";

/// One page materialized as its own document
#[derive(Debug, Clone)]
pub struct SplitPage {
    pub page_number: u32,
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Result of splitting a document; failed pages do not stop the rest
#[derive(Debug, Default)]
pub struct SplitOutcome {
    pub pages: Vec<SplitPage>,
    pub failures: Vec<(u32, ProcessingError)>,
}

/// Splits an N-page document into N single-page documents
pub struct PageSplitter;

impl PageSplitter {
    pub fn new() -> Self {
        PageSplitter
    }

    /// Deterministic file name for page `page_number` of `stem`
    pub fn page_file_name(stem: &str, page_number: u32) -> String {
        format!("{}_{}_{}.pdf", stem, PAGE_MARKER, page_number)
    }

    /// Split in memory
    pub fn split(&self, document: &Document, stem: &str) -> SplitOutcome {
        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        info!("Splitting {} into {} pages", stem, page_numbers.len());

        let mut outcome = SplitOutcome::default();
        for page_number in page_numbers {
            let file_name = Self::page_file_name(stem, page_number);
            match page_subset(document, &[page_number], &file_name) {
                Ok(data) => {
                    debug!("Split page {} of {} ({} bytes)", page_number, stem, data.len());
                    outcome.pages.push(SplitPage {
                        page_number,
                        file_name,
                        data,
                    });
                }
                Err(e) => {
                    error!("Failed to split page {} of {}: {}", page_number, stem, e);
                    outcome.failures.push((page_number, e));
                }
            }
        }

        outcome
    }

    /// Split and write every page into `directory`, returning the written paths
    pub fn split_to_dir(&self, document: &Document, stem: &str, directory: &Path) -> Result<Vec<PathBuf>, ProcessingError> {
        fs::create_dir_all(directory).map_err(|e| ProcessingError::io(directory, e))?;

        let outcome = self.split(document, stem);
        let mut written = Vec::with_capacity(outcome.pages.len());
        for page in outcome.pages {
            let path = directory.join(&page.file_name);
            match fs::write(&path, &page.data) {
                Ok(()) => written.push(path),
                Err(e) => error!("Failed to write {}: {}", path.display(), e),
            }
        }

        Ok(written)
    }
}

impl Default for PageSplitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf_utils::load_pdf_mem;
    use crate::pdf_utils::test_support::numbered_pdf;
    use tempfile::TempDir;

    #[test]
    fn test_split_produces_one_document_per_page() {
        let doc = load_pdf_mem("packet.pdf", &numbered_pdf(5)).unwrap();
        let outcome = PageSplitter::new().split(&doc, "packet");

        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.pages.len(), 5);

        for (index, page) in outcome.pages.iter().enumerate() {
            let expected_number = index as u32 + 1;
            assert_eq!(page.page_number, expected_number);
            assert_eq!(page.file_name, format!("packet_pagina_{}.pdf", expected_number));

            let single = load_pdf_mem(&page.file_name, &page.data).unwrap();
            assert_eq!(single.get_pages().len(), 1);
            let text = single.extract_text(&[1]).unwrap();
            assert!(text.contains(&format!("PAGE {}", expected_number)));
        }
    }

    #[test]
    fn test_split_to_dir_writes_files() {
        let dir = TempDir::new().unwrap();
        let doc = load_pdf_mem("packet.pdf", &numbered_pdf(3)).unwrap();

        let written = PageSplitter::new()
            .split_to_dir(&doc, "packet", &dir.path().join("split"))
            .unwrap();

        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|path| path.exists()));
        assert!(dir.path().join("split/packet_pagina_2.pdf").exists());
    }
}
