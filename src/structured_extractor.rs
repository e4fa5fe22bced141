use crate::classifier::{DocumentMap, DocumentType};
use crate::client_identity::sanitize_name;
use crate::config::ExtractionSlot;
use crate::error::ProcessingError;
use crate::organizer::{ClientFolder, FolderOrganizer, ItemKind};
use crate::pdf_utils::page_subset;
use lopdf::Document;
use log::{debug, info};

/// A slot's pages cut out as a standalone document
#[derive(Debug, Clone)]
pub struct SubDocument {
    pub label: String,
    pub pages: Vec<u32>,
    pub data: Vec<u8>,
}

/// Writes named sub-documents built from page lists
///
/// Used by both extraction modes: fixed slots come from configuration,
/// discovered slots come from a `DocumentMap`. Slots are independent; one
/// failing never stops the others.
pub struct StructuredExtractor;

impl StructuredExtractor {
    pub fn new() -> Self {
        StructuredExtractor
    }

    /// `<LABEL>.pdf`, with characters illegal in file names removed
    pub fn file_name(label: &str) -> String {
        format!("{}.pdf", sanitize_name(label))
    }

    /// Cut one slot out of the document
    ///
    /// Pages are 1-based; duplicates collapse and the source page order is kept.
    pub fn build_slot(&self, document: &Document, slot: &ExtractionSlot) -> Result<SubDocument, ProcessingError> {
        if slot.pages.is_empty() {
            return Err(ProcessingError::EmptySlot(slot.label.clone()));
        }

        let page_count = document.get_pages().len() as u32;
        if let Some(&page) = slot.pages.iter().find(|&&page| page == 0 || page > page_count) {
            return Err(ProcessingError::PageRangeError {
                label: slot.label.clone(),
                page,
                page_count,
            });
        }

        let mut pages = slot.pages.clone();
        pages.sort_unstable();
        pages.dedup();

        let data = page_subset(document, &pages, &slot.label)?;
        debug!("Slot {} built from pages {:?} ({} bytes)", slot.label, pages, data.len());

        Ok(SubDocument {
            label: slot.label.clone(),
            pages,
            data,
        })
    }

    /// Write every slot into the client folder, returning how many succeeded
    pub fn extract_slots(
        &self,
        document: &Document,
        source_name: &str,
        slots: &[ExtractionSlot],
        folder: &ClientFolder,
        organizer: &mut FolderOrganizer,
    ) -> usize {
        let mut written = 0;

        for slot in slots {
            let file_name = Self::file_name(&slot.label);
            match self.build_slot(document, slot) {
                Ok(sub_document) => {
                    if organizer.write_document(source_name, folder, &file_name, &sub_document.data, ItemKind::Extracted) {
                        written += 1;
                    }
                }
                Err(e) => {
                    organizer.record_failure(source_name, ItemKind::Extracted, Some(folder.path.join(&file_name)), &e);
                }
            }
        }

        info!("{}: {}/{} slots written", source_name, written, slots.len());
        written
    }

    /// Turn discovered page groups into slots, in order of first appearance
    pub fn slots_from_map(map: &DocumentMap, include_unknown: bool) -> Vec<ExtractionSlot> {
        map.iter()
            .filter(|(doc_type, _)| include_unknown || *doc_type != DocumentType::Unknown)
            .map(|(doc_type, pages)| ExtractionSlot::new(doc_type.label(), pages.to_vec()))
            .collect()
    }

    pub fn extract_discovered(
        &self,
        document: &Document,
        source_name: &str,
        map: &DocumentMap,
        include_unknown: bool,
        folder: &ClientFolder,
        organizer: &mut FolderOrganizer,
    ) -> usize {
        let slots = Self::slots_from_map(map, include_unknown);
        self.extract_slots(document, source_name, &slots, folder, organizer)
    }
}

impl Default for StructuredExtractor {
    fn default() -> Self {
        Self::new()
    }
}
