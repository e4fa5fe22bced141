use crate::classifier::{DocumentClassifier, DocumentMap};
use crate::client_identity::ClientIdentityResolver;
use crate::config::{ExtractionMode, OriginalNaming, PipelineConfig};
use crate::error::ProcessingError;
use crate::orientation::OrientationNormalizer;
use crate::organizer::{
    ClientFolder, FolderOrganizer, ItemKind, OrganizationResult, Progress, original_file_name,
};
use crate::page_splitter::PageSplitter;
use crate::pdf_utils::to_bytes;
use crate::source::{SourceDocument, SourceInput};
use crate::structured_extractor::StructuredExtractor;
use crate::text_extractor::PageTextExtractor;
use std::path::{Path, PathBuf};
use log::{info, warn};

/// Marker appended to the stem of a rotated intermediate document
pub const ROTATED_MARKER: &str = "rotacionado";

/// A source-level failure and, when known, where the source was headed
struct SourceFailure {
    destination: Option<PathBuf>,
    error: ProcessingError,
}

impl From<ProcessingError> for SourceFailure {
    fn from(error: ProcessingError) -> Self {
        SourceFailure {
            destination: None,
            error,
        }
    }
}

/// Main intake processor that orchestrates the entire pipeline
///
/// Sources are handled one at a time, in input order. Every per-source failure
/// ends up in the run log; only run setup errors are returned.
pub struct PdfProcessor {
    config: PipelineConfig,
    text_extractor: PageTextExtractor,
    classifier: DocumentClassifier,
    normalizer: OrientationNormalizer,
    splitter: PageSplitter,
    extractor: StructuredExtractor,
    resolver: ClientIdentityResolver,
}

impl PdfProcessor {
    pub fn new(config: PipelineConfig) -> Result<Self, ProcessingError> {
        config.validate()?;
        info!(
            "Initializing intake processor: destination={}, mode={:?}",
            config.destination_root.display(),
            config.mode
        );

        Ok(PdfProcessor {
            text_extractor: PageTextExtractor::new(),
            classifier: DocumentClassifier::new(),
            normalizer: OrientationNormalizer::new(config.rotation),
            splitter: PageSplitter::new(),
            extractor: StructuredExtractor::new(),
            resolver: ClientIdentityResolver::new(config.naming),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Start a run the caller drives itself with `process_source`
    pub fn begin_run(&self) -> Result<FolderOrganizer, ProcessingError> {
        let organizer = FolderOrganizer::new(&self.config.destination_root, self.config.collision);
        organizer.prepare()?;
        Ok(organizer)
    }

    pub fn run(&self, sources: &[SourceInput]) -> Result<OrganizationResult, ProcessingError> {
        self.run_with_progress(sources, |_| {})
    }

    /// Process every source, reporting progress after each one
    pub fn run_with_progress<F>(&self, sources: &[SourceInput], mut on_progress: F) -> Result<OrganizationResult, ProcessingError>
    where
        F: FnMut(Progress),
    {
        let mut organizer = self.begin_run()?;
        let total = sources.len();
        info!("Starting run over {} source(s)", total);

        for (index, source) in sources.iter().enumerate() {
            self.process_source(source, &mut organizer);
            on_progress(Progress {
                completed: index + 1,
                total,
            });
        }

        Ok(organizer.finish())
    }

    /// Process one source item; returns whether it was filed
    pub fn process_source(&self, input: &SourceInput, organizer: &mut FolderOrganizer) -> bool {
        let name = input.name();
        info!("Processing {}", name);

        let succeeded = match self.organize_source(input, &name, organizer) {
            Ok(()) => true,
            Err(failure) => {
                organizer.record_failure(&name, ItemKind::Source, failure.destination, &failure.error);
                false
            }
        };

        organizer.record_source(succeeded);
        succeeded
    }

    fn organize_source(&self, input: &SourceInput, name: &str, organizer: &mut FolderOrganizer) -> Result<(), SourceFailure> {
        if self.config.mode == ExtractionMode::CopyOnly {
            let folder = self.client_folder(name, organizer)?;
            self.file_original(input, name, &folder, organizer);
            return Ok(());
        }

        let data = input.read_bytes()?;
        let mut source = SourceDocument::parse(name, &data, &self.text_extractor)?;

        let rotated = self.normalizer.normalize_document(&mut source.document);
        if !rotated.is_empty() {
            info!("{}: rotated pages {:?}", name, rotated);
            source.refresh_pages(&self.text_extractor, &rotated);
        }
        if let Some(processing_root) = &self.config.processing_root {
            self.write_intermediates(&mut source, !rotated.is_empty(), processing_root, organizer);
        }

        let folder = self.client_folder(name, organizer)?;

        let written = match &self.config.mode {
            ExtractionMode::FixedSlots { slots } => {
                self.extractor
                    .extract_slots(&source.document, name, slots, &folder, organizer)
            }
            ExtractionMode::Discovery => {
                let map = self.classify_pages(&mut source);
                self.extractor.extract_discovered(
                    &source.document,
                    name,
                    &map,
                    self.config.include_unknown,
                    &folder,
                    organizer,
                )
            }
            ExtractionMode::CopyOnly => 0,
        };
        info!("{}: {} sub-document(s) filed under {}", name, written, folder.name);

        self.file_original(input, name, &folder, organizer);
        Ok(())
    }

    /// Resolve the client and create or reuse its folder
    fn client_folder(&self, name: &str, organizer: &mut FolderOrganizer) -> Result<ClientFolder, SourceFailure> {
        let identity = self.resolver.resolve(name);
        match organizer.ensure_client_folder(&identity) {
            Ok(folder) => Ok(folder),
            Err(error) => Err(SourceFailure {
                destination: organizer.client_folder_path(&identity).ok().map(|(_, path)| path),
                error,
            }),
        }
    }

    /// Classify every page, recording the type on the page and in the map
    pub fn classify_pages(&self, source: &mut SourceDocument) -> DocumentMap {
        let map = self
            .classifier
            .build_map(source.pages.iter().map(|page| (page.number, page.text.as_str())));

        for (doc_type, numbers) in map.iter() {
            for page in source.pages.iter_mut().filter(|page| numbers.contains(&page.number)) {
                page.doc_type = Some(doc_type);
            }
        }
        map
    }

    /// Copy the untouched original next to the extracted documents
    fn file_original(&self, input: &SourceInput, name: &str, folder: &ClientFolder, organizer: &mut FolderOrganizer) {
        let naming = self.config.original_naming();
        if naming == OriginalNaming::Skip {
            return;
        }

        let Some(file_name) = original_file_name(name, naming) else {
            let e = ProcessingError::InvalidName(name.to_string());
            organizer.record_failure(name, ItemKind::Original, None, &e);
            return;
        };

        match input {
            SourceInput::File(path) => {
                organizer.copy_file(name, path, folder, &file_name);
            }
            SourceInput::Memory { data, .. } => {
                organizer.write_document(name, folder, &file_name, data, ItemKind::Original);
            }
        }
    }

    /// Rotated document and split pages for the processing root
    fn write_intermediates(
        &self,
        source: &mut SourceDocument,
        any_rotated: bool,
        processing_root: &Path,
        organizer: &mut FolderOrganizer,
    ) {
        let stem = source.stem();

        if any_rotated {
            let file_name = format!("{}_{}.pdf", stem, ROTATED_MARKER);
            match to_bytes(&mut source.document, &file_name) {
                Ok(data) => {
                    organizer.write_intermediate(&source.identifier, processing_root, &file_name, &data);
                }
                Err(e) => {
                    organizer.record_failure(&source.identifier, ItemKind::Intermediate, None, &e);
                }
            }
        }

        let outcome = self.splitter.split(&source.document, &stem);
        for page in &outcome.pages {
            organizer.write_intermediate(&source.identifier, processing_root, &page.file_name, &page.data);
        }
        for (page_number, e) in &outcome.failures {
            warn!("{}: page {} not split", source.identifier, page_number);
            let destination = processing_root.join(PageSplitter::page_file_name(&stem, *page_number));
            organizer.record_failure(&source.identifier, ItemKind::Intermediate, Some(destination), e);
        }
    }
}
