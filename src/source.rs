use crate::classifier::DocumentType;
use crate::error::ProcessingError;
use crate::pdf_utils::{load_pdf_mem, page_dimensions};
use crate::text_extractor::PageTextExtractor;
use lopdf::Document;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, error, info};

/// A source PDF as handed over by the caller
#[derive(Debug, Clone)]
pub enum SourceInput {
    File(PathBuf),
    Memory { name: String, data: Vec<u8> },
}

impl SourceInput {
    /// Identifier used in logs and for client name resolution
    pub fn name(&self) -> String {
        match self {
            SourceInput::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            SourceInput::Memory { name, .. } => name.clone(),
        }
    }

    pub fn read_bytes(&self) -> Result<Cow<'_, [u8]>, ProcessingError> {
        match self {
            SourceInput::File(path) => fs::read(path)
                .map(Cow::Owned)
                .map_err(|e| ProcessingError::io(path, e)),
            SourceInput::Memory { data, .. } => Ok(Cow::Borrowed(data.as_slice())),
        }
    }
}

/// One page of a source document
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based
    pub number: u32,
    /// Empty when the page has no text layer
    pub text: String,
    pub width: f32,
    pub height: f32,
    pub rotated: bool,
    pub doc_type: Option<DocumentType>,
}

/// A parsed source PDF and its pages, owned by a single pipeline run
pub struct SourceDocument {
    pub identifier: String,
    pub document: Document,
    pub pages: Vec<Page>,
}

impl SourceDocument {
    /// Parse PDF bytes and read every page's text and size
    pub fn parse(identifier: &str, data: &[u8], extractor: &PageTextExtractor) -> Result<Self, ProcessingError> {
        let document = load_pdf_mem(identifier, data)?;
        let mut source = SourceDocument {
            identifier: identifier.to_string(),
            document,
            pages: Vec::new(),
        };
        source.refresh_pages(extractor, &[]);
        Ok(source)
    }

    pub fn read(input: &SourceInput, extractor: &PageTextExtractor) -> Result<Self, ProcessingError> {
        let data = input.read_bytes()?;
        Self::parse(&input.name(), &data, extractor)
    }

    /// Re-read page metadata, flagging the given pages as rotated
    pub fn refresh_pages(&mut self, extractor: &PageTextExtractor, rotated: &[u32]) {
        self.pages = self
            .document
            .get_pages()
            .into_iter()
            .map(|(number, page_id)| {
                let (width, height) = page_dimensions(&self.document, page_id);
                Page {
                    number,
                    text: extractor.extract_page_text(&self.document, number),
                    width,
                    height,
                    rotated: rotated.contains(&number),
                    doc_type: None,
                }
            })
            .collect();
        debug!("{}: {} pages read", self.identifier, self.pages.len());
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Source file name without extension
    pub fn stem(&self) -> String {
        Path::new(&self.identifier)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.identifier.clone())
    }
}

fn is_pdf(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// List the PDFs waiting in an intake folder, sorted by file name
pub fn discover_sources(dir: &Path) -> Result<Vec<SourceInput>, ProcessingError> {
    let entries = fs::read_dir(dir).map_err(|e| ProcessingError::io(dir, e))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_pdf(path))
        .collect();
    paths.sort();

    info!("Found {} PDF(s) in {}", paths.len(), dir.display());
    Ok(paths.into_iter().map(SourceInput::File).collect())
}

/// Uploads saved by `stage_uploads`
#[derive(Debug, Default)]
pub struct StagedUploads {
    pub saved: Vec<PathBuf>,
    pub failed: Vec<(String, ProcessingError)>,
}

/// Persist uploaded files into the intake folder, creating it when needed
///
/// A failed upload is recorded and the remaining ones are still saved.
pub fn stage_uploads(uploads: &[(String, Vec<u8>)], dir: &Path) -> Result<StagedUploads, ProcessingError> {
    fs::create_dir_all(dir).map_err(|e| ProcessingError::io(dir, e))?;

    let mut staged = StagedUploads::default();
    for (name, data) in uploads {
        let file_name = match Path::new(name).file_name() {
            Some(file_name) => file_name.to_owned(),
            None => {
                staged.failed.push((name.clone(), ProcessingError::InvalidName(name.clone())));
                continue;
            }
        };

        let path = dir.join(file_name);
        match fs::write(&path, data) {
            Ok(()) => staged.saved.push(path),
            Err(e) => {
                error!("Failed to save upload {}: {}", name, e);
                staged.failed.push((name.clone(), ProcessingError::io(&path, e)));
            }
        }
    }

    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf_utils::test_support::numbered_pdf;
    use tempfile::TempDir;

    #[test]
    fn test_source_document_reads_pages() {
        let extractor = PageTextExtractor::new();
        let input = SourceInput::Memory {
            name: "ana_lima.pdf".to_string(),
            data: numbered_pdf(3),
        };

        let source = SourceDocument::read(&input, &extractor).unwrap();

        assert_eq!(source.page_count(), 3);
        assert_eq!(source.stem(), "ana_lima");
        assert_eq!(source.pages[1].number, 2);
        assert!(source.pages[1].text.contains("PAGE 2"));
        assert_eq!((source.pages[0].width, source.pages[0].height), (842.0, 595.0));
        assert!(source.pages.iter().all(|page| page.doc_type.is_none()));
    }

    #[test]
    fn test_unparseable_source_is_parse_error() {
        let extractor = PageTextExtractor::new();
        let input = SourceInput::Memory {
            name: "broken.pdf".to_string(),
            data: b"definitely not a pdf".to_vec(),
        };

        assert!(matches!(
            SourceDocument::read(&input, &extractor),
            Err(ProcessingError::ParseError { .. })
        ));
    }

    #[test]
    fn test_discover_sources_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.pdf"), b"x").unwrap();
        fs::write(dir.path().join("a.PDF"), b"x").unwrap();
        fs::write(dir.path().join("c.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("folder.pdf")).unwrap();

        let names: Vec<String> = discover_sources(dir.path())
            .unwrap()
            .iter()
            .map(SourceInput::name)
            .collect();

        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
        assert!(discover_sources(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_stage_uploads_saves_into_intake() {
        let dir = TempDir::new().unwrap();
        let intake = dir.path().join("whatsapp");
        let uploads = vec![
            ("maria.pdf".to_string(), b"one".to_vec()),
            ("../escape/jose.pdf".to_string(), b"two".to_vec()),
            ("..".to_string(), b"three".to_vec()),
        ];

        let staged = stage_uploads(&uploads, &intake).unwrap();

        assert_eq!(staged.saved, vec![intake.join("maria.pdf"), intake.join("jose.pdf")]);
        assert_eq!(staged.failed.len(), 1);
        assert_eq!(fs::read(intake.join("jose.pdf")).unwrap(), b"two");
    }
}
