//! Intake packet organizer.
//!
//! Splits scanned legal intake PDFs into typed documents and files them into
//! one folder per client. The interactive front end lives elsewhere; with the
//! `python` feature this crate builds as an extension module it can import.

pub mod classifier;
pub mod client_identity;
pub mod config;
pub mod error;
pub mod orientation;
pub mod organizer;
pub mod page_splitter;
pub mod pdf_processor;
pub mod pdf_utils;
pub mod source;
pub mod structured_extractor;
pub mod text_extractor;

pub use classifier::{DocumentClassifier, DocumentMap, DocumentType};
pub use client_identity::{ClientIdentity, ClientIdentityResolver};
pub use config::{
    CollisionPolicy, ExtractionMode, ExtractionSlot, NamingPolicy, OriginalNaming, PipelineConfig,
    RotationRule,
};
pub use error::ProcessingError;
pub use orientation::{NormalizeReport, OrientationNormalizer};
pub use organizer::{
    FolderOrganizer, FolderOverview, ItemKind, ItemLog, ItemOutcome, OrganizationResult, Progress,
    folder_overview,
};
pub use page_splitter::PageSplitter;
pub use pdf_processor::PdfProcessor;
pub use source::{SourceDocument, SourceInput, discover_sources, stage_uploads};
pub use structured_extractor::StructuredExtractor;
pub use text_extractor::PageTextExtractor;

/// Install the env_logger backend (`RUST_LOG` overrides the `info` default)
///
/// Safe to call repeatedly; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}

#[cfg(feature = "python")]
mod python {
    use super::*;
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;
    use pyo3::types::PyDict;
    use std::path::PathBuf;

    /// Python module initialization
    /// This is the entry point that Maturin uses to create the Python extension
    #[pymodule]
    fn intake_organizer(m: &Bound<'_, PyModule>) -> PyResult<()> {
        init_logging();

        m.add_function(wrap_pyfunction!(organize, m)?)?;
        m.add_function(wrap_pyfunction!(classify_text, m)?)?;
        m.add_function(wrap_pyfunction!(resolve_client, m)?)?;
        m.add("__version__", env!("CARGO_PKG_VERSION"))?;

        Ok(())
    }

    /// Run the pipeline over PDF paths with a JSON configuration
    ///
    /// Returns a dict with the run counters and a `log` list of per-item dicts
    /// (source, destination, kind, outcome, detail).
    #[pyfunction]
    fn organize(py: Python, files: Vec<String>, config_json: String) -> PyResult<PyObject> {
        let config = PipelineConfig::from_json(&config_json)
            .map_err(|e| PyErr::new::<PyValueError, _>(format!("Invalid configuration: {}", e)))?;
        let processor = PdfProcessor::new(config)
            .map_err(|e| PyErr::new::<PyValueError, _>(format!("Processor initialization failed: {}", e)))?;

        let sources: Vec<SourceInput> = files.into_iter().map(|file| SourceInput::File(PathBuf::from(file))).collect();
        let result = processor
            .run(&sources)
            .map_err(|e| PyErr::new::<PyRuntimeError, _>(format!("Intake run failed: {}", e)))?;

        let mut log = Vec::with_capacity(result.log.len());
        for entry in &result.log {
            let item = PyDict::new(py);
            item.set_item("source", &entry.source)?;
            item.set_item(
                "destination",
                entry.destination.as_ref().map(|path| path.display().to_string()),
            )?;
            item.set_item("kind", format!("{:?}", entry.kind).to_lowercase())?;
            let (outcome, detail) = match &entry.outcome {
                ItemOutcome::Written => ("written", None),
                ItemOutcome::Skipped(reason) => ("skipped", Some(reason.as_str())),
                ItemOutcome::Failed(reason) => ("failed", Some(reason.as_str())),
            };
            item.set_item("outcome", outcome)?;
            item.set_item("detail", detail)?;
            log.push(item);
        }

        let summary = PyDict::new(py);
        summary.set_item("folders_created", result.folders_created)?;
        summary.set_item("files_written", result.files_written)?;
        summary.set_item("sources_processed", result.sources_processed)?;
        summary.set_item("sources_failed", result.sources_failed)?;
        summary.set_item("log", log)?;

        Ok(summary.into())
    }

    #[pyfunction]
    fn classify_text(text: &str) -> String {
        DocumentClassifier::new().classify(text).label().to_string()
    }

    /// Returns (display_name, folder_name); `naming` is "compact" or "full"
    #[pyfunction]
    #[pyo3(signature = (file_name, naming = "compact"))]
    fn resolve_client(file_name: &str, naming: &str) -> PyResult<(String, String)> {
        let policy = match naming {
            "compact" => NamingPolicy::Compact,
            "full" => NamingPolicy::Full,
            other => return Err(PyErr::new::<PyValueError, _>(format!("Unknown naming policy: {}", other))),
        };
        let identity = ClientIdentityResolver::new(policy).resolve(file_name);
        Ok((identity.display_name, identity.folder_name))
    }
}
