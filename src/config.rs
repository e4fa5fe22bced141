//! Caller-owned pipeline configuration.
//!
//! Everything a run needs is carried here and passed in explicitly; the
//! pipeline keeps no state between runs.

use crate::classifier::DocumentType;
use crate::client_identity::sanitize_name;
use crate::error::ProcessingError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Fixed page positions for one document type in a known packet layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSlot {
    pub label: String,
    pub pages: Vec<u32>,
}

impl ExtractionSlot {
    pub fn new(label: impl Into<String>, pages: Vec<u32>) -> Self {
        ExtractionSlot {
            label: label.into(),
            pages,
        }
    }

    /// Standard intake packet: ID on pages 1-2, birth certificate on 6,
    /// proof of address on 9, INSS representation term on 11
    pub fn default_layout() -> Vec<ExtractionSlot> {
        vec![
            ExtractionSlot::new(DocumentType::RgCpf.label(), vec![1, 2]),
            ExtractionSlot::new(DocumentType::CertidaoNascimento.label(), vec![6]),
            ExtractionSlot::new(DocumentType::ComprovanteResidencia.label(), vec![9]),
            ExtractionSlot::new(DocumentType::TermoRepresentacao.label(), vec![11]),
        ]
    }
}

/// How sub-documents are found in a source PDF
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionMode {
    /// No extraction, only file the original into the client folder
    CopyOnly,
    /// Cut fixed page positions into named documents
    FixedSlots {
        #[serde(default = "ExtractionSlot::default_layout")]
        slots: Vec<ExtractionSlot>,
    },
    /// Classify every page by its text and group pages per document type
    Discovery,
}

impl Default for ExtractionMode {
    fn default() -> Self {
        ExtractionMode::FixedSlots {
            slots: ExtractionSlot::default_layout(),
        }
    }
}

/// Client name policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// First two remaining tokens
    #[default]
    Compact,
    /// Every remaining token, connectors included
    Full,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationRule {
    /// Rotate pages narrower than they are tall (legacy behavior)
    #[default]
    PortraitPages,
    /// Rotate pages wider than they are tall
    LandscapePages,
    Disabled,
}

/// What to do when a destination file already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Last write wins
    #[default]
    Overwrite,
    /// Leave the existing file alone and log the item as skipped
    KeepExisting,
    /// Log the item as failed
    Fail,
}

/// Name given to the copy of the original file in the client folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginalNaming {
    KeepName,
    /// Upper-cased stem without extension, so it cannot clash with `<LABEL>.pdf`
    UpperStem,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub destination_root: PathBuf,
    #[serde(default)]
    pub processing_root: Option<PathBuf>,
    #[serde(default)]
    pub mode: ExtractionMode,
    #[serde(default)]
    pub naming: NamingPolicy,
    #[serde(default)]
    pub rotation: RotationRule,
    #[serde(default)]
    pub collision: CollisionPolicy,
    #[serde(default)]
    pub original_copy: Option<OriginalNaming>,
    #[serde(default)]
    pub include_unknown: bool,
}

impl PipelineConfig {
    pub fn new(destination_root: impl Into<PathBuf>) -> Self {
        PipelineConfig {
            destination_root: destination_root.into(),
            processing_root: None,
            mode: ExtractionMode::default(),
            naming: NamingPolicy::default(),
            rotation: RotationRule::default(),
            collision: CollisionPolicy::default(),
            original_copy: None,
            include_unknown: false,
        }
    }

    pub fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_naming(mut self, naming: NamingPolicy) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_processing_root(mut self, processing_root: impl Into<PathBuf>) -> Self {
        self.processing_root = Some(processing_root.into());
        self
    }

    pub fn with_collision(mut self, collision: CollisionPolicy) -> Self {
        self.collision = collision;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ProcessingError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ProcessingError> {
        let json = fs::read_to_string(path).map_err(|e| ProcessingError::io(path, e))?;
        Self::from_json(&json)
    }

    /// Original copy naming, falling back to the mode's default
    pub fn original_naming(&self) -> OriginalNaming {
        self.original_copy.unwrap_or(match self.mode {
            ExtractionMode::CopyOnly => OriginalNaming::KeepName,
            _ => OriginalNaming::UpperStem,
        })
    }

    /// Page numbers are deliberately not checked here: an out-of-range page
    /// only fails its own slot at extraction time.
    pub fn validate(&self) -> Result<(), ProcessingError> {
        if self.destination_root.as_os_str().is_empty() {
            return Err(ProcessingError::ConfigError("destination_root is empty".to_string()));
        }

        if let ExtractionMode::FixedSlots { slots } = &self.mode {
            for slot in slots {
                if sanitize_name(&slot.label).is_empty() {
                    return Err(ProcessingError::ConfigError(format!(
                        "slot label {:?} is empty after sanitizing",
                        slot.label
                    )));
                }
            }
        }

        Ok(())
    }
}
