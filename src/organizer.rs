use crate::client_identity::{ClientIdentity, sanitize_name};
use crate::config::{CollisionPolicy, OriginalNaming};
use crate::error::ProcessingError;
use crate::source::discover_sources;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use log::{debug, error, info, warn};

/// What a log entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// The source file as a whole (parse and read failures)
    Source,
    /// Copy of the source file in the client folder
    Original,
    /// Type-labeled sub-document
    Extracted,
    /// Rotated document or split page in the processing root
    Intermediate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ItemOutcome {
    Written,
    Skipped(String),
    Failed(String),
}

/// One (source item, destination, outcome) record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemLog {
    pub source: String,
    pub destination: Option<PathBuf>,
    pub kind: ItemKind,
    pub outcome: ItemOutcome,
}

/// Run summary returned to the caller
///
/// Counters only ever reflect writes that actually succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrganizationResult {
    pub folders_created: usize,
    pub files_written: usize,
    pub sources_processed: usize,
    pub sources_failed: usize,
    pub log: Vec<ItemLog>,
}

impl OrganizationResult {
    pub fn failures(&self) -> impl Iterator<Item = &ItemLog> {
        self.log
            .iter()
            .filter(|entry| matches!(entry.outcome, ItemOutcome::Failed(_)))
    }
}

/// Run progress after each source item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f32 / self.total as f32
    }
}

/// A client directory under the destination root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFolder {
    pub name: String,
    pub path: PathBuf,
    pub newly_created: bool,
}

/// Counts shown in the intake overview
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FolderOverview {
    pub pending_pdfs: usize,
    pub client_folders: usize,
}

/// File name for the original's copy, or `None` when it is not kept
pub fn original_file_name(source_name: &str, naming: OriginalNaming) -> Option<String> {
    let path = Path::new(source_name);
    match naming {
        OriginalNaming::KeepName => path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string),
        OriginalNaming::UpperStem => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_uppercase),
        OriginalNaming::Skip => None,
    }
}

/// Count pending PDFs and existing client folders; missing folders count as zero
pub fn folder_overview(intake_dir: Option<&Path>, destination_root: &Path) -> FolderOverview {
    let pending_pdfs = intake_dir
        .and_then(|dir| discover_sources(dir).ok())
        .map(|sources| sources.len())
        .unwrap_or(0);

    let client_folders = fs::read_dir(destination_root)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.path().is_dir())
                .count()
        })
        .unwrap_or(0);

    FolderOverview {
        pending_pdfs,
        client_folders,
    }
}

/// Files documents into per-client folders and keeps the run's books
///
/// The destination tree is shared storage: the organizer only adds to it and
/// does not guard against other processes writing the same folders.
pub struct FolderOrganizer {
    destination_root: PathBuf,
    collision: CollisionPolicy,
    result: OrganizationResult,
}

impl FolderOrganizer {
    pub fn new(destination_root: impl Into<PathBuf>, collision: CollisionPolicy) -> Self {
        FolderOrganizer {
            destination_root: destination_root.into(),
            collision,
            result: OrganizationResult::default(),
        }
    }

    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    /// Create the destination root if it does not exist yet
    pub fn prepare(&self) -> Result<(), ProcessingError> {
        if !self.destination_root.is_dir() {
            fs::create_dir_all(&self.destination_root)
                .map_err(|e| ProcessingError::io(&self.destination_root, e))?;
            info!("Created destination root {}", self.destination_root.display());
        }
        Ok(())
    }

    /// Create or reuse the client's folder
    ///
    /// `folders_created` moves only when the directory did not exist before.
    pub fn ensure_client_folder(&mut self, identity: &ClientIdentity) -> Result<ClientFolder, ProcessingError> {
        let (name, path) = self.client_folder_path(identity)?;
        if path.is_dir() {
            debug!("Reusing client folder {}", path.display());
            return Ok(ClientFolder {
                name,
                path,
                newly_created: false,
            });
        }

        fs::create_dir_all(&path).map_err(|e| ProcessingError::io(&path, e))?;
        self.result.folders_created += 1;
        info!("Created client folder {}", path.display());

        Ok(ClientFolder {
            name,
            path,
            newly_created: true,
        })
    }

    /// Folder name and path a client is filed under; nothing is created
    pub fn client_folder_path(&self, identity: &ClientIdentity) -> Result<(String, PathBuf), ProcessingError> {
        let name = sanitize_name(&identity.display_name);
        if name.is_empty() || name == "." || name == ".." {
            return Err(ProcessingError::InvalidName(identity.display_name.clone()));
        }

        let path = self.destination_root.join(&name);
        Ok((name, path))
    }

    /// Write an in-memory document into the client folder
    pub fn write_document(
        &mut self,
        source: &str,
        folder: &ClientFolder,
        file_name: &str,
        data: &[u8],
        kind: ItemKind,
    ) -> bool {
        let destination = folder.path.join(file_name);
        self.deposit(source, destination, kind, |path| fs::write(path, data))
    }

    /// Copy a file from disk into the client folder, content unchanged
    pub fn copy_file(&mut self, source: &str, from: &Path, folder: &ClientFolder, file_name: &str) -> bool {
        let destination = folder.path.join(file_name);
        self.deposit(source, destination, ItemKind::Original, |path| fs::copy(from, path).map(|_| ()))
    }

    /// Write a scratch artifact; always overwrites and is not counted
    pub fn write_intermediate(&mut self, source: &str, directory: &Path, file_name: &str, data: &[u8]) -> bool {
        let destination = directory.join(file_name);
        let written = fs::create_dir_all(directory).and_then(|_| fs::write(&destination, data));

        let outcome = match written {
            Ok(()) => {
                debug!("Wrote intermediate {}", destination.display());
                ItemOutcome::Written
            }
            Err(e) => {
                let e = ProcessingError::io(&destination, e);
                error!("Failed to write intermediate for {}: {}", source, e);
                ItemOutcome::Failed(e.to_string())
            }
        };

        let ok = outcome == ItemOutcome::Written;
        self.push_log(source, Some(destination), ItemKind::Intermediate, outcome);
        ok
    }

    fn deposit<F>(&mut self, source: &str, destination: PathBuf, kind: ItemKind, write: F) -> bool
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        if destination.exists() {
            match self.collision {
                CollisionPolicy::Overwrite => {
                    debug!("Overwriting {}", destination.display());
                }
                CollisionPolicy::KeepExisting => {
                    warn!("Keeping existing {}", destination.display());
                    self.push_log(
                        source,
                        Some(destination),
                        kind,
                        ItemOutcome::Skipped("destination already exists".to_string()),
                    );
                    return false;
                }
                CollisionPolicy::Fail => {
                    let e = ProcessingError::DestinationExists(destination.clone());
                    self.record_failure(source, kind, Some(destination), &e);
                    return false;
                }
            }
        }

        match write(&destination) {
            Ok(()) => {
                self.result.files_written += 1;
                info!("{} -> {}", source, destination.display());
                self.push_log(source, Some(destination), kind, ItemOutcome::Written);
                true
            }
            Err(e) => {
                let e = ProcessingError::io(&destination, e);
                self.record_failure(source, kind, Some(destination), &e);
                false
            }
        }
    }

    pub fn record_failure(
        &mut self,
        source: &str,
        kind: ItemKind,
        destination: Option<PathBuf>,
        failure: &ProcessingError,
    ) {
        error!("Failed to organize {}: {}", source, failure);
        self.push_log(source, destination, kind, ItemOutcome::Failed(failure.to_string()));
    }

    /// Close the books for one source item
    pub fn record_source(&mut self, succeeded: bool) {
        if succeeded {
            self.result.sources_processed += 1;
        } else {
            self.result.sources_failed += 1;
        }
    }

    fn push_log(&mut self, source: &str, destination: Option<PathBuf>, kind: ItemKind, outcome: ItemOutcome) {
        self.result.log.push(ItemLog {
            source: source.to_string(),
            destination,
            kind,
            outcome,
        });
    }

    pub fn result(&self) -> &OrganizationResult {
        &self.result
    }

    pub fn finish(self) -> OrganizationResult {
        info!(
            "Run finished: {} folders created, {} files written, {} sources failed",
            self.result.folders_created, self.result.files_written, self.result.sources_failed
        );
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_identity::ClientIdentityResolver;
    use crate::config::NamingPolicy;
    use tempfile::TempDir;

    fn identity(name: &str) -> ClientIdentity {
        ClientIdentityResolver::new(NamingPolicy::Compact).resolve(name)
    }

    #[test]
    fn test_same_client_shares_one_folder() {
        let root = TempDir::new().unwrap();
        let intake = TempDir::new().unwrap();
        let first = intake.path().join("Maria_Silva_documentos_2.pdf");
        let second = intake.path().join("Maria Silva.pdf");
        fs::write(&first, b"first").unwrap();
        fs::write(&second, b"second").unwrap();

        let mut organizer = FolderOrganizer::new(root.path(), CollisionPolicy::Overwrite);
        for path in [&first, &second] {
            let name = path.file_name().unwrap().to_str().unwrap();
            let folder = organizer.ensure_client_folder(&identity(name)).unwrap();
            assert!(organizer.copy_file(name, path, &folder, name));
        }
        let result = organizer.finish();

        assert_eq!(result.folders_created, 1);
        assert_eq!(result.files_written, 2);
        let folder = root.path().join("Maria Silva");
        assert_eq!(fs::read(folder.join("Maria_Silva_documentos_2.pdf")).unwrap(), b"first");
        assert_eq!(fs::read(folder.join("Maria Silva.pdf")).unwrap(), b"second");
    }

    #[test]
    fn test_existing_folder_is_reused_without_counting() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("Joao Pereira")).unwrap();

        let mut organizer = FolderOrganizer::new(root.path(), CollisionPolicy::Overwrite);
        let folder = organizer.ensure_client_folder(&identity("joao_pereira.pdf")).unwrap();

        assert!(!folder.newly_created);
        assert_eq!(organizer.result().folders_created, 0);

        let again = organizer.ensure_client_folder(&identity("Joao Pereira 2.pdf")).unwrap();
        assert_eq!(again.path, folder.path);
        assert_eq!(organizer.result().folders_created, 0);
    }

    #[test]
    fn test_new_folder_is_counted_once() {
        let root = TempDir::new().unwrap();
        let mut organizer = FolderOrganizer::new(root.path(), CollisionPolicy::Overwrite);

        let first = organizer.ensure_client_folder(&identity("ana_lima.pdf")).unwrap();
        let second = organizer.ensure_client_folder(&identity("Ana Lima docs.pdf")).unwrap();

        assert!(first.newly_created);
        assert!(!second.newly_created);
        assert_eq!(organizer.result().folders_created, 1);
    }

    #[test]
    fn test_folder_blocked_by_regular_file() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("Ana Lima"), b"not a folder").unwrap();
        let mut organizer = FolderOrganizer::new(root.path(), CollisionPolicy::Overwrite);

        let err = organizer.ensure_client_folder(&identity("ana_lima.pdf")).unwrap_err();

        match err {
            ProcessingError::IoError { path, .. } => assert_eq!(path, root.path().join("Ana Lima")),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(organizer.result().folders_created, 0);
    }

    #[test]
    fn test_write_onto_directory_fails_and_is_logged() {
        let root = TempDir::new().unwrap();
        let mut organizer = FolderOrganizer::new(root.path(), CollisionPolicy::Overwrite);
        let folder = organizer.ensure_client_folder(&identity("bia_souza.pdf")).unwrap();
        fs::create_dir(folder.path.join("RG_CPF.pdf")).unwrap();

        let written = organizer.write_document("bia_souza.pdf", &folder, "RG_CPF.pdf", b"data", ItemKind::Extracted);
        let result = organizer.finish();

        assert!(!written);
        assert_eq!(result.files_written, 0);
        assert_eq!(result.log.len(), 1);
        assert_eq!(result.log[0].destination, Some(folder.path.join("RG_CPF.pdf")));
        assert_eq!(result.log[0].kind, ItemKind::Extracted);
        assert!(matches!(result.log[0].outcome, ItemOutcome::Failed(_)));
        assert!(folder.path.join("RG_CPF.pdf").is_dir());
    }

    #[test]
    fn test_collision_policies() {
        let root = TempDir::new().unwrap();
        let policies = [
            (CollisionPolicy::Overwrite, b"new".as_slice(), 1),
            (CollisionPolicy::KeepExisting, b"old".as_slice(), 0),
            (CollisionPolicy::Fail, b"old".as_slice(), 0),
        ];

        for (policy, expected, written) in policies {
            let mut organizer = FolderOrganizer::new(root.path(), policy);
            let folder = organizer.ensure_client_folder(&identity("ana_lima.pdf")).unwrap();
            fs::write(folder.path.join("RG_CPF.pdf"), b"old").unwrap();

            organizer.write_document("ana_lima.pdf", &folder, "RG_CPF.pdf", b"new", ItemKind::Extracted);
            let result = organizer.finish();

            assert_eq!(fs::read(folder.path.join("RG_CPF.pdf")).unwrap(), expected);
            assert_eq!(result.files_written, written);
            match policy {
                CollisionPolicy::Overwrite => assert_eq!(result.log[0].outcome, ItemOutcome::Written),
                CollisionPolicy::KeepExisting => assert!(matches!(result.log[0].outcome, ItemOutcome::Skipped(_))),
                CollisionPolicy::Fail => assert_eq!(result.failures().count(), 1),
            }
        }
    }

    #[test]
    fn test_failed_write_is_logged_not_counted() {
        let root = TempDir::new().unwrap();
        let mut organizer = FolderOrganizer::new(root.path(), CollisionPolicy::Overwrite);
        let folder = organizer.ensure_client_folder(&identity("bia_souza.pdf")).unwrap();

        let missing = root.path().join("does-not-exist.pdf");
        assert!(!organizer.copy_file("does-not-exist.pdf", &missing, &folder, "x.pdf"));

        let result = organizer.finish();
        assert_eq!(result.files_written, 0);
        assert_eq!(result.failures().count(), 1);
        assert_eq!(result.log[0].source, "does-not-exist.pdf");
    }

    #[test]
    fn test_unusable_folder_name_is_rejected() {
        let root = TempDir::new().unwrap();
        let mut organizer = FolderOrganizer::new(root.path(), CollisionPolicy::Overwrite);
        let bad = ClientIdentity {
            display_name: "???".to_string(),
            folder_name: String::new(),
        };

        assert!(matches!(
            organizer.ensure_client_folder(&bad),
            Err(ProcessingError::InvalidName(_))
        ));
    }

    #[test]
    fn test_original_file_names() {
        assert_eq!(
            original_file_name("/in/joao-pereira-123.pdf", OriginalNaming::KeepName).as_deref(),
            Some("joao-pereira-123.pdf")
        );
        assert_eq!(
            original_file_name("/in/joao-pereira-123.pdf", OriginalNaming::UpperStem).as_deref(),
            Some("JOAO-PEREIRA-123")
        );
        assert_eq!(original_file_name("joao.pdf", OriginalNaming::Skip), None);
    }

    #[test]
    fn test_progress_fraction() {
        assert_eq!(Progress { completed: 1, total: 4 }.fraction(), 0.25);
        assert_eq!(Progress { completed: 0, total: 0 }.fraction(), 1.0);
    }

    #[test]
    fn test_folder_overview_counts() {
        let intake = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        fs::write(intake.path().join("a.pdf"), b"x").unwrap();
        fs::write(intake.path().join("b.PDF"), b"x").unwrap();
        fs::write(intake.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(root.path().join("Ana Lima")).unwrap();

        let overview = folder_overview(Some(intake.path()), root.path());
        assert_eq!(overview, FolderOverview { pending_pdfs: 2, client_folders: 1 });

        let missing = root.path().join("nope");
        assert_eq!(folder_overview(None, &missing), FolderOverview::default());
    }
}
