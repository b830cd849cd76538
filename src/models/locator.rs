use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::ListingError;
use crate::ollama::ModelLister;

use super::manifest::{file_name_to_digest, ManifestDocument};
use super::reference::{ModelReference, BLOBS_DIR, DEFAULT_REGISTRY, MANIFESTS_DIR};

/// Non-fatal findings recorded while locating a model. Each one is also
/// logged as it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    ManifestMissing { path: PathBuf },
    ManifestFallback { path: PathBuf },
    NoFallbackMatch { scanned: PathBuf },
    ManifestNotFound { model: String },
    ManifestUnreadable { path: PathBuf, reason: String },
    BlobMissing { path: PathBuf },
    ModelIdUnknown { model: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ManifestMissing { path } => {
                write!(f, "model manifest not found at {}", path.display())
            }
            Diagnostic::ManifestFallback { path } => {
                write!(f, "using possible manifest {}", path.display())
            }
            Diagnostic::NoFallbackMatch { scanned } => {
                write!(f, "no matching manifest under {}", scanned.display())
            }
            Diagnostic::ManifestNotFound { model } => {
                write!(f, "could not find a manifest or fallback files for {model}")
            }
            Diagnostic::ManifestUnreadable { path, reason } => {
                write!(f, "failed to read manifest {}: {reason}", path.display())
            }
            Diagnostic::BlobMissing { path } => {
                write!(f, "blob file not found: {}", path.display())
            }
            Diagnostic::ModelIdUnknown { model } => {
                write!(f, "model {model} does not appear in the installed model list")
            }
        }
    }
}

/// Files that make up one model: the manifest first, then each blob that
/// exists on disk in manifest order.
#[derive(Debug, Clone, Default)]
pub struct ResolvedFileSet {
    manifest: Option<PathBuf>,
    files: Vec<PathBuf>,
    diagnostics: Vec<Diagnostic>,
}

impl ResolvedFileSet {
    pub fn manifest(&self) -> Option<&Path> {
        self.manifest.as_deref()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn missing_blobs(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|diagnostic| matches!(diagnostic, Diagnostic::BlobMissing { .. }))
            .count()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn set_manifest(&mut self, path: PathBuf) {
        self.files.push(path.clone());
        self.manifest = Some(path);
    }

    fn push(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    fn note(&mut self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::ManifestFallback { .. } => info!("{diagnostic}"),
            _ => warn!("{diagnostic}"),
        }
        self.diagnostics.push(diagnostic);
    }
}

/// Maps a model name to the manifest and blob files under a storage root.
///
/// The listing collaborator is only consulted when a manifest exists but
/// cannot be parsed; its failure is the only error this returns.
pub struct ModelLocator<'a> {
    storage_root: &'a Path,
    lister: &'a dyn ModelLister,
}

impl<'a> ModelLocator<'a> {
    pub fn new(storage_root: &'a Path, lister: &'a dyn ModelLister) -> Self {
        Self {
            storage_root,
            lister,
        }
    }

    pub fn locate(&self, reference: &ModelReference) -> Result<ResolvedFileSet, ListingError> {
        let mut found = ResolvedFileSet::default();

        let candidate = reference.manifest(self.storage_root);
        let manifest_path = if candidate.exists() {
            Some(candidate.path)
        } else {
            found.note(Diagnostic::ManifestMissing {
                path: candidate.path,
            });
            self.fallback_manifest(&reference.name, &mut found)
        };

        let Some(manifest_path) = manifest_path.filter(|path| path.exists()) else {
            found.note(Diagnostic::ManifestNotFound {
                model: reference.to_string(),
            });
            return Ok(found);
        };

        found.set_manifest(manifest_path.clone());

        match ManifestDocument::from_path(&manifest_path) {
            Ok(document) => self.collect_blobs(&document, &mut found),
            Err(error) => {
                found.note(Diagnostic::ManifestUnreadable {
                    path: manifest_path,
                    reason: format!("{error:#}"),
                });
                self.collect_blobs_by_id(reference, &mut found)?;
            }
        }

        Ok(found)
    }

    /// First file under `manifests/<default registry>` whose name, or whose
    /// directory path relative to that registry dir, contains `name`
    /// ignoring case. Entries are visited sorted by file name, parents first.
    fn fallback_manifest(&self, name: &str, found: &mut ResolvedFileSet) -> Option<PathBuf> {
        let scan_dir = self.storage_root.join(MANIFESTS_DIR).join(DEFAULT_REGISTRY);
        if !scan_dir.is_dir() {
            found.note(Diagnostic::NoFallbackMatch { scanned: scan_dir });
            return None;
        }

        info!("searching {} for a matching manifest", scan_dir.display());
        let needle = name.to_lowercase();
        let hit = WalkDir::new(&scan_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .find(|entry| {
                let file_name = entry.file_name().to_string_lossy().to_lowercase();
                let parent = entry
                    .path()
                    .parent()
                    .and_then(|parent| parent.strip_prefix(&scan_dir).ok())
                    .map(|relative| relative.to_string_lossy().replace('\\', "/").to_lowercase())
                    .unwrap_or_default();
                file_name.contains(&needle) || parent.contains(&needle)
            })
            .map(|entry| entry.into_path());

        match hit {
            Some(path) => {
                found.note(Diagnostic::ManifestFallback { path: path.clone() });
                Some(path)
            }
            None => {
                found.note(Diagnostic::NoFallbackMatch { scanned: scan_dir });
                None
            }
        }
    }

    fn collect_blobs(&self, document: &ManifestDocument, found: &mut ResolvedFileSet) {
        for blob in document.blob_references(self.storage_root) {
            if blob.exists() {
                debug!("found blob {}", blob.digest);
                found.push(blob.path);
            } else {
                found.note(Diagnostic::BlobMissing { path: blob.path });
            }
        }
    }

    /// Recovery for unreadable manifests: take every blob whose file name
    /// contains the model's short id from the installed model list.
    fn collect_blobs_by_id(
        &self,
        reference: &ModelReference,
        found: &mut ResolvedFileSet,
    ) -> Result<(), ListingError> {
        info!("trying to find model files by id");
        let model = reference.to_string();
        let Some(id) = self.lister.model_id(&model)? else {
            found.note(Diagnostic::ModelIdUnknown { model });
            return Ok(());
        };

        let blobs_dir = self.storage_root.join(BLOBS_DIR);
        if !blobs_dir.is_dir() {
            debug!("no blob directory at {}", blobs_dir.display());
            return Ok(());
        }

        let needle = id.to_lowercase();
        for entry in WalkDir::new(&blobs_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.to_lowercase().contains(&needle) {
                debug!("blob {} matches id {id}", file_name_to_digest(&file_name));
                found.push(entry.into_path());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::InstalledModel;
    use std::cell::Cell;
    use std::fs;
    use tempfile::TempDir;

    struct FakeLister {
        rows: Vec<InstalledModel>,
        fail: bool,
        calls: Cell<usize>,
    }

    impl FakeLister {
        fn with_rows(rows: &[(&str, &str)]) -> Self {
            Self {
                rows: rows
                    .iter()
                    .map(|(name, id)| InstalledModel {
                        name: name.to_string(),
                        id: Some(id.to_string()),
                        line: format!("{name}    {id}"),
                    })
                    .collect(),
                fail: false,
                calls: Cell::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                rows: Vec::new(),
                fail: true,
                calls: Cell::new(0),
            }
        }
    }

    impl ModelLister for FakeLister {
        fn list_installed(&self) -> Result<Vec<InstalledModel>, ListingError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(ListingError::Spawn {
                    program: PathBuf::from("ollama"),
                    subcommand: "list",
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
                });
            }
            Ok(self.rows.clone())
        }
    }

    fn write_manifest(root: &Path, segments: &[&str], body: &str) -> PathBuf {
        let mut path = root.join("manifests");
        for segment in segments {
            path.push(segment);
        }
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    fn write_blob(root: &Path, file_name: &str) -> PathBuf {
        let path = root.join("blobs").join(file_name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, file_name.as_bytes()).unwrap();
        path
    }

    const TWO_LAYERS_AND_CONFIG: &str = r#"{
        "schemaVersion": 2,
        "config": {"digest": "sha256:cfg"},
        "layers": [
            {"mediaType": "application/vnd.ollama.image.model", "digest": "sha256:gone"},
            {"mediaType": "application/vnd.ollama.image.params", "digest": "sha256:here"}
        ]
    }"#;

    #[test]
    fn missing_blob_is_skipped_with_one_warning() {
        let root = TempDir::new().unwrap();
        let manifest = write_manifest(
            root.path(),
            &["registry.ollama.ai", "library", "llama2", "latest"],
            TWO_LAYERS_AND_CONFIG,
        );
        let here = write_blob(root.path(), "sha256-here");
        let config = write_blob(root.path(), "sha256-cfg");

        let lister = FakeLister::with_rows(&[]);
        let locator = ModelLocator::new(root.path(), &lister);
        let found = locator
            .locate(&ModelReference::parse("llama2").unwrap())
            .unwrap();

        assert_eq!(found.files(), &[manifest.clone(), here, config]);
        assert_eq!(found.manifest(), Some(manifest.as_path()));
        assert_eq!(found.missing_blobs(), 1);
        assert_eq!(found.diagnostics().len(), 1);
        assert_eq!(lister.calls.get(), 0);
    }

    #[test]
    fn explicit_namespace_resolves_directly() {
        let root = TempDir::new().unwrap();
        let manifest = write_manifest(
            root.path(),
            &["modelscope.cn", "unsloth", "DeepSeek-R1", "Q4"],
            r#"{"layers": [{"digest": "sha256:w"}]}"#,
        );
        let weights = write_blob(root.path(), "sha256-w");

        let lister = FakeLister::with_rows(&[]);
        let found = ModelLocator::new(root.path(), &lister)
            .locate(&ModelReference::parse("modelscope.cn/unsloth/DeepSeek-R1:Q4").unwrap())
            .unwrap();

        assert_eq!(found.files(), &[manifest, weights]);
        assert!(found.diagnostics().is_empty());
    }

    #[test]
    fn fallback_scan_matches_case_insensitively() {
        let root = TempDir::new().unwrap();
        let manifest = write_manifest(
            root.path(),
            &["registry.ollama.ai", "quentinz", "bge-large-zh-v1.5", "latest"],
            r#"{"layers": []}"#,
        );

        let lister = FakeLister::with_rows(&[]);
        let found = ModelLocator::new(root.path(), &lister)
            .locate(&ModelReference::parse("BGE-Large-ZH-v1.5").unwrap())
            .unwrap();

        assert_eq!(found.files(), &[manifest.clone()]);
        assert!(found
            .diagnostics()
            .contains(&Diagnostic::ManifestFallback { path: manifest }));
    }

    #[test]
    fn fallback_scan_takes_first_in_sorted_order() {
        let root = TempDir::new().unwrap();
        write_manifest(
            root.path(),
            &["registry.ollama.ai", "zed", "phi3", "latest"],
            "{}",
        );
        let first = write_manifest(
            root.path(),
            &["registry.ollama.ai", "alice", "phi3", "mini"],
            "{}",
        );

        let lister = FakeLister::with_rows(&[]);
        let found = ModelLocator::new(root.path(), &lister)
            .locate(&ModelReference::parse("phi3:medium").unwrap())
            .unwrap();

        assert_eq!(found.manifest(), Some(first.as_path()));
    }

    #[test]
    fn fallback_ignores_storage_root_path() {
        let root = TempDir::new().unwrap();
        let models = root.path().join("llama-store");
        write_manifest(&models, &["registry.ollama.ai", "library", "qwen2", "latest"], "{}");

        let lister = FakeLister::with_rows(&[]);
        let found = ModelLocator::new(&models, &lister)
            .locate(&ModelReference::parse("llama").unwrap())
            .unwrap();

        assert!(found.is_empty());
    }

    #[test]
    fn nothing_found_yields_empty_set() {
        let root = TempDir::new().unwrap();
        let lister = FakeLister::with_rows(&[]);
        let found = ModelLocator::new(root.path(), &lister)
            .locate(&ModelReference::parse("mistral").unwrap())
            .unwrap();

        assert!(found.is_empty());
        assert_eq!(found.manifest(), None);
        assert!(found
            .diagnostics()
            .iter()
            .any(|diagnostic| matches!(diagnostic, Diagnostic::ManifestNotFound { .. })));
        assert_eq!(lister.calls.get(), 0);
    }

    #[test]
    fn unreadable_manifest_falls_back_to_model_id() {
        let root = TempDir::new().unwrap();
        let manifest = write_manifest(
            root.path(),
            &["registry.ollama.ai", "library", "llama2", "latest"],
            "{ truncated",
        );
        let matching = write_blob(root.path(), "sha256-78E26419B446aaaa");
        write_blob(root.path(), "sha256-0000ffff");

        let lister = FakeLister::with_rows(&[("llama2:latest", "78e26419b446")]);
        let found = ModelLocator::new(root.path(), &lister)
            .locate(&ModelReference::parse("llama2").unwrap())
            .unwrap();

        assert_eq!(found.files(), &[manifest, matching]);
        assert_eq!(lister.calls.get(), 1);
    }

    #[test]
    fn unknown_id_keeps_only_manifest() {
        let root = TempDir::new().unwrap();
        let manifest = write_manifest(
            root.path(),
            &["registry.ollama.ai", "library", "llama2", "latest"],
            "[1, 2",
        );
        write_blob(root.path(), "sha256-78e26419b446");

        let lister = FakeLister::with_rows(&[("mistral:latest", "78e26419b446")]);
        let found = ModelLocator::new(root.path(), &lister)
            .locate(&ModelReference::parse("llama2").unwrap())
            .unwrap();

        assert_eq!(found.files(), &[manifest]);
        assert!(found.diagnostics().contains(&Diagnostic::ModelIdUnknown {
            model: "llama2:latest".into()
        }));
    }

    #[test]
    fn listing_failure_propagates() {
        let root = TempDir::new().unwrap();
        write_manifest(
            root.path(),
            &["registry.ollama.ai", "library", "llama2", "latest"],
            "not json",
        );

        let lister = FakeLister::failing();
        let result = ModelLocator::new(root.path(), &lister)
            .locate(&ModelReference::parse("llama2").unwrap());

        assert!(matches!(result, Err(ListingError::Spawn { .. })));
    }
}
