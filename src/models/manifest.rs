use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::reference::BLOBS_DIR;

/// Parsed Ollama manifest. Only the parts needed to find blobs are typed;
/// everything else in the document is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDocument {
    #[serde(default)]
    pub layers: Vec<ManifestSlot>,
    #[serde(default)]
    pub config: Option<ManifestSlot>,
}

/// A `layers` element or the `config` value. Anything that is not an object
/// of the expected shape is kept as `Other` and later skipped.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ManifestSlot {
    Entry(ManifestEntry),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    #[serde(default)]
    pub digest: Option<String>,
}

impl ManifestDocument {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("open manifest {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parse manifest {}", path.display()))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("parse manifest json")
    }

    /// Layers followed by the config entry, skipping anything without a digest.
    pub fn entries(&self) -> impl Iterator<Item = &ManifestEntry> + '_ {
        self.layers
            .iter()
            .chain(self.config.iter())
            .filter_map(|slot| match slot {
                ManifestSlot::Entry(entry) if entry.digest.is_some() => Some(entry),
                _ => None,
            })
    }

    pub fn blob_references(&self, storage_root: &Path) -> Vec<BlobReference> {
        self.entries()
            .filter_map(|entry| entry.digest.as_deref())
            .map(|digest| BlobReference::new(digest, storage_root))
            .collect()
    }
}

/// A content-addressed blob: the manifest digest plus where it sits on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobReference {
    pub digest: String,
    pub file_name: String,
    pub path: PathBuf,
}

impl BlobReference {
    pub fn new(digest: &str, storage_root: &Path) -> Self {
        let file_name = digest_to_file_name(digest);
        let path = storage_root.join(BLOBS_DIR).join(&file_name);
        Self {
            digest: digest.to_string(),
            file_name,
            path,
        }
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// `sha256:abcd` -> `sha256-abcd`, the name Ollama stores blobs under.
#[must_use]
pub fn digest_to_file_name(digest: &str) -> String {
    digest.replace(':', "-")
}

/// Inverse of [`digest_to_file_name`] for well-formed `algorithm-hex` names.
#[must_use]
pub fn file_name_to_digest(file_name: &str) -> String {
    file_name.replacen('-', ":", 1)
}
