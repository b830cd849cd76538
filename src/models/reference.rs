use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Error};

/// Registry host that Ollama uses for models pulled without an explicit namespace.
pub const DEFAULT_REGISTRY: &str = "registry.ollama.ai";
/// Namespace under [`DEFAULT_REGISTRY`] that holds the official library models.
pub const DEFAULT_NAMESPACE: &str = "library";
pub const DEFAULT_TAG: &str = "latest";
pub const MANIFESTS_DIR: &str = "manifests";
pub const BLOBS_DIR: &str = "blobs";

const VERSION_SEPARATOR: char = ':';
const NAMESPACE_SEPARATOR: char = '/';

/// A model name as typed by the user, e.g. `llama2`, `qwen2:7b` or
/// `modelscope.cn/unsloth/DeepSeek-R1:latest`.
///
/// Only the first `/` splits off a namespace, so the last example parses to
/// namespace `modelscope.cn` and name `unsloth/DeepSeek-R1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReference {
    pub namespace: Option<String>,
    pub name: String,
    pub version: String,
}

impl ModelReference {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let raw = raw.trim();
        let (path, version) = split_version(raw);
        let version = match version {
            Some(tag) if !tag.is_empty() => tag.to_string(),
            _ => DEFAULT_TAG.to_string(),
        };

        let (namespace, name) = match path.split_once(NAMESPACE_SEPARATOR) {
            Some((namespace, name)) => (Some(namespace.to_string()), name.to_string()),
            None => (None, path.to_string()),
        };

        if name.is_empty() {
            return Err(anyhow!("model name {raw:?} has no name component"));
        }
        if matches!(namespace.as_deref(), Some("")) {
            return Err(anyhow!("model name {raw:?} has an empty namespace"));
        }

        Ok(Self {
            namespace,
            name,
            version,
        })
    }

    /// Directory segments between `manifests/` and the model name.
    #[must_use]
    pub fn namespace_segments(&self) -> Vec<&str> {
        match &self.namespace {
            Some(namespace) => vec![namespace.as_str()],
            None => vec![DEFAULT_REGISTRY, DEFAULT_NAMESPACE],
        }
    }

    #[must_use]
    pub fn manifest(&self, storage_root: &Path) -> ManifestDescriptor {
        let mut path = storage_root.join(MANIFESTS_DIR);
        for segment in self.namespace_segments() {
            path.push(segment);
        }
        path.push(&self.name);
        path.push(&self.version);
        ManifestDescriptor { path }
    }
}

impl FromStr for ModelReference {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for ModelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(namespace) = &self.namespace {
            write!(f, "{namespace}{NAMESPACE_SEPARATOR}")?;
        }
        write!(f, "{}{VERSION_SEPARATOR}{}", self.name, self.version)
    }
}

/// Where the manifest for a [`ModelReference`] is expected to live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDescriptor {
    pub path: PathBuf,
}

impl ManifestDescriptor {
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// Filesystem-safe base name for archives: `/` and `:` become `_`.
#[must_use]
pub fn safe_file_stem(raw: &str) -> String {
    raw.trim()
        .replace(NAMESPACE_SEPARATOR, "_")
        .replace(VERSION_SEPARATOR, "_")
}

// A `:` that precedes the last `/` belongs to a host:port prefix, not a tag.
fn split_version(raw: &str) -> (&str, Option<&str>) {
    match raw.rsplit_once(VERSION_SEPARATOR) {
        Some((path, tag)) if !tag.contains(NAMESPACE_SEPARATOR) => (path, Some(tag)),
        _ => (raw, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_uses_library_namespace_and_latest() {
        let reference = ModelReference::parse("llama2").unwrap();
        assert_eq!(reference.namespace, None);
        assert_eq!(reference.name, "llama2");
        assert_eq!(reference.version, "latest");

        let root = Path::new("/models");
        assert_eq!(
            reference.manifest(root).path,
            root.join("manifests")
                .join("registry.ollama.ai")
                .join("library")
                .join("llama2")
                .join("latest")
        );
    }

    #[test]
    fn explicit_tag_is_kept() {
        let reference = ModelReference::parse("qwen2:7b-instruct").unwrap();
        assert_eq!(reference.name, "qwen2");
        assert_eq!(reference.version, "7b-instruct");
    }

    #[test]
    fn only_first_slash_splits_namespace() {
        let reference = ModelReference::parse("modelscope.cn/unsloth/DeepSeek-R1:latest").unwrap();
        assert_eq!(reference.namespace.as_deref(), Some("modelscope.cn"));
        assert_eq!(reference.name, "unsloth/DeepSeek-R1");
        assert_eq!(reference.version, "latest");

        let root = Path::new("/models");
        assert_eq!(
            reference.manifest(root).path,
            root.join("manifests")
                .join("modelscope.cn")
                .join("unsloth/DeepSeek-R1")
                .join("latest")
        );
    }

    #[test]
    fn trailing_separator_means_latest() {
        let reference = ModelReference::parse("mistral:").unwrap();
        assert_eq!(reference.name, "mistral");
        assert_eq!(reference.version, "latest");
    }

    #[test]
    fn port_colon_is_not_a_tag() {
        let reference = ModelReference::parse("localhost:5000/team/model").unwrap();
        assert_eq!(reference.namespace.as_deref(), Some("localhost:5000"));
        assert_eq!(reference.name, "team/model");
        assert_eq!(reference.version, "latest");
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(ModelReference::parse("").is_err());
        assert!(ModelReference::parse(":7b").is_err());
        assert!(ModelReference::parse("/llama2").is_err());
        assert!(ModelReference::parse("user/").is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let reference: ModelReference = "quentinz/bge-large-zh-v1.5".parse().unwrap();
        assert_eq!(reference.to_string(), "quentinz/bge-large-zh-v1.5:latest");
        assert_eq!(ModelReference::parse(&reference.to_string()).unwrap(), reference);
    }

    #[test]
    fn safe_stem_replaces_separators() {
        assert_eq!(
            safe_file_stem("modelscope.cn/unsloth/DeepSeek-R1:latest"),
            "modelscope.cn_unsloth_DeepSeek-R1_latest"
        );
        assert_eq!(safe_file_stem("llama2"), "llama2");
    }
}
