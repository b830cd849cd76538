use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::storage::StorageRootResolver;

/// Overrides the models directory; same variable the Ollama daemon reads.
pub const ENV_MODELS_DIR: &str = "OLLAMA_MODELS";
/// Program invoked as `<bin> list` to enumerate installed models.
pub const ENV_OLLAMA_BIN: &str = "OLLAMA_PACKER_OLLAMA_BIN";
/// Log level filter for the binary, e.g. `debug`.
pub const ENV_LOG: &str = "OLLAMA_PACKER_LOG";

const DEFAULT_OLLAMA_BIN: &str = "ollama";

#[derive(Debug, Clone)]
pub struct Settings {
    pub models_dir_override: Option<String>,
    pub ollama_bin: PathBuf,
    pub output_dir: PathBuf,
}

impl Settings {
    pub fn from_env(output_dir: Option<PathBuf>) -> Result<Self> {
        let output_dir = match output_dir {
            Some(dir) => dir,
            None => std::env::current_dir().context("resolve current working directory")?,
        };

        let ollama_bin = std::env::var(ENV_OLLAMA_BIN)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OLLAMA_BIN.to_string());

        Ok(Self {
            models_dir_override: std::env::var(ENV_MODELS_DIR).ok(),
            ollama_bin: PathBuf::from(ollama_bin),
            output_dir,
        })
    }

    #[must_use]
    pub fn storage_root(&self) -> PathBuf {
        StorageRootResolver::new(self.models_dir_override.clone()).resolve()
    }
}
