use std::path::Path;

use tracing::{error, info};

use crate::error::ListingError;
use crate::models::{ModelLocator, ModelReference};
use crate::ollama::ModelLister;
use crate::output::{package, plan_for};

/// Locates `model_name` under `storage_root` and writes it as a `.tar.gz`
/// into `output_dir`.
///
/// Handled failures are logged and reported as `Ok(false)`; only a failing
/// listing command is returned as an error.
pub fn package_model(
    model_name: &str,
    storage_root: &Path,
    output_dir: &Path,
    lister: &dyn ModelLister,
) -> Result<bool, ListingError> {
    info!("looking for model files in {}", storage_root.display());
    if !storage_root.exists() {
        error!("models directory not found: {}", storage_root.display());
        return Ok(false);
    }

    let reference = match ModelReference::parse(model_name) {
        Ok(reference) => reference,
        Err(error) => {
            error!("{error:#}");
            return Ok(false);
        }
    };

    let found = ModelLocator::new(storage_root, lister).locate(&reference)?;
    if found.is_empty() {
        error!(
            "no files found for model '{model_name}' in {}",
            storage_root.display()
        );
        return Ok(false);
    }
    info!("found {} files for model '{model_name}'", found.len());

    let outcome = plan_for(model_name, storage_root, output_dir)
        .and_then(|plan| package(&plan, found.files()));

    match outcome {
        Ok(outcome) => {
            info!(
                "packaged {} files into {} ({} bytes, sha256 {})",
                outcome.file_count,
                outcome.archive_path.display(),
                outcome.fingerprint.size_bytes,
                outcome.fingerprint.sha256
            );
            Ok(true)
        }
        Err(error) => {
            error!("failed to package model '{model_name}': {error:#}");
            Ok(false)
        }
    }
}
