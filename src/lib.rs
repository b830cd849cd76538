//! Export a model installed by a local Ollama daemon into a portable
//! `.tar.gz` holding its manifest and blobs under their storage-relative paths.

pub mod error;
pub mod models;
pub mod ollama;
pub mod output;
pub mod pipeline;
pub mod settings;
pub mod storage;

pub use error::ListingError;
pub use models::{ModelLocator, ModelReference, ResolvedFileSet};
pub use ollama::{ModelLister, OllamaCli};
pub use pipeline::package_model;
pub use settings::Settings;
pub use storage::StorageRootResolver;
