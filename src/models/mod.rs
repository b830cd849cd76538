mod locator;
mod manifest;
mod metadata;
mod reference;

pub use locator::{Diagnostic, ModelLocator, ResolvedFileSet};
pub use manifest::{
    digest_to_file_name, file_name_to_digest, BlobReference, ManifestDocument, ManifestEntry,
    ManifestSlot,
};
pub use metadata::{compute_sha256, fingerprint, ArchiveFingerprint};
pub use reference::{
    safe_file_stem, ManifestDescriptor, ModelReference, BLOBS_DIR, DEFAULT_NAMESPACE,
    DEFAULT_REGISTRY, DEFAULT_TAG, MANIFESTS_DIR,
};
