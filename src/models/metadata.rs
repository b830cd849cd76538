use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// Size and SHA-256 of a finished archive, reported so an export can be
/// checked after it has been moved to another machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFingerprint {
    pub size_bytes: u64,
    pub sha256: String,
}

pub fn fingerprint(path: &Path) -> Result<ArchiveFingerprint> {
    let size_bytes = std::fs::metadata(path)
        .with_context(|| format!("stat archive {}", path.display()))?
        .len();
    let sha256 = compute_sha256(path)?;
    Ok(ArchiveFingerprint { size_bytes, sha256 })
}

pub fn compute_sha256(path: &Path) -> Result<String> {
    let file =
        File::open(path).with_context(|| format!("open file for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let read = reader.read(&mut buffer).context("hash read")?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
