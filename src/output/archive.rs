use std::{
    fs::{self, File, FileTimes, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use flate2::{write::GzEncoder, Compression};
use tar::Builder;
use tempfile::TempDir;
use time::{macros::format_description, OffsetDateTime};
use tracing::{debug, info, warn};

use crate::models::{fingerprint, safe_file_stem, ArchiveFingerprint};

const ARCHIVE_EXTENSION: &str = "tar.gz";
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Everything needed to name the archive and staging directory for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePlan {
    pub model_name: String,
    pub storage_root: PathBuf,
    pub output_dir: PathBuf,
    pub stem: String,
    pub timestamp: String,
}

impl PackagePlan {
    #[must_use]
    pub fn archive_path(&self, attempt: u32) -> PathBuf {
        let name = if attempt == 0 {
            format!("{}_{}.{ARCHIVE_EXTENSION}", self.stem, self.timestamp)
        } else {
            format!(
                "{}_{}_{attempt}.{ARCHIVE_EXTENSION}",
                self.stem, self.timestamp
            )
        };
        self.output_dir.join(name)
    }

    #[must_use]
    pub fn staging_prefix(&self) -> String {
        format!("temp_{}_{}_", self.stem, self.timestamp)
    }
}

pub fn plan_for(model_name: &str, storage_root: &Path, output_dir: &Path) -> Result<PackagePlan> {
    Ok(PackagePlan {
        model_name: model_name.to_string(),
        storage_root: storage_root.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        stem: safe_file_stem(model_name),
        timestamp: timestamp()?,
    })
}

#[derive(Debug)]
pub struct PackageOutcome {
    pub archive_path: PathBuf,
    pub file_count: usize,
    pub fingerprint: ArchiveFingerprint,
}

/// Copies `files` into a private staging directory under the output
/// directory, mirroring their paths relative to the storage root, and
/// compresses that tree into a new `.tar.gz`.
///
/// The staging directory is removed on every path out of this function, and
/// a half-written archive is deleted if any step fails.
pub fn package(plan: &PackagePlan, files: &[PathBuf]) -> Result<PackageOutcome> {
    if !plan.storage_root.exists() {
        bail!(
            "models directory {} does not exist",
            plan.storage_root.display()
        );
    }
    if files.is_empty() {
        bail!(
            "no files found for model {} in {}",
            plan.model_name,
            plan.storage_root.display()
        );
    }

    fs::create_dir_all(&plan.output_dir)
        .with_context(|| format!("create output directory {}", plan.output_dir.display()))?;

    let (mut pending, archive_file) = claim_archive(plan)?;
    info!(
        "packaging model '{}' into '{}'",
        plan.model_name,
        pending.path.display()
    );

    let staging = tempfile::Builder::new()
        .prefix(&plan.staging_prefix())
        .tempdir_in(&plan.output_dir)
        .context("create staging directory")?;
    debug!("staging in {}", staging.path().display());

    stage_files(&plan.storage_root, files, staging.path())?;
    write_archive(staging.path(), archive_file)?;
    release_staging(staging);

    let fingerprint = fingerprint(&pending.path)?;
    pending.commit();

    Ok(PackageOutcome {
        archive_path: pending.path.clone(),
        file_count: files.len(),
        fingerprint,
    })
}

/// An archive file created for this run; deleted on drop unless committed.
struct PendingArchive {
    path: PathBuf,
    committed: bool,
}

impl PendingArchive {
    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for PendingArchive {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(error) = fs::remove_file(&self.path) {
                warn!(
                    "failed to remove incomplete archive {}: {error}",
                    self.path.display()
                );
            }
        }
    }
}

fn claim_archive(plan: &PackagePlan) -> Result<(PendingArchive, File)> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let path = plan.archive_path(attempt);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                return Ok((
                    PendingArchive {
                        path,
                        committed: false,
                    },
                    file,
                ))
            }
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(error) => {
                return Err(error).with_context(|| format!("create archive {}", path.display()))
            }
        }
    }
    Err(anyhow!(
        "no free archive name for {} after {MAX_NAME_ATTEMPTS} attempts",
        plan.archive_path(0).display()
    ))
}

fn stage_files(storage_root: &Path, files: &[PathBuf], staging: &Path) -> Result<()> {
    for file in files {
        let relative = file.strip_prefix(storage_root).with_context(|| {
            format!(
                "{} is not inside {}",
                file.display(),
                storage_root.display()
            )
        })?;
        info!("copying {}", relative.display());

        let dest = staging.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).context("create staging subdirectory")?;
        }
        fs::copy(file, &dest).with_context(|| format!("copy {}", file.display()))?;
        preserve_times(file, &dest);
    }
    Ok(())
}

// Permissions come across with fs::copy; timestamps are best-effort.
fn preserve_times(source: &Path, dest: &Path) {
    let result = fs::metadata(source).and_then(|metadata| {
        let mut times = FileTimes::new();
        if let Ok(modified) = metadata.modified() {
            times = times.set_modified(modified);
        }
        if let Ok(accessed) = metadata.accessed() {
            times = times.set_accessed(accessed);
        }
        OpenOptions::new().write(true).open(dest)?.set_times(times)
    });
    if let Err(error) = result {
        debug!("could not preserve timestamps on {}: {error}", dest.display());
    }
}

/// Archives the staging directory's children at the top level, so entries
/// read `manifests/...` and `blobs/...`.
fn write_archive(staging: &Path, archive_file: File) -> Result<()> {
    let mut builder = Builder::new(GzEncoder::new(archive_file, Compression::default()));

    let mut children = fs::read_dir(staging)
        .context("read staging directory")?
        .collect::<io::Result<Vec<_>>>()
        .context("read staging entry")?;
    children.sort_by_key(|entry| entry.file_name());

    for child in children {
        let path = child.path();
        let name = child.file_name();
        if path.is_dir() {
            builder
                .append_dir_all(&name, &path)
                .with_context(|| format!("archive {}", path.display()))?;
        } else {
            builder
                .append_path_with_name(&path, &name)
                .with_context(|| format!("archive {}", path.display()))?;
        }
    }

    let encoder = builder.into_inner().context("finish tar stream")?;
    let file = encoder.finish().context("finish gzip stream")?;
    file.sync_all().context("flush archive")?;
    Ok(())
}

fn release_staging(staging: TempDir) {
    let path = staging.path().to_path_buf();
    if let Err(error) = staging.close() {
        warn!("failed to remove staging directory {}: {error}", path.display());
    }
}

fn timestamp() -> Result<String> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))
    .context("format archive timestamp")
}
