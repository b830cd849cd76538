use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Failures of the model listing command. These abort the whole program;
/// everything else in the crate degrades with a diagnostic instead.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("failed to run `{program} {subcommand}`: {source}")]
    Spawn {
        program: PathBuf,
        subcommand: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program} {subcommand}` exited with {status}: {stderr}")]
    Failed {
        program: PathBuf,
        subcommand: &'static str,
        status: ExitStatus,
        stderr: String,
    },
}
