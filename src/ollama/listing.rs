use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::ListingError;

const LIST_SUBCOMMAND: &str = "list";

/// One row of `ollama list` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledModel {
    pub name: String,
    pub id: Option<String>,
    /// The row exactly as printed, for `--list` and the selection menu.
    pub line: String,
}

/// Source of the installed-model table. The process-backed implementation
/// is [`OllamaCli`]; tests substitute canned rows.
pub trait ModelLister {
    fn list_installed(&self) -> Result<Vec<InstalledModel>, ListingError>;

    /// Short id of the model whose name column equals `name` exactly.
    fn model_id(&self, name: &str) -> Result<Option<String>, ListingError> {
        Ok(self
            .list_installed()?
            .into_iter()
            .find(|model| model.name == name)
            .and_then(|model| model.id))
    }
}

pub struct OllamaCli {
    program: PathBuf,
}

impl OllamaCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self) -> Result<String, ListingError> {
        debug!("running {:?} {LIST_SUBCOMMAND}", self.program);
        let output = Command::new(&self.program)
            .arg(LIST_SUBCOMMAND)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ListingError::Spawn {
                program: self.program.clone(),
                subcommand: LIST_SUBCOMMAND,
                source,
            })?;

        if !output.status.success() {
            return Err(ListingError::Failed {
                program: self.program.clone(),
                subcommand: LIST_SUBCOMMAND,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ModelLister for OllamaCli {
    fn list_installed(&self) -> Result<Vec<InstalledModel>, ListingError> {
        self.run().map(|stdout| parse_listing(&stdout))
    }
}

/// Drops the header line and blank lines; columns are whitespace separated
/// with the name first and the id second.
pub fn parse_listing(stdout: &str) -> Vec<InstalledModel> {
    stdout
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let name = columns.next()?.to_string();
            let id = columns.next().map(str::to_string);
            Some(InstalledModel {
                name,
                id,
                line: line.to_string(),
            })
        })
        .collect()
}
