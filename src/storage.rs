use std::path::{Path, PathBuf};

use directories::BaseDirs;
use tracing::{debug, warn};

/// System-wide store used by the Linux service install.
pub const SYSTEM_MODELS_DIR: &str = "/usr/share/ollama/.ollama/models";
const USER_MODELS_DIR: [&str; 2] = [".ollama", "models"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    Other,
}

impl Platform {
    #[must_use]
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }
}

/// Finds the directory Ollama keeps `manifests/` and `blobs/` under.
///
/// Order: a non-empty override, then on Linux the system store if it exists,
/// then `<home>/.ollama/models`. The result is not checked for existence.
#[derive(Debug, Clone)]
pub struct StorageRootResolver {
    override_dir: Option<String>,
    platform: Platform,
    home: PathBuf,
    system_dir: PathBuf,
}

impl StorageRootResolver {
    pub fn new(override_dir: Option<String>) -> Self {
        let home = BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .unwrap_or_else(|| {
                warn!("could not determine the home directory; using a relative models path");
                PathBuf::new()
            });
        Self {
            override_dir,
            platform: Platform::current(),
            home,
            system_dir: PathBuf::from(SYSTEM_MODELS_DIR),
        }
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    #[must_use]
    pub fn with_system_dir(mut self, system_dir: impl Into<PathBuf>) -> Self {
        self.system_dir = system_dir.into();
        self
    }

    #[must_use]
    pub fn resolve(&self) -> PathBuf {
        if let Some(dir) = self.override_dir.as_deref().filter(|dir| !dir.is_empty()) {
            debug!("using models directory override {dir}");
            return PathBuf::from(dir);
        }

        match self.platform {
            Platform::Linux if self.system_dir.exists() => self.system_dir.clone(),
            Platform::Windows | Platform::Linux | Platform::Other => user_models_dir(&self.home),
        }
    }
}

fn user_models_dir(home: &Path) -> PathBuf {
    USER_MODELS_DIR
        .iter()
        .fold(home.to_path_buf(), |path, segment| path.join(segment))
}
