// src/config.rs
//! Project configuration
//!
//! A project directory (default `.rdfbundle` under the working directory)
//! holds an optional `config.toml` and a `remotes/` directory of
//! `*.remote` files:
//!
//! ```toml
//! bundles_directory = "/srv/bundles"
//! cache_directory = "/var/cache/rdfbundle"
//! http_timeout_secs = 60
//! installer_id = "build-host-1"
//! ```
//!
//! Every key is optional. `RDFBUNDLE_BUNDLES_DIR` overrides
//! `bundles_directory`.

use crate::error::{Error, Result};
use crate::loader::LoaderOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default project directory name
pub const DEFAULT_PROJECT_DIR: &str = ".rdfbundle";

/// Name of the settings file inside the project directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Name of the remotes directory inside the project directory
pub const REMOTES_DIR_NAME: &str = "remotes";

/// Environment variable overriding the bundles directory
pub const BUNDLES_DIR_ENV: &str = "RDFBUNDLE_BUNDLES_DIR";

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_bundles_directory")]
    pub bundles_directory: PathBuf,

    /// Where URL loaders keep downloaded archives; no caching when unset
    #[serde(default)]
    pub cache_directory: Option<PathBuf>,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Lock identity used by installs; defaults to one derived from the pid
    #[serde(default)]
    pub installer_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bundles_directory: default_bundles_directory(),
            cache_directory: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            installer_id: None,
        }
    }
}

fn default_bundles_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_PROJECT_DIR)
        .join("bundles")
}

fn default_http_timeout() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

impl Settings {
    /// Load settings for a project, falling back to defaults when the
    /// project has no `config.toml`
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(CONFIG_FILE_NAME);
        let settings = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        Ok(settings.with_bundles_dir_override(std::env::var(BUNDLES_DIR_ENV).ok()))
    }

    /// Parse a settings file without applying environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.http_timeout_secs == 0 {
            return Err(Error::ParseError(
                "http_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.installer_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(Error::ParseError("installer_id must not be blank".to_string()));
        }
        Ok(())
    }

    /// Replace `bundles_directory` with `value` when it is set and non-empty
    pub fn with_bundles_dir_override(mut self, value: Option<String>) -> Self {
        if let Some(dir) = value.filter(|v| !v.is_empty()) {
            self.bundles_directory = PathBuf::from(dir);
        }
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Options handed to every loader built from this project's remotes
    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            cache_directory: self.cache_directory.clone(),
            timeout: self.http_timeout(),
        }
    }

    pub fn save(&self, project_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(project_dir)?;
        let text = toml::to_string_pretty(self)
            .map_err(|e| Error::ParseError(format!("Failed to serialize settings: {}", e)))?;
        std::fs::write(project_dir.join(CONFIG_FILE_NAME), text)?;
        Ok(())
    }
}

/// `<project>/remotes`
pub fn remotes_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(REMOTES_DIR_NAME)
}
