// src/remote.rs

//! Remotes: named places bundles can be fetched from
//!
//! A remote is a name plus an ordered list of accessor configs. Each config
//! says how to reach the remote (today always a URL); the loaders that
//! actually talk to it are derived from a [`LoaderRegistry`] on demand.
//!
//! Remotes are stored one per file as YAML under `<project>/remotes/`:
//!
//! ```yaml
//! name: origin
//! accessors:
//!   - kind: url
//!     url: https://bundles.example.org/index.json
//! ```

use crate::config::remotes_dir;
use crate::error::{Error, Result};
use crate::loader::{Loader, LoaderRegistry};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

/// File extension of stored remotes
pub const REMOTE_EXTENSION: &str = "remote";

/// How to reach a remote
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AccessorConfig {
    Url { url: String },
}

impl AccessorConfig {
    /// A URL accessor; the URL must be absolute
    pub fn url(url: &str) -> Result<Self> {
        let config = AccessorConfig::Url {
            url: url.trim().to_string(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            AccessorConfig::Url { url } => Url::parse(url)
                .map(|_| ())
                .map_err(|e| Error::RemoteError(format!("invalid accessor URL '{}': {}", url, e))),
        }
    }

    pub fn parsed_url(&self) -> Option<Url> {
        match self {
            AccessorConfig::Url { url } => Url::parse(url).ok(),
        }
    }
}

impl fmt::Display for AccessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessorConfig::Url { url } => write!(f, "{}", url),
        }
    }
}

/// A named source of bundles
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Remote {
    pub name: String,
    #[serde(default)]
    pub accessors: Vec<AccessorConfig>,
}

impl Remote {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accessors: Vec::new(),
        }
    }

    /// Append an accessor config; returns false if it was already present
    pub fn add_config(&mut self, config: AccessorConfig) -> bool {
        if self.accessors.contains(&config) {
            return false;
        }
        self.accessors.push(config);
        true
    }

    /// Loaders for every accessor config, built fresh from `registry`
    pub fn generate_loaders(&self, registry: &LoaderRegistry) -> Vec<Box<dyn Loader>> {
        let mut loaders = Vec::new();
        for config in &self.accessors {
            let built = registry.loaders_for(config);
            if built.is_empty() {
                debug!("Remote {}: no loader kind accepts {}", self.name, config);
            }
            loaders.extend(built);
        }
        loaders
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::RemoteError("remote name must not be empty".to_string()));
        }
        if self.name.contains(['/', '\\']) || self.name.starts_with('.') {
            return Err(Error::RemoteError(format!(
                "remote name '{}' cannot be used as a file name",
                self.name
            )));
        }
        for config in &self.accessors {
            config.validate()?;
        }
        Ok(())
    }

    /// Serialize as YAML into `out`
    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        self.validate()?;
        serde_yaml::to_writer(out, self)?;
        Ok(())
    }

    /// Read a remote written by [`Remote::write`]
    pub fn read<R: Read>(input: R) -> Result<Self> {
        let remote: Remote = serde_yaml::from_reader(input)
            .map_err(|e| Error::RemoteError(format!("malformed remote document: {}", e)))?;
        remote.validate()?;
        Ok(remote)
    }

    /// `<dir>/<name>.remote`
    pub fn file_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.{}", self.name, REMOTE_EXTENSION))
    }

    /// Store the remote in a project's remotes directory
    pub fn save(&self, project_dir: &Path) -> Result<PathBuf> {
        let dir = remotes_dir(project_dir);
        fs::create_dir_all(&dir)?;
        let path = self.file_path(&dir);
        let mut file = fs::File::create(&path)?;
        self.write(&mut file)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)
            .map_err(|e| Error::RemoteError(format!("cannot open {}: {}", path.display(), e)))?;
        Self::read(file)
    }
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for config in &self.accessors {
            write!(f, "\n    {}", config)?;
        }
        Ok(())
    }
}

/// All remotes stored in a project, ordered by file name
///
/// Files that cannot be read or parsed are skipped with a warning.
pub fn retrieve_remotes(project_dir: &Path) -> Result<Vec<Remote>> {
    let dir = remotes_dir(project_dir);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let pattern = dir.join(format!("*.{}", REMOTE_EXTENSION));
    let pattern = pattern.to_string_lossy();
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| Error::RemoteError(format!("bad remotes pattern {}: {}", pattern, e)))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Unable to read remote file: {}", e);
                None
            }
        })
        .collect();
    paths.sort();

    let mut remotes = Vec::new();
    for path in paths {
        match Remote::load(&path) {
            Ok(remote) => remotes.push(remote),
            Err(e) => warn!("Unable to read remote {}: {}", path.display(), e),
        }
    }
    Ok(remotes)
}
