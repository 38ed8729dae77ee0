// src/error.rs

//! Crate-wide error type
//!
//! Bundle operations fail in a handful of well-defined ways (missing
//! bundles, failed loads, aborted installs, exhausted fetches). Each has its
//! own variant so callers can match on the kind; the remaining variants carry
//! I/O, parsing and transport failures from the layers underneath.

use std::collections::BTreeSet;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The requested bundle (or version) is not available locally and no
    /// remote could supply it
    #[error("Missing bundle \"{id}\"{}: {reason}", version_suffix(.version))]
    BundleNotFound {
        id: String,
        version: Option<u64>,
        reason: String,
    },

    /// A specific loader could not retrieve or unpack a bundle
    #[error("Failed to load {bundle} bundle with loader {loader}: {reason}")]
    LoadFailed {
        bundle: String,
        loader: String,
        reason: String,
    },

    /// Installation aborted
    #[error("Install failed: {0}")]
    InstallFailed(String),

    /// Contexts transitively imported by the bundle are covered neither by
    /// the bundle nor by its dependencies
    #[error("Missing {} imports", .0.len())]
    MissingImports(BTreeSet<String>),

    /// An explicitly included file does not exist in the source directory
    #[error("Included file in bundle does not exist: {0}")]
    MissingFile(String),

    /// Generic fetch failure
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// No loader on any remote claims the requested bundle
    #[error("No loader could be found for \"{bundle}\"{}", version_suffix(.version))]
    NoBundleLoader {
        bundle: String,
        version: Option<u64>,
    },

    #[error("I/O error: {0}")]
    IoError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Download error: {0}")]
    DownloadError(String),

    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("Remote error: {0}")]
    RemoteError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
}

impl Error {
    /// True for every way an install can be aborted
    pub fn is_install_failure(&self) -> bool {
        matches!(
            self,
            Self::InstallFailed(_) | Self::MissingImports(_) | Self::MissingFile(_)
        )
    }

    /// True when a fetch ran out of loaders to try
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::FetchFailed(_) | Self::NoBundleLoader { .. })
    }

    /// Shorthand for a [`Error::BundleNotFound`]
    pub fn bundle_not_found(
        id: impl Into<String>,
        version: Option<u64>,
        reason: impl Into<String>,
    ) -> Self {
        Self::BundleNotFound {
            id: id.into(),
            version,
            reason: reason.into(),
        }
    }
}

fn version_suffix(version: &Option<u64>) -> String {
    match version {
        Some(v) => format!(" at version {v}"),
        None => String::new(),
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::ParseError(format!("JSON: {e}"))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::ParseError(format!("YAML: {e}"))
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::ParseError(format!("TOML: {e}"))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::DownloadError(e.to_string())
    }
}
