// src/loader/mod.rs

//! Bundle loaders
//!
//! A loader knows how to retrieve bundles from one kind of location. Which
//! loaders apply to a remote is decided per accessor config by a
//! [`LoaderRegistry`]: each registered [`LoaderKind`] has a capability test
//! and a constructor, and a remote asks the registry for fresh loader
//! instances every time it is consulted.
//!
//! # Registered kinds
//!
//! | Kind | Accessor URLs | Index location |
//! |------|---------------|----------------|
//! | `http` | `http://`, `https://` | the URL itself |
//! | `file` | `file://` | the path the URL names |

pub mod file;
pub mod http;
pub mod index;

pub use file::FileBundleLoader;
pub use http::HttpBundleLoader;
pub use index::BundleIndex;

use crate::config::DEFAULT_HTTP_TIMEOUT_SECS;
use crate::error::Result;
use crate::remote::AccessorConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// A strategy for retrieving bundles from one location
pub trait Loader {
    /// Human-readable description used in logs and errors
    fn describe(&self) -> String;

    /// True if this loader can supply `bundle` (at `version`, when given)
    ///
    /// Problems reaching the location count as "cannot load".
    fn can_load(&mut self, bundle: &str, version: Option<u64>) -> bool;

    /// Versions of `bundle` this loader can supply
    fn bundle_versions(&mut self, bundle: &str) -> Result<Vec<u64>>;

    /// Download `bundle` at `version` and unpack it into `target`
    fn load(&mut self, bundle: &str, version: u64, target: &Path) -> Result<()>;
}

/// Settings shared by every loader a registry builds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Keep downloaded archives here and reuse them on later loads
    pub cache_directory: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            cache_directory: None,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

/// Builds a loader for an accessor config its kind accepted
pub type LoaderConstructor = fn(&AccessorConfig, &LoaderOptions) -> Result<Box<dyn Loader>>;

/// One registered kind of loader
#[derive(Clone)]
pub struct LoaderKind {
    pub name: &'static str,
    pub can_load_from: fn(&AccessorConfig) -> bool,
    pub build: LoaderConstructor,
}

impl std::fmt::Debug for LoaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderKind").field("name", &self.name).finish()
    }
}

/// The set of loader kinds available to remotes
#[derive(Debug, Clone)]
pub struct LoaderRegistry {
    kinds: Vec<LoaderKind>,
    options: LoaderOptions,
}

impl LoaderRegistry {
    /// A registry with no loader kinds
    pub fn empty(options: LoaderOptions) -> Self {
        Self {
            kinds: Vec::new(),
            options,
        }
    }

    /// A registry with the HTTP and file loaders
    pub fn with_defaults(options: LoaderOptions) -> Self {
        let mut registry = Self::empty(options);
        registry.register(HttpBundleLoader::kind());
        registry.register(FileBundleLoader::kind());
        registry
    }

    /// Add a kind; kinds are consulted in registration order
    pub fn register(&mut self, kind: LoaderKind) {
        self.kinds.retain(|k| k.name != kind.name);
        self.kinds.push(kind);
    }

    pub fn kinds(&self) -> &[LoaderKind] {
        &self.kinds
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Fresh loaders for every kind that accepts `config`
    ///
    /// A kind whose constructor fails is logged and left out.
    pub fn loaders_for(&self, config: &AccessorConfig) -> Vec<Box<dyn Loader>> {
        let mut loaders = Vec::new();
        for kind in &self.kinds {
            if !(kind.can_load_from)(config) {
                continue;
            }
            match (kind.build)(config, &self.options) {
                Ok(loader) => {
                    debug!("Built {} loader for {}", kind.name, config);
                    loaders.push(loader);
                }
                Err(e) => warn!("Could not build {} loader for {}: {}", kind.name, config, e),
            }
        }
        loaders
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults(LoaderOptions::default())
    }
}

/// `<cache>/<quoted bundle id>/<version>.tar.xz`
pub(crate) fn cached_archive_path(cache: &Path, bundle: &str, version: u64) -> PathBuf {
    cache
        .join(urlencoding::encode(bundle).as_ref())
        .join(format!("{}.tar.xz", version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_dispatch() {
        let registry = LoaderRegistry::default();
        let http = AccessorConfig::url("https://example.org/index.json").unwrap();
        let file = AccessorConfig::url("file:///srv/bundles/index.json").unwrap();
        let other = AccessorConfig::url("ftp://example.org/index.json").unwrap();

        assert_eq!(registry.loaders_for(&http).len(), 1);
        assert_eq!(registry.loaders_for(&file).len(), 1);
        assert!(registry.loaders_for(&other).is_empty());
        assert!(LoaderRegistry::empty(LoaderOptions::default())
            .loaders_for(&http)
            .is_empty());
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = LoaderRegistry::default();
        registry.register(FileBundleLoader::kind());
        assert_eq!(registry.kinds().len(), 2);
        assert_eq!(registry.kinds()[1].name, "file");
    }

    #[test]
    fn test_cached_archive_path() {
        let path = cached_archive_path(Path::new("/cache"), "ex/a b", 3);
        assert_eq!(path, PathBuf::from("/cache/ex%2Fa%20b/3.tar.xz"));
    }
}
