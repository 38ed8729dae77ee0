// src/bundle/mod.rs

//! Installed bundles
//!
//! An installed bundle lives at `<bundles>/<quoted id>/<version>/`:
//!
//! ```text
//! manifest
//! graphs/index        context id -> graph file
//! graphs/hashes       context id -> digest
//! graphs/<hex>.nt     one canonical N-Triples file per context
//! files/hashes        relative path -> digest
//! files/<path>        packaged source files
//! ```
//!
//! The manifest is written last, so a version directory without one is an
//! incomplete install or fetch.
//!
//! [`Bundle`] is the consumer-side handle: it finds an installed version,
//! fetching it from remotes when nothing suitable is installed, and can
//! open a private store holding all of the bundle's graphs.

pub mod descriptor;
pub mod installer;
pub mod lock;
pub mod matcher;
pub mod records;
pub mod verify;

pub use descriptor::{DependencyDescriptor, Descriptor, FilesDescriptor};
pub use installer::Installer;
pub use records::Manifest;

use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::loader::LoaderRegistry;
use crate::rdf::SqliteStore;
use crate::remote::{retrieve_remotes, Remote};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Predicate linking a context to a context it imports
pub const CONTEXT_IMPORTS: &str = "http://openworm.org/schema/Context/imports";

/// Prefix of the synthetic imports context written into manifests
pub const BUNDLE_CONTEXT_PREFIX: &str =
    "http://openworm.org/data/generated_imports_ctx?bundle_id=";

pub const MANIFEST_FILE_NAME: &str = "manifest";
pub const GRAPHS_DIR_NAME: &str = "graphs";
pub const FILES_DIR_NAME: &str = "files";
pub const INDEX_FILE_NAME: &str = "index";
pub const HASHES_FILE_NAME: &str = "hashes";

/// Database backing a bundle's private store while it is open
pub const STORE_FILE_NAME: &str = "bundle.db";

/// `<root>/<quoted id>`
pub fn bundle_id_directory(root: &Path, id: &str) -> PathBuf {
    root.join(urlencoding::encode(id).as_ref())
}

/// `<root>/<quoted id>/<version>`
///
/// The id is percent-encoded with no safe characters, so `/` in an id never
/// creates extra directory levels.
pub fn bundle_directory(root: &Path, id: &str, version: u64) -> PathBuf {
    bundle_id_directory(root, id).join(version.to_string())
}

/// Identifier of the imports context generated for bundle `id`
pub fn bundle_context_id(id: &str) -> String {
    let quoted = urlencoding::encode(id).replace("%2F", "/");
    format!("{}{}", BUNDLE_CONTEXT_PREFIX, quoted)
}

/// Installed versions of `id` under `root`, ascending
///
/// Only subdirectories named by a positive integer and holding a manifest
/// count; anything else in the id directory, including what a failed
/// install or fetch leaves behind, is ignored.
pub fn installed_versions(root: &Path, id: &str) -> Result<Vec<u64>> {
    let dir = bundle_id_directory(root, id);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        match entry.file_name().to_str().map(str::parse::<u64>) {
            Some(Ok(v)) if v > 0 => {
                if is_complete(&entry.path()) {
                    versions.push(v);
                } else {
                    debug!("Ignoring incomplete bundle at {}", entry.path().display());
                }
            }
            _ => debug!("Ignoring non-version entry {}", entry.path().display()),
        }
    }
    versions.sort_unstable();
    Ok(versions)
}

/// True if `dir` holds a manifest, i.e. its install or fetch finished
pub fn is_complete(dir: &Path) -> bool {
    dir.join(MANIFEST_FILE_NAME).is_file()
}

/// Directory of an installed bundle
///
/// With `version = None` the highest installed version is chosen.
pub fn find_bundle_directory(root: &Path, id: &str, version: Option<u64>) -> Result<PathBuf> {
    match version {
        Some(v) => {
            let dir = bundle_directory(root, id, v);
            if is_complete(&dir) {
                Ok(dir)
            } else if dir.is_dir() {
                Err(Error::bundle_not_found(
                    id,
                    Some(v),
                    "Bundle directory has no manifest",
                ))
            } else {
                Err(Error::bundle_not_found(
                    id,
                    Some(v),
                    "Bundle directory does not exist",
                ))
            }
        }
        None => {
            let latest = installed_versions(root, id)?.last().copied();
            match latest {
                Some(v) => Ok(bundle_directory(root, id, v)),
                None => Err(Error::bundle_not_found(
                    id,
                    None,
                    "No versioned bundle directories exist",
                )),
            }
        }
    }
}

/// Context ids listed in a bundle's `graphs/index`
pub fn read_contexts(bundle_dir: &Path) -> Result<BTreeSet<String>> {
    let index = bundle_dir.join(GRAPHS_DIR_NAME).join(INDEX_FILE_NAME);
    Ok(records::read_index(&index)?
        .into_iter()
        .map(|e| e.context)
        .collect())
}

/// Handle on a bundle that may or may not be installed yet
pub struct Bundle {
    ident: String,
    version: Option<u64>,
    bundles_directory: PathBuf,
    remotes: Option<Vec<Remote>>,
    project_dir: Option<PathBuf>,
    registry: LoaderRegistry,
    directory: Option<PathBuf>,
    contexts: Option<BTreeSet<String>>,
}

impl Bundle {
    pub fn new(ident: impl Into<String>, bundles_directory: impl Into<PathBuf>) -> Self {
        Self {
            ident: ident.into(),
            version: None,
            bundles_directory: bundles_directory.into(),
            remotes: None,
            project_dir: None,
            registry: LoaderRegistry::default(),
            directory: None,
            contexts: None,
        }
    }

    /// Pin the bundle to one version
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// Remotes to fetch from; takes precedence over project remotes
    pub fn with_remotes(mut self, remotes: Vec<Remote>) -> Self {
        self.remotes = Some(remotes);
        self
    }

    /// Project whose `remotes/` directory is consulted when no remotes
    /// were given explicitly
    pub fn with_project_dir(mut self, project_dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(project_dir.into());
        self
    }

    pub fn with_registry(mut self, registry: LoaderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.ident
    }

    /// The pinned version, or the resolved one once [`Bundle::resolve`] ran
    pub fn version(&self) -> Option<u64> {
        self.version.or_else(|| {
            self.directory
                .as_ref()
                .and_then(|d| d.file_name())
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse().ok())
        })
    }

    pub fn bundles_directory(&self) -> &Path {
        &self.bundles_directory
    }

    /// Locate the bundle directory, fetching from remotes if needed
    ///
    /// Fetching only happens for unpinned bundles; a pinned version that is
    /// not installed is reported as not found. The result is cached.
    pub fn resolve(&mut self) -> Result<PathBuf> {
        if let Some(dir) = &self.directory {
            return Ok(dir.clone());
        }

        let dir = match find_bundle_directory(&self.bundles_directory, &self.ident, self.version) {
            Ok(dir) => dir,
            Err(e @ Error::BundleNotFound { .. }) if self.version.is_none() => {
                let remotes = self.available_remotes()?;
                if remotes.is_empty() {
                    return Err(e);
                }
                info!("{}; trying {} remote(s)", e, remotes.len());
                Fetcher::new(&self.bundles_directory, &self.registry).fetch(
                    &remotes,
                    &self.ident,
                    None,
                )?
            }
            Err(e) => return Err(e),
        };

        debug!("Resolved {} to {}", self.ident, dir.display());
        self.directory = Some(dir.clone());
        Ok(dir)
    }

    fn available_remotes(&self) -> Result<Vec<Remote>> {
        if let Some(remotes) = &self.remotes {
            return Ok(remotes.clone());
        }
        match &self.project_dir {
            Some(project) => retrieve_remotes(project),
            None => Ok(Vec::new()),
        }
    }

    /// Context ids contained in the bundle, read from its index once
    pub fn contexts(&mut self) -> Result<&BTreeSet<String>> {
        if self.contexts.is_none() {
            let dir = self.resolve()?;
            self.contexts = Some(read_contexts(&dir)?);
        }
        Ok(self.contexts.get_or_insert_with(BTreeSet::new))
    }

    pub fn manifest(&mut self) -> Result<Manifest> {
        let dir = self.resolve()?;
        Manifest::read(&dir.join(MANIFEST_FILE_NAME))
    }

    /// Load every graph of the bundle into a private store
    ///
    /// The store is closed when the returned guard is dropped.
    pub fn open(&mut self) -> Result<OpenBundle> {
        let dir = self.resolve()?;
        OpenBundle::open(&dir)
    }
}

/// Where an open bundle's store lives and which contexts are special
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub default_context: Option<String>,
    pub imports_context: Option<String>,
}

/// A bundle whose graphs are loaded into a private store
pub struct OpenBundle {
    store: Option<SqliteStore>,
    config: StoreConfig,
}

impl OpenBundle {
    pub fn open(bundle_dir: &Path) -> Result<Self> {
        let manifest = Manifest::read(&bundle_dir.join(MANIFEST_FILE_NAME))?;
        let config = StoreConfig {
            db_path: bundle_dir.join(STORE_FILE_NAME),
            default_context: manifest.default_context,
            imports_context: manifest.imports_context,
        };

        let graphs = bundle_dir.join(GRAPHS_DIR_NAME);
        let index = records::read_index(&graphs.join(INDEX_FILE_NAME))?;

        // Dropped (and so closed) if any load below fails
        let mut store = SqliteStore::open(&config.db_path)?;
        let mut total = 0;
        for entry in &index {
            total += store.load_ntriples_file(&entry.context, &graphs.join(&entry.file_name))?;
        }
        info!(
            "Opened {} with {} contexts ({} triples)",
            bundle_dir.display(),
            index.len(),
            total
        );

        Ok(Self {
            store: Some(store),
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn store(&self) -> Result<&SqliteStore> {
        self.store
            .as_ref()
            .ok_or_else(|| Error::InitError("bundle store is closed".to_string()))
    }

    /// Close the store, reporting any error from doing so
    pub fn close(mut self) -> Result<()> {
        match self.store.take() {
            Some(store) => store.close(),
            None => Ok(()),
        }
    }
}

impl Drop for OpenBundle {
    fn drop(&mut self) {
        if self.store.take().is_some() {
            debug!("Released store {}", self.config.db_path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_layout() {
        assert_eq!(
            bundle_directory(Path::new("/b"), "ex/neurons", 3),
            PathBuf::from("/b/ex%2Fneurons/3")
        );
        assert_eq!(
            bundle_context_id("ex/neurons x"),
            "http://openworm.org/data/generated_imports_ctx?bundle_id=ex/neurons%20x"
        );
    }

    fn complete(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE_NAME), b"").unwrap();
    }

    #[test]
    fn test_latest_version_ignores_non_numeric() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in ["1", "2", "10", "latest", "0"] {
            complete(&bundle_id_directory(root, "b").join(name));
        }
        fs::write(bundle_id_directory(root, "b").join("11"), b"not a dir").unwrap();

        assert_eq!(installed_versions(root, "b").unwrap(), vec![1, 2, 10]);
        let dir = find_bundle_directory(root, "b", None).unwrap();
        assert!(dir.ends_with("10"));
    }

    #[test]
    fn test_incomplete_version_is_not_installed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        complete(&bundle_directory(root, "b", 1));
        // Left by a failed install: only the lock file remains
        let failed = bundle_directory(root, "b", 2);
        fs::create_dir_all(&failed).unwrap();
        fs::write(failed.join(lock::LOCK_FILE_NAME), b"someone\n").unwrap();

        assert_eq!(installed_versions(root, "b").unwrap(), vec![1]);
        assert!(find_bundle_directory(root, "b", None).unwrap().ends_with("1"));
        let err = find_bundle_directory(root, "b", Some(2)).unwrap_err();
        assert!(matches!(err, Error::BundleNotFound { version: Some(2), .. }));
    }

    #[test]
    fn test_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = find_bundle_directory(temp_dir.path(), "b", None).unwrap_err();
        assert!(matches!(err, Error::BundleNotFound { version: None, .. }));
        let err = find_bundle_directory(temp_dir.path(), "b", Some(4)).unwrap_err();
        assert!(matches!(err, Error::BundleNotFound { version: Some(4), .. }));
    }

    #[test]
    fn test_resolve_without_remotes_propagates_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let mut bundle = Bundle::new("b", temp_dir.path()).with_project_dir(temp_dir.path());
        assert!(matches!(bundle.resolve(), Err(Error::BundleNotFound { .. })));
    }

    #[test]
    fn test_pinned_missing_does_not_fetch() {
        let temp_dir = TempDir::new().unwrap();
        let mut remote = Remote::new("r");
        remote.add_config(crate::remote::AccessorConfig::url("file:///nonexistent/index.json").unwrap());
        let mut bundle = Bundle::new("b", temp_dir.path())
            .with_version(2)
            .with_remotes(vec![remote]);
        assert!(matches!(
            bundle.resolve(),
            Err(Error::BundleNotFound { version: Some(2), .. })
        ));
    }

    #[test]
    fn test_resolved_version() {
        let temp_dir = TempDir::new().unwrap();
        complete(&bundle_directory(temp_dir.path(), "b", 7));
        let mut bundle = Bundle::new("b", temp_dir.path());
        assert_eq!(bundle.version(), None);
        bundle.resolve().unwrap();
        assert_eq!(bundle.version(), Some(7));
        assert_eq!(bundle.identifier(), "b");
    }
}
