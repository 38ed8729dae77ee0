// src/fetcher.rs

//! Fetching bundles from remotes
//!
//! The fetcher asks every remote for loaders, keeps the ones that claim the
//! requested bundle, and tries them in order until one installs it. A
//! failing loader is logged and the next one is tried; only when every
//! candidate has failed does the fetch fail.
//!
//! Fetches take the same per-version lock as installs, and a version whose
//! manifest is already present is returned without loading anything. A
//! failed fetch removes the version directory it created, so nothing of it
//! is left for version lookup to find.

use crate::bundle::lock::{default_holder, InstallLock};
use crate::bundle::{bundle_directory, FILES_DIR_NAME, GRAPHS_DIR_NAME, MANIFEST_FILE_NAME};
use crate::error::{Error, Result};
use crate::loader::{Loader, LoaderRegistry};
use crate::remote::Remote;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of trying one loader
pub enum LoadAttempt {
    /// The bundle is installed at this directory
    Loaded(PathBuf),
    /// This loader failed; the next candidate may still succeed
    Failed { loader: String, error: Error },
}

pub struct Fetcher<'a> {
    bundles_root: &'a Path,
    registry: &'a LoaderRegistry,
    holder: String,
}

impl<'a> Fetcher<'a> {
    pub fn new(bundles_root: &'a Path, registry: &'a LoaderRegistry) -> Self {
        Self {
            bundles_root,
            registry,
            holder: default_holder(),
        }
    }

    /// Identity written into the lock file while fetching
    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = holder.into();
        self
    }

    /// Fetch `bundle` (latest available when `version` is `None`) from the
    /// first remote loader able to supply it
    pub fn fetch(&self, remotes: &[Remote], bundle: &str, version: Option<u64>) -> Result<PathBuf> {
        let mut candidates = self.candidates(remotes, bundle, version);
        if candidates.is_empty() {
            return Err(Error::NoBundleLoader {
                bundle: bundle.to_string(),
                version,
            });
        }

        for loader in candidates.iter_mut() {
            match self.attempt(loader.as_mut(), bundle, version) {
                LoadAttempt::Loaded(dir) => return Ok(dir),
                LoadAttempt::Failed { loader, error } => {
                    warn!("Failed to load bundle {} with {}: {}", bundle, loader, error);
                }
            }
        }

        Err(Error::NoBundleLoader {
            bundle: bundle.to_string(),
            version,
        })
    }

    /// Loaders across all remotes that claim `bundle`@`version`
    pub fn candidates(
        &self,
        remotes: &[Remote],
        bundle: &str,
        version: Option<u64>,
    ) -> Vec<Box<dyn Loader>> {
        let mut candidates = Vec::new();
        for remote in remotes {
            for mut loader in remote.generate_loaders(self.registry) {
                if loader.can_load(bundle, version) {
                    debug!("Remote {}: {} can load {}", remote.name, loader.describe(), bundle);
                    candidates.push(loader);
                } else {
                    debug!(
                        "Remote {}: {} cannot load {}",
                        remote.name,
                        loader.describe(),
                        bundle
                    );
                }
            }
        }
        candidates
    }

    /// Run one loader to completion, turning every failure into
    /// [`LoadAttempt::Failed`]
    pub fn attempt(&self, loader: &mut dyn Loader, bundle: &str, version: Option<u64>) -> LoadAttempt {
        match self.try_load(loader, bundle, version) {
            Ok(dir) => LoadAttempt::Loaded(dir),
            Err(error) => LoadAttempt::Failed {
                loader: loader.describe(),
                error,
            },
        }
    }

    fn try_load(&self, loader: &mut dyn Loader, bundle: &str, version: Option<u64>) -> Result<PathBuf> {
        let version = match version {
            Some(v) => v,
            None => loader
                .bundle_versions(bundle)?
                .into_iter()
                .max()
                .ok_or_else(|| Error::LoadFailed {
                    bundle: bundle.to_string(),
                    loader: loader.describe(),
                    reason: "no versions available".to_string(),
                })?,
        };

        let dir = bundle_directory(self.bundles_root, bundle, version);
        let lock = InstallLock::acquire(&dir, &self.holder)?;

        if dir.join(MANIFEST_FILE_NAME).is_file() {
            info!("{}@{} is already installed at {}", bundle, version, dir.display());
            return Ok(dir);
        }

        let outcome = match loader.load(bundle, version, &dir) {
            Ok(()) if dir.join(MANIFEST_FILE_NAME).is_file() => Ok(()),
            Ok(()) => Err(Error::FetchFailed(format!(
                "{} delivered {}@{} without a manifest",
                loader.describe(),
                bundle,
                version
            ))),
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            discard_partial(&dir);
            if let Err(prune_err) = lock.release_and_prune() {
                warn!("Could not prune {}: {}", dir.display(), prune_err);
            }
            return Err(e);
        }

        info!("Fetched {}@{} into {}", bundle, version, dir.display());
        Ok(dir)
    }
}

/// Remove whatever a failed load left in `dir`, keeping the lock file
fn discard_partial(dir: &Path) {
    for name in [GRAPHS_DIR_NAME, FILES_DIR_NAME] {
        let path = dir.join(name);
        if path.exists() {
            if let Err(e) = fs::remove_dir_all(&path) {
                warn!("Could not remove {}: {}", path.display(), e);
            }
        }
    }
    let manifest = dir.join(MANIFEST_FILE_NAME);
    match fs::remove_file(&manifest) {
        Ok(()) => debug!("Removed partial manifest {}", manifest.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", manifest.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LoaderKind, LoaderOptions};
    use crate::remote::AccessorConfig;
    use tempfile::TempDir;

    /// Claims every bundle at version 5 and fails or writes a bare manifest
    struct StubLoader {
        succeed: bool,
    }

    impl Loader for StubLoader {
        fn describe(&self) -> String {
            format!("StubLoader(succeed={})", self.succeed)
        }

        fn can_load(&mut self, _bundle: &str, version: Option<u64>) -> bool {
            version.is_none_or(|v| v == 5)
        }

        fn bundle_versions(&mut self, _bundle: &str) -> Result<Vec<u64>> {
            Ok(vec![1, 5])
        }

        fn load(&mut self, bundle: &str, version: u64, target: &Path) -> Result<()> {
            fs::create_dir_all(target.join(GRAPHS_DIR_NAME))?;
            if !self.succeed {
                return Err(Error::LoadFailed {
                    bundle: bundle.to_string(),
                    loader: self.describe(),
                    reason: "stub failure".to_string(),
                });
            }
            let manifest = crate::bundle::Manifest {
                default_context: None,
                imports_context: None,
                version,
            };
            let mut file = fs::File::create(target.join(MANIFEST_FILE_NAME))?;
            manifest.write(&mut file)
        }
    }

    fn stub_registry() -> LoaderRegistry {
        let mut registry = LoaderRegistry::empty(LoaderOptions::default());
        registry.register(LoaderKind {
            name: "stub-ok",
            can_load_from: |c| c.to_string().starts_with("stub://ok"),
            build: |_, _| Ok(Box::new(StubLoader { succeed: true }) as Box<dyn Loader>),
        });
        registry.register(LoaderKind {
            name: "stub-fail",
            can_load_from: |c| c.to_string().starts_with("stub://fail"),
            build: |_, _| Ok(Box::new(StubLoader { succeed: false }) as Box<dyn Loader>),
        });
        registry
    }

    fn remote(name: &str, url: &str) -> Remote {
        let mut remote = Remote::new(name);
        remote.add_config(AccessorConfig::url(url).unwrap());
        remote
    }

    #[test]
    fn test_falls_through_failing_loader() {
        let temp_dir = TempDir::new().unwrap();
        let registry = stub_registry();
        let fetcher = Fetcher::new(temp_dir.path(), &registry);
        let remotes = vec![remote("a", "stub://fail"), remote("b", "stub://ok")];

        let dir = fetcher.fetch(&remotes, "ex/x", None).unwrap();
        assert_eq!(dir, bundle_directory(temp_dir.path(), "ex/x", 5));
        assert!(dir.join(MANIFEST_FILE_NAME).is_file());
    }

    #[test]
    fn test_all_failing_is_no_loader() {
        let temp_dir = TempDir::new().unwrap();
        let registry = stub_registry();
        let fetcher = Fetcher::new(temp_dir.path(), &registry);

        let err = fetcher
            .fetch(&[remote("a", "stub://fail")], "ex/x", Some(5))
            .unwrap_err();
        assert!(err.is_fetch_failure());
        let dir = bundle_directory(temp_dir.path(), "ex/x", 5);
        assert!(!dir.exists());
        assert!(!dir.parent().unwrap().exists());

        let err = fetcher
            .fetch(&[remote("b", "stub://ok")], "ex/x", Some(4))
            .unwrap_err();
        assert!(matches!(err, Error::NoBundleLoader { version: Some(4), .. }));
    }

    #[test]
    fn test_existing_manifest_short_circuits() {
        let temp_dir = TempDir::new().unwrap();
        let registry = stub_registry();
        let fetcher = Fetcher::new(temp_dir.path(), &registry);
        let remotes = vec![remote("b", "stub://ok")];

        let first = fetcher.fetch(&remotes, "ex/x", None).unwrap();
        // A failing loader would break the directory if it were invoked again
        let remotes = vec![remote("a", "stub://fail")];
        let again = fetcher.fetch(&remotes, "ex/x", Some(5)).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_failed_fetch_keeps_other_versions() {
        let temp_dir = TempDir::new().unwrap();
        let registry = stub_registry();
        let fetcher = Fetcher::new(temp_dir.path(), &registry);

        let installed = bundle_directory(temp_dir.path(), "ex/x", 1);
        fs::create_dir_all(&installed).unwrap();
        fs::write(installed.join(MANIFEST_FILE_NAME), "version: 1\n").unwrap();

        fetcher
            .fetch(&[remote("a", "stub://fail")], "ex/x", None)
            .unwrap_err();
        assert!(!bundle_directory(temp_dir.path(), "ex/x", 5).exists());
        assert!(installed.join(MANIFEST_FILE_NAME).is_file());
        assert_eq!(
            crate::bundle::installed_versions(temp_dir.path(), "ex/x").unwrap(),
            vec![1]
        );
    }
}
