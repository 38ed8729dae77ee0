// src/loader/file.rs

//! Loader for bundles published on a local or mounted filesystem
//!
//! The accessor is a `file://` URL naming an index document. Archive
//! locations are `file://` URLs, absolute paths, or paths relative to the
//! directory holding the index.

use super::index::BundleIndex;
use super::{Loader, LoaderKind, LoaderOptions};
use crate::archive;
use crate::error::{Error, Result};
use crate::remote::AccessorConfig;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

pub struct FileBundleLoader {
    index_path: PathBuf,
    index: Option<BundleIndex>,
}

impl FileBundleLoader {
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            index: None,
        }
    }

    /// Loader for the index named by a `file://` URL
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::ParseError(format!("invalid index URL {}: {}", url, e)))?;
        if parsed.scheme() != "file" {
            return Err(Error::InitError(format!("{} is not a file:// URL", url)));
        }
        let path = parsed
            .to_file_path()
            .map_err(|_| Error::InitError(format!("{} does not name a local path", url)))?;
        Ok(Self::new(path))
    }

    /// Registry entry for this loader
    pub fn kind() -> LoaderKind {
        LoaderKind {
            name: "file",
            can_load_from: Self::can_load_from,
            build: |config: &AccessorConfig, _options: &LoaderOptions| {
                let AccessorConfig::Url { url } = config;
                let loader: Box<dyn Loader> = Box::new(Self::from_url(url)?);
                Ok(loader)
            },
        }
    }

    pub fn can_load_from(config: &AccessorConfig) -> bool {
        config.parsed_url().is_some_and(|u| u.scheme() == "file")
    }

    pub fn index(&mut self) -> Result<&BundleIndex> {
        if self.index.is_none() {
            debug!("Reading bundle index {}", self.index_path.display());
            let data = fs::read(&self.index_path).map_err(|e| {
                Error::IoError(format!(
                    "Failed to read index {}: {}",
                    self.index_path.display(),
                    e
                ))
            })?;
            self.index = Some(BundleIndex::from_json(&data)?);
        }
        Ok(self.index.get_or_insert_with(BundleIndex::default))
    }

    fn archive_path(&self, location: &str) -> Option<PathBuf> {
        if location.starts_with("file:") {
            return Url::parse(location).ok()?.to_file_path().ok();
        }
        let path = Path::new(location);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            let base = self.index_path.parent().unwrap_or(Path::new("."));
            Some(base.join(path))
        }
    }
}

impl Loader for FileBundleLoader {
    fn describe(&self) -> String {
        format!("FileBundleLoader({})", self.index_path.display())
    }

    fn can_load(&mut self, bundle: &str, version: Option<u64>) -> bool {
        let index_path = self.index_path.clone();
        match self.index() {
            Ok(index) => index.can_load(bundle, version),
            Err(e) => {
                debug!("{} cannot read its index: {}", index_path.display(), e);
                false
            }
        }
    }

    fn bundle_versions(&mut self, bundle: &str) -> Result<Vec<u64>> {
        Ok(self.index()?.versions(bundle))
    }

    fn load(&mut self, bundle: &str, version: u64, target: &Path) -> Result<()> {
        let describe = self.describe();
        let location = self.index()?.location(&describe, bundle, version)?.to_string();
        let path = self.archive_path(&location).ok_or_else(|| Error::LoadFailed {
            bundle: bundle.to_string(),
            loader: describe.clone(),
            reason: format!("bad archive location {}", location),
        })?;

        info!("Loading {}@{} from {}", bundle, version, path.display());
        let file = File::open(&path).map_err(|e| Error::LoadFailed {
            bundle: bundle.to_string(),
            loader: describe,
            reason: format!("cannot open {}: {}", path.display(), e),
        })?;
        archive::unpack(file, target)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_archive_locations() {
        let loader = FileBundleLoader::new("/srv/remote/index.json");
        assert_eq!(
            loader.archive_path("a-1.tar.xz").unwrap(),
            PathBuf::from("/srv/remote/a-1.tar.xz")
        );
        assert_eq!(
            loader.archive_path("/elsewhere/a.tar.xz").unwrap(),
            PathBuf::from("/elsewhere/a.tar.xz")
        );
        assert_eq!(
            loader.archive_path("file:///x/a.tar.xz").unwrap(),
            PathBuf::from("/x/a.tar.xz")
        );
    }

    #[test]
    fn test_missing_index_cannot_load() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = FileBundleLoader::new(temp_dir.path().join("index.json"));
        assert!(!loader.can_load("ex/a", None));
    }

    #[test]
    fn test_versions_from_index() {
        let temp_dir = TempDir::new().unwrap();
        let index_path = temp_dir.path().join("index.json");
        fs::write(&index_path, r#"{"ex/a": {"1": "a1.tar.xz", "3": "a3.tar.xz"}}"#).unwrap();

        let url = Url::from_file_path(&index_path).unwrap();
        let mut loader = FileBundleLoader::from_url(url.as_str()).unwrap();
        assert!(loader.can_load("ex/a", Some(3)));
        assert!(!loader.can_load("ex/b", None));
        assert_eq!(loader.bundle_versions("ex/a").unwrap(), vec![1, 3]);

        let err = loader.load("ex/a", 1, &temp_dir.path().join("out")).unwrap_err();
        assert!(matches!(err, Error::LoadFailed { .. }));
    }
}
