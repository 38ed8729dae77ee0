// src/loader/http.rs

//! Loader for bundles published over HTTP(S)
//!
//! The accessor URL points at a bundle index document. Archive locations in
//! the index may be absolute URLs or relative to the index URL.

use super::index::BundleIndex;
use super::{cached_archive_path, Loader, LoaderKind, LoaderOptions};
use crate::archive;
use crate::error::{Error, Result};
use crate::remote::AccessorConfig;
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

pub struct HttpBundleLoader {
    index_url: Url,
    client: Client,
    cache_directory: Option<PathBuf>,
    index: Option<BundleIndex>,
}

impl HttpBundleLoader {
    pub fn new(index_url: &str, options: &LoaderOptions) -> Result<Self> {
        let index_url = Url::parse(index_url)
            .map_err(|e| Error::ParseError(format!("invalid index URL {}: {}", index_url, e)))?;
        if !matches!(index_url.scheme(), "http" | "https") {
            return Err(Error::InitError(format!(
                "{} is not an HTTP(S) URL",
                index_url
            )));
        }

        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            index_url,
            client,
            cache_directory: options.cache_directory.clone(),
            index: None,
        })
    }

    /// Registry entry for this loader
    pub fn kind() -> LoaderKind {
        LoaderKind {
            name: "http",
            can_load_from: Self::can_load_from,
            build: |config, options| {
                let AccessorConfig::Url { url } = config;
                let loader: Box<dyn Loader> = Box::new(Self::new(url, options)?);
                Ok(loader)
            },
        }
    }

    pub fn can_load_from(config: &AccessorConfig) -> bool {
        config
            .parsed_url()
            .is_some_and(|u| matches!(u.scheme(), "http" | "https"))
    }

    /// The index document, fetched on first use
    pub fn index(&mut self) -> Result<&BundleIndex> {
        if self.index.is_none() {
            info!("Fetching bundle index from {}", self.index_url);
            let response = self.get(self.index_url.as_str())?;
            let body = response
                .bytes()
                .map_err(|e| Error::DownloadError(format!("Failed to read index: {e}")))?;
            self.index = Some(BundleIndex::from_json(&body)?);
        }
        Ok(self.index.get_or_insert_with(BundleIndex::default))
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::DownloadError(format!("Failed to fetch {}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(Error::DownloadError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }
        Ok(response)
    }

    fn download_into(&self, url: &str, file: &mut File) -> Result<u64> {
        let mut response = self.get(url)?;
        let written = io::copy(&mut response, file)
            .map_err(|e| Error::IoError(format!("Failed to write downloaded data: {e}")))?;
        file.seek(SeekFrom::Start(0))?;
        debug!("Downloaded {} bytes from {}", written, url);
        Ok(written)
    }

    /// Open the archive for `bundle`@`version`, downloading it if needed
    ///
    /// The flag is true when the archive came out of the cache rather than
    /// off the network.
    fn archive(&self, url: &str, bundle: &str, version: u64) -> Result<(File, bool)> {
        let Some(cache) = &self.cache_directory else {
            let mut spool = tempfile::tempfile()?;
            self.download_into(url, &mut spool)?;
            return Ok((spool, false));
        };

        let cached = cached_archive_path(cache, bundle, version);
        if cached.is_file() {
            debug!("Using cached archive {}", cached.display());
            return Ok((File::open(&cached)?, true));
        }

        let parent = cached.parent().unwrap_or(cache);
        fs::create_dir_all(parent)?;
        let mut staged = tempfile::NamedTempFile::new_in(parent)?;
        self.download_into(url, staged.as_file_mut())?;
        let file = staged
            .persist(&cached)
            .map_err(|e| Error::IoError(format!("Failed to cache {}: {}", cached.display(), e)))?;
        Ok((file, false))
    }

    /// Drop the cached copy of an archive that failed to unpack
    fn evict(&self, bundle: &str, version: u64) {
        let Some(cache) = &self.cache_directory else {
            return;
        };
        let cached = cached_archive_path(cache, bundle, version);
        match fs::remove_file(&cached) {
            Ok(()) => warn!("Removed unusable cached archive {}", cached.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove cached archive {}: {}", cached.display(), e),
        }
    }
}

impl Loader for HttpBundleLoader {
    fn describe(&self) -> String {
        format!("HttpBundleLoader({})", self.index_url)
    }

    fn can_load(&mut self, bundle: &str, version: Option<u64>) -> bool {
        let index_url = self.index_url.to_string();
        match self.index() {
            Ok(index) => index.can_load(bundle, version),
            Err(e) => {
                debug!("{} cannot read its index: {}", index_url, e);
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
        let url = self.index_url.join(&location).map_err(|e| Error::LoadFailed {
            bundle: bundle.to_string(),
            loader: describe.clone(),
            reason: format!("bad archive location {}: {}", location, e),
        })?;

        info!("Loading {}@{} from {}", bundle, version, url);
        let (archive, from_cache) = self.archive(url.as_str(), bundle, version)?;
        let count = match archive::unpack(archive, target) {
            Ok(count) => count,
            Err(e) => {
                self.evict(bundle, version);
                if !from_cache {
                    return Err(e);
                }
                warn!(
                    "Cached archive for {}@{} is unusable ({}), downloading again",
                    bundle, version, e
                );
                let (archive, _) = self.archive(url.as_str(), bundle, version)?;
                archive::unpack(archive, target).inspect_err(|_| self.evict(bundle, version))?
            }
        };
        debug!("Unpacked {} files into {}", count, target.display());
        Ok(())
    }
}
