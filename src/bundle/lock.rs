// src/bundle/lock.rs

//! Exclusive lock on a bundle's staging directory
//!
//! Installs (and fetches) into `<bundles>/<id>/<version>/` hold `.lock` in
//! that directory for their whole duration, so two writers never populate
//! the same version at once. The lock file records the identity of the
//! holder and is normally left behind on release; the `flock` itself goes
//! away when the file handle closes.
//!
//! A holder may instead prune a directory that ended up holding nothing but
//! the lock file. Waiters that were blocked on the unlinked file notice it
//! is gone once they get the lock and start over on a fresh one.
//!
//! ```ignore
//! let lock = InstallLock::acquire(&staging_dir, "installer-1")?;
//! // ... write graphs/, files/, manifest ...
//! drop(lock);
//! ```

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the lock file inside a staging directory
pub const LOCK_FILE_NAME: &str = ".lock";

/// Held exclusive lock on a staging directory
pub struct InstallLock {
    #[allow(dead_code)]
    file: File,
    dir: PathBuf,
    path: PathBuf,
}

impl InstallLock {
    /// Block until the lock on `dir` is available
    pub fn acquire(dir: &Path, holder: &str) -> Result<Self> {
        loop {
            let (file, path) = open_lock_file(dir)?;

            file.lock_exclusive().map_err(|e| {
                Error::LockError(format!("Failed to lock {}: {}", path.display(), e))
            })?;

            if still_linked(&file, &path) {
                return Self::held(file, dir, path, holder);
            }
            debug!("Lock file {} was pruned while waiting, retrying", path.display());
        }
    }

    fn held(mut file: File, dir: &Path, path: PathBuf, holder: &str) -> Result<Self> {
        file.set_len(0)?;
        writeln!(file, "{}", holder)?;
        info!("Acquired staging lock {} as {}", path.display(), holder);
        Ok(Self {
            file,
            dir: dir.to_path_buf(),
            path,
        })
    }

    /// Release the lock, deleting the staging directory if the lock file is
    /// the only thing left in it
    ///
    /// Returns whether the directory was removed. The parent (the bundle's
    /// version list) goes too when that leaves it empty.
    pub fn release_and_prune(self) -> Result<bool> {
        let only_lock = fs::read_dir(&self.dir)?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect::<std::io::Result<Vec<_>>>()?
            .iter()
            .all(|name| name == LOCK_FILE_NAME);
        if !only_lock {
            return Ok(false);
        }

        // Unlinked under the flock; waiters re-check the link once they lock
        fs::remove_file(&self.path)?;
        fs::remove_dir(&self.dir)?;
        debug!("Pruned empty staging directory {}", self.dir.display());

        if let Some(parent) = self.dir.parent() {
            match fs::remove_dir(parent) {
                Ok(()) => debug!("Pruned empty bundle directory {}", parent.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) if e.kind() == std::io::ErrorKind::DirectoryNotEmpty => {}
                Err(e) => warn!("Could not remove {}: {}", parent.display(), e),
            }
        }
        Ok(true)
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        debug!("Released staging lock {}", self.path.display());
    }
}

fn open_lock_file(dir: &Path) -> Result<(File, PathBuf)> {
    fs::create_dir_all(dir)?;
    let path = dir.join(LOCK_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(|e| Error::LockError(format!("Cannot open {}: {}", path.display(), e)))?;
    Ok((file, path))
}

/// Whether `path` still names the file we hold open
fn still_linked(file: &File, path: &Path) -> bool {
    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
        _ => false,
    }
}

/// Default lock identity for this process
pub fn default_holder() -> String {
    format!("rdfbundle-{}", std::process::id())
}
