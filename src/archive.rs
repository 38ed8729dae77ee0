// src/archive.rs

//! Bundle archives
//!
//! Loaders download bundles as compressed tarballs whose entries are paths
//! relative to the bundle directory (`manifest`, `graphs/...`, `files/...`).
//! Packing walks an installed bundle in sorted order with a fixed mtime so
//! the same bundle always yields the same archive bytes.

use crate::compression::{decoder_auto, xz_encoder};
use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Component, Path};
use tracing::{debug, info, warn};

/// Modification time stamped on every packed entry (2024-01-01 00:00:00 UTC)
const PACK_MTIME: u64 = 1704067200;

/// Top-level names that belong to the local installation, not the bundle
const LOCAL_ONLY: &[&str] = &[crate::bundle::lock::LOCK_FILE_NAME, crate::bundle::STORE_FILE_NAME];

/// Pack the installed bundle in `bundle_dir` into an `.tar.xz` at `output`
pub fn pack_bundle(bundle_dir: &Path, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(output).map_err(|e| {
        Error::IoError(format!("Failed to create archive {}: {}", output.display(), e))
    })?;
    let file = pack_to_writer(bundle_dir, file)?;
    file.sync_all()?;
    info!("Packed {} into {}", bundle_dir.display(), output.display());
    Ok(())
}

/// Write an xz-compressed tarball of `bundle_dir` into `writer`
pub fn pack_to_writer<W: Write>(bundle_dir: &Path, writer: W) -> Result<W> {
    if !bundle_dir.join(crate::bundle::MANIFEST_FILE_NAME).is_file() {
        return Err(Error::BundleNotFound {
            id: bundle_dir.display().to_string(),
            version: None,
            reason: "directory has no manifest; only complete bundles can be packed".to_string(),
        });
    }

    let mut builder = tar::Builder::new(xz_encoder(writer));
    append_dir(&mut builder, bundle_dir, "")?;
    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

fn append_dir<W: Write>(builder: &mut tar::Builder<W>, dir: &Path, prefix: &str) -> Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if prefix.is_empty() && LOCAL_ONLY.contains(&name.as_str()) {
            continue;
        }
        let archive_path = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            header.set_mtime(PACK_MTIME);
            header.set_cksum();
            builder.append_data(&mut header, &archive_path, std::io::empty())?;
            append_dir(builder, &entry.path(), &archive_path)?;
        } else if file_type.is_file() {
            let content = fs::read(entry.path())?;
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_mode(0o644);
            header.set_size(content.len() as u64);
            header.set_mtime(PACK_MTIME);
            header.set_cksum();
            builder.append_data(&mut header, &archive_path, content.as_slice())?;
        } else {
            warn!("Skipping {} while packing: not a regular file", entry.path().display());
        }
    }

    Ok(())
}

/// Extract a (possibly compressed) bundle tarball into `target`
///
/// Compression is detected from the stream. Entries whose paths are
/// absolute or climb out of `target` abort the extraction, and anything
/// other than regular files and directories is skipped. Returns the number
/// of files written.
pub fn unpack<R: Read>(reader: R, target: &Path) -> Result<usize> {
    unpack_buffered(BufReader::new(reader), target)
}

fn unpack_buffered<R: BufRead>(reader: R, target: &Path) -> Result<usize> {
    let (format, decoder) = decoder_auto(reader)?;
    debug!("Unpacking {} archive into {}", format, target.display());
    fs::create_dir_all(target)?;

    let mut archive = tar::Archive::new(decoder);
    let mut written = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();

        if !is_contained(&path) {
            return Err(Error::ParseError(format!(
                "archive entry {} escapes the target directory",
                path.display()
            )));
        }

        match entry.header().entry_type() {
            tar::EntryType::Directory => {
                fs::create_dir_all(target.join(&path))?;
            }
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                if entry.unpack_in(target)? {
                    written += 1;
                }
            }
            other => {
                warn!("Skipping archive entry {} of type {:?}", path.display(), other);
            }
        }
    }

    Ok(written)
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
