// src/bundle/records.rs

//! On-disk record formats of an installed bundle
//!
//! All three files are sequences of newline-terminated records with a NUL
//! between key and value:
//!
//! | File | Record |
//! |------|--------|
//! | `manifest` | `<key>\0<value>\n`; `version` holds a little-endian u64 |
//! | `graphs/index` | `<context-id>\0<graph-file-name>\n` |
//! | `graphs/hashes`, `files/hashes` | `<name>\0<digest-size-byte><digest>\n` |
//!
//! Binary values (the version and raw digests) may themselves contain `\n`
//! bytes, so readers consume them by length rather than splitting on lines.

use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Manifest key for the default context identifier
pub const DEFAULT_CONTEXT_KEY: &str = "default_context_id";

/// Manifest key for the imports context identifier
pub const IMPORTS_CONTEXT_KEY: &str = "imports_context_id";

/// Manifest key for the bundle version
pub const VERSION_KEY: &str = "version";

/// Bundle-level metadata written last during an install
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub default_context: Option<String>,
    pub imports_context: Option<String>,
    pub version: u64,
}

impl Manifest {
    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        if let Some(ctx) = &self.default_context {
            write_text_record(out, DEFAULT_CONTEXT_KEY, ctx)?;
        }
        if let Some(ctx) = &self.imports_context {
            write_text_record(out, IMPORTS_CONTEXT_KEY, ctx)?;
        }
        out.write_all(VERSION_KEY.as_bytes())?;
        out.write_all(b"\0")?;
        out.write_all(&self.version.to_le_bytes())?;
        out.write_all(b"\n")?;
        Ok(())
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut manifest = Manifest::default();
        let mut saw_version = false;
        let mut pos = 0;

        while pos < data.len() {
            if data[pos] == b'\n' {
                pos += 1;
                continue;
            }
            let (key, after_key) = take_until(data, pos, 0)
                .ok_or_else(|| corrupt("manifest", "record without a NUL separator"))?;
            let key = std::str::from_utf8(key)
                .map_err(|_| corrupt("manifest", "key is not UTF-8"))?;

            if key == VERSION_KEY {
                let end = after_key + 8;
                let bytes: [u8; 8] = data
                    .get(after_key..end)
                    .and_then(|b| b.try_into().ok())
                    .ok_or_else(|| corrupt("manifest", "truncated version"))?;
                manifest.version = u64::from_le_bytes(bytes);
                saw_version = true;
                pos = expect_newline(data, end, "manifest")?;
                continue;
            }

            let (value, next) = take_until(data, after_key, b'\n').unwrap_or((&data[after_key..], data.len()));
            let value = String::from_utf8(value.to_vec())
                .map_err(|_| corrupt("manifest", "value is not UTF-8"))?;
            match key {
                DEFAULT_CONTEXT_KEY => manifest.default_context = Some(value),
                IMPORTS_CONTEXT_KEY => manifest.imports_context = Some(value),
                _ => {}
            }
            pos = next;
        }

        if !saw_version {
            return Err(corrupt("manifest", "no version record"));
        }
        Ok(manifest)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|e| {
            Error::IoError(format!("Failed to read manifest {}: {}", path.display(), e))
        })?;
        Self::parse(&data)
    }
}

/// One `graphs/index` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub context: String,
    pub file_name: String,
}

impl IndexEntry {
    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        write_text_record(out, &self.context, &self.file_name)
    }
}

/// Parse the contents of a `graphs/index` file
pub fn parse_index(data: &[u8]) -> Result<Vec<IndexEntry>> {
    let mut entries = Vec::new();
    for line in data.split(|b| *b == b'\n') {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        let sep = line
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| corrupt("index", "record without a NUL separator"))?;
        let context = std::str::from_utf8(&line[..sep])
            .map_err(|_| corrupt("index", "context id is not UTF-8"))?;
        let file_name = std::str::from_utf8(&line[sep + 1..])
            .map_err(|_| corrupt("index", "file name is not UTF-8"))?;
        entries.push(IndexEntry {
            context: context.to_string(),
            file_name: file_name.to_string(),
        });
    }
    Ok(entries)
}

/// Read a `graphs/index` file
pub fn read_index(path: &Path) -> Result<Vec<IndexEntry>> {
    let data = fs::read(path).map_err(|e| {
        Error::IoError(format!("Cannot find an index at {}: {}", path.display(), e))
    })?;
    parse_index(&data)
}

/// One record of a `hashes` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashEntry {
    pub name: String,
    pub digest: Vec<u8>,
}

impl HashEntry {
    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        let size = u8::try_from(self.digest.len())
            .map_err(|_| Error::InstallFailed(format!("digest for {} is too long", self.name)))?;
        out.write_all(self.name.as_bytes())?;
        out.write_all(&[0, size])?;
        out.write_all(&self.digest)?;
        out.write_all(b"\n")?;
        Ok(())
    }
}

/// Parse the contents of a `hashes` file
pub fn parse_hashes(data: &[u8]) -> Result<Vec<HashEntry>> {
    let mut entries = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        if data[pos] == b'\n' {
            pos += 1;
            continue;
        }
        let (name, after_name) = take_until(data, pos, 0)
            .ok_or_else(|| corrupt("hashes", "record without a NUL separator"))?;
        let name = std::str::from_utf8(name)
            .map_err(|_| corrupt("hashes", "name is not UTF-8"))?
            .to_string();
        let size = *data
            .get(after_name)
            .ok_or_else(|| corrupt("hashes", "missing digest size"))? as usize;
        let start = after_name + 1;
        let digest = data
            .get(start..start + size)
            .ok_or_else(|| corrupt("hashes", "truncated digest"))?
            .to_vec();
        pos = expect_newline(data, start + size, "hashes")?;
        entries.push(HashEntry { name, digest });
    }

    Ok(entries)
}

/// Read a `hashes` file
pub fn read_hashes(path: &Path) -> Result<Vec<HashEntry>> {
    let data = fs::read(path).map_err(|e| {
        Error::IoError(format!("Failed to read hashes {}: {}", path.display(), e))
    })?;
    parse_hashes(&data)
}

fn write_text_record<W: Write>(out: &mut W, key: &str, value: &str) -> Result<()> {
    out.write_all(key.as_bytes())?;
    out.write_all(b"\0")?;
    out.write_all(value.as_bytes())?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Bytes from `start` up to (not including) `delim`, and the position after it
fn take_until(data: &[u8], start: usize, delim: u8) -> Option<(&[u8], usize)> {
    let offset = data[start..].iter().position(|b| *b == delim)?;
    Some((&data[start..start + offset], start + offset + 1))
}

fn expect_newline(data: &[u8], pos: usize, file: &str) -> Result<usize> {
    match data.get(pos) {
        Some(b'\n') => Ok(pos + 1),
        None => Ok(pos),
        Some(_) => Err(corrupt(file, "record not terminated by a newline")),
    }
}

fn corrupt(file: &str, detail: &str) -> Error {
    Error::ParseError(format!("corrupt bundle {} file: {}", file, detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_with_newline_in_version() {
        // 10 == b'\n', which must not be mistaken for a record separator
        let manifest = Manifest {
            default_context: Some("http://example.org/default".to_string()),
            imports_context: Some("http://example.org/imports".to_string()),
            version: 10,
        };
        let mut buf = Vec::new();
        manifest.write(&mut buf).unwrap();
        assert_eq!(Manifest::parse(&buf).unwrap(), manifest);
    }

    #[test]
    fn test_manifest_layout() {
        let manifest = Manifest {
            default_context: None,
            imports_context: None,
            version: 1,
        };
        let mut buf = Vec::new();
        manifest.write(&mut buf).unwrap();
        assert_eq!(buf, b"version\0\x01\0\0\0\0\0\0\0\n".to_vec());
    }

    #[test]
    fn test_manifest_requires_version() {
        assert!(Manifest::parse(b"default_context_id\0http://x\n").is_err());
    }

    #[test]
    fn test_index_parse() {
        let data = b"http://a\0abc.nt\n\nhttp://b\0def.nt\n";
        let entries = parse_index(data).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].context, "http://b");
        assert_eq!(entries[1].file_name, "def.nt");
        assert!(parse_index(b"no separator\n").is_err());
    }

    #[test]
    fn test_hashes_with_binary_digest() {
        let entries = vec![
            HashEntry {
                name: "http://a".to_string(),
                digest: vec![b'\n', 0, 1, 2],
            },
            HashEntry {
                name: "docs/readme.md".to_string(),
                digest: vec![0xff; 28],
            },
        ];
        let mut buf = Vec::new();
        for e in &entries {
            e.write(&mut buf).unwrap();
        }
        assert_eq!(buf[8], 0);
        assert_eq!(buf[9], 4);
        assert_eq!(parse_hashes(&buf).unwrap(), entries);
    }

    #[test]
    fn test_truncated_hashes() {
        assert!(parse_hashes(b"name\0\x1c\x01\x02").is_err());
    }
}
