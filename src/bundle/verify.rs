// src/bundle/verify.rs

//! Integrity checks for installed bundles
//!
//! Graph files are parsed and re-canonicalized before hashing, so a check
//! passes only if the stored graph still canonicalizes to the recorded
//! digest. Packaged files are hashed as stored.

use super::records::{read_hashes, read_index, HashEntry, Manifest};
use super::{FILES_DIR_NAME, GRAPHS_DIR_NAME, HASHES_FILE_NAME, INDEX_FILE_NAME, MANIFEST_FILE_NAME};
use crate::error::Result;
use crate::hash::{hash_bytes, hash_file, HashAlgorithm};
use crate::rdf::canonical_ntriples;
use crate::rdf::ntriples::parse_document;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// What kind of bundle member a problem concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Graph,
    File,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Graph => write!(f, "graph"),
            MemberKind::File => write!(f, "file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub kind: MemberKind,
    pub name: String,
    pub detail: String,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.name, self.detail)
    }
}

/// Result of checking one bundle
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub graphs_checked: usize,
    pub files_checked: usize,
    pub problems: Vec<Problem>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }

    fn problem(&mut self, kind: MemberKind, name: &str, detail: impl Into<String>) {
        self.problems.push(Problem {
            kind,
            name: name.to_string(),
            detail: detail.into(),
        });
    }
}

/// Re-hash every graph and file listed in the bundle at `dir`
///
/// A missing or unreadable manifest, index or hashes file is an error;
/// mismatches and missing members are collected in the report.
pub fn verify_bundle(dir: &Path) -> Result<VerifyReport> {
    Manifest::read(&dir.join(MANIFEST_FILE_NAME))?;
    let mut report = VerifyReport::default();

    let graphs = dir.join(GRAPHS_DIR_NAME);
    let index = read_index(&graphs.join(INDEX_FILE_NAME))?;
    let graph_hashes = by_name(read_hashes(&graphs.join(HASHES_FILE_NAME))?);

    for entry in &index {
        report.graphs_checked += 1;
        let Some(expected) = graph_hashes.get(&entry.context) else {
            report.problem(MemberKind::Graph, &entry.context, "no hash record");
            continue;
        };
        let Some(algorithm) = HashAlgorithm::for_output_len(expected.len()) else {
            report.problem(MemberKind::Graph, &entry.context, "unknown digest size");
            continue;
        };
        let text = match fs::read_to_string(graphs.join(&entry.file_name)) {
            Ok(text) => text,
            Err(e) => {
                report.problem(MemberKind::Graph, &entry.context, format!("unreadable: {}", e));
                continue;
            }
        };
        let triples = match parse_document(&text) {
            Ok(triples) => triples,
            Err(e) => {
                report.problem(MemberKind::Graph, &entry.context, e.to_string());
                continue;
            }
        };
        let actual = hash_bytes(algorithm, &canonical_ntriples(triples));
        if actual.as_bytes() != expected.as_slice() {
            report.problem(
                MemberKind::Graph,
                &entry.context,
                format!(
                    "{} expected {}, found {}",
                    actual.algorithm(),
                    hex::encode(expected),
                    actual.to_hex()
                ),
            );
        } else if entry.file_name != format!("{}.nt", actual.to_hex()) {
            report.problem(
                MemberKind::Graph,
                &entry.context,
                format!("stored as {} rather than by its digest", entry.file_name),
            );
        }
    }

    let files = dir.join(FILES_DIR_NAME);
    let file_hashes = files.join(HASHES_FILE_NAME);
    if file_hashes.exists() {
        for entry in read_hashes(&file_hashes)? {
            report.files_checked += 1;
            let Some(algorithm) = HashAlgorithm::for_output_len(entry.digest.len()) else {
                report.problem(MemberKind::File, &entry.name, "unknown digest size");
                continue;
            };
            match hash_file(algorithm, &files.join(&entry.name)) {
                Ok(actual) if actual.as_bytes() == entry.digest.as_slice() => {}
                Ok(actual) => report.problem(
                    MemberKind::File,
                    &entry.name,
                    format!(
                        "{} expected {}, found {}",
                        actual.algorithm(),
                        hex::encode(&entry.digest),
                        actual.to_hex()
                    ),
                ),
                Err(e) => report.problem(MemberKind::File, &entry.name, format!("unreadable: {}", e)),
            }
        }
    }

    debug!(
        "Verified {}: {} graphs, {} files, {} problems",
        dir.display(),
        report.graphs_checked,
        report.files_checked,
        report.problems.len()
    );
    Ok(report)
}

fn by_name(entries: Vec<HashEntry>) -> BTreeMap<String, Vec<u8>> {
    entries.into_iter().map(|e| (e.name, e.digest)).collect()
}
