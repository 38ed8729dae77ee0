// src/bundle/descriptor.rs

//! Bundle descriptors
//!
//! A descriptor declares what goes into a bundle: its identity and version,
//! which contexts to take from the source store, which files to take from
//! the source directory, and which other bundles it depends on.
//!
//! Descriptors are usually written as YAML:
//!
//! ```yaml
//! id: example/neurons
//! version: 2
//! description: Curated neuron data
//! includes:
//!   - http://example.org/data/neurons
//! patterns:
//!   - http://example.org/data/cells/*
//!   - rgx:http://example.org/evidence/[0-9]+
//! dependencies:
//!   - example/schema
//!   - id: example/refs
//!     version: 3
//! files:
//!   includes: [README.md]
//!   patterns: ["docs/*.md"]
//! ```

use super::matcher::{selects, Include, Pattern};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// A dependency on another bundle, optionally pinned to a version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyDescriptor {
    id: String,
    version: Option<u64>,
}

impl DependencyDescriptor {
    /// `version = None` means "latest available"
    pub fn new(id: impl Into<String>, version: Option<u64>) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }
}

impl fmt::Display for DependencyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(v) => write!(f, "{}@{}", self.id, v),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Which files from the source directory go into a bundle
///
/// Includes are exact relative paths and must exist. Patterns are globs
/// evaluated relative to the source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilesDescriptor {
    pub patterns: BTreeSet<String>,
    pub includes: BTreeSet<String>,
}

/// Declarative description of a bundle
#[derive(Debug, Clone)]
pub struct Descriptor {
    id: String,
    pub name: String,
    pub version: u64,
    pub description: Option<String>,
    pub patterns: Vec<Pattern>,
    pub includes: BTreeSet<Include>,
    pub dependencies: BTreeSet<DependencyDescriptor>,
    pub files: Option<FilesDescriptor>,
}

impl Descriptor {
    /// A descriptor selecting nothing, at version 1
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version: 1,
            description: None,
            patterns: Vec::new(),
            includes: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            files: None,
        }
    }

    /// The bundle identifier; fixed at construction
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add a pattern, ignoring duplicates
    pub fn add_pattern(&mut self, pattern: Pattern) {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }

    pub fn add_include(&mut self, reference: &str) {
        self.includes.insert(Include::new(reference));
    }

    pub fn add_dependency(&mut self, dependency: DependencyDescriptor) {
        self.dependencies.insert(dependency);
    }

    /// True if the descriptor selects the given context identifier
    pub fn selects_context(&self, context_id: &str) -> bool {
        selects(&self.includes, &self.patterns, context_id)
    }

    /// Parse a descriptor from a YAML document
    pub fn from_yaml(text: &str) -> Result<Self> {
        let raw: RawDescriptor = serde_yaml::from_str(text)?;
        Self::from_raw(raw)
    }

    /// Build a descriptor from an already-parsed YAML mapping
    pub fn from_value(value: serde_yaml::Value) -> Result<Self> {
        let raw: RawDescriptor = serde_yaml::from_value(value)?;
        Self::from_raw(raw)
    }

    /// Read a descriptor from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("Failed to read descriptor {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
    }

    /// Serialize the descriptor back to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.to_raw())?)
    }

    fn from_raw(raw: RawDescriptor) -> Result<Self> {
        if raw.id.trim().is_empty() {
            return Err(Error::ParseError("descriptor id must not be empty".to_string()));
        }
        if raw.version == 0 {
            return Err(Error::ParseError(format!(
                "descriptor {} has version 0; versions start at 1",
                raw.id
            )));
        }

        let mut descriptor = Descriptor::new(raw.id);
        if let Some(name) = raw.name {
            descriptor.name = name;
        }
        descriptor.version = raw.version;
        descriptor.description = raw.description;
        for p in &raw.patterns {
            descriptor.add_pattern(Pattern::parse(p)?);
        }
        for inc in &raw.includes {
            descriptor.add_include(inc);
        }
        for dep in raw.dependencies {
            descriptor.add_dependency(dep.into());
        }
        descriptor.files = raw.files.map(|f| FilesDescriptor {
            patterns: f.patterns.into_iter().collect(),
            includes: f.includes.into_iter().collect(),
        });
        Ok(descriptor)
    }

    fn to_raw(&self) -> RawDescriptor {
        RawDescriptor {
            id: self.id.clone(),
            name: Some(self.name.clone()),
            version: self.version,
            description: self.description.clone(),
            patterns: self.patterns.iter().map(ToString::to_string).collect(),
            includes: self.includes.iter().map(|i| i.reference().to_string()).collect(),
            dependencies: self
                .dependencies
                .iter()
                .map(|d| RawDependency::Full {
                    id: d.id.clone(),
                    version: d.version,
                })
                .collect(),
            files: self.files.as_ref().map(|f| RawFiles {
                patterns: f.patterns.iter().cloned().collect(),
                includes: f.includes.iter().cloned().collect(),
            }),
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) version {}", self.id, self.name, self.version)
    }
}

fn default_version() -> u64 {
    1
}

#[derive(Debug, Serialize, Deserialize)]
struct RawDescriptor {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default = "default_version")]
    version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    includes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<RawDependency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    files: Option<RawFiles>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Id(String),
    Full {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<u64>,
    },
    Pair(String, Option<u64>),
}

impl From<RawDependency> for DependencyDescriptor {
    fn from(raw: RawDependency) -> Self {
        match raw {
            RawDependency::Id(id) => DependencyDescriptor::new(id, None),
            RawDependency::Full { id, version } | RawDependency::Pair(id, version) => {
                DependencyDescriptor::new(id, version)
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawFiles {
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    includes: Vec<String>,
}
