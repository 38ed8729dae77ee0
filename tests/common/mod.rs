// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use rdfbundle::loader::BundleIndex;
use rdfbundle::{archive, Descriptor, Installer, MemoryStore, Term, Triple};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const IMPORTS: &str = "http://example.org/imports";
pub const IMPORTS_PREDICATE: &str = "http://openworm.org/schema/Context/imports";

pub const CELLS: &str = "http://example.org/data/cells";
pub const NEURONS: &str = "http://example.org/data/neurons";
pub const SCHEMA: &str = "http://example.org/schema/core";
pub const UNITS: &str = "http://example.org/schema/units";

/// A workspace laid out like a real project: a source directory, a
/// bundles root, a project directory and a publishing area.
pub struct Workspace {
    pub temp_dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("src")).unwrap();
        Self { temp_dir }
    }

    pub fn source_dir(&self) -> PathBuf {
        self.temp_dir.path().join("src")
    }

    pub fn bundles_dir(&self) -> PathBuf {
        self.temp_dir.path().join("bundles")
    }

    pub fn project_dir(&self) -> PathBuf {
        self.temp_dir.path().join("project")
    }

    pub fn publish_dir(&self) -> PathBuf {
        self.temp_dir.path().join("published")
    }

    pub fn write_source_file(&self, name: &str, contents: &str) {
        let path = self.source_dir().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    pub fn installer<'a>(&self, store: &'a MemoryStore) -> Installer<'a, MemoryStore> {
        Installer::new(self.source_dir(), self.bundles_dir(), store)
    }
}

/// Source store with data contexts, two schema contexts and an imports
/// graph where neurons -> cells -> schema -> units.
pub fn source_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    let p = |s: &str| Term::iri(format!("http://example.org/schema/{s}"));

    store.add(
        NEURONS,
        Triple::new(
            Term::iri("http://example.org/n/AVAL"),
            p("type"),
            Term::iri("http://example.org/schema/Neuron"),
        ),
    );
    store.add(
        NEURONS,
        Triple::new(
            Term::iri("http://example.org/n/AVAL"),
            p("evidence"),
            Term::blank("ev1"),
        ),
    );
    store.add(
        NEURONS,
        Triple::new(Term::blank("ev1"), p("source"), Term::literal("White et al. 1986")),
    );
    store.add(
        CELLS,
        Triple::new(
            Term::iri("http://example.org/c/1"),
            p("label"),
            Term::lang_literal("cell one", "en"),
        ),
    );
    store.add(
        SCHEMA,
        Triple::new(
            Term::iri("http://example.org/schema/Neuron"),
            p("subClassOf"),
            Term::iri("http://example.org/schema/Cell"),
        ),
    );
    store.add(
        UNITS,
        Triple::new(
            Term::iri("http://example.org/schema/um"),
            p("factor"),
            Term::typed_literal("0.000001", "http://www.w3.org/2001/XMLSchema#decimal"),
        ),
    );

    for (from, to) in [(NEURONS, CELLS), (CELLS, SCHEMA), (SCHEMA, UNITS)] {
        store.add(
            IMPORTS,
            Triple::new(Term::iri(from), Term::iri(IMPORTS_PREDICATE), Term::iri(to)),
        );
    }
    store
}

pub fn descriptor(id: &str, version: u64, includes: &[&str]) -> Descriptor {
    let mut d = Descriptor::new(id);
    d.version = version;
    for include in includes {
        d.add_include(include);
    }
    d
}

/// Pack an installed bundle into `<publish>/<name>.tar.xz` and return the
/// archive path
pub fn publish(bundle_dir: &Path, publish_dir: &Path, name: &str) -> PathBuf {
    let archive_path = publish_dir.join(format!("{name}.tar.xz"));
    archive::pack_bundle(bundle_dir, &archive_path).unwrap();
    archive_path
}

/// Write a bundle index JSON document and return its path
pub fn write_index(dir: &Path, entries: &[(&str, u64, &str)]) -> PathBuf {
    let mut index = BundleIndex::default();
    for (bundle, version, location) in entries {
        index.insert(bundle, *version, location);
    }
    fs::create_dir_all(dir).unwrap();
    let path = dir.join("index.json");
    fs::write(&path, index.to_json().unwrap()).unwrap();
    path
}

pub fn file_url(path: &Path) -> String {
    url::Url::from_file_path(path).unwrap().to_string()
}
