// tests/install.rs

//! Installing bundles: layout, determinism, imports coverage and failure
//! cleanup.

mod common;

use common::*;
use rdfbundle::bundle::{find_bundle_directory, installed_versions, lock::LOCK_FILE_NAME};
use rdfbundle::{
    bundle_context_id, verify_bundle, Bundle, DependencyDescriptor, Error, FilesDescriptor,
    GraphStore, Manifest, MemoryStore, Term, Triple,
};
use std::collections::BTreeSet;
use std::fs;

/// The same statements as `store`, added in reverse order with every blank
/// node relabelled
fn relabelled_reversed(store: &MemoryStore) -> MemoryStore {
    let relabel = |term: Term| match term {
        Term::BlankNode(label) => Term::blank(format!("other{label}")),
        other => other,
    };

    let mut quads = Vec::new();
    for context in store.context_ids().unwrap() {
        for triple in store.triples(&context).unwrap() {
            quads.push((context.clone(), triple));
        }
    }

    let mut reversed = MemoryStore::new();
    for (context, triple) in quads.into_iter().rev() {
        reversed.add(
            &context,
            Triple::new(
                relabel(triple.subject),
                triple.predicate,
                relabel(triple.object),
            ),
        );
    }
    reversed
}

#[test]
fn test_install_is_deterministic() {
    let store = source_store();
    let other = relabelled_reversed(&store);
    let d = descriptor("example/neurons", 1, &[NEURONS, CELLS]);

    let first = Workspace::new();
    let second = Workspace::new();
    let a = first.installer(&store).install(&d).unwrap();
    let b = second.installer(&other).install(&d).unwrap();

    for name in ["graphs/index", "graphs/hashes", "manifest"] {
        assert_eq!(
            fs::read(a.join(name)).unwrap(),
            fs::read(b.join(name)).unwrap(),
            "{name} differs between installs"
        );
    }

    let mut graph_files: Vec<_> = fs::read_dir(a.join("graphs"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".nt"))
        .collect();
    graph_files.sort();
    assert_eq!(graph_files.len(), 2);
    for name in &graph_files {
        // 56 hex digits of SHA-224 plus ".nt"
        assert_eq!(name.len(), 59);
        assert!(b.join("graphs").join(name).is_file());
    }
}

#[test]
fn test_installed_bundle_verifies() {
    let ws = Workspace::new();
    ws.write_source_file("README.md", "neuron data\n");
    ws.write_source_file("docs/cells.md", "cells\n");
    ws.write_source_file("docs/draft.txt", "not selected\n");

    let store = source_store();
    let mut d = descriptor("example/neurons", 1, &[NEURONS]);
    d.files = Some(FilesDescriptor {
        includes: ["README.md".to_string()].into(),
        patterns: ["docs/*.md".to_string()].into(),
    });
    let dir = ws.installer(&store).install(&d).unwrap();

    assert!(dir.join("files/README.md").is_file());
    assert!(dir.join("files/docs/cells.md").is_file());
    assert!(!dir.join("files/docs/draft.txt").exists());

    let report = verify_bundle(&dir).unwrap();
    assert!(report.is_ok(), "{:?}", report.problems);
    assert_eq!(report.graphs_checked, 1);
    assert_eq!(report.files_checked, 2);
}

#[test]
fn test_latest_version_is_selected() {
    let ws = Workspace::new();
    let store = source_store();
    for version in [1, 2, 10] {
        ws.installer(&store)
            .install(&descriptor("example/neurons", version, &[NEURONS]))
            .unwrap();
    }

    assert_eq!(
        installed_versions(&ws.bundles_dir(), "example/neurons").unwrap(),
        vec![1, 2, 10]
    );

    let latest = find_bundle_directory(&ws.bundles_dir(), "example/neurons", None).unwrap();
    assert!(latest.ends_with("10"));
    assert!(latest.parent().unwrap().ends_with("example%2Fneurons"));

    let mut pinned = Bundle::new("example/neurons", ws.bundles_dir()).with_version(2);
    assert_eq!(pinned.manifest().unwrap().version, 2);

    let mut missing = Bundle::new("example/neurons", ws.bundles_dir()).with_version(3);
    assert!(matches!(
        missing.resolve(),
        Err(Error::BundleNotFound {
            version: Some(3),
            ..
        })
    ));
}

#[test]
fn test_missing_imports_are_named() {
    let ws = Workspace::new();
    ws.write_source_file("README.md", "neuron data\n");
    let store = source_store();

    let mut d = descriptor("example/neurons", 1, &[NEURONS, CELLS]);
    d.files = Some(FilesDescriptor {
        includes: ["README.md".to_string()].into(),
        patterns: BTreeSet::new(),
    });
    let err = ws
        .installer(&store)
        .with_imports_context(IMPORTS)
        .install(&d)
        .unwrap_err();

    match err {
        Error::MissingImports(missing) => {
            let expected: BTreeSet<String> =
                [SCHEMA.to_string(), UNITS.to_string()].into_iter().collect();
            assert_eq!(missing, expected);
        }
        other => panic!("expected MissingImports, got {other:?}"),
    }

    // The failed install leaves no partial bundle behind
    let dir = rdfbundle::bundle_directory(&ws.bundles_dir(), "example/neurons", 1);
    assert!(!dir.join("graphs").exists());
    assert!(!dir.join("files").exists());
    assert!(!dir.join("manifest").exists());
    assert!(dir.join(LOCK_FILE_NAME).exists());
}

#[test]
fn test_failed_install_keeps_previous_version_resolvable() {
    let ws = Workspace::new();
    let store = source_store();
    ws.installer(&store)
        .install(&descriptor("example/neurons", 1, &[NEURONS, CELLS]))
        .unwrap();

    let err = ws
        .installer(&store)
        .with_imports_context(IMPORTS)
        .install(&descriptor("example/neurons", 2, &[NEURONS, CELLS]))
        .unwrap_err();
    assert!(err.is_install_failure(), "{err:?}");

    // Only the lock file of the failed attempt remains
    let failed = rdfbundle::bundle_directory(&ws.bundles_dir(), "example/neurons", 2);
    assert!(failed.join(LOCK_FILE_NAME).exists());

    assert_eq!(
        installed_versions(&ws.bundles_dir(), "example/neurons").unwrap(),
        vec![1]
    );
    let mut bundle = Bundle::new("example/neurons", ws.bundles_dir());
    assert!(bundle.resolve().unwrap().ends_with("1"));
    assert_eq!(bundle.version(), Some(1));
    assert!(bundle.contexts().unwrap().contains(NEURONS));

    let mut pinned = Bundle::new("example/neurons", ws.bundles_dir()).with_version(2);
    assert!(matches!(
        pinned.resolve(),
        Err(Error::BundleNotFound {
            version: Some(2),
            ..
        })
    ));

    // Retrying the failed version once its imports are covered succeeds
    ws.installer(&store)
        .install(&descriptor("example/neurons", 2, &[NEURONS, CELLS, SCHEMA, UNITS]))
        .unwrap();
    let mut latest = Bundle::new("example/neurons", ws.bundles_dir());
    assert_eq!(latest.manifest().unwrap().version, 2);
}

#[test]
fn test_dependency_covers_imports() {
    let ws = Workspace::new();
    let store = source_store();

    ws.installer(&store)
        .with_imports_context(IMPORTS)
        .install(&descriptor("example/schema", 1, &[SCHEMA, UNITS]))
        .unwrap();

    let mut d = descriptor("example/neurons", 1, &[NEURONS, CELLS]);
    d.add_dependency(DependencyDescriptor::new("example/schema", None));
    let dir = ws
        .installer(&store)
        .with_imports_context(IMPORTS)
        .with_default_context(NEURONS)
        .install(&d)
        .unwrap();

    let manifest = Manifest::read(&dir.join("manifest")).unwrap();
    assert_eq!(manifest.version, 1);
    assert_eq!(manifest.default_context.as_deref(), Some(NEURONS));
    assert_eq!(
        manifest.imports_context,
        Some(bundle_context_id("example/neurons"))
    );
    assert_eq!(
        bundle_context_id("example/neurons"),
        "http://openworm.org/data/generated_imports_ctx?bundle_id=example/neurons"
    );
}

#[test]
fn test_pinned_dependency_must_be_installed() {
    let ws = Workspace::new();
    let store = source_store();
    ws.installer(&store)
        .install(&descriptor("example/schema", 1, &[SCHEMA, UNITS]))
        .unwrap();

    let mut d = descriptor("example/neurons", 1, &[NEURONS, CELLS]);
    d.add_dependency(DependencyDescriptor::new("example/schema", Some(2)));
    let err = ws
        .installer(&store)
        .with_imports_context(IMPORTS)
        .install(&d)
        .unwrap_err();
    assert!(matches!(err, Error::BundleNotFound { .. }), "{err:?}");
}

#[test]
fn test_open_loads_bundle_graphs() {
    let ws = Workspace::new();
    let store = source_store();
    ws.installer(&store)
        .with_default_context(NEURONS)
        .install(&descriptor("example/neurons", 1, &[NEURONS, CELLS]))
        .unwrap();

    let mut bundle = Bundle::new("example/neurons", ws.bundles_dir());
    let opened = bundle.open().unwrap();
    assert_eq!(opened.config().default_context.as_deref(), Some(NEURONS));
    assert_eq!(opened.config().imports_context, None);

    let loaded = opened.store().unwrap();
    let mut contexts = loaded.context_ids().unwrap();
    contexts.sort();
    assert_eq!(contexts, vec![CELLS.to_string(), NEURONS.to_string()]);
    assert_eq!(loaded.triples(NEURONS).unwrap().len(), 3);
    assert_eq!(loaded.triples(CELLS).unwrap().len(), 1);
    opened.close().unwrap();

    // Opening again reuses the store without duplicating statements
    let reopened = bundle.open().unwrap();
    assert_eq!(reopened.store().unwrap().len().unwrap(), 4);
}
