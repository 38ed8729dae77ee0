// src/bundle/installer.rs

//! Building bundles from a graph store and a source tree
//!
//! An install runs under the staging directory's lock and proceeds in a
//! fixed order: files, then graphs, then the dependency check, then the
//! manifest. Any failure removes `graphs/` and `files/` again, and since the
//! manifest comes last a half-written bundle is never mistaken for a
//! complete one.

use super::descriptor::{Descriptor, FilesDescriptor};
use super::lock::{default_holder, InstallLock};
use super::records::{HashEntry, IndexEntry, Manifest};
use super::{
    bundle_context_id, bundle_directory, Bundle, CONTEXT_IMPORTS, FILES_DIR_NAME,
    GRAPHS_DIR_NAME, HASHES_FILE_NAME, INDEX_FILE_NAME, MANIFEST_FILE_NAME, STORE_FILE_NAME,
};
use crate::error::{Error, Result};
use crate::hash::{hash_file, HashAlgorithm};
use crate::loader::LoaderRegistry;
use crate::rdf::{transitive_lookup, write_canonical, GraphStore, Term};
use crate::remote::Remote;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Installs bundles described by [`Descriptor`]s
pub struct Installer<'a, G: GraphStore + ?Sized> {
    source_directory: PathBuf,
    bundles_directory: PathBuf,
    graph: &'a G,
    imports_context: Option<String>,
    default_context: Option<String>,
    installer_id: String,
    remotes: Option<Vec<Remote>>,
    project_dir: Option<PathBuf>,
    registry: LoaderRegistry,
    file_hash: HashAlgorithm,
    context_hash: HashAlgorithm,
}

impl<'a, G: GraphStore + ?Sized> Installer<'a, G> {
    /// Files are taken from `source_directory`, contexts from `graph`
    pub fn new(
        source_directory: impl Into<PathBuf>,
        bundles_directory: impl Into<PathBuf>,
        graph: &'a G,
    ) -> Self {
        Self {
            source_directory: source_directory.into(),
            bundles_directory: bundles_directory.into(),
            graph,
            imports_context: None,
            default_context: None,
            installer_id: default_holder(),
            remotes: None,
            project_dir: None,
            registry: LoaderRegistry::default(),
            file_hash: HashAlgorithm::Sha224,
            context_hash: HashAlgorithm::Sha224,
        }
    }

    /// Context in `graph` holding the imports relation; enables the
    /// dependency check
    pub fn with_imports_context(mut self, context: impl Into<String>) -> Self {
        self.imports_context = Some(context.into());
        self
    }

    pub fn with_default_context(mut self, context: impl Into<String>) -> Self {
        self.default_context = Some(context.into());
        self
    }

    /// Identity recorded in the staging lock
    pub fn with_installer_id(mut self, id: impl Into<String>) -> Self {
        self.installer_id = id.into();
        self
    }

    /// Remotes used to fetch dependency bundles that are not installed
    pub fn with_remotes(mut self, remotes: Vec<Remote>) -> Self {
        self.remotes = Some(remotes);
        self
    }

    pub fn with_project_dir(mut self, project_dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(project_dir.into());
        self
    }

    pub fn with_registry(mut self, registry: LoaderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Install the bundle and return its directory
    pub fn install(&self, descriptor: &Descriptor) -> Result<PathBuf> {
        let staging =
            bundle_directory(&self.bundles_directory, descriptor.id(), descriptor.version);
        fs::create_dir_all(&staging).map_err(|e| {
            Error::InstallFailed(format!("cannot create {}: {}", staging.display(), e))
        })?;

        let _lock = InstallLock::acquire(&staging, &self.installer_id)?;
        info!("Installing {} into {}", descriptor, staging.display());

        match self.install_into(descriptor, &staging) {
            Ok(()) => Ok(staging),
            Err(e) => {
                self.cleanup_failed_install(&staging);
                Err(e)
            }
        }
    }

    fn install_into(&self, descriptor: &Descriptor, staging: &Path) -> Result<()> {
        // A reinstall starts from an empty bundle; without a manifest the
        // directory reads as incomplete until this install finishes
        remove_if_exists(&staging.join(MANIFEST_FILE_NAME))?;
        remove_if_exists(&staging.join(STORE_FILE_NAME))?;
        for name in [GRAPHS_DIR_NAME, FILES_DIR_NAME] {
            let dir = staging.join(name);
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
            }
        }

        let graphs_directory = staging.join(GRAPHS_DIR_NAME);
        let files_directory = staging.join(FILES_DIR_NAME);
        fs::create_dir_all(&graphs_directory)?;
        fs::create_dir_all(&files_directory)?;

        self.write_files(descriptor.files.as_ref(), &files_directory)?;
        let included = self.write_contexts(descriptor, &graphs_directory)?;

        if let Some(imports) = &self.imports_context {
            self.check_imports(descriptor, imports, &included)?;
        }

        self.write_manifest(descriptor, staging)
    }

    fn cleanup_failed_install(&self, staging: &Path) {
        for name in [GRAPHS_DIR_NAME, FILES_DIR_NAME] {
            let dir = staging.join(name);
            if dir.exists() {
                if let Err(e) = fs::remove_dir_all(&dir) {
                    warn!("Could not clean up {}: {}", dir.display(), e);
                }
            }
        }
    }

    fn write_files(&self, files: Option<&FilesDescriptor>, files_directory: &Path) -> Result<()> {
        let Some(files) = files else {
            return Ok(());
        };

        let mut hashes = BufWriter::new(File::create(files_directory.join(HASHES_FILE_NAME))?);
        for name in select_files(files, &self.source_directory)? {
            let source = self.source_directory.join(&name);
            let digest = hash_file(self.file_hash, &source)?;
            HashEntry {
                name: name.clone(),
                digest: digest.as_bytes().to_vec(),
            }
            .write(&mut hashes)?;

            let dest = files_directory.join(&name);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            copy_with_mtime(&source, &dest)?;
            debug!("Packaged file {}", name);
        }
        hashes.flush()?;
        Ok(())
    }

    /// Write every selected context; returns the ids written
    fn write_contexts(
        &self,
        descriptor: &Descriptor,
        graphs_directory: &Path,
    ) -> Result<BTreeSet<String>> {
        let selected: BTreeSet<String> = self
            .graph
            .context_ids()?
            .into_iter()
            .filter(|ctx| descriptor.selects_context(ctx))
            .collect();

        let mut hashes = BufWriter::new(File::create(graphs_directory.join(HASHES_FILE_NAME))?);
        let mut index = BufWriter::new(File::create(graphs_directory.join(INDEX_FILE_NAME))?);

        for context in &selected {
            let mut staged = tempfile::NamedTempFile::new_in(graphs_directory)?;
            {
                let mut out = BufWriter::new(staged.as_file_mut());
                write_canonical(self.graph.triples(context)?, &mut out)?;
                out.flush()?;
            }

            let digest = hash_file(self.context_hash, staged.path())?;
            let file_name = format!("{}.nt", digest.to_hex());
            staged
                .persist(graphs_directory.join(&file_name))
                .map_err(|e| Error::InstallFailed(format!("cannot store {}: {}", file_name, e)))?;

            HashEntry {
                name: context.clone(),
                digest: digest.as_bytes().to_vec(),
            }
            .write(&mut hashes)?;
            IndexEntry {
                context: context.clone(),
                file_name,
            }
            .write(&mut index)?;
            debug!("Packaged context {}", context);
        }

        hashes.flush()?;
        index.flush()?;
        info!("Packaged {} contexts", selected.len());
        Ok(selected)
    }

    /// Fail with [`Error::MissingImports`] unless every context the bundle
    /// transitively imports is in the bundle or one of its dependencies
    fn check_imports(
        &self,
        descriptor: &Descriptor,
        imports_context: &str,
        included: &BTreeSet<String>,
    ) -> Result<()> {
        let predicate = Term::iri(CONTEXT_IMPORTS);
        let mut seen = BTreeSet::new();
        for context in included {
            transitive_lookup(
                self.graph,
                imports_context,
                &Term::iri(context.as_str()),
                &predicate,
                &mut seen,
            )?;
        }

        let mut uncovered: BTreeSet<String> = seen
            .into_iter()
            .filter_map(|t| t.as_iri().map(str::to_string))
            .filter(|ctx| !included.contains(ctx))
            .collect();

        for dependency in &descriptor.dependencies {
            if uncovered.is_empty() {
                break;
            }
            let mut bundle = Bundle::new(dependency.id(), &self.bundles_directory)
                .with_registry(self.registry.clone());
            if let Some(v) = dependency.version() {
                bundle = bundle.with_version(v);
            }
            if let Some(remotes) = &self.remotes {
                bundle = bundle.with_remotes(remotes.clone());
            }
            if let Some(project) = &self.project_dir {
                bundle = bundle.with_project_dir(project);
            }
            let covered = bundle.contexts()?;
            uncovered.retain(|ctx| !covered.contains(ctx));
            debug!("After {}: {} imports uncovered", dependency, uncovered.len());
        }

        if uncovered.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingImports(uncovered))
        }
    }

    fn write_manifest(&self, descriptor: &Descriptor, staging: &Path) -> Result<()> {
        let manifest = Manifest {
            default_context: self.default_context.clone(),
            // The bundle gets its own imports context: only a subset of the
            // source imports applies to it
            imports_context: self
                .imports_context
                .as_ref()
                .map(|_| bundle_context_id(descriptor.id())),
            version: descriptor.version,
        };

        let path = staging.join(MANIFEST_FILE_NAME);
        let mut out = BufWriter::new(File::create(&path)?);
        manifest.write(&mut out)?;
        out.into_inner()
            .map_err(|e| Error::InstallFailed(format!("cannot write manifest: {}", e)))?
            .sync_all()?;
        Ok(())
    }
}

/// Relative paths selected by `files` under `source`, sorted
///
/// Explicit includes must exist; patterns are globbed against `source`.
pub fn select_files(files: &FilesDescriptor, source: &Path) -> Result<BTreeSet<String>> {
    let mut selected = BTreeSet::new();

    for include in &files.includes {
        check_relative(include)?;
        if !source.join(include).exists() {
            return Err(Error::MissingFile(include.clone()));
        }
        selected.insert(include.clone());
    }

    for pattern in &files.patterns {
        check_relative(pattern)?;
        let full = source.join(pattern);
        let full = full.to_string_lossy();
        let matches = glob::glob(&full)
            .map_err(|e| Error::InstallFailed(format!("bad file pattern {}: {}", pattern, e)))?;
        for path in matches {
            let path = path
                .map_err(|e| Error::InstallFailed(format!("cannot read match: {}", e)))?;
            if !path.is_file() {
                continue;
            }
            if let Ok(rel) = path.strip_prefix(source) {
                selected.insert(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }

    Ok(selected)
}

fn check_relative(path: &str) -> Result<()> {
    let contained = Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if contained {
        Ok(())
    } else {
        Err(Error::InstallFailed(format!(
            "file selection {} must be relative to the source directory",
            path
        )))
    }
}

fn copy_with_mtime(source: &Path, dest: &Path) -> Result<()> {
    fs::copy(source, dest)?;
    let modified = fs::metadata(source)?.modified()?;
    File::options().write(true).open(dest)?.set_modified(modified)?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
