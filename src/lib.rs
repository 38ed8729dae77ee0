// src/lib.rs

//! rdfbundle: versioned bundles of RDF graph data
//!
//! Bundles package selected named graphs ("contexts") from a graph store,
//! together with auxiliary files, into an immutable, content-addressed
//! directory. They are published to remotes as compressed archives and
//! fetched and resolved by consumers.
//!
//! # Architecture
//!
//! - Descriptors: declarative YAML naming the contexts, files and dependencies of a bundle
//! - Installer: canonicalizes, hashes and lays out a bundle, checking its imports are covered
//! - Bundle handles: find an installed version or fetch one, then open it as a store
//! - Remotes and loaders: where bundles come from and how they are retrieved
//! - Fetcher: tries every capable loader in turn until one delivers the bundle

pub mod archive;
pub mod bundle;
pub mod compression;
pub mod config;
mod error;
pub mod fetcher;
pub mod hash;
pub mod loader;
pub mod rdf;
pub mod remote;

pub use bundle::matcher::{Include, Matcher, Pattern};
pub use bundle::verify::{verify_bundle, VerifyReport};
pub use bundle::{
    bundle_context_id, bundle_directory, Bundle, DependencyDescriptor, Descriptor,
    FilesDescriptor, Installer, Manifest, OpenBundle, StoreConfig,
};
pub use config::Settings;
pub use error::{Error, Result};
pub use fetcher::{Fetcher, LoadAttempt};
pub use hash::{Digest, HashAlgorithm, Hasher};
pub use loader::{Loader, LoaderKind, LoaderOptions, LoaderRegistry};
pub use rdf::{GraphSink, GraphStore, MemoryStore, SqliteStore, Term, Triple};
pub use remote::{retrieve_remotes, AccessorConfig, Remote};
