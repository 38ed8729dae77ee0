// src/rdf/mod.rs

//! Minimal RDF layer: terms, N-Triples I/O, canonical form and stores
//!
//! Bundles are built from, and loaded into, stores of named graphs
//! ("contexts"). This module provides just enough of that model for the
//! bundle machinery: the [`GraphStore`]/[`GraphSink`] seams, an in-memory
//! store, a SQLite-backed store, and the canonical serialization used for
//! content hashing.

pub mod canonical;
pub mod closure;
pub mod ntriples;
pub mod sqlite;
pub mod store;
pub mod term;

pub use canonical::{canonical_ntriples, canonicalize, write_canonical};
pub use closure::transitive_lookup;
pub use sqlite::SqliteStore;
pub use store::{GraphSink, GraphStore, MemoryStore};
pub use term::{Term, Triple};
