// src/rdf/store.rs

//! Graph store interfaces
//!
//! The installer only needs to enumerate named contexts and iterate the
//! triples of each; a scoped bundle store additionally accepts batches of
//! triples per context. [`MemoryStore`] implements both and is the usual
//! source store for building bundles from dumps.

use super::ntriples::parse_quad_line;
use super::term::{Term, Triple};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;

/// Read access to a store of named graphs
pub trait GraphStore {
    /// Identifiers of every named context in the store
    fn context_ids(&self) -> Result<Vec<String>>;

    /// All triples in the given context (empty if the context is unknown)
    fn triples(&self, context: &str) -> Result<Vec<Triple>>;

    /// Objects of `(subject, predicate, ?)` statements in a context
    fn objects(&self, context: &str, subject: &Term, predicate: &Term) -> Result<Vec<Term>> {
        Ok(self
            .triples(context)?
            .into_iter()
            .filter(|t| &t.subject == subject && &t.predicate == predicate)
            .map(|t| t.object)
            .collect())
    }
}

/// Write access to a store of named graphs
pub trait GraphSink {
    /// Add a batch of triples to a context, creating it if needed
    fn add_triples(&mut self, context: &str, triples: &[Triple]) -> Result<()>;
}

/// In-memory quad store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    contexts: BTreeMap<String, BTreeSet<Triple>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single triple to a context
    pub fn add(&mut self, context: &str, triple: Triple) {
        self.contexts
            .entry(context.to_string())
            .or_default()
            .insert(triple);
    }

    /// Number of triples across all contexts
    pub fn len(&self) -> usize {
        self.contexts.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load an N-Quads document
    ///
    /// Statements without a graph name go into `default_context`; when no
    /// default is given such statements are rejected.
    pub fn load_nquads<R: BufRead>(reader: R, default_context: Option<&str>) -> Result<Self> {
        let mut store = Self::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let Some((triple, graph)) = parse_quad_line(&line, idx + 1)? else {
                continue;
            };
            let context = match (graph.as_deref(), default_context) {
                (Some(g), _) => g.to_string(),
                (None, Some(d)) => d.to_string(),
                (None, None) => {
                    return Err(Error::ParseError(format!(
                        "line {}: statement has no graph name and no default context was given",
                        idx + 1
                    )));
                }
            };
            store.add(&context, triple);
        }
        Ok(store)
    }
}

impl GraphStore for MemoryStore {
    fn context_ids(&self) -> Result<Vec<String>> {
        Ok(self.contexts.keys().cloned().collect())
    }

    fn triples(&self, context: &str) -> Result<Vec<Triple>> {
        Ok(self
            .contexts
            .get(context)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn objects(&self, context: &str, subject: &Term, predicate: &Term) -> Result<Vec<Term>> {
        let Some(set) = self.contexts.get(context) else {
            return Ok(Vec::new());
        };
        Ok(set
            .iter()
            .filter(|t| &t.subject == subject && &t.predicate == predicate)
            .map(|t| t.object.clone())
            .collect())
    }
}

impl GraphSink for MemoryStore {
    fn add_triples(&mut self, context: &str, triples: &[Triple]) -> Result<()> {
        let entry = self.contexts.entry(context.to_string()).or_default();
        entry.extend(triples.iter().cloned());
        Ok(())
    }
}
