// src/rdf/closure.rs

//! Transitive lookups over a relation stored in a graph

use super::store::GraphStore;
use super::term::Term;
use crate::error::Result;
use std::collections::BTreeSet;

/// Everything reachable from `start` by following `predicate` edges in
/// `context`, including `start` itself
///
/// Nodes already in `seen` are not expanded again, so one `seen` set can be
/// threaded through several lookups to share work. Newly reached nodes are
/// added to `seen`; the return value holds only what this call reached.
pub fn transitive_lookup<G: GraphStore + ?Sized>(
    store: &G,
    context: &str,
    start: &Term,
    predicate: &Term,
    seen: &mut BTreeSet<Term>,
) -> Result<BTreeSet<Term>> {
    let mut reached = BTreeSet::new();
    let mut border = vec![start.clone()];

    while let Some(node) = border.pop() {
        if !seen.insert(node.clone()) {
            continue;
        }
        for next in store.objects(context, &node, predicate)? {
            if !seen.contains(&next) {
                border.push(next);
            }
        }
        reached.insert(node);
    }

    Ok(reached)
}
