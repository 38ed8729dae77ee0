// src/rdf/canonical.rs

//! Canonical N-Triples serialization
//!
//! Bundles address every context by the digest of its serialized graph, so
//! the serialization must not depend on storage order or on the labels a
//! store happened to give its blank nodes. Canonical form is:
//!
//! 1. Blank nodes are relabelled `_:c14n0`, `_:c14n1`, ... in an order derived
//!    from the graph structure alone (iterated neighbourhood signatures,
//!    individualizing one member of a tied class at a time).
//! 2. Statements are formatted as N-Triples, sorted and de-duplicated.
//! 3. Every statement is terminated by `\n`.
//!
//! Graphs whose blank nodes cannot be told apart by refinement (highly
//! regular structures) still serialize deterministically for a given input,
//! but two differently-labelled copies of such a graph may not coincide.

use super::ntriples::format_triple;
use super::term::{Term, Triple};
use crate::hash::{hash_bytes, HashAlgorithm};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{self, Write};

/// Prefix for canonical blank node labels
pub const CANONICAL_BLANK_PREFIX: &str = "c14n";

type Colors = HashMap<String, String>;

/// Relabel blank nodes canonically and return the sorted, de-duplicated
/// statements
pub fn canonicalize<I>(triples: I) -> Vec<Triple>
where
    I: IntoIterator<Item = Triple>,
{
    let unique: BTreeSet<Triple> = triples.into_iter().collect();
    let triples: Vec<Triple> = unique.into_iter().collect();

    let labels = canonical_labels(&triples);
    if labels.is_empty() {
        return triples;
    }

    let relabel = |term: &Term| match term {
        Term::BlankNode(label) => Term::BlankNode(labels[label].clone()),
        other => other.clone(),
    };

    let relabelled: BTreeSet<Triple> = triples
        .iter()
        .map(|t| Triple::new(relabel(&t.subject), relabel(&t.predicate), relabel(&t.object)))
        .collect();
    relabelled.into_iter().collect()
}

/// Canonical N-Triples bytes for a graph
pub fn canonical_ntriples<I>(triples: I) -> Vec<u8>
where
    I: IntoIterator<Item = Triple>,
{
    let mut out = Vec::new();
    for line in canonical_lines(triples) {
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
    }
    out
}

/// Write the canonical serialization of a graph to `out`
pub fn write_canonical<I, W>(triples: I, out: &mut W) -> io::Result<()>
where
    I: IntoIterator<Item = Triple>,
    W: Write,
{
    for line in canonical_lines(triples) {
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

fn canonical_lines<I>(triples: I) -> Vec<String>
where
    I: IntoIterator<Item = Triple>,
{
    // Sorting the formatted lines (rather than the terms) keeps the byte
    // order of the file independent of the Term ordering rules.
    let lines: BTreeSet<String> = canonicalize(triples).iter().map(format_triple).collect();
    lines.into_iter().collect()
}

/// Map every blank node label in `triples` to its canonical label
fn canonical_labels(triples: &[Triple]) -> HashMap<String, String> {
    let mut occurrences: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, t) in triples.iter().enumerate() {
        for term in [&t.subject, &t.predicate, &t.object] {
            if let Term::BlankNode(label) = term {
                let entry = occurrences.entry(label.clone()).or_default();
                if entry.last() != Some(&idx) {
                    entry.push(idx);
                }
            }
        }
    }
    if occurrences.is_empty() {
        return HashMap::new();
    }

    let nodes: Vec<String> = occurrences.keys().cloned().collect();
    let mut colors: Colors = nodes.iter().map(|n| (n.clone(), String::new())).collect();
    refine(triples, &occurrences, &mut colors);

    // Nodes still tied after refinement are interchangeable, so marking
    // any one member of the class gives the same serialization.
    while let Some(class) = first_tied_class(&colors) {
        let Some(representative) = class.into_iter().next() else {
            break;
        };
        let marked = digest(&format!("{}*", colors[&representative]));
        colors.insert(representative, marked);
        refine(triples, &occurrences, &mut colors);
    }

    let mut ordered: Vec<(&String, &String)> = colors.iter().map(|(n, c)| (c, n)).collect();
    ordered.sort();
    ordered
        .into_iter()
        .enumerate()
        .map(|(i, (_, node))| (node.clone(), format!("{}{}", CANONICAL_BLANK_PREFIX, i)))
        .collect()
}

/// Refine colors until the partition they induce stops splitting
fn refine(triples: &[Triple], occurrences: &BTreeMap<String, Vec<usize>>, colors: &mut Colors) {
    let mut classes = class_count(colors);
    for _ in 0..=occurrences.len() {
        let next: Colors = occurrences
            .iter()
            .map(|(node, idxs)| (node.clone(), signature(node, idxs, triples, colors)))
            .collect();
        let next_classes = class_count(&next);
        *colors = next;
        if next_classes == classes {
            break;
        }
        classes = next_classes;
    }
}

fn signature(node: &str, idxs: &[usize], triples: &[Triple], colors: &Colors) -> String {
    let term_key = |term: &Term| match term {
        Term::BlankNode(label) if label == node => "_:@".to_string(),
        Term::BlankNode(label) => format!("_:{}", colors[label]),
        other => other.to_string(),
    };

    let mut parts: Vec<String> = idxs
        .iter()
        .map(|&i| {
            let t = &triples[i];
            format!("{} {} {}", term_key(&t.subject), term_key(&t.predicate), term_key(&t.object))
        })
        .collect();
    parts.sort();

    digest(&format!("{}\n{}", colors[node], parts.join("\n")))
}

fn class_count(colors: &Colors) -> usize {
    colors.values().collect::<BTreeSet<_>>().len()
}

/// Members of the lowest-colored class holding more than one node
fn first_tied_class(colors: &Colors) -> Option<Vec<String>> {
    let mut by_color: BTreeMap<&String, Vec<String>> = BTreeMap::new();
    for (node, color) in colors {
        by_color.entry(color).or_default().push(node.clone());
    }
    by_color.into_values().find(|members| members.len() > 1).map(|mut members| {
        members.sort();
        members
    })
}

fn digest(s: &str) -> String {
    hash_bytes(HashAlgorithm::Sha256, s.as_bytes()).to_hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: Term, p: &str, o: Term) -> Triple {
        Triple::new(s, Term::iri(p), o)
    }

    #[test]
    fn test_order_independent() {
        let a = vec![
            t(Term::iri("http://x/1"), "http://p", Term::literal("one")),
            t(Term::iri("http://x/2"), "http://p", Term::literal("two")),
            t(Term::iri("http://x/0"), "http://q", Term::iri("http://x/1")),
        ];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(canonical_ntriples(a), canonical_ntriples(b));
    }

    #[test]
    fn test_duplicates_collapse() {
        let triple = t(Term::iri("http://s"), "http://p", Term::iri("http://o"));
        let out = canonical_ntriples(vec![triple.clone(), triple]);
        assert_eq!(out, b"<http://s> <http://p> <http://o> .\n".to_vec());
    }

    #[test]
    fn test_blank_labels_do_not_matter() {
        let a = vec![
            t(Term::blank("x"), "http://name", Term::literal("alice")),
            t(Term::blank("y"), "http://name", Term::literal("bob")),
            t(Term::blank("x"), "http://knows", Term::blank("y")),
        ];
        let b = vec![
            t(Term::blank("q9"), "http://knows", Term::blank("a1")),
            t(Term::blank("a1"), "http://name", Term::literal("bob")),
            t(Term::blank("q9"), "http://name", Term::literal("alice")),
        ];
        assert_eq!(canonical_ntriples(a), canonical_ntriples(b));
    }

    #[test]
    fn test_symmetric_blank_nodes() {
        let a = vec![
            t(Term::iri("http://s"), "http://p", Term::blank("one")),
            t(Term::iri("http://s"), "http://p", Term::blank("two")),
        ];
        let b = vec![
            t(Term::iri("http://s"), "http://p", Term::blank("zz")),
            t(Term::iri("http://s"), "http://p", Term::blank("aa")),
        ];
        let out = canonical_ntriples(a.clone());
        assert_eq!(out, canonical_ntriples(b));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("_:c14n0"));
        assert!(text.contains("_:c14n1"));
    }

    #[test]
    fn test_distinct_graphs_differ() {
        let a = vec![t(Term::iri("http://s"), "http://p", Term::literal("1"))];
        let b = vec![t(Term::iri("http://s"), "http://p", Term::literal("2"))];
        assert_ne!(canonical_ntriples(a), canonical_ntriples(b));
    }

    #[test]
    fn test_large_symmetric_graph() {
        let n = 150;
        let star = |label: &dyn Fn(usize) -> String| -> Vec<Triple> {
            (0..n)
                .map(|i| t(Term::iri("http://s"), "http://p", Term::blank(label(i))))
                .collect()
        };
        let forward = star(&|i| format!("b{i}"));
        let mut reversed = star(&|i| format!("b{}", n - 1 - i));
        reversed.reverse();

        let start = std::time::Instant::now();
        let a = canonical_ntriples(forward);
        let b = canonical_ntriples(reversed);
        assert!(start.elapsed() < std::time::Duration::from_secs(30));
        assert_eq!(a, b);
        assert_eq!(a.iter().filter(|&&c| c == b'\n').count(), n);
    }

    #[test]
    fn test_tied_chains_are_label_independent() {
        // Two identical two-node chains hanging off one subject
        let chain = |x: &str, y: &str| {
            vec![
                t(Term::iri("http://s"), "http://p", Term::blank(x)),
                t(Term::blank(x), "http://next", Term::blank(y)),
                t(Term::blank(y), "http://v", Term::literal("end")),
            ]
        };
        let mut a = chain("a", "b");
        a.extend(chain("c", "d"));
        let mut b = chain("z", "y");
        b.extend(chain("m", "n"));
        assert_eq!(canonical_ntriples(a), canonical_ntriples(b));
    }

    #[test]
    fn test_write_matches_bytes() {
        let triples = vec![t(Term::blank("b"), "http://p", Term::literal("v"))];
        let mut out = Vec::new();
        write_canonical(triples.clone(), &mut out).unwrap();
        assert_eq!(out, canonical_ntriples(triples));
    }
}
