// src/bundle/matcher.rs

//! Context and file selection predicates
//!
//! A descriptor selects an identifier when it equals one of the descriptor's
//! includes or matches one of its patterns. Patterns are either regular
//! expressions (written with an `rgx:` prefix) or shell-style globs. Both are
//! matched against the whole identifier.

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Prefix marking a pattern as a regular expression rather than a glob
pub const REGEX_PREFIX: &str = "rgx:";

/// Something that can decide whether an identifier is selected
pub trait Matcher {
    fn matches(&self, identifier: &str) -> bool;
}

/// Matches exactly one identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Include {
    reference: String,
}

impl Include {
    /// Surrounding whitespace in the reference is ignored
    pub fn new(reference: &str) -> Self {
        Self {
            reference: reference.trim().to_string(),
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl Matcher for Include {
    fn matches(&self, identifier: &str) -> bool {
        identifier == self.reference
    }
}

impl fmt::Display for Include {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference)
    }
}

/// How a [`Pattern`] was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    Glob,
    Regex,
}

/// A compiled glob or regular-expression pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    kind: PatternKind,
    regex: Regex,
}

impl Pattern {
    /// Parse a pattern as written in a descriptor
    ///
    /// `rgx:<expr>` is a regular expression; anything else is a glob.
    pub fn parse(s: &str) -> Result<Self> {
        match s.strip_prefix(REGEX_PREFIX) {
            Some(expr) => Self::regex(expr),
            None => Self::glob(s),
        }
    }

    pub fn regex(expr: &str) -> Result<Self> {
        Ok(Self {
            source: expr.to_string(),
            kind: PatternKind::Regex,
            regex: compile_anchored(expr)?,
        })
    }

    pub fn glob(glob: &str) -> Result<Self> {
        Ok(Self {
            source: glob.to_string(),
            kind: PatternKind::Glob,
            regex: compile_anchored(&glob_to_regex(glob))?,
        })
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    /// The pattern as written, without the `rgx:` prefix
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Matcher for Pattern {
    fn matches(&self, identifier: &str) -> bool {
        self.regex.is_match(identifier)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.source == other.source
    }
}

impl Eq for Pattern {}

impl Hash for Pattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.source.hash(state);
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PatternKind::Glob => write!(f, "{}", self.source),
            PatternKind::Regex => write!(f, "{}{}", REGEX_PREFIX, self.source),
        }
    }
}

fn compile_anchored(expr: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})$", expr))
        .map_err(|e| Error::ParseError(format!("invalid pattern '{}': {}", expr, e)))
}

/// Translate a shell-style glob into a regular expression body
///
/// `*` matches any run of characters, `?` exactly one character, and
/// `[...]` / `[!...]` a (negated) character class. Everything else is
/// literal.
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2);
    let mut chars = glob.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut class = String::new();
                let mut raw = String::from("[");
                let mut closed = false;
                if chars.peek() == Some(&'!') {
                    chars.next();
                    raw.push('!');
                    class.push('^');
                }
                // A ']' right after the opening bracket is a literal member
                if chars.peek() == Some(&']') {
                    chars.next();
                    raw.push(']');
                    class.push_str("\\]");
                }
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    raw.push(c);
                    if matches!(c, '\\' | '[' | '&' | '~') {
                        class.push('\\');
                    }
                    class.push(c);
                }
                if closed {
                    out.push('[');
                    out.push_str(&class);
                    out.push(']');
                } else {
                    // Unterminated class: the bracket and its tail are literal
                    out.push_str(&regex::escape(&raw));
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out
}

/// True if any include or any pattern selects `identifier`
pub fn selects<'a, I, P>(includes: I, patterns: P, identifier: &str) -> bool
where
    I: IntoIterator<Item = &'a Include>,
    P: IntoIterator<Item = &'a Pattern>,
{
    includes.into_iter().any(|inc| inc.matches(identifier))
        || patterns.into_iter().any(|pat| pat.matches(identifier))
}
