// src/rdf/ntriples.rs

//! N-Triples / N-Quads line codec
//!
//! Graph files inside a bundle are N-Triples documents, one statement per
//! line. The parser accepts the full term syntax (IRIs, blank nodes, plain,
//! typed and language-tagged literals, `\u`/`\U` escapes) and optionally a
//! fourth graph-name term for N-Quads input.

use super::term::{Term, Triple};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NTriplesError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}

impl From<NTriplesError> for crate::Error {
    fn from(e: NTriplesError) -> Self {
        crate::Error::ParseError(format!("N-Triples {e}"))
    }
}

/// Format a term in N-Triples syntax
pub fn format_term(term: &Term) -> String {
    match term {
        Term::Iri(iri) => format!("<{}>", iri),
        Term::BlankNode(label) => format!("_:{}", label),
        Term::Literal {
            lexical,
            datatype,
            language,
        } => {
            let mut out = String::with_capacity(lexical.len() + 2);
            out.push('"');
            escape_into(lexical, &mut out);
            out.push('"');
            if let Some(lang) = language {
                out.push('@');
                out.push_str(lang);
            } else if let Some(dt) = datatype {
                out.push_str("^^<");
                out.push_str(dt);
                out.push('>');
            }
            out
        }
    }
}

/// Format a triple as one N-Triples statement, without the line terminator
pub fn format_triple(triple: &Triple) -> String {
    format!(
        "{} {} {} .",
        format_term(&triple.subject),
        format_term(&triple.predicate),
        format_term(&triple.object)
    )
}

fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
}

/// Parse one N-Triples line
///
/// Returns `Ok(None)` for blank lines and comments.
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<Triple>, NTriplesError> {
    match parse_quad_line(line, line_no)? {
        None => Ok(None),
        Some((_, Some(_))) => Err(NTriplesError::Syntax {
            line: line_no,
            message: "unexpected graph name in N-Triples statement".to_string(),
        }),
        Some((triple, None)) => Ok(Some(triple)),
    }
}

/// Parse one N-Quads line into a triple and its optional graph name
pub fn parse_quad_line(
    line: &str,
    line_no: usize,
) -> Result<Option<(Triple, Option<String>)>, NTriplesError> {
    let mut cursor = Cursor::new(line, line_no);
    cursor.skip_ws();
    if cursor.at_end() || cursor.peek() == Some('#') {
        return Ok(None);
    }

    let subject = cursor.term()?;
    if matches!(subject, Term::Literal { .. }) {
        return Err(cursor.error("literal in subject position"));
    }
    cursor.skip_ws();
    let predicate = cursor.term()?;
    if !matches!(predicate, Term::Iri(_)) {
        return Err(cursor.error("predicate must be an IRI"));
    }
    cursor.skip_ws();
    let object = cursor.term()?;
    cursor.skip_ws();

    let graph = if cursor.peek() == Some('.') {
        None
    } else {
        match cursor.term()? {
            Term::Iri(iri) => Some(iri),
            Term::BlankNode(label) => Some(format!("_:{}", label)),
            Term::Literal { .. } => return Err(cursor.error("literal as graph name")),
        }
    };

    cursor.skip_ws();
    if cursor.next_char() != Some('.') {
        return Err(cursor.error("expected '.' at end of statement"));
    }
    cursor.skip_ws();
    if !cursor.at_end() && cursor.peek() != Some('#') {
        return Err(cursor.error("trailing characters after statement"));
    }

    Ok(Some((Triple::new(subject, predicate, object), graph)))
}

/// Parse a whole N-Triples document
pub fn parse_document(text: &str) -> Result<Vec<Triple>, NTriplesError> {
    let mut triples = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some(triple) = parse_line(line, idx + 1)? {
            triples.push(triple);
        }
    }
    Ok(triples)
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, line: usize) -> Self {
        Self {
            chars: text.chars().peekable(),
            line,
        }
    }

    fn error(&self, message: &str) -> NTriplesError {
        NTriplesError::Syntax {
            line: self.line,
            message: message.to_string(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn next_char(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn at_end(&mut self) -> bool {
        self.chars.peek().is_none()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t') | Some('\r')) {
            self.chars.next();
        }
    }

    fn term(&mut self) -> Result<Term, NTriplesError> {
        match self.peek() {
            Some('<') => {
                self.chars.next();
                Ok(Term::Iri(self.iri_body()?))
            }
            Some('_') => {
                self.chars.next();
                if self.next_char() != Some(':') {
                    return Err(self.error("expected ':' after '_'"));
                }
                let mut label = String::new();
                while let Some(c) = self.peek() {
                    // '.' is left out so "_:b0." still ends the statement
                    if c.is_alphanumeric() || matches!(c, '_' | '-') {
                        label.push(c);
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                if label.is_empty() {
                    return Err(self.error("empty blank node label"));
                }
                Ok(Term::BlankNode(label))
            }
            Some('"') => {
                self.chars.next();
                self.literal()
            }
            Some(c) => Err(self.error(&format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of line")),
        }
    }

    fn iri_body(&mut self) -> Result<String, NTriplesError> {
        let mut iri = String::new();
        loop {
            match self.next_char() {
                Some('>') => return Ok(iri),
                Some('\\') => iri.push(self.escape()?),
                Some(c) if c == ' ' || c == '<' || c == '"' => {
                    return Err(self.error("invalid character in IRI"));
                }
                Some(c) => iri.push(c),
                None => return Err(self.error("unterminated IRI")),
            }
        }
    }

    fn literal(&mut self) -> Result<Term, NTriplesError> {
        let mut lexical = String::new();
        loop {
            match self.next_char() {
                Some('"') => break,
                Some('\\') => lexical.push(self.escape()?),
                Some(c) => lexical.push(c),
                None => return Err(self.error("unterminated literal")),
            }
        }

        match self.peek() {
            Some('@') => {
                self.chars.next();
                let mut lang = String::new();
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphanumeric() || c == '-' {
                        lang.push(c);
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                if lang.is_empty() {
                    return Err(self.error("empty language tag"));
                }
                Ok(Term::lang_literal(lexical, lang))
            }
            Some('^') => {
                self.chars.next();
                if self.next_char() != Some('^') || self.next_char() != Some('<') {
                    return Err(self.error("expected '^^<' before datatype"));
                }
                let datatype = self.iri_body()?;
                Ok(Term::typed_literal(lexical, datatype))
            }
            _ => Ok(Term::literal(lexical)),
        }
    }

    fn escape(&mut self) -> Result<char, NTriplesError> {
        match self.next_char() {
            Some('t') => Ok('\t'),
            Some('b') => Ok('\u{8}'),
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('f') => Ok('\u{c}'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some('\\') => Ok('\\'),
            Some('u') => self.unicode_escape(4),
            Some('U') => self.unicode_escape(8),
            _ => Err(self.error("invalid escape sequence")),
        }
    }

    fn unicode_escape(&mut self, digits: usize) -> Result<char, NTriplesError> {
        let mut hex = String::with_capacity(digits);
        for _ in 0..digits {
            match self.next_char() {
                Some(c) if c.is_ascii_hexdigit() => hex.push(c),
                _ => return Err(self.error("invalid unicode escape")),
            }
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error("unicode escape is not a scalar value"))
    }
}
