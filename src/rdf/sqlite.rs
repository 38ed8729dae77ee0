// src/rdf/sqlite.rs

//! SQLite-backed quad store
//!
//! Used as the private store a bundle materializes while it is in scoped
//! use. Terms are stored in their N-Triples form; a unique constraint on
//! `(context, subject, predicate, object)` makes repeated loads idempotent.

use super::ntriples::{format_term, parse_line};
use super::store::{GraphSink, GraphStore};
use super::term::{Term, Triple};
use crate::error::{Error, Result};
use rusqlite::{params, Connection};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

/// Current store schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Statements inserted per write transaction during bulk loads
pub const BATCH_SIZE: usize = 4000;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) a store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open a throwaway store in memory
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        let current: i32 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )?;

        if current >= SCHEMA_VERSION {
            return Ok(());
        }

        debug!("Creating quad store schema version {}", SCHEMA_VERSION);
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS quads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                context TEXT NOT NULL,
                subject TEXT NOT NULL,
                predicate TEXT NOT NULL,
                object TEXT NOT NULL,
                UNIQUE(context, subject, predicate, object)
            );

            CREATE INDEX IF NOT EXISTS idx_quads_context ON quads(context);
            CREATE INDEX IF NOT EXISTS idx_quads_subject ON quads(context, subject, predicate);
            ",
        )?;
        self.conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [SCHEMA_VERSION],
        )?;
        Ok(())
    }

    /// Bulk-load an N-Triples file into a context
    ///
    /// Writes are committed every [`BATCH_SIZE`] statements. Returns the
    /// number of statements read.
    pub fn load_ntriples_file(&mut self, context: &str, path: &Path) -> Result<usize> {
        let reader = BufReader::new(File::open(path)?);
        let mut batch = Vec::with_capacity(BATCH_SIZE);
        let mut count = 0;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if let Some(triple) = parse_line(&line, idx + 1)? {
                batch.push(triple);
                count += 1;
            }
            if batch.len() >= BATCH_SIZE {
                self.add_triples(context, &batch)?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            self.add_triples(context, &batch)?;
        }

        debug!("Loaded {} statements into {} from {:?}", count, context, path);
        Ok(count)
    }

    /// Number of stored statements
    pub fn len(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM quads", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Close the underlying connection
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::DatabaseError(e))?;
        info!("Closed quad store");
        Ok(())
    }
}

fn row_to_triple(subject: &str, predicate: &str, object: &str) -> Result<Triple> {
    let line = format!("{} {} {} .", subject, predicate, object);
    parse_line(&line, 0)?
        .ok_or_else(|| Error::ParseError(format!("stored statement is empty: {line}")))
}

impl GraphStore for SqliteStore {
    fn context_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT context FROM quads ORDER BY context")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn triples(&self, context: &str) -> Result<Vec<Triple>> {
        let mut stmt = self.conn.prepare(
            "SELECT subject, predicate, object FROM quads WHERE context = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([context], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut triples = Vec::new();
        for row in rows {
            let (s, p, o) = row?;
            triples.push(row_to_triple(&s, &p, &o)?);
        }
        Ok(triples)
    }

    fn objects(&self, context: &str, subject: &Term, predicate: &Term) -> Result<Vec<Term>> {
        let mut stmt = self.conn.prepare(
            "SELECT subject, predicate, object FROM quads
             WHERE context = ?1 AND subject = ?2 AND predicate = ?3 ORDER BY id",
        )?;
        let rows = stmt.query_map(
            params![context, format_term(subject), format_term(predicate)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )?;

        let mut objects = Vec::new();
        for row in rows {
            let (s, p, o) = row?;
            objects.push(row_to_triple(&s, &p, &o)?.object);
        }
        Ok(objects)
    }
}

impl GraphSink for SqliteStore {
    fn add_triples(&mut self, context: &str, triples: &[Triple]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO quads (context, subject, predicate, object)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for t in triples {
                stmt.execute(params![
                    context,
                    format_term(&t.subject),
                    format_term(&t.predicate),
                    format_term(&t.object)
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Vec<Triple> {
        vec![
            Triple::new(Term::iri("http://s"), Term::iri("http://p"), Term::literal("a \"b\"")),
            Triple::new(Term::blank("n1"), Term::iri("http://p"), Term::lang_literal("x", "en")),
        ]
    }

    #[test]
    fn test_add_and_read_back() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.add_triples("http://ctx", &sample()).unwrap();
        assert_eq!(store.context_ids().unwrap(), vec!["http://ctx"]);
        assert_eq!(store.triples("http://ctx").unwrap(), sample());
    }

    #[test]
    fn test_duplicate_load_is_idempotent() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.add_triples("http://ctx", &sample()).unwrap();
        store.add_triples("http://ctx", &sample()).unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_load_file_and_reopen() {
        let dir = TempDir::new().unwrap();
        let nt = dir.path().join("g.nt");
        std::fs::write(
            &nt,
            "<http://s> <http://p> <http://o> .\n<http://s> <http://p> \"v\" .\n",
        )
        .unwrap();
        let db = dir.path().join("store.db");

        let mut store = SqliteStore::open(&db).unwrap();
        assert_eq!(store.load_ntriples_file("http://g", &nt).unwrap(), 2);
        store.close().unwrap();

        let store = SqliteStore::open(&db).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        let objs = store
            .objects("http://g", &Term::iri("http://s"), &Term::iri("http://p"))
            .unwrap();
        assert_eq!(objs, vec![Term::iri("http://o"), Term::literal("v")]);
    }
}
