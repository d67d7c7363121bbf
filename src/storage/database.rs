//! SQLite passage store with migrations
//!
//! Holds ingested documents, their passages, and passage embeddings. Passage
//! row ids are the node identities every retriever reports.

use crate::error::{DelveError, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
}

/// A passage joined with its document
#[derive(Debug, Clone, PartialEq)]
pub struct PassageRecord {
    pub id: i64,
    pub document_id: i64,
    pub position: i64,
    pub text: String,
    pub file_name: String,
    pub path: String,
}

/// Outcome of registering a document
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentUpsert {
    /// First time this path was seen
    Created(i64),
    /// Same content hash as before; nothing to do
    Unchanged(i64),
    /// Content changed, or an earlier run never confirmed its keyword
    /// entries; old passages were removed
    Replaced {
        id: i64,
        removed_passages: Vec<i64>,
    },
}

impl Database {
    /// Create (or open) a database, running migrations
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DelveError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);

        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| DelveError::Config(format!("Failed to create connection pool: {}", e)))?;

        {
            let conn = pool
                .get()
                .map_err(|e| DelveError::Config(format!("Failed to get connection: {}", e)))?;

            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
        }

        let db = Self { pool };
        db.migrate()?;

        Ok(db)
    }

    /// Open a database that must already exist
    pub fn open_existing(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            return Err(DelveError::IndexNotFound {
                path: db_path.to_path_buf(),
            });
        }
        Self::new(db_path)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| DelveError::Config(format!("Failed to get connection: {}", e)))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM _migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);
                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Register a document by path, detecting content changes by hash
    pub fn upsert_document(
        &self,
        path: &str,
        file_name: &str,
        content_hash: &str,
    ) -> Result<DocumentUpsert> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let existing: Option<(i64, String, bool)> = tx
            .query_row(
                "SELECT id, content_hash, indexed FROM documents WHERE path = ?1",
                params![path],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let outcome = match existing {
            Some((id, hash, true)) if hash == content_hash => DocumentUpsert::Unchanged(id),
            Some((id, _, _)) => {
                let removed_passages = {
                    let mut stmt = tx.prepare("SELECT id FROM passages WHERE document_id = ?1")?;
                    let rows = stmt.query_map(params![id], |row| row.get(0))?;
                    rows.collect::<std::result::Result<Vec<i64>, _>>()?
                };
                tx.execute("DELETE FROM passages WHERE document_id = ?1", params![id])?;
                tx.execute(
                    "UPDATE documents SET content_hash = ?1, ingested_at = ?2, indexed = 0 WHERE id = ?3",
                    params![content_hash, chrono::Utc::now().timestamp(), id],
                )?;
                DocumentUpsert::Replaced {
                    id,
                    removed_passages,
                }
            }
            None => {
                tx.execute(
                    "INSERT INTO documents (path, file_name, content_hash, ingested_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![path, file_name, content_hash, chrono::Utc::now().timestamp()],
                )?;
                DocumentUpsert::Created(tx.last_insert_rowid())
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Mark documents whose keyword entries are committed
    pub fn mark_indexed(&self, document_ids: &[i64]) -> Result<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("UPDATE documents SET indexed = 1 WHERE id = ?1")?;
            for id in document_ids {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert a passage; returns `None` when the document already holds
    /// identical text
    pub fn insert_passage(&self, document_id: i64, position: i64, text: &str) -> Result<Option<i64>> {
        let conn = self.get_conn()?;
        let hash = blake3::hash(text.as_bytes()).to_hex().to_string();

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO passages (document_id, position, text, content_hash)
             VALUES (?1, ?2, ?3, ?4)",
            params![document_id, position, text, hash],
        )?;

        if inserted == 0 {
            Ok(None)
        } else {
            Ok(Some(conn.last_insert_rowid()))
        }
    }

    /// Persist a passage embedding
    pub fn set_embedding(&self, passage_id: i64, embedding: &[f32]) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE passages SET embedding = ?1 WHERE id = ?2",
            params![encode_embedding(embedding), passage_id],
        )?;
        Ok(())
    }

    /// Fetch passages by id, in the order requested; unknown ids are skipped
    pub fn get_passages(&self, ids: &[i64]) -> Result<Vec<PassageRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT p.id, p.document_id, p.position, p.text, d.file_name, d.path
             FROM passages p JOIN documents d ON d.id = p.document_id
             WHERE p.id = ?1",
        )?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let record = stmt
                .query_row(params![id], |row| {
                    Ok(PassageRecord {
                        id: row.get(0)?,
                        document_id: row.get(1)?,
                        position: row.get(2)?,
                        text: row.get(3)?,
                        file_name: row.get(4)?,
                        path: row.get(5)?,
                    })
                })
                .optional()?;

            if let Some(record) = record {
                records.push(record);
            }
        }

        Ok(records)
    }

    /// All stored embeddings, for rebuilding the vector index
    pub fn embeddings(&self) -> Result<Vec<(i64, Vec<f32>)>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, embedding FROM passages WHERE embedding IS NOT NULL")?;

        let rows = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((id, decode_embedding(&blob)))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Passages that still need an embedding
    pub fn passages_without_embedding(&self) -> Result<Vec<(i64, String)>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, text FROM passages WHERE embedding IS NULL ORDER BY id")?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.get_conn()?;

        let document_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let passage_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM passages", [], |row| row.get(0))?;
        let embedded_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM passages WHERE embedding IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(DbStats {
            document_count: document_count as usize,
            passage_count: passage_count as usize,
            embedded_count: embedded_count as usize,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbStats {
    pub document_count: usize,
    pub passage_count: usize,
    pub embedded_count: usize,
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    CREATE TABLE documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL UNIQUE,
        file_name TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        ingested_at INTEGER NOT NULL,
        indexed INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE passages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id INTEGER NOT NULL,
        position INTEGER NOT NULL,
        text TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        embedding BLOB,
        UNIQUE (document_id, content_hash),
        FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
    );

    CREATE INDEX idx_passages_document ON passages(document_id);
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Database) {
        let temp = TempDir::new().unwrap();
        let db = Database::new(&temp.path().join("corpus.sqlite")).unwrap();
        (temp, db)
    }

    #[test]
    fn test_open_existing_requires_file() {
        let temp = TempDir::new().unwrap();
        let result = Database::open_existing(&temp.path().join("missing.sqlite"));
        assert!(matches!(result, Err(DelveError::IndexNotFound { .. })));
    }

    #[test]
    fn test_document_upsert_lifecycle() {
        let (_temp, db) = setup();

        let id = match db.upsert_document("/docs/a.md", "a.md", "h1").unwrap() {
            DocumentUpsert::Created(id) => id,
            other => panic!("unexpected {:?}", other),
        };
        let p1 = db.insert_passage(id, 0, "first passage").unwrap().unwrap();
        db.mark_indexed(&[id]).unwrap();

        assert_eq!(
            db.upsert_document("/docs/a.md", "a.md", "h1").unwrap(),
            DocumentUpsert::Unchanged(id)
        );

        match db.upsert_document("/docs/a.md", "a.md", "h2").unwrap() {
            DocumentUpsert::Replaced {
                id: same,
                removed_passages,
            } => {
                assert_eq!(same, id);
                assert_eq!(removed_passages, vec![p1]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(db.stats().unwrap().passage_count, 0);
    }

    #[test]
    fn test_duplicate_passage_text_is_ignored() {
        let (_temp, db) = setup();
        let DocumentUpsert::Created(doc) = db.upsert_document("/d/x.txt", "x.txt", "h").unwrap()
        else {
            panic!("expected new document");
        };

        assert!(db.insert_passage(doc, 0, "same text").unwrap().is_some());
        assert!(db.insert_passage(doc, 1, "same text").unwrap().is_none());
    }

    #[test]
    fn test_shared_text_survives_replacing_one_document() {
        let (_temp, db) = setup();
        let DocumentUpsert::Created(a) = db.upsert_document("/d/a.md", "a.md", "ha").unwrap() else {
            panic!("expected new document");
        };
        let DocumentUpsert::Created(b) = db.upsert_document("/d/b.md", "b.md", "hb").unwrap() else {
            panic!("expected new document");
        };

        let shared_a = db.insert_passage(a, 0, "Shared entropy sentence.").unwrap().unwrap();
        let shared_b = db.insert_passage(b, 0, "Shared entropy sentence.").unwrap().unwrap();
        assert_ne!(shared_a, shared_b);

        db.upsert_document("/d/a.md", "a.md", "ha2").unwrap();

        let records = db.get_passages(&[shared_a, shared_b]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name, "b.md");
    }

    #[test]
    fn test_unconfirmed_document_is_not_unchanged() {
        let (_temp, db) = setup();
        let DocumentUpsert::Created(id) = db.upsert_document("/d/a.md", "a.md", "h").unwrap() else {
            panic!("expected new document");
        };
        let passage = db.insert_passage(id, 0, "text").unwrap().unwrap();

        // Same hash, but the keyword entries were never confirmed
        assert_eq!(
            db.upsert_document("/d/a.md", "a.md", "h").unwrap(),
            DocumentUpsert::Replaced {
                id,
                removed_passages: vec![passage],
            }
        );

        db.mark_indexed(&[id]).unwrap();
        assert_eq!(
            db.upsert_document("/d/a.md", "a.md", "h").unwrap(),
            DocumentUpsert::Unchanged(id)
        );
    }

    #[test]
    fn test_get_passages_preserves_request_order() {
        let (_temp, db) = setup();
        let DocumentUpsert::Created(doc) = db.upsert_document("/d/x.txt", "x.txt", "h").unwrap()
        else {
            panic!("expected new document");
        };

        let a = db.insert_passage(doc, 0, "alpha").unwrap().unwrap();
        let b = db.insert_passage(doc, 1, "beta").unwrap().unwrap();

        let records = db.get_passages(&[b, 9999, a]).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "beta");
        assert_eq!(records[1].text, "alpha");
        assert_eq!(records[0].file_name, "x.txt");
    }

    #[test]
    fn test_embedding_roundtrip() {
        let (_temp, db) = setup();
        let DocumentUpsert::Created(doc) = db.upsert_document("/d/x.txt", "x.txt", "h").unwrap()
        else {
            panic!("expected new document");
        };
        let id = db.insert_passage(doc, 0, "vector me").unwrap().unwrap();

        assert_eq!(db.passages_without_embedding().unwrap().len(), 1);
        db.set_embedding(id, &[0.25, -1.5, 3.0]).unwrap();

        assert!(db.passages_without_embedding().unwrap().is_empty());
        assert_eq!(db.embeddings().unwrap(), vec![(id, vec![0.25, -1.5, 3.0])]);
        assert_eq!(db.stats().unwrap().embedded_count, 1);
    }
}
