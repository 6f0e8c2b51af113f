//! Memory Stream – append-only log of experiences with embedding recall.
//!
//! Every entry carries a monotonically increasing integer id, a UTC
//! timestamp, the text, its embedding and a small metadata object.  Recall
//! ranks entries by cosine similarity to a query embedding.
//!
//! # Storage layout
//!
//! | column    | type    | description                                |
//! |-----------|---------|--------------------------------------------|
//! | id        | INTEGER | primary key, assigned at insert            |
//! | timestamp | TEXT    | RFC-3339 creation time (UTC)               |
//! | text      | TEXT    | the experience, verbatim                   |
//! | embedding | BLOB    | little-endian f32 vector (4 × N bytes)     |
//! | metadata  | TEXT    | JSON object, e.g. `{"source":"remember"}`  |
//!
//! Ids are allocated under the connection lock and only consumed by a
//! successful insert, so concurrent appends never collide and a failed
//! append leaves no gap.
//!
//! # Example
//!
//! ```rust
//! use sara_memory::stream::MemoryStream;
//!
//! let stream = MemoryStream::open_in_memory().unwrap();
//! let id = stream
//!     .append("User shared facts: deadline is Friday", &[0.1, 0.9], serde_json::json!({}))
//!     .unwrap();
//! let hits = stream.recall_similar(&[0.1, 0.9], 5).unwrap();
//! assert_eq!(hits[0].0.id, id);
//! ```

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from memory stream operations.
#[derive(Error, Debug)]
pub enum MemoryStreamError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("Embedding vectors must be non-empty")]
    EmptyEmbedding,
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryRecord
// ─────────────────────────────────────────────────────────────────────────────

/// A single stored experience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding serialisation helpers
// ─────────────────────────────────────────────────────────────────────────────

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity of two vectors; `0.0` if either has zero norm or the
/// lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryStream
// ─────────────────────────────────────────────────────────────────────────────

struct Inner {
    conn: Connection,
    next_id: u64,
}

/// SQLite-backed, append-only memory stream.
pub struct MemoryStream {
    inner: Mutex<Inner>,
}

impl MemoryStream {
    /// Open (or create) a persistent database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryStreamError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a temporary in-memory database.
    pub fn open_in_memory() -> Result<Self, MemoryStreamError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, MemoryStreamError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memory_stream (
                id        INTEGER NOT NULL PRIMARY KEY,
                timestamp TEXT    NOT NULL,
                text      TEXT    NOT NULL,
                embedding BLOB    NOT NULL,
                metadata  TEXT    NOT NULL
            );",
        )?;
        let (count, max_id): (i64, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), MAX(id) FROM memory_stream",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        // Continue after the highest id even if rows were removed externally.
        let next_id = (count as u64).max(max_id.map_or(0, |m| m as u64 + 1));
        Ok(Self {
            inner: Mutex::new(Inner { conn, next_id }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an experience and return its id.
    pub fn append(
        &self,
        text: &str,
        embedding: &[f32],
        metadata: Value,
    ) -> Result<u64, MemoryStreamError> {
        if embedding.is_empty() {
            return Err(MemoryStreamError::EmptyEmbedding);
        }
        let metadata = serde_json::to_string(&metadata)?;
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.conn.execute(
            "INSERT INTO memory_stream (id, timestamp, text, embedding, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id as i64,
                Utc::now().to_rfc3339(),
                text,
                embedding_to_bytes(embedding),
                metadata,
            ],
        )?;
        inner.next_id += 1;
        Ok(id)
    }

    /// Number of stored entries.
    pub fn count(&self) -> Result<u64, MemoryStreamError> {
        let inner = self.lock();
        let n: i64 = inner
            .conn
            .query_row("SELECT COUNT(*) FROM memory_stream", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Every entry, oldest first.
    pub fn all_records(&self) -> Result<Vec<MemoryRecord>, MemoryStreamError> {
        let inner = self.lock();
        let mut stmt = inner.conn.prepare(
            "SELECT id, timestamp, text, embedding, metadata
             FROM memory_stream
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let ts: String = row.get(1)?;
            let text: String = row.get(2)?;
            let blob: Vec<u8> = row.get(3)?;
            let metadata: String = row.get(4)?;
            Ok((id, ts, text, blob, metadata))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, ts, text, blob, metadata) = row?;
            let timestamp = ts.parse::<DateTime<Utc>>().map_err(|e| {
                rusqlite::Error::InvalidColumnType(1, e.to_string(), rusqlite::types::Type::Text)
            })?;
            records.push(MemoryRecord {
                id: id as u64,
                timestamp,
                text,
                embedding: bytes_to_embedding(&blob),
                metadata: serde_json::from_str(&metadata).unwrap_or(Value::Null),
            });
        }
        Ok(records)
    }

    /// The `k` entries most similar to `query`, best first.  Equal scores are
    /// ordered by id so the result is deterministic.  Entries whose embedding
    /// dimension differs from the query are skipped.
    pub fn recall_similar(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(MemoryRecord, f32)>, MemoryStreamError> {
        if query.is_empty() {
            return Err(MemoryStreamError::EmptyEmbedding);
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(MemoryRecord, f32)> = self
            .all_records()?
            .into_iter()
            .filter(|r| r.embedding.len() == query.len())
            .map(|r| {
                let score = cosine_similarity(&r.embedding, query);
                (r, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.id.cmp(&b.0.id)));
        scored.truncate(k);
        Ok(scored)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
