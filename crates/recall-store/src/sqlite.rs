//! SQLite-backed [`Store`].
//!
//! One connection behind a mutex, WAL journal, foreign keys on so that deleting
//! a collection cascades to its chunks, flashcards and review states.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::embedding::{decode_f32, encode_f32};
use crate::schema::{FLASHCARD_SCHEMA_SQL, SCHEMA_SQL};
use crate::store::Store;
use crate::types::StoreStats;
use recall_core::{
    CardStyle, Chunk, Collection, Difficulty, Error, Flashcard, Result, ReviewState,
};

const DATE_FMT: &str = "%Y-%m-%d";

const FLASHCARD_COLUMNS: &str = "f.id, f.collection_id, f.question, f.answer, f.difficulty, \
     f.style, f.tags_json, f.source_chunk_ids_json, f.created_at, \
     r.repetition_count, r.easiness_factor, r.interval_days, r.due_date, r.last_quality, \
     r.review_count, r.correct_count, r.last_reviewed";

/// SQLite store for collections, chunks, flashcards and review state.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create the store. The file will be `db_dir/recall.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("recall.db");

        let conn = Connection::open(&db_path).map_err(|e| Error::Database(e.to_string()))?;
        let store = Self::from_connection(conn, Some(db_path))?;

        let stats = store.stats()?;
        info!(
            "SqliteStore initialized: {} collections, {} chunks, {} flashcards, path={}",
            stats.total_collections,
            stats.total_chunks,
            stats.total_flashcards,
            stats.db_path.as_deref().unwrap_or("")
        );
        Ok(store)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Database(e.to_string()))?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        let full_schema = format!("{}\n{}", SCHEMA_SQL, FLASHCARD_SCHEMA_SQL);
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    fn collection_exists(conn: &Connection, id: &str) -> Result<bool> {
        let found: Option<i64> = conn
            .prepare_cached("SELECT 1 FROM collections WHERE id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![id], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(found.is_some())
    }

    // ---------------------------------------------------------------
    // Row Mapping Helpers
    // ---------------------------------------------------------------

    fn row_to_collection(row: &rusqlite::Row<'_>) -> rusqlite::Result<Collection> {
        Ok(Collection {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            created_at: parse_timestamp(row, "created_at")?,
        })
    }

    fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
        let heading_json: String = row.get("heading_path_json")?;
        let blob: Option<Vec<u8>> = row.get("embedding")?;
        Ok(Chunk {
            id: row.get("id")?,
            collection_id: row.get("collection_id")?,
            document_id: row.get("document_id")?,
            position: row.get("position")?,
            heading_path: serde_json::from_str(&heading_json).unwrap_or_default(),
            text: row.get("text")?,
            embedding: blob.as_deref().map(decode_f32).unwrap_or_default(),
        })
    }

    fn row_to_review(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReviewState> {
        Ok(ReviewState {
            repetition_count: row.get("repetition_count")?,
            easiness_factor: row.get("easiness_factor")?,
            interval_days: row.get("interval_days")?,
            due_date: parse_date(row, "due_date")?,
            last_quality: row.get("last_quality")?,
            review_count: row.get("review_count")?,
            correct_count: row.get("correct_count")?,
            last_reviewed: match row.get::<_, Option<String>>("last_reviewed")? {
                Some(_) => Some(parse_date(row, "last_reviewed")?),
                None => None,
            },
        })
    }

    fn row_to_flashcard(row: &rusqlite::Row<'_>) -> rusqlite::Result<Flashcard> {
        let difficulty: String = row.get("difficulty")?;
        let style: String = row.get("style")?;
        let tags_json: String = row.get("tags_json")?;
        let sources_json: String = row.get("source_chunk_ids_json")?;
        Ok(Flashcard {
            id: row.get("id")?,
            collection_id: row.get("collection_id")?,
            question: row.get("question")?,
            answer: row.get("answer")?,
            difficulty: Difficulty::parse_lenient(&difficulty),
            style: style.parse::<CardStyle>().unwrap_or_default(),
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            source_chunk_ids: serde_json::from_str(&sources_json).unwrap_or_default(),
            created_at: parse_timestamp(row, "created_at")?,
            review: Self::row_to_review(row)?,
        })
    }
}

fn conversion_error(
    row: &rusqlite::Row<'_>,
    column: &str,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    let idx = row.as_ref().column_index(column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_date(row: &rusqlite::Row<'_>, column: &str) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(column)?;
    NaiveDate::parse_from_str(&raw, DATE_FMT).map_err(|e| conversion_error(row, column, e))
}

fn parse_timestamp(row: &rusqlite::Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(row, column, e))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

impl Store for SqliteStore {
    fn create_collection(&self, collection: &Collection) -> Result<()> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO collections (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            collection.id,
            collection.name,
            collection.description,
            collection.created_at.to_rfc3339(),
        ])
        .map_err(|e| Error::Database(e.to_string()))?;
        debug!(collection_id = %collection.id, "collection created");
        Ok(())
    }

    fn get_collection(&self, id: &str) -> Result<Option<Collection>> {
        let conn = self.conn.lock();
        let result = conn
            .prepare_cached("SELECT * FROM collections WHERE id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![id], Self::row_to_collection)
            .optional()
            .map_err(|e| Error::Database(e.to_string()));
        result
    }

    fn list_collections(&self) -> Result<Vec<Collection>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM collections ORDER BY rowid")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_collection)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))
    }

    fn delete_collection(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM collections WHERE id = ?1", params![id])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count > 0)
    }

    fn add_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        for chunk in chunks {
            if !Self::collection_exists(&tx, &chunk.collection_id)? {
                return Err(Error::CollectionNotFound(chunk.collection_id.clone()));
            }
            let heading_json = serde_json::to_string(&chunk.heading_path)?;
            let blob = (!chunk.embedding.is_empty()).then(|| encode_f32(&chunk.embedding));
            tx.prepare_cached(
                "INSERT OR REPLACE INTO chunks \
                 (id, collection_id, document_id, position, heading_path_json, text, embedding) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .execute(params![
                chunk.id,
                chunk.collection_id,
                chunk.document_id,
                chunk.position,
                heading_json,
                chunk.text,
                blob,
            ])
            .map_err(|e| Error::Database(e.to_string()))?;
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    fn load_chunks(&self, ids: &[String]) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM chunks WHERE id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(chunk) = stmt
                .query_row(params![id], Self::row_to_chunk)
                .optional()
                .map_err(|e| Error::Database(e.to_string()))?
            {
                out.push(chunk);
            }
        }
        Ok(out)
    }

    fn chunks_for_collection(&self, collection_id: &str) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT * FROM chunks WHERE collection_id = ?1 \
                 ORDER BY document_id, position, rowid",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![collection_id], Self::row_to_chunk)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))
    }

    fn save_flashcard(&self, card: &Flashcard) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        if !Self::collection_exists(&tx, &card.collection_id)? {
            return Err(Error::CollectionNotFound(card.collection_id.clone()));
        }
        tx.execute(
            "INSERT INTO flashcards (id, collection_id, question, answer, difficulty, style, \
             tags_json, source_chunk_ids_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                card.id,
                card.collection_id,
                card.question,
                card.answer,
                card.difficulty.as_str(),
                card.style.as_str(),
                serde_json::to_string(&card.tags)?,
                serde_json::to_string(&card.source_chunk_ids)?,
                card.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        let r = &card.review;
        tx.execute(
            "INSERT INTO review_states (card_id, repetition_count, easiness_factor, interval_days, \
             due_date, last_quality, review_count, correct_count, last_reviewed) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                card.id,
                r.repetition_count,
                r.easiness_factor,
                r.interval_days,
                format_date(r.due_date),
                r.last_quality,
                r.review_count,
                r.correct_count,
                r.last_reviewed.map(format_date),
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    fn get_flashcard(&self, id: &str) -> Result<Option<Flashcard>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {FLASHCARD_COLUMNS} FROM flashcards f \
             JOIN review_states r ON r.card_id = f.id WHERE f.id = ?1"
        );
        let result = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![id], Self::row_to_flashcard)
            .optional()
            .map_err(|e| Error::Database(e.to_string()));
        result
    }

    fn list_flashcards(&self, collection_id: &str) -> Result<Vec<Flashcard>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {FLASHCARD_COLUMNS} FROM flashcards f \
             JOIN review_states r ON r.card_id = f.id \
             WHERE f.collection_id = ?1 ORDER BY f.rowid"
        );
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![collection_id], Self::row_to_flashcard)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))
    }

    fn delete_flashcard(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM flashcards WHERE id = ?1", params![id])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count > 0)
    }

    fn load_review_state(&self, card_id: &str) -> Result<ReviewState> {
        let conn = self.conn.lock();
        let result = conn
            .prepare_cached("SELECT * FROM review_states WHERE card_id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![card_id], Self::row_to_review)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?
            .ok_or_else(|| Error::NotFound(format!("flashcard {card_id}")));
        result
    }

    fn save_review_state(&self, card_id: &str, state: &ReviewState) -> Result<()> {
        let conn = self.conn.lock();
        let count = conn
            .prepare_cached(
                "UPDATE review_states SET repetition_count = ?2, easiness_factor = ?3, \
                 interval_days = ?4, due_date = ?5, last_quality = ?6, review_count = ?7, \
                 correct_count = ?8, last_reviewed = ?9 WHERE card_id = ?1",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .execute(params![
                card_id,
                state.repetition_count,
                state.easiness_factor,
                state.interval_days,
                format_date(state.due_date),
                state.last_quality,
                state.review_count,
                state.correct_count,
                state.last_reviewed.map(format_date),
            ])
            .map_err(|e| Error::Database(e.to_string()))?;
        if count == 0 {
            return Err(Error::NotFound(format!("flashcard {card_id}")));
        }
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock();
        let count = |sql: &str| -> Result<i64> {
            conn.query_row(sql, [], |row| row.get(0))
                .map_err(|e| Error::Database(e.to_string()))
        };
        let stats = StoreStats {
            total_collections: count("SELECT COUNT(*) FROM collections")?,
            total_chunks: count("SELECT COUNT(*) FROM chunks")?,
            total_flashcards: count("SELECT COUNT(*) FROM flashcards")?,
            reviewed_flashcards: count(
                "SELECT COUNT(*) FROM review_states WHERE last_quality IS NOT NULL",
            )?,
            db_path: self
                .db_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            db_size_mb: self
                .db_path
                .as_ref()
                .and_then(|p| std::fs::metadata(p).ok())
                .map(|m| m.len() as f64 / (1024.0 * 1024.0))
                .unwrap_or(0.0),
        };
        Ok(stats)
    }
}
