//! Database schema SQL.

/// Collections and their chunks.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    collection_id TEXT NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
    document_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    heading_path_json TEXT NOT NULL DEFAULT '[]',
    text TEXT NOT NULL,
    embedding BLOB
);

CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection_id);
"#;

/// Flashcards and their 1:1 review state.
pub const FLASHCARD_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS flashcards (
    id TEXT PRIMARY KEY,
    collection_id TEXT NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    difficulty TEXT NOT NULL DEFAULT 'medium',
    style TEXT NOT NULL DEFAULT 'basic',
    tags_json TEXT NOT NULL DEFAULT '[]',
    source_chunk_ids_json TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_flashcards_collection ON flashcards(collection_id);

CREATE TABLE IF NOT EXISTS review_states (
    card_id TEXT PRIMARY KEY REFERENCES flashcards(id) ON DELETE CASCADE,
    repetition_count INTEGER NOT NULL DEFAULT 0,
    easiness_factor REAL NOT NULL DEFAULT 2.5,
    interval_days INTEGER NOT NULL DEFAULT 0,
    due_date TEXT NOT NULL,
    last_quality INTEGER,
    review_count INTEGER NOT NULL DEFAULT 0,
    correct_count INTEGER NOT NULL DEFAULT 0,
    last_reviewed TEXT
);

CREATE INDEX IF NOT EXISTS idx_review_due ON review_states(due_date);
"#;
