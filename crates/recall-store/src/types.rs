//! Store-level data types.

use serde::{Deserialize, Serialize};

/// Store-level statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_collections: i64,
    pub total_chunks: i64,
    pub total_flashcards: i64,
    pub reviewed_flashcards: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
    pub db_size_mb: f64,
}
