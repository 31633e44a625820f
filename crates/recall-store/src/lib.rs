//! Recall Store: persistence of collections, chunks, flashcards and review state.

pub mod embedding;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod store;
pub mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::Store;
pub use types::*;
