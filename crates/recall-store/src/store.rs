//! Storage abstraction shared by the scheduler, retriever and quiz engine.
//!
//! Implementations must be `Send + Sync`; every method is synchronous and
//! cheap enough to call from async handlers, as with the SQLite backend.

use recall_core::{Chunk, Collection, Flashcard, Result, ReviewState};

use crate::types::StoreStats;

/// Persistent storage for collections, chunks, flashcards and review state.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_collection`](Store::create_collection) | Insert a collection |
/// | [`add_chunks`](Store::add_chunks) | Insert or replace chunks with their embeddings |
/// | [`load_chunks`](Store::load_chunks) | Fetch chunks by id, in the order requested |
/// | [`save_flashcard`](Store::save_flashcard) | Insert a flashcard with its initial review state |
/// | [`list_flashcards`](Store::list_flashcards) | Flashcards of a collection in creation order |
/// | [`load_review_state`](Store::load_review_state) | Current SM-2 state of a card |
/// | [`save_review_state`](Store::save_review_state) | Overwrite the SM-2 state of a card |
pub trait Store: Send + Sync {
    fn create_collection(&self, collection: &Collection) -> Result<()>;

    fn get_collection(&self, id: &str) -> Result<Option<Collection>>;

    fn list_collections(&self) -> Result<Vec<Collection>>;

    /// Delete a collection with its chunks and flashcards. Returns false if absent.
    fn delete_collection(&self, id: &str) -> Result<bool>;

    /// Insert chunks (replacing any with the same id). The owning collection must exist.
    fn add_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Fetch chunks by id. Missing ids are omitted; the rest keep the requested order.
    fn load_chunks(&self, ids: &[String]) -> Result<Vec<Chunk>>;

    /// All chunks of a collection, ordered by document then position.
    fn chunks_for_collection(&self, collection_id: &str) -> Result<Vec<Chunk>>;

    /// Insert a new flashcard together with its review state.
    fn save_flashcard(&self, card: &Flashcard) -> Result<()>;

    fn get_flashcard(&self, id: &str) -> Result<Option<Flashcard>>;

    /// Flashcards of a collection in creation order.
    fn list_flashcards(&self, collection_id: &str) -> Result<Vec<Flashcard>>;

    fn delete_flashcard(&self, id: &str) -> Result<bool>;

    /// `NotFound` if the card does not exist.
    fn load_review_state(&self, card_id: &str) -> Result<ReviewState>;

    /// `NotFound` if the card does not exist.
    fn save_review_state(&self, card_id: &str, state: &ReviewState) -> Result<()>;

    fn stats(&self) -> Result<StoreStats>;
}
