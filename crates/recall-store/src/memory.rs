//! In-memory [`Store`] implementation for tests and ephemeral servers.
//!
//! Vectors and maps behind `parking_lot::RwLock`. Insertion order of the
//! backing vectors is the creation order reported by the listing methods.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::store::Store;
use crate::types::StoreStats;
use recall_core::{Chunk, Collection, Error, Flashcard, Result, ReviewState};

#[derive(Default)]
struct Inner {
    collections: Vec<Collection>,
    chunks: Vec<Chunk>,
    flashcards: Vec<Flashcard>,
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn has_collection(&self, id: &str) -> bool {
        self.collections.iter().any(|c| c.id == id)
    }

    fn card_mut(&mut self, id: &str) -> Option<&mut Flashcard> {
        self.flashcards.iter_mut().find(|c| c.id == id)
    }
}

impl Store for MemoryStore {
    fn create_collection(&self, collection: &Collection) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.has_collection(&collection.id) {
            return Err(Error::InvalidInput(format!(
                "collection {} already exists",
                collection.id
            )));
        }
        inner.collections.push(collection.clone());
        Ok(())
    }

    fn get_collection(&self, id: &str) -> Result<Option<Collection>> {
        let inner = self.inner.read();
        Ok(inner.collections.iter().find(|c| c.id == id).cloned())
    }

    fn list_collections(&self) -> Result<Vec<Collection>> {
        Ok(self.inner.read().collections.clone())
    }

    fn delete_collection(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write();
        let before = inner.collections.len();
        inner.collections.retain(|c| c.id != id);
        if inner.collections.len() == before {
            return Ok(false);
        }
        inner.chunks.retain(|c| c.collection_id != id);
        inner.flashcards.retain(|c| c.collection_id != id);
        Ok(true)
    }

    fn add_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(orphan) = chunks.iter().find(|c| !inner.has_collection(&c.collection_id)) {
            return Err(Error::CollectionNotFound(orphan.collection_id.clone()));
        }
        for chunk in chunks {
            match inner.chunks.iter().position(|c| c.id == chunk.id) {
                Some(idx) => inner.chunks[idx] = chunk.clone(),
                None => inner.chunks.push(chunk.clone()),
            }
        }
        Ok(())
    }

    fn load_chunks(&self, ids: &[String]) -> Result<Vec<Chunk>> {
        let inner = self.inner.read();
        let by_id: HashMap<&str, &Chunk> =
            inner.chunks.iter().map(|c| (c.id.as_str(), c)).collect();
        Ok(ids
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).map(|c| (*c).clone()))
            .collect())
    }

    fn chunks_for_collection(&self, collection_id: &str) -> Result<Vec<Chunk>> {
        let inner = self.inner.read();
        let mut chunks: Vec<Chunk> = inner
            .chunks
            .iter()
            .filter(|c| c.collection_id == collection_id)
            .cloned()
            .collect();
        chunks.sort_by(|a, b| {
            a.document_id
                .cmp(&b.document_id)
                .then(a.position.cmp(&b.position))
        });
        Ok(chunks)
    }

    fn save_flashcard(&self, card: &Flashcard) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.has_collection(&card.collection_id) {
            return Err(Error::CollectionNotFound(card.collection_id.clone()));
        }
        if inner.card_mut(&card.id).is_some() {
            return Err(Error::InvalidInput(format!(
                "flashcard {} already exists",
                card.id
            )));
        }
        inner.flashcards.push(card.clone());
        Ok(())
    }

    fn get_flashcard(&self, id: &str) -> Result<Option<Flashcard>> {
        let inner = self.inner.read();
        Ok(inner.flashcards.iter().find(|c| c.id == id).cloned())
    }

    fn list_flashcards(&self, collection_id: &str) -> Result<Vec<Flashcard>> {
        let inner = self.inner.read();
        Ok(inner
            .flashcards
            .iter()
            .filter(|c| c.collection_id == collection_id)
            .cloned()
            .collect())
    }

    fn delete_flashcard(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write();
        let before = inner.flashcards.len();
        inner.flashcards.retain(|c| c.id != id);
        Ok(inner.flashcards.len() != before)
    }

    fn load_review_state(&self, card_id: &str) -> Result<ReviewState> {
        let inner = self.inner.read();
        inner
            .flashcards
            .iter()
            .find(|c| c.id == card_id)
            .map(|c| c.review.clone())
            .ok_or_else(|| Error::NotFound(format!("flashcard {card_id}")))
    }

    fn save_review_state(&self, card_id: &str, state: &ReviewState) -> Result<()> {
        let mut inner = self.inner.write();
        let card = inner
            .card_mut(card_id)
            .ok_or_else(|| Error::NotFound(format!("flashcard {card_id}")))?;
        card.review = state.clone();
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats> {
        let inner = self.inner.read();
        Ok(StoreStats {
            total_collections: inner.collections.len() as i64,
            total_chunks: inner.chunks.len() as i64,
            total_flashcards: inner.flashcards.len() as i64,
            reviewed_flashcards: inner
                .flashcards
                .iter()
                .filter(|c| !c.review.is_new())
                .count() as i64,
            db_path: None,
            db_size_mb: 0.0,
        })
    }
}
