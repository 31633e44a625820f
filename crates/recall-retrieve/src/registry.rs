//! Concurrent map of collection id to its [`VectorIndex`].

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::index::VectorIndex;
use recall_core::Result;
use recall_store::Store;

#[derive(Default)]
pub struct IndexRegistry {
    indexes: DashMap<String, Arc<VectorIndex>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, collection_id: &str) -> Option<Arc<VectorIndex>> {
        self.indexes.get(collection_id).map(|r| r.value().clone())
    }

    pub fn get_or_create(&self, collection_id: &str) -> Arc<VectorIndex> {
        self.indexes
            .entry(collection_id.to_string())
            .or_insert_with(|| Arc::new(VectorIndex::new()))
            .value()
            .clone()
    }

    /// Forget a collection's index. Returns false if none was registered.
    pub fn drop_collection(&self, collection_id: &str) -> bool {
        self.indexes.remove(collection_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Rebuild one collection's index from its stored chunks, replacing any
    /// existing index. Chunks without an embedding are skipped.
    pub fn rebuild(&self, store: &dyn Store, collection_id: &str) -> Result<usize> {
        let index = Arc::new(VectorIndex::new());
        let mut skipped = 0usize;
        for chunk in store.chunks_for_collection(collection_id)? {
            if chunk.embedding.is_empty() {
                skipped += 1;
                continue;
            }
            if let Err(e) = index.add(&chunk.id, &chunk.embedding) {
                warn!(chunk_id = %chunk.id, "skipping chunk during index rebuild: {}", e);
                skipped += 1;
            }
        }
        let size = index.size();
        self.indexes.insert(collection_id.to_string(), index);
        info!(
            collection_id,
            indexed = size,
            skipped,
            "rebuilt vector index"
        );
        Ok(size)
    }

    /// Rebuild the index of every stored collection. Returns the number of
    /// collections loaded.
    pub fn warm_up(&self, store: &dyn Store) -> Result<usize> {
        let collections = store.list_collections()?;
        for collection in &collections {
            self.rebuild(store, &collection.id)?;
        }
        Ok(collections.len())
    }
}
