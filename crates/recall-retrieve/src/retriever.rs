//! Top-K chunk retrieval for a collection.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::registry::IndexRegistry;
use recall_core::{with_deadline, Chunk, Error, Result};
use recall_infer::Embedder;
use recall_store::Store;

/// A retrieved chunk with its similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Retrieved chunks, best first, at most `k` long.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn chunk_ids(&self) -> Vec<String> {
        self.hits.iter().map(|h| h.chunk.id.clone()).collect()
    }
}

pub struct Retriever {
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    registry: Arc<IndexRegistry>,
    embed_timeout: Duration,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        registry: Arc<IndexRegistry>,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            store,
            embedder,
            registry,
            embed_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.registry
    }

    /// The `k` chunks of `collection_id` most similar to `query`.
    pub async fn retrieve(
        &self,
        collection_id: &str,
        query: &str,
        k: usize,
    ) -> Result<RetrievalResult> {
        let index = self
            .registry
            .get(collection_id)
            .ok_or_else(|| Error::CollectionNotFound(collection_id.to_string()))?;
        if k == 0 {
            return Ok(RetrievalResult::default());
        }

        let vector = with_deadline("embed", self.embed_timeout, self.embedder.embed(query)).await?;
        let scored = index.search(&vector, k)?;
        if scored.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let ids: Vec<String> = scored.iter().map(|s| s.chunk_id.clone()).collect();
        let mut chunks: std::collections::HashMap<String, Chunk> = self
            .store
            .load_chunks(&ids)?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        let mut hits = Vec::with_capacity(scored.len());
        for s in scored {
            match chunks.remove(&s.chunk_id) {
                Some(chunk) if chunk.collection_id == collection_id => hits.push(RetrievedChunk {
                    chunk,
                    score: s.score,
                }),
                Some(chunk) => warn!(
                    collection_id,
                    chunk_id = %s.chunk_id,
                    owner = %chunk.collection_id,
                    "indexed chunk belongs to another collection"
                ),
                None => warn!(
                    collection_id,
                    chunk_id = %s.chunk_id,
                    "indexed chunk missing from storage"
                ),
            }
        }
        debug!(collection_id, k, returned = hits.len(), "retrieved chunks");
        Ok(RetrievalResult { hits })
    }

    /// Embed chunks that carry no vector, persist them, and add them to the
    /// collection's index.
    ///
    /// Vectors are checked for dimension and finiteness before anything is
    /// written, and the storage write and index insert happen under the
    /// index's write guard, so a rejected batch leaves both untouched. A chunk
    /// id already stored under another collection is rejected.
    pub async fn index_chunks(&self, collection_id: &str, mut chunks: Vec<Chunk>) -> Result<usize> {
        if self.store.get_collection(collection_id)?.is_none() {
            return Err(Error::CollectionNotFound(collection_id.to_string()));
        }
        if chunks.is_empty() {
            return Ok(0);
        }
        if let Some(c) = chunks.iter().find(|c| c.collection_id != collection_id) {
            return Err(Error::InvalidInput(format!(
                "chunk {} belongs to collection {}",
                c.id, c.collection_id
            )));
        }

        let missing: Vec<usize> = (0..chunks.len())
            .filter(|&i| chunks[i].embedding.is_empty())
            .collect();
        if !missing.is_empty() {
            let texts: Vec<String> = missing.iter().map(|&i| chunks[i].text.clone()).collect();
            let vectors = with_deadline(
                "embed",
                self.embed_timeout,
                self.embedder.embed_batch(&texts),
            )
            .await?;
            if vectors.len() != texts.len() {
                return Err(Error::EmbeddingUnavailable(format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    vectors.len()
                )));
            }
            for (i, vector) in missing.into_iter().zip(vectors) {
                chunks[i].embedding = vector;
            }
        }

        let index = self.registry.get_or_create(collection_id);
        let batch: Vec<(&str, &[f32])> = chunks
            .iter()
            .map(|c| (c.id.as_str(), c.embedding.as_slice()))
            .collect();
        index.add_batch(&batch, || {
            self.check_not_foreign(collection_id, &chunks)?;
            self.store.add_chunks(&chunks)
        })?;
        info!(
            collection_id,
            added = chunks.len(),
            index_size = index.size(),
            "indexed chunks"
        );
        Ok(chunks.len())
    }

    fn check_not_foreign(&self, collection_id: &str, chunks: &[Chunk]) -> Result<()> {
        let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        match self
            .store
            .load_chunks(&ids)?
            .into_iter()
            .find(|stored| stored.collection_id != collection_id)
        {
            Some(stored) => Err(Error::InvalidInput(format!(
                "chunk id {} is already used by collection {}",
                stored.id, stored.collection_id
            ))),
            None => Ok(()),
        }
    }
}
