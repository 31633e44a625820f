//! Recall Infer: embedding backends and the query embedding cache.
//!
//! `RemoteEmbedder` talks to an OpenAI-compatible or Gemini embeddings
//! endpoint. Without credentials `NoopEmbedder` is used and every embed call
//! fails with `EmbeddingUnavailable`, so retrieval reports the outage instead
//! of returning degraded results.

pub mod cache;
pub mod embedder;
pub mod remote;

pub use cache::{CachedEmbedder, QueryCache};
pub use embedder::{Embedder, NoopEmbedder};
pub use remote::{EmbedProvider, EmbedderConfig, RemoteEmbedder};

use std::sync::Arc;

/// Create the best available embedder for the given configuration.
pub fn create_embedder(config: &EmbedderConfig) -> Arc<dyn Embedder> {
    match RemoteEmbedder::new(config.clone()) {
        Ok(embedder) => {
            tracing::info!(
                "Using {} embedder (model={}, dim={})",
                config.provider,
                config.model,
                config.dimension
            );
            Arc::new(embedder)
        }
        Err(e) => {
            tracing::warn!("Remote embedder unavailable: {}. Retrieval is disabled.", e);
            Arc::new(NoopEmbedder::new(config.dimension))
        }
    }
}
