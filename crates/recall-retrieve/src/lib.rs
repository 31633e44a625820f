//! Recall Retrieve: per-collection vector indexes and top-K chunk retrieval.

pub mod context;
pub mod index;
pub mod registry;
pub mod retriever;

pub use context::{build_context, ContextBudget};
pub use index::{ScoredId, VectorIndex};
pub use registry::IndexRegistry;
pub use retriever::{RetrievalResult, RetrievedChunk, Retriever};
