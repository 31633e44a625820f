//! Similarity retrieval over a collection's chunks.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;
use recall_core::Error;
use recall_retrieve::{build_context, ContextBudget};

/// Largest `k` a caller may ask for.
const MAX_K: usize = 50;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/retrieve", post(retrieve))
}

fn default_k() -> usize {
    5
}

#[derive(Deserialize)]
struct RetrieveRequest {
    collection_id: String,
    query: String,
    #[serde(default = "default_k")]
    k: usize,
    #[serde(default)]
    include_context: bool,
}

/// POST /api/retrieve
async fn retrieve(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RetrieveRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.query.trim().is_empty() {
        return Err(Error::InvalidInput("query must not be empty".into()).into());
    }
    if req.k > MAX_K {
        return Err(Error::InvalidInput(format!("k must be at most {MAX_K}, got {}", req.k)).into());
    }

    let result = state
        .retriever
        .retrieve(&req.collection_id, &req.query, req.k)
        .await?;
    let context = req
        .include_context
        .then(|| build_context(&result, ContextBudget::default()));

    Ok(Json(serde_json::json!({
        "collectionId": req.collection_id,
        "query": req.query,
        "total": result.len(),
        "hits": result.hits,
        "context": context,
    })))
}
