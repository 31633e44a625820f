//! Collection routes: create, list, delete, add chunks, list flashcards.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiResult;
use crate::state::AppState;
use recall_core::{Chunk, Collection, Error, Flashcard};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/collections", post(create_collection).get(list_collections))
        .route(
            "/collections/{id}",
            get(get_collection).delete(delete_collection),
        )
        .route("/collections/{id}/chunks", post(add_chunks))
        .route("/collections/{id}/flashcards", get(list_flashcards))
}

#[derive(Deserialize)]
struct CreateCollectionRequest {
    name: String,
    description: Option<String>,
}

/// POST /api/collections
async fn create_collection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCollectionRequest>,
) -> ApiResult<(StatusCode, Json<Collection>)> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("collection name must not be empty".into()).into());
    }
    let collection = Collection::new(name, req.description.filter(|d| !d.trim().is_empty()));
    state.store.create_collection(&collection)?;
    // Retrieval on a fresh collection returns nothing rather than failing.
    state.registry.get_or_create(&collection.id);
    info!(collection_id = %collection.id, name = %collection.name, "collection created");
    Ok((StatusCode::CREATED, Json(collection)))
}

/// GET /api/collections
async fn list_collections(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    let collections = state.store.list_collections()?;
    Ok(Json(serde_json::json!({
        "total": collections.len(),
        "collections": collections,
    })))
}

/// GET /api/collections/{id}
async fn get_collection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let collection = state
        .store
        .get_collection(&id)?
        .ok_or_else(|| Error::CollectionNotFound(id.clone()))?;
    let indexed_chunks = state.registry.get(&id).map(|i| i.size()).unwrap_or(0);
    let flashcards = state.store.list_flashcards(&id)?.len();
    Ok(Json(serde_json::json!({
        "collection": collection,
        "indexedChunks": indexed_chunks,
        "flashcards": flashcards,
    })))
}

/// DELETE /api/collections/{id}: removes chunks, flashcards and the index.
async fn delete_collection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let cards = state.store.list_flashcards(&id)?;
    if !state.store.delete_collection(&id)? {
        return Err(Error::CollectionNotFound(id).into());
    }
    for card in &cards {
        state.scheduler.forget(&card.id);
    }
    state.registry.drop_collection(&id);
    info!(collection_id = %id, flashcards = cards.len(), "collection deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct ChunkInput {
    id: Option<String>,
    document_id: String,
    #[serde(default)]
    position: u32,
    #[serde(default)]
    heading_path: Vec<String>,
    text: String,
    /// Precomputed embedding; embedded on arrival when absent.
    #[serde(default)]
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct AddChunksRequest {
    chunks: Vec<ChunkInput>,
}

/// POST /api/collections/{id}/chunks: store, embed and index chunks.
async fn add_chunks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddChunksRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let mut chunks = Vec::with_capacity(req.chunks.len());
    for input in req.chunks {
        if input.text.trim().is_empty() {
            return Err(Error::InvalidInput("chunk text must not be empty".into()).into());
        }
        chunks.push(Chunk {
            id: input
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            collection_id: id.clone(),
            document_id: input.document_id,
            position: input.position,
            heading_path: input.heading_path,
            text: input.text,
            embedding: input.embedding,
        });
    }
    let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
    let added = state.retriever.index_chunks(&id, chunks).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "added": added,
            "chunkIds": ids,
        })),
    ))
}

/// GET /api/collections/{id}/flashcards
async fn list_flashcards(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if state.store.get_collection(&id)?.is_none() {
        return Err(Error::CollectionNotFound(id).into());
    }
    let flashcards: Vec<Flashcard> = state.store.list_flashcards(&id)?;
    Ok(Json(serde_json::json!({
        "collectionId": id,
        "total": flashcards.len(),
        "flashcards": flashcards,
    })))
}
