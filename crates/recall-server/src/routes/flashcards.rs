//! Flashcard routes: generation, deletion, interval preview.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiResult;
use crate::state::AppState;
use recall_core::{CardStyle, Error};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate/flashcards", post(generate_flashcards))
        .route("/flashcards/{id}", delete(delete_flashcard))
        .route("/flashcards/{id}/preview", get(preview_intervals))
}

fn default_n_cards() -> usize {
    5
}

fn default_style() -> String {
    "basic".into()
}

#[derive(Deserialize)]
struct GenerateRequest {
    collection_id: String,
    #[serde(default = "default_n_cards")]
    n_cards: usize,
    #[serde(default = "default_style")]
    style: String,
}

/// POST /api/generate/flashcards
async fn generate_flashcards(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let style: CardStyle = req.style.parse()?;
    let cards = state
        .flashcards
        .generate(&req.collection_id, req.n_cards, style)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "collectionId": req.collection_id,
            "count": cards.len(),
            "flashcards": cards,
        })),
    ))
}

/// DELETE /api/flashcards/{id}
async fn delete_flashcard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !state.store.delete_flashcard(&id)? {
        return Err(Error::NotFound(format!("flashcard {id}")).into());
    }
    state.scheduler.forget(&id);
    info!(card_id = %id, "flashcard deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/flashcards/{id}/preview: next interval per answer quality.
async fn preview_intervals(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let options = state.scheduler.preview(&id)?;
    Ok(Json(serde_json::json!({
        "cardId": id,
        "today": state.scheduler.today(),
        "options": options,
    })))
}
