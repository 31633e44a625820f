//! Review routes: due cards, statistics, workload forecast, direct grading.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;
use recall_core::ReviewState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/review/{collection_id}/due", get(get_due))
        .route("/review/{collection_id}/stats", get(get_stats))
        .route("/review/{collection_id}/schedule", get(get_schedule))
        .route("/review/cards/{card_id}", post(review_card))
}

#[derive(Deserialize)]
struct AsOfQuery {
    as_of: Option<NaiveDate>,
}

fn default_days_ahead() -> u32 {
    7
}

#[derive(Deserialize)]
struct ScheduleQuery {
    from: Option<NaiveDate>,
    #[serde(default = "default_days_ahead")]
    days_ahead: u32,
}

/// GET /api/review/{collection_id}/due
async fn get_due(
    State(state): State<Arc<AppState>>,
    Path(collection_id): Path<String>,
    Query(q): Query<AsOfQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let as_of = q.as_of.unwrap_or_else(|| state.scheduler.today());
    let cards = state.scheduler.due_flashcards(&collection_id, as_of)?;
    Ok(Json(serde_json::json!({
        "collectionId": collection_id,
        "asOf": as_of,
        "total": cards.len(),
        "flashcards": cards,
    })))
}

/// GET /api/review/{collection_id}/stats
async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(collection_id): Path<String>,
    Query(q): Query<AsOfQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let as_of = q.as_of.unwrap_or_else(|| state.scheduler.today());
    let stats = state.scheduler.review_stats(&collection_id, as_of)?;
    Ok(Json(serde_json::json!({
        "collectionId": collection_id,
        "asOf": as_of,
        "stats": stats,
    })))
}

/// GET /api/review/{collection_id}/schedule: upcoming review workload.
async fn get_schedule(
    State(state): State<Arc<AppState>>,
    Path(collection_id): Path<String>,
    Query(q): Query<ScheduleQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let from = q.from.unwrap_or_else(|| state.scheduler.today());
    let forecast = state.scheduler.forecast(&collection_id, from, q.days_ahead)?;
    Ok(Json(serde_json::json!({
        "collectionId": collection_id,
        "forecast": forecast,
    })))
}

#[derive(Deserialize)]
struct ReviewRequest {
    quality: i64,
}

/// POST /api/review/cards/{card_id}: record a self-graded review.
async fn review_card(
    State(state): State<Arc<AppState>>,
    Path(card_id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> ApiResult<Json<ReviewState>> {
    Ok(Json(state.scheduler.update(&card_id, req.quality)?))
}
