//! Health and readiness routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;
use recall_llm::Generator;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(get_health))
        .route("/health/live", get(get_live))
        .route("/health/ready", get(get_ready))
}

/// GET /api/health: service status and collaborator availability.
async fn get_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let stats = state.store.stats().ok();
    Json(serde_json::json!({
        "status": "healthy",
        "service": "recall",
        "version": env!("CARGO_PKG_VERSION"),
        "today": state.clock.today(),
        "embedder": {
            "model": state.embedder.model_name(),
            "dimension": state.embedder.dimension(),
            "available": state.embedder.is_available(),
        },
        "generator": {
            "backend": state.generator.describe(),
            "available": state.generator.is_available(),
        },
        "indexes": state.registry.len(),
        "activeSessions": state.quiz.sessions().len(),
        "store": stats,
    }))
}

/// GET /api/health/live
async fn get_live() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "alive" }))
}

/// GET /api/health/ready: ready once storage answers.
async fn get_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.stats() {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ready" })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not_ready", "error": e.to_string() })),
        ),
    }
}
