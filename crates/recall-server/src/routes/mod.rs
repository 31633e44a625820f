//! HTTP route handlers.

pub mod collections;
pub mod flashcards;
pub mod health;
pub mod llm;
pub mod quiz;
pub mod retrieve;
pub mod review;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::routes())
        .merge(collections::routes())
        .merge(flashcards::routes())
        .merge(retrieve::routes())
        .merge(review::routes())
        .merge(quiz::routes())
        .merge(llm::routes())
}
