//! LLM provider configuration routes.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::ApiResult;
use crate::state::AppState;
use recall_core::Error;
use recall_llm::{create_generator, LLMConfigResponse, LLMConfigUpdate};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/llm/config", get(get_config).put(update_config))
}

/// GET /api/llm/config: provider settings, never the keys.
async fn get_config(State(state): State<Arc<AppState>>) -> Json<LLMConfigResponse> {
    Json(state.llm_config.read().to_response())
}

/// PUT /api/llm/config: update, persist, and swap the active generator.
async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<LLMConfigUpdate>,
) -> ApiResult<Json<LLMConfigResponse>> {
    let mut config = state.llm_config.write();
    config.apply_update(&update);
    config.save().map_err(Error::from)?;
    state.generator.replace(create_generator(&config));
    Ok(Json(config.to_response()))
}
