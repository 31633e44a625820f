//! Quiz routes: start a session, check answers, inspect or abandon sessions.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;
use recall_core::{CardStyle, Difficulty, Error, Flashcard};
use recall_quiz::{AnswerOutcome, SessionView, Strategy};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quiz/start", post(start_quiz))
        .route("/quiz/check", post(check_answer))
        .route(
            "/quiz/sessions/{id}",
            get(get_session).delete(delete_session),
        )
}

fn default_count() -> usize {
    10
}

fn default_strategy() -> String {
    Strategy::default().as_str().into()
}

#[derive(Deserialize)]
struct StartQuizRequest {
    collection_id: String,
    #[serde(default = "default_count")]
    count: usize,
    #[serde(default = "default_strategy")]
    strategy: String,
    as_of: Option<NaiveDate>,
}

/// A card as shown to the learner; the answer stays server side.
#[derive(Serialize)]
struct QuizCard {
    id: String,
    question: String,
    difficulty: Difficulty,
    style: CardStyle,
    tags: Vec<String>,
}

impl From<Flashcard> for QuizCard {
    fn from(card: Flashcard) -> Self {
        Self {
            id: card.id,
            question: card.question,
            difficulty: card.difficulty,
            style: card.style,
            tags: card.tags,
        }
    }
}

/// POST /api/quiz/start
async fn start_quiz(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartQuizRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let strategy: Strategy = req.strategy.parse()?;
    let as_of = req.as_of.unwrap_or_else(|| state.scheduler.today());
    let session = state
        .quiz
        .start(&req.collection_id, req.count, strategy, as_of)?;

    let mut cards = Vec::with_capacity(session.len());
    for id in &session.card_ids {
        if let Some(card) = state.store.get_flashcard(id)? {
            cards.push(QuizCard::from(card));
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "sessionId": session.id,
            "collectionId": session.collection_id,
            "strategy": strategy,
            "total": cards.len(),
            "cards": cards,
        })),
    ))
}

#[derive(Deserialize)]
struct CheckAnswerRequest {
    session_id: String,
    card_id: String,
    user_answer: String,
    #[serde(default)]
    strict: bool,
}

/// POST /api/quiz/check
async fn check_answer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckAnswerRequest>,
) -> ApiResult<Json<AnswerOutcome>> {
    let outcome = state
        .quiz
        .check_answer(&req.session_id, &req.card_id, &req.user_answer, req.strict)
        .await?;
    Ok(Json(outcome))
}

/// GET /api/quiz/sessions/{id}
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionView>> {
    Ok(Json(state.quiz.session(&id)?.view()))
}

/// DELETE /api/quiz/sessions/{id}
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !state.quiz.sessions().remove(&id) {
        return Err(Error::NotFound(format!("quiz session {id}")).into());
    }
    Ok(StatusCode::NO_CONTENT)
}
