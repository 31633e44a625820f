//! HTTP API tests: drive the router in-process with an in-memory store and
//! scripted collaborators, checking status codes and response shapes.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use tower::ServiceExt;

use recall_core::{Collection, FixedClock, Flashcard, RecallConfig, Result};
use recall_infer::Embedder;
use recall_llm::{Generator, LLMConfig};
use recall_retrieve::IndexRegistry;
use recall_server::{build_router, AppState};
use recall_store::{MemoryStore, Store};

/// Three-dimensional bag of topic words.
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_lowercase();
        let hit = |w: &str| if text.contains(w) { 1.0 } else { 0.0 };
        Ok(vec![hit("plant"), hit("river"), 0.1])
    }

    fn dimension(&self) -> usize {
        3
    }

    fn model_name(&self) -> &str {
        "keyword"
    }
}

/// Grades every answer correct with quality 5.
struct ApprovingGenerator;

#[async_trait]
impl Generator for ApprovingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(r#"{"verdict": "correct", "quality": 5, "score": 1.0, "feedback": "Exactly right"}"#.into())
    }

    fn describe(&self) -> String {
        "approving".into()
    }
}

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
    collection_id: String,
    card_ids: Vec<String>,
    _dir: tempfile::TempDir,
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let collection = Collection::new("Geography", None);
    store.create_collection(&collection).unwrap();

    let mut card_ids = Vec::new();
    for (q, a) in [
        ("Longest river in Africa?", "The Nile"),
        ("Capital of Peru?", "Lima"),
    ] {
        let card = Flashcard::new(&collection.id, q, a, today());
        store.save_flashcard(&card).unwrap();
        card_ids.push(card.id);
    }

    let registry = Arc::new(IndexRegistry::new());
    registry.get_or_create(&collection.id);

    let state = Arc::new(AppState::new(
        RecallConfig::default(),
        store.clone(),
        Arc::new(FixedClock::new(today())),
        Arc::new(KeywordEmbedder),
        Arc::new(ApprovingGenerator),
        LLMConfig::load(&dir.path().join("llm-config.json")),
        registry,
    ));

    Harness {
        app: build_router(state),
        store,
        collection_id: collection.id,
        card_ids,
        _dir: dir,
    }
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_shape() {
    let h = harness();
    let (status, body) = send(&h.app, Method::GET, "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["today"], "2024-05-10");
    assert_eq!(body["embedder"]["dimension"], 3);
    assert_eq!(body["generator"]["backend"], "approving");
    assert!(body["activeSessions"].is_number());
    assert_eq!(body["store"]["total_flashcards"], 2);

    let (status, _) = send(&h.app, Method::GET, "/api/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_quiz_flow_and_double_answer_conflict() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        Method::POST,
        "/api/quiz/start",
        Some(serde_json::json!({ "collection_id": h.collection_id, "count": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["strategy"], "mixed");
    assert_eq!(body["total"], 2);
    let cards = body["cards"].as_array().unwrap();
    assert!(cards.iter().all(|c| c.get("answer").is_none()));
    assert!(cards.iter().all(|c| c["question"].is_string()));

    let session_id = body["sessionId"].as_str().unwrap().to_string();
    let card_id = cards[0]["id"].as_str().unwrap().to_string();
    let check = serde_json::json!({
        "session_id": session_id,
        "card_id": card_id,
        "user_answer": "the nile",
    });

    let (status, outcome) = send(&h.app, Method::POST, "/api/quiz/check", Some(check.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["verdict"], "correct");
    assert_eq!(outcome["quality"], 5);
    assert_eq!(outcome["review"]["interval_days"], 1);
    assert_eq!(outcome["progress"]["answered"], 1);

    let (status, err) = send(&h.app, Method::POST, "/api/quiz/check", Some(check)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["kind"], "already_answered");

    let stored = h.store.load_review_state(&card_id).unwrap();
    assert_eq!(stored.repetition_count, 1);
    assert_eq!(stored.review_count, 1);

    let (status, view) = send(
        &h.app,
        Method::GET,
        &format!("/api/quiz/sessions/{session_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["answers"].as_array().unwrap().len(), 1);

    let uri = format!("/api/quiz/sessions/{session_id}");
    let (status, _) = send(&h.app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&h.app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_collection_and_bad_requests() {
    let h = harness();

    let (status, err) = send(&h.app, Method::GET, "/api/review/missing/due", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["kind"], "collection_not_found");

    let (status, err) = send(
        &h.app,
        Method::POST,
        "/api/quiz/start",
        Some(serde_json::json!({ "collection_id": h.collection_id, "strategy": "hardest" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], "invalid_input");

    let (status, err) = send(
        &h.app,
        Method::POST,
        &format!("/api/review/cards/{}", h.card_ids[0]),
        Some(serde_json::json!({ "quality": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], "invalid_quality");
}

#[tokio::test]
async fn test_review_endpoints() {
    let h = harness();
    let (status, state) = send(
        &h.app,
        Method::POST,
        &format!("/api/review/cards/{}", h.card_ids[1]),
        Some(serde_json::json!({ "quality": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["due_date"], "2024-05-11");

    let base = format!("/api/review/{}", h.collection_id);
    let (status, due) = send(&h.app, Method::GET, &format!("{base}/due?as_of=2024-05-11"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(due["total"], 1);
    assert_eq!(due["flashcards"][0]["id"], h.card_ids[1].as_str());

    let (status, stats) = send(&h.app, Method::GET, &format!("{base}/stats"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["stats"]["total"], 2);
    assert_eq!(stats["stats"]["new"], 1);

    let (status, schedule) =
        send(&h.app, Method::GET, &format!("{base}/schedule?days_ahead=3"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(schedule["forecast"]["days"].as_array().unwrap().len(), 3);
    assert_eq!(schedule["forecast"]["total_cards"], 1);

    let (status, _) = send(&h.app, Method::GET, &format!("{base}/schedule?days_ahead=0"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chunks_and_retrieve() {
    let h = harness();
    let (status, added) = send(
        &h.app,
        Method::POST,
        &format!("/api/collections/{}/chunks", h.collection_id),
        Some(serde_json::json!({
            "chunks": [
                { "document_id": "atlas", "position": 0, "text": "The Nile is the longest river in Africa." },
                { "document_id": "atlas", "position": 1, "text": "Most plants grow toward light." },
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(added["added"], 2);

    let (status, body) = send(
        &h.app,
        Method::POST,
        "/api/retrieve",
        Some(serde_json::json!({
            "collection_id": h.collection_id,
            "query": "which river?",
            "k": 1,
            "include_context": true,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert!(body["hits"][0]["chunk"]["text"]
        .as_str()
        .unwrap()
        .contains("Nile"));
    assert!(body["context"].as_str().unwrap().contains("Nile"));

    let (status, err) = send(
        &h.app,
        Method::POST,
        "/api/retrieve",
        Some(serde_json::json!({ "collection_id": "missing", "query": "river" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["kind"], "collection_not_found");
}

#[tokio::test]
async fn test_chunk_id_reuse_across_collections_rejected() {
    let h = harness();
    let chunk = |text: &str| {
        serde_json::json!({
            "chunks": [{ "id": "shared", "document_id": "atlas", "text": text }]
        })
    };
    let (status, _) = send(
        &h.app,
        Method::POST,
        &format!("/api/collections/{}/chunks", h.collection_id),
        Some(chunk("The Nile is the longest river in Africa.")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, created) = send(
        &h.app,
        Method::POST,
        "/api/collections",
        Some(serde_json::json!({ "name": "Botany" })),
    )
    .await;
    let other = created["id"].as_str().unwrap().to_string();
    let (status, err) = send(
        &h.app,
        Method::POST,
        &format!("/api/collections/{other}/chunks"),
        Some(chunk("Most plants grow toward light.")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], "invalid_input");

    let (status, body) = send(
        &h.app,
        Method::POST,
        "/api/retrieve",
        Some(serde_json::json!({ "collection_id": h.collection_id, "query": "river", "k": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hits"][0]["chunk"]["collection_id"], h.collection_id.as_str());
    assert!(body["hits"][0]["chunk"]["text"]
        .as_str()
        .unwrap()
        .contains("Nile"));
}

#[tokio::test]
async fn test_collection_lifecycle() {
    let h = harness();
    let (status, created) = send(
        &h.app,
        Method::POST,
        "/api/collections",
        Some(serde_json::json!({ "name": "Chemistry", "description": "Acids and bases" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, list) = send(&h.app, Method::GET, "/api/collections", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 2);

    let (status, body) = send(&h.app, Method::GET, &format!("/api/collections/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["indexedChunks"], 0);

    // A new collection has no cards to quiz.
    let (status, err) = send(
        &h.app,
        Method::POST,
        "/api/quiz/start",
        Some(serde_json::json!({ "collection_id": id })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["kind"], "empty_collection");

    let (status, _) = send(&h.app, Method::DELETE, &format!("/api/collections/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&h.app, Method::GET, &format!("/api/collections/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_flashcard_and_preview() {
    let h = harness();
    let card = &h.card_ids[0];

    let (status, preview) =
        send(&h.app, Method::GET, &format!("/api/flashcards/{card}/preview"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["options"].as_array().unwrap().len(), 4);

    let (status, _) = send(&h.app, Method::DELETE, &format!("/api/flashcards/{card}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&h.app, Method::DELETE, &format!("/api/flashcards/{card}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = send(
        &h.app,
        Method::GET,
        &format!("/api/collections/{}/flashcards", h.collection_id),
        None,
    )
    .await;
    assert_eq!(listed["total"], 1);
}

#[tokio::test]
async fn test_llm_config_update_hides_keys() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        Method::PUT,
        "/api/llm/config",
        Some(serde_json::json!({
            "preferredProvider": "Groq",
            "groqApiKey": "gsk-test",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["preferredProvider"], "groq");
    assert_eq!(body["groqConfigured"], true);
    assert_eq!(body["activeProvider"], "groq");
    assert!(!body.to_string().contains("gsk-test"));

    let (status, body) = send(&h.app, Method::GET, "/api/llm/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["activeProvider"], "groq");
}
