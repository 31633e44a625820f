//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use recall_core::{Clock, RecallConfig};
use recall_infer::Embedder;
use recall_llm::{Generator, LLMConfig, ReloadableGenerator};
use recall_quiz::{FlashcardGenerator, GradingAdjudicator, QuizSelector, SessionManager};
use recall_retrieve::{IndexRegistry, Retriever};
use recall_review::ReviewScheduler;
use recall_store::Store;

/// How often expired quiz sessions are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: RecallConfig,
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<ReloadableGenerator>,
    pub llm_config: RwLock<LLMConfig>,
    pub registry: Arc<IndexRegistry>,
    pub retriever: Arc<Retriever>,
    pub scheduler: Arc<ReviewScheduler>,
    pub quiz: QuizSelector,
    pub flashcards: FlashcardGenerator,
}

impl AppState {
    /// Wire the core components together. `registry` should already hold the
    /// indexes of stored collections.
    pub fn new(
        config: RecallConfig,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        llm_config: LLMConfig,
        registry: Arc<IndexRegistry>,
    ) -> Self {
        let generator = Arc::new(ReloadableGenerator::new(generator));

        let retriever = Arc::new(Retriever::new(
            store.clone(),
            embedder.clone(),
            registry.clone(),
            config.embed_timeout(),
        ));
        let scheduler = Arc::new(ReviewScheduler::new(store.clone(), clock.clone()));
        let adjudicator = Arc::new(GradingAdjudicator::new(
            generator.clone(),
            config.grading,
            config.generate_timeout(),
        ));
        let sessions = Arc::new(SessionManager::new(
            config.max_sessions,
            config.session_ttl_minutes,
        ));
        let quiz = QuizSelector::new(
            store.clone(),
            scheduler.clone(),
            adjudicator,
            sessions,
            config.max_quiz_count,
        );
        let flashcards = FlashcardGenerator::new(
            store.clone(),
            retriever.clone(),
            generator.clone(),
            clock.clone(),
            config.generate_timeout(),
            config.max_generated_cards,
        );

        Self {
            config,
            store,
            clock,
            embedder,
            generator,
            llm_config: RwLock::new(llm_config),
            registry,
            retriever,
            scheduler,
            quiz,
            flashcards,
        }
    }
}

/// Periodically drop idle quiz sessions.
pub fn start_session_sweeper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            state.quiz.sessions().purge_expired();
        }
    });
}
