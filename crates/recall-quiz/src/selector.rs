//! Quiz selection and answer checking.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::grading::{FollowUp, Grade, GradeSource, GradingAdjudicator, Verdict};
use crate::session::{AnswerRecord, QuizSession, SessionManager, SessionProgress};
use recall_core::{Error, Flashcard, Result, ReviewState};
use recall_retrieve::{build_context, ContextBudget, RetrievalResult, RetrievedChunk};
use recall_review::ReviewScheduler;
use recall_store::Store;

/// Source material shown to the grader is kept short.
const GRADING_CONTEXT_BUDGET: ContextBudget = ContextBudget {
    max_tokens: 800,
    per_chunk_max_chars: 1200,
};

/// How a session's cards are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Due cards, most overdue first, then never-reviewed cards.
    #[default]
    Mixed,
    DueOnly,
    /// Never reviewed or fewer than two repetitions.
    New,
    /// Lowest easiness factor first.
    Weakest,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mixed => "mixed",
            Self::DueOnly => "due_only",
            Self::New => "new",
            Self::Weakest => "weakest",
        }
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mixed" => Ok(Self::Mixed),
            "due_only" => Ok(Self::DueOnly),
            "new" => Ok(Self::New),
            "weakest" => Ok(Self::Weakest),
            other => Err(Error::InvalidInput(format!("unknown quiz strategy '{other}'"))),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of answering one card.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub session_id: String,
    pub card_id: String,
    pub verdict: Verdict,
    pub quality: u8,
    pub score: f64,
    pub feedback: String,
    pub source: GradeSource,
    pub canonical_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<FollowUp>,
    pub review: ReviewState,
    pub progress: SessionProgress,
}

pub struct QuizSelector {
    store: Arc<dyn Store>,
    scheduler: Arc<ReviewScheduler>,
    adjudicator: Arc<GradingAdjudicator>,
    sessions: Arc<SessionManager>,
    max_count: usize,
}

impl QuizSelector {
    pub fn new(
        store: Arc<dyn Store>,
        scheduler: Arc<ReviewScheduler>,
        adjudicator: Arc<GradingAdjudicator>,
        sessions: Arc<SessionManager>,
        max_count: usize,
    ) -> Self {
        Self {
            store,
            scheduler,
            adjudicator,
            sessions,
            max_count,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Cards a new session of `count` would contain, in quiz order.
    pub fn select(
        &self,
        collection_id: &str,
        count: usize,
        strategy: Strategy,
        as_of: NaiveDate,
    ) -> Result<Vec<Flashcard>> {
        if count == 0 || count > self.max_count {
            return Err(Error::InvalidInput(format!(
                "count must be between 1 and {}, got {count}",
                self.max_count
            )));
        }
        // Also rejects unknown collections.
        let due = self.scheduler.due_flashcards(collection_id, as_of)?;

        let chosen: Vec<Flashcard> = match strategy {
            Strategy::Mixed => {
                let fresh = self
                    .store
                    .list_flashcards(collection_id)?
                    .into_iter()
                    .filter(|c| c.review.is_new());
                due.into_iter().chain(fresh).take(count).collect()
            }
            Strategy::DueOnly => due.into_iter().take(count).collect(),
            Strategy::New => self
                .store
                .list_flashcards(collection_id)?
                .into_iter()
                .filter(|c| c.review.is_new() || c.review.repetition_count < 2)
                .take(count)
                .collect(),
            Strategy::Weakest => {
                let mut all = self.store.list_flashcards(collection_id)?;
                all.sort_by(|a, b| {
                    a.review
                        .easiness_factor
                        .total_cmp(&b.review.easiness_factor)
                });
                all.truncate(count);
                all
            }
        };

        if chosen.is_empty() {
            return Err(Error::EmptyCollection(collection_id.to_string()));
        }
        Ok(chosen)
    }

    /// Open a session for `collection_id`.
    pub fn start(
        &self,
        collection_id: &str,
        count: usize,
        strategy: Strategy,
        as_of: NaiveDate,
    ) -> Result<Arc<QuizSession>> {
        let cards = self.select(collection_id, count, strategy, as_of)?;
        let card_ids = cards.into_iter().map(|c| c.id).collect();
        let session = self
            .sessions
            .insert(QuizSession::new(collection_id, strategy, card_ids));
        info!(
            session_id = %session.id,
            collection_id,
            %strategy,
            cards = session.len(),
            "quiz session started"
        );
        Ok(session)
    }

    pub fn session(&self, session_id: &str) -> Result<Arc<QuizSession>> {
        self.sessions
            .get(session_id)
            .ok_or_else(|| Error::NotFound(format!("quiz session {session_id}")))
    }

    /// Grade an answer and feed its quality into the scheduler.
    ///
    /// A card can be answered once per session. If grading or the review
    /// update fails the card is released and may be answered again.
    pub async fn check_answer(
        &self,
        session_id: &str,
        card_id: &str,
        user_answer: &str,
        strict: bool,
    ) -> Result<AnswerOutcome> {
        let session = self.session(session_id)?;
        session.reserve(card_id)?;

        let graded = self.grade_and_record(card_id, user_answer, strict).await;
        let (card, grade, review) = match graded {
            Ok(done) => done,
            Err(e) => {
                session.release(card_id);
                warn!(session_id, card_id, "answer not recorded: {}", e);
                return Err(e);
            }
        };

        let progress = session.complete(AnswerRecord {
            card_id: card_id.to_string(),
            verdict: grade.verdict,
            quality: grade.quality,
            answered_at: Utc::now(),
        });
        debug!(
            session_id,
            card_id,
            quality = grade.quality,
            answered = progress.answered,
            total = progress.total,
            "answer checked"
        );

        Ok(AnswerOutcome {
            session_id: session_id.to_string(),
            card_id: card_id.to_string(),
            verdict: grade.verdict,
            quality: grade.quality,
            score: grade.score,
            feedback: grade.feedback,
            source: grade.source,
            canonical_answer: card.answer,
            follow_up: grade.follow_up,
            review,
            progress,
        })
    }

    async fn grade_and_record(
        &self,
        card_id: &str,
        user_answer: &str,
        strict: bool,
    ) -> Result<(Flashcard, Grade, ReviewState)> {
        let card = self
            .store
            .get_flashcard(card_id)?
            .ok_or_else(|| Error::NotFound(format!("flashcard {card_id}")))?;
        let context = self.source_context(&card)?;
        let grade = self
            .adjudicator
            .grade_with_context(&card, user_answer, context.as_deref(), strict)
            .await?;
        let review = self.scheduler.update(card_id, i64::from(grade.quality))?;
        Ok((card, grade, review))
    }

    /// Text of the chunks a card was generated from, if any survive.
    fn source_context(&self, card: &Flashcard) -> Result<Option<String>> {
        if card.source_chunk_ids.is_empty() {
            return Ok(None);
        }
        let hits = self
            .store
            .load_chunks(&card.source_chunk_ids)?
            .into_iter()
            .map(|chunk| RetrievedChunk { chunk, score: 1.0 })
            .collect();
        let context = build_context(&RetrievalResult { hits }, GRADING_CONTEXT_BUDGET);
        Ok(Some(context).filter(|c| !c.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use recall_core::{Collection, FixedClock, GradingThresholds};
    use recall_llm::Generator;
    use recall_store::MemoryStore;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replies from a queue; an empty queue replies with a fixed verdict.
    struct ScriptedGenerator {
        replies: Mutex<VecDeque<Result<String>>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            tokio::task::yield_now().await;
            self.replies.lock().pop_front().unwrap_or_else(|| {
                Ok(r#"{"verdict": "correct", "score": 0.9, "quality": 5, "feedback": "Well done"}"#.into())
            })
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    struct Fixture {
        selector: Arc<QuizSelector>,
        store: Arc<MemoryStore>,
        scheduler: Arc<ReviewScheduler>,
        clock: Arc<FixedClock>,
        collection_id: String,
    }

    fn fixture(replies: Vec<Result<String>>) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(day(1)));
        let collection = Collection::new("History", None);
        store.create_collection(&collection).unwrap();
        let scheduler = Arc::new(ReviewScheduler::new(store.clone(), clock.clone()));
        let adjudicator = Arc::new(GradingAdjudicator::new(
            Arc::new(ScriptedGenerator::new(replies)),
            GradingThresholds::default(),
            Duration::from_secs(5),
        ));
        let selector = Arc::new(QuizSelector::new(
            store.clone(),
            scheduler.clone(),
            adjudicator,
            Arc::new(SessionManager::new(100, 60)),
            50,
        ));
        Fixture {
            selector,
            store,
            scheduler,
            clock,
            collection_id: collection.id,
        }
    }

    fn add_cards(f: &Fixture, names: &[&str]) -> Vec<String> {
        names
            .iter()
            .map(|name| {
                let card = Flashcard::new(&f.collection_id, *name, format!("{name} answer"), day(1));
                f.store.save_flashcard(&card).unwrap();
                card.id
            })
            .collect()
    }

    fn review_on(f: &Fixture, card_id: &str, date: NaiveDate, quality: i64) {
        f.clock.set(date);
        f.scheduler.update(card_id, quality).unwrap();
    }

    #[test]
    fn test_mixed_prefers_most_overdue_then_new() {
        let f = fixture(vec![]);
        let ids = add_cards(&f, &["d1", "d2", "d3", "n1", "n2"]);
        // Due dates: d3 day 2, d2 day 3, d1 day 4.
        review_on(&f, &ids[2], day(1), 4);
        review_on(&f, &ids[1], day(2), 4);
        review_on(&f, &ids[0], day(3), 4);

        let session = f
            .selector
            .start(&f.collection_id, 5, Strategy::Mixed, day(10))
            .unwrap();
        assert_eq!(
            session.card_ids,
            vec![
                ids[2].clone(),
                ids[1].clone(),
                ids[0].clone(),
                ids[3].clone(),
                ids[4].clone()
            ]
        );
    }

    #[test]
    fn test_due_only_may_be_short() {
        let f = fixture(vec![]);
        let ids = add_cards(&f, &["a", "b", "c"]);
        review_on(&f, &ids[1], day(1), 5);
        let cards = f
            .selector
            .select(&f.collection_id, 5, Strategy::DueOnly, day(2))
            .unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].id, ids[1]);
    }

    #[test]
    fn test_new_and_weakest_strategies() {
        let f = fixture(vec![]);
        let ids = add_cards(&f, &["a", "b", "c"]);
        review_on(&f, &ids[0], day(1), 5);
        review_on(&f, &ids[0], day(2), 5);
        review_on(&f, &ids[1], day(2), 0);

        let new: Vec<String> = f
            .selector
            .select(&f.collection_id, 10, Strategy::New, day(2))
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(new, vec![ids[1].clone(), ids[2].clone()]);

        let weakest: Vec<String> = f
            .selector
            .select(&f.collection_id, 2, Strategy::Weakest, day(2))
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(weakest, vec![ids[1].clone(), ids[2].clone()]);
    }

    #[test]
    fn test_selection_errors() {
        let f = fixture(vec![]);
        assert!(matches!(
            f.selector.start(&f.collection_id, 5, Strategy::Mixed, day(1)),
            Err(Error::EmptyCollection(_))
        ));
        add_cards(&f, &["a"]);
        assert!(matches!(
            f.selector.start(&f.collection_id, 5, Strategy::DueOnly, day(1)),
            Err(Error::EmptyCollection(_))
        ));
        assert!(matches!(
            f.selector.start(&f.collection_id, 0, Strategy::Mixed, day(1)),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            f.selector.start(&f.collection_id, 51, Strategy::Mixed, day(1)),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            f.selector.start("missing", 5, Strategy::Mixed, day(1)),
            Err(Error::CollectionNotFound(_))
        ));
        assert!("sideways".parse::<Strategy>().is_err());
        assert_eq!("DUE_ONLY".parse::<Strategy>().unwrap(), Strategy::DueOnly);
    }

    #[tokio::test]
    async fn test_check_answer_updates_schedule() {
        let f = fixture(vec![]);
        let ids = add_cards(&f, &["a", "b"]);
        let session = f.selector.start(&f.collection_id, 2, Strategy::Mixed, day(1)).unwrap();

        let outcome = f
            .selector
            .check_answer(&session.id, &ids[0], "a answer", false)
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Correct);
        assert_eq!(outcome.quality, 5);
        assert_eq!(outcome.source, GradeSource::Model);
        assert_eq!(outcome.canonical_answer, "a answer");
        assert_eq!(outcome.review.repetition_count, 1);
        assert_eq!(outcome.progress.answered, 1);
        assert!(!outcome.progress.finished);
        assert_eq!(f.store.load_review_state(&ids[0]).unwrap(), outcome.review);
        assert_eq!(session.cursor(), 1);
    }

    #[tokio::test]
    async fn test_second_answer_rejected() {
        let f = fixture(vec![]);
        let ids = add_cards(&f, &["a"]);
        let session = f.selector.start(&f.collection_id, 1, Strategy::Mixed, day(1)).unwrap();

        f.selector.check_answer(&session.id, &ids[0], "x", false).await.unwrap();
        let err = f
            .selector
            .check_answer(&session.id, &ids[0], "x", false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyAnswered(_)));
        assert_eq!(f.store.load_review_state(&ids[0]).unwrap().review_count, 1);
    }

    #[tokio::test]
    async fn test_unknown_session_and_foreign_card() {
        let f = fixture(vec![]);
        let ids = add_cards(&f, &["a", "b"]);
        let session = f.selector.start(&f.collection_id, 1, Strategy::Mixed, day(1)).unwrap();

        assert!(matches!(
            f.selector.check_answer("nope", &ids[0], "x", false).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            f.selector.check_answer(&session.id, &ids[1], "x", false).await,
            Err(Error::CardNotInSession { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_grading_releases_card() {
        let f = fixture(vec![Err(Error::GenerationUnavailable("quota".into()))]);
        let ids = add_cards(&f, &["a"]);
        let session = f.selector.start(&f.collection_id, 1, Strategy::Mixed, day(1)).unwrap();

        let err = f
            .selector
            .check_answer(&session.id, &ids[0], "a answer", false)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(f.store.load_review_state(&ids[0]).unwrap().is_new());
        assert_eq!(session.cursor(), 0);

        let retry = f
            .selector
            .check_answer(&session.id, &ids[0], "a answer", false)
            .await
            .unwrap();
        assert!(retry.progress.finished);
    }

    #[tokio::test]
    async fn test_unparseable_grade_still_scores() {
        let f = fixture(vec![Ok("I'd say that's mostly right.".into())]);
        let ids = add_cards(&f, &["a"]);
        let session = f.selector.start(&f.collection_id, 1, Strategy::Mixed, day(1)).unwrap();
        let outcome = f
            .selector
            .check_answer(&session.id, &ids[0], "something unrelated", true)
            .await
            .unwrap();
        assert_eq!(outcome.source, GradeSource::Heuristic);
        assert_eq!(outcome.quality, 2);
        assert_eq!(outcome.review.repetition_count, 0);
        assert_eq!(outcome.review.interval_days, 1);
    }

    #[tokio::test]
    async fn test_wrong_answer_outcome_carries_follow_up() {
        let f = fixture(vec![
            Ok(r#"{"verdict": "incorrect", "quality": 0, "score": 0.0, "feedback": "No"}"#.into()),
            Ok(r#"{"follow_up": "Which treaty ended the war?", "hint_type": "comparative"}"#.into()),
        ]);
        let ids = add_cards(&f, &["a"]);
        let session = f.selector.start(&f.collection_id, 1, Strategy::Mixed, day(1)).unwrap();
        let outcome = f
            .selector
            .check_answer(&session.id, &ids[0], "no idea", false)
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Incorrect);
        assert_eq!(outcome.review.repetition_count, 0);
        let follow_up = outcome.follow_up.unwrap();
        assert_eq!(follow_up.question, "Which treaty ended the war?");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_answers_for_distinct_cards() {
        let f = fixture(vec![]);
        let names: Vec<String> = (0..8).map(|i| format!("card {i}")).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let ids = add_cards(&f, &name_refs);
        let session = f.selector.start(&f.collection_id, 8, Strategy::Mixed, day(1)).unwrap();

        let tasks = ids.iter().map(|id| {
            let selector = f.selector.clone();
            let session_id = session.id.clone();
            let id = id.clone();
            tokio::spawn(async move { selector.check_answer(&session_id, &id, "answer", false).await })
        });
        let results = futures::future::join_all(tasks).await;
        assert!(results.into_iter().all(|r| r.unwrap().is_ok()));

        let progress = session.progress();
        assert_eq!(progress.answered, 8);
        assert!(progress.finished);
        assert_eq!(session.cursor(), 8);
    }

    #[tokio::test]
    async fn test_concurrent_answers_for_same_card() {
        let f = fixture(vec![]);
        let ids = add_cards(&f, &["a"]);
        let session = f.selector.start(&f.collection_id, 1, Strategy::Mixed, day(1)).unwrap();

        let (first, second) = tokio::join!(
            f.selector.check_answer(&session.id, &ids[0], "a", false),
            f.selector.check_answer(&session.id, &ids[0], "a", false)
        );
        let oks = [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(oks, 1);
        assert!(matches!(
            first.err().or(second.err()),
            Some(Error::AlreadyAnswered(_))
        ));
    }
}
