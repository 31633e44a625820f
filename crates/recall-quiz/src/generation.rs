//! Flashcard generation grounded on a collection's retrieved chunks.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use recall_core::{with_deadline, CardStyle, Clock, Difficulty, Error, Flashcard, Result};
use recall_llm::prompts::{extract_json, flashcard_prompt};
use recall_llm::Generator;
use recall_retrieve::{build_context, ContextBudget, Retriever};
use recall_store::Store;

/// Retrieval depth is twice the card count, capped here.
const MAX_CONTEXT_CHUNKS: usize = 10;

pub struct FlashcardGenerator {
    store: Arc<dyn Store>,
    retriever: Arc<Retriever>,
    generator: Arc<dyn Generator>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    max_cards: usize,
}

impl FlashcardGenerator {
    pub fn new(
        store: Arc<dyn Store>,
        retriever: Arc<Retriever>,
        generator: Arc<dyn Generator>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
        max_cards: usize,
    ) -> Self {
        Self {
            store,
            retriever,
            generator,
            clock,
            timeout,
            max_cards,
        }
    }

    /// Generate and persist up to `n_cards` new flashcards for a collection.
    pub async fn generate(
        &self,
        collection_id: &str,
        n_cards: usize,
        style: CardStyle,
    ) -> Result<Vec<Flashcard>> {
        if n_cards == 0 || n_cards > self.max_cards {
            return Err(Error::InvalidInput(format!(
                "n_cards must be between 1 and {}, got {n_cards}",
                self.max_cards
            )));
        }
        let collection = self
            .store
            .get_collection(collection_id)?
            .ok_or_else(|| Error::CollectionNotFound(collection_id.to_string()))?;
        if self.retriever.registry().get(collection_id).is_none() {
            return Err(Error::EmptyCollection(collection_id.to_string()));
        }

        let k = (n_cards * 2).min(MAX_CONTEXT_CHUNKS);
        let retrieved = self
            .retriever
            .retrieve(collection_id, &collection.topic_query(), k)
            .await?;
        if retrieved.is_empty() {
            return Err(Error::EmptyCollection(collection_id.to_string()));
        }

        let context = build_context(&retrieved, ContextBudget::default());
        let prompt = flashcard_prompt(&context, n_cards, style.as_str());
        let raw = with_deadline("generate", self.timeout, self.generator.generate(&prompt)).await?;

        let entries = match extract_json(&raw, '[') {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(Error::InvalidResponse(
                    "expected a JSON array of flashcards".into(),
                ))
            }
        };

        let today = self.clock.today();
        let source_chunk_ids = retrieved.chunk_ids();
        let total = entries.len();
        let cards: Vec<Flashcard> = entries
            .iter()
            .filter_map(parse_card)
            .take(n_cards)
            .map(|parsed| {
                let mut card = Flashcard::new(collection_id, parsed.question, parsed.answer, today);
                card.difficulty = parsed.difficulty;
                card.style = style;
                card.tags = parsed.tags;
                card.source_chunk_ids = source_chunk_ids.clone();
                card
            })
            .collect();

        if cards.is_empty() {
            return Err(Error::InvalidResponse(format!(
                "none of the {total} generated entries was a valid flashcard"
            )));
        }
        if cards.len() < total.min(n_cards) {
            warn!(collection_id, total, kept = cards.len(), "skipped invalid flashcard entries");
        }

        for card in &cards {
            self.store.save_flashcard(card)?;
        }
        info!(
            collection_id,
            generated = cards.len(),
            style = style.as_str(),
            "flashcards generated"
        );
        Ok(cards)
    }
}

struct ParsedCard {
    question: String,
    answer: String,
    difficulty: Difficulty,
    tags: Vec<String>,
}

fn parse_card(entry: &Value) -> Option<ParsedCard> {
    let text = |key: &str| {
        entry
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let tags = entry
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(ParsedCard {
        question: text("question")?,
        answer: text("answer")?,
        difficulty: entry
            .get("difficulty")
            .and_then(Value::as_str)
            .map(Difficulty::parse_lenient)
            .unwrap_or_default(),
        tags,
    })
}
