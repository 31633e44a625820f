//! Review scheduler: applies SM-2 to stored review state.
//!
//! Each update runs load → compute → save while holding a lock for that card,
//! so concurrent reviews of one card serialise and none is lost. Different
//! cards never contend.

use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::sm2::{self, IntervalPreview};
use crate::stats::{self, Forecast, ReviewStats};
use recall_core::{Clock, Error, Flashcard, Result, ReviewState};
use recall_store::Store;

pub struct ReviewScheduler {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ReviewScheduler {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: DashMap::new(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    fn card_lock(&self, card_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(card_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Record a review of `card_id` with the given quality and return the new state.
    pub fn update(&self, card_id: &str, quality: i64) -> Result<ReviewState> {
        let quality = sm2::validate_quality(quality)?;
        let lock = self.card_lock(card_id);
        let result = {
            let _guard = lock.lock();
            self.apply(card_id, quality)
        };
        drop(lock);
        self.release_lock(card_id);
        result
    }

    fn apply(&self, card_id: &str, quality: u8) -> Result<ReviewState> {
        let current = self.store.load_review_state(card_id)?;
        let next = sm2::next_state(&current, quality, self.clock.today());
        self.store.save_review_state(card_id, &next)?;

        info!(
            card_id,
            quality,
            repetitions = next.repetition_count,
            interval_days = next.interval_days,
            due = %next.due_date,
            "review recorded"
        );
        Ok(next)
    }

    /// Remove the card's lock entry once no other update holds a handle to it.
    fn release_lock(&self, card_id: &str) {
        self.locks
            .remove_if(card_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Drop the lock entry of a deleted card.
    pub fn forget(&self, card_id: &str) {
        self.locks.remove(card_id);
    }

    fn cards(&self, collection_id: &str) -> Result<Vec<Flashcard>> {
        if self.store.get_collection(collection_id)?.is_none() {
            return Err(Error::CollectionNotFound(collection_id.to_string()));
        }
        self.store.list_flashcards(collection_id)
    }

    /// Reviewed cards due on or before `as_of`, most overdue first, ties in
    /// creation order.
    pub fn due_flashcards(&self, collection_id: &str, as_of: NaiveDate) -> Result<Vec<Flashcard>> {
        let mut due: Vec<Flashcard> = self
            .cards(collection_id)?
            .into_iter()
            .filter(|c| c.review.is_due(as_of))
            .collect();
        // Stable sort keeps creation order among equal dates.
        due.sort_by_key(|c| c.review.due_date);
        debug!(collection_id, %as_of, due = due.len(), "due cards");
        Ok(due)
    }

    pub fn due_cards(&self, collection_id: &str, as_of: NaiveDate) -> Result<Vec<String>> {
        Ok(self
            .due_flashcards(collection_id, as_of)?
            .into_iter()
            .map(|c| c.id)
            .collect())
    }

    pub fn review_stats(&self, collection_id: &str, as_of: NaiveDate) -> Result<ReviewStats> {
        Ok(stats::review_stats(&self.cards(collection_id)?, as_of))
    }

    pub fn forecast(
        &self,
        collection_id: &str,
        from: NaiveDate,
        days_ahead: u32,
    ) -> Result<Forecast> {
        stats::forecast(&self.cards(collection_id)?, from, days_ahead)
    }

    /// What qualities 1, 3, 4 and 5 would do to the card today.
    pub fn preview(&self, card_id: &str) -> Result<Vec<IntervalPreview>> {
        let state = self.store.load_review_state(card_id)?;
        Ok(sm2::preview(&state, self.clock.today()))
    }
}
