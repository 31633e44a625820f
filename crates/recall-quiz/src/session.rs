//! Quiz sessions and their in-memory registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info};

use crate::grading::Verdict;
use crate::selector::Strategy;
use recall_core::{Error, Result};

/// A card answered within a session.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerRecord {
    pub card_id: String,
    pub verdict: Verdict,
    pub quality: u8,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
enum Slot {
    /// Grading in flight.
    Pending,
    Answered(AnswerRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    pub answered: usize,
    pub correct: usize,
    pub total: usize,
    pub finished: bool,
}

/// Serializable snapshot of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: String,
    pub collection_id: String,
    pub strategy: Strategy,
    pub card_ids: Vec<String>,
    pub answers: Vec<AnswerRecord>,
    pub progress: SessionProgress,
    pub created_at: DateTime<Utc>,
}

/// An ordered set of cards to answer. Each card can be answered once.
///
/// Answer slots are reserved atomically, so concurrent answers to different
/// cards proceed in parallel while a second answer to the same card fails.
#[derive(Debug)]
pub struct QuizSession {
    pub id: String,
    pub collection_id: String,
    pub strategy: Strategy,
    pub card_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    last_active: Mutex<DateTime<Utc>>,
    slots: DashMap<String, Slot>,
    cursor: AtomicUsize,
}

impl QuizSession {
    pub fn new(collection_id: impl Into<String>, strategy: Strategy, card_ids: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            collection_id: collection_id.into(),
            strategy,
            card_ids,
            created_at: now,
            last_active: Mutex::new(now),
            slots: DashMap::new(),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.card_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.card_ids.is_empty()
    }

    pub fn contains(&self, card_id: &str) -> bool {
        self.card_ids.iter().any(|id| id == card_id)
    }

    /// Number of answered cards.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Claim the answer slot of `card_id`.
    pub fn reserve(&self, card_id: &str) -> Result<()> {
        if !self.contains(card_id) {
            return Err(Error::CardNotInSession {
                session_id: self.id.clone(),
                card_id: card_id.to_string(),
            });
        }
        match self.slots.entry(card_id.to_string()) {
            Entry::Occupied(_) => Err(Error::AlreadyAnswered(card_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Slot::Pending);
                Ok(())
            }
        }
    }

    /// Give back a reservation whose grading failed.
    pub fn release(&self, card_id: &str) {
        self.slots
            .remove_if(card_id, |_, slot| matches!(slot, Slot::Pending));
    }

    /// Record the answer for a reserved card and advance the cursor.
    pub fn complete(&self, record: AnswerRecord) -> SessionProgress {
        self.slots
            .insert(record.card_id.clone(), Slot::Answered(record));
        self.cursor.fetch_add(1, Ordering::SeqCst);
        self.touch();
        self.progress()
    }

    pub fn answers(&self) -> Vec<AnswerRecord> {
        // Session order, not completion order.
        self.card_ids
            .iter()
            .filter_map(|id| match self.slots.get(id).as_deref() {
                Some(Slot::Answered(record)) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> SessionProgress {
        let answers = self.answers();
        let answered = answers.len();
        SessionProgress {
            answered,
            correct: answers
                .iter()
                .filter(|a| a.verdict == Verdict::Correct)
                .count(),
            total: self.len(),
            finished: answered == self.len(),
        }
    }

    pub fn touch(&self) {
        *self.last_active.lock() = Utc::now();
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        *self.last_active.lock()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id.clone(),
            collection_id: self.collection_id.clone(),
            strategy: self.strategy,
            card_ids: self.card_ids.clone(),
            answers: self.answers(),
            progress: self.progress(),
            created_at: self.created_at,
        }
    }
}

/// Live quiz sessions with an idle TTL and a cap on their number.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<QuizSession>>>,
    max_sessions: usize,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(max_sessions: usize, ttl_minutes: i64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    fn is_expired(&self, session: &QuizSession, now: DateTime<Utc>) -> bool {
        now - session.last_active() > self.ttl
    }

    /// Register a session, evicting the oldest one when full.
    pub fn insert(&self, session: QuizSession) -> Arc<QuizSession> {
        let session = Arc::new(session);
        let mut sessions = self.sessions.write();
        if sessions.len() >= self.max_sessions {
            if let Some(oldest_id) = sessions
                .values()
                .min_by_key(|s| s.created_at)
                .map(|s| s.id.clone())
            {
                sessions.remove(&oldest_id);
                debug!(session_id = %oldest_id, "evicted oldest quiz session");
            }
        }
        sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// Look up a live session. Expired sessions are dropped and reported absent.
    pub fn get(&self, id: &str) -> Option<Arc<QuizSession>> {
        let session = self.sessions.read().get(id).cloned()?;
        if self.is_expired(&session, Utc::now()) {
            self.sessions.write().remove(id);
            return None;
        }
        session.touch();
        Some(session)
    }

    pub fn remove(&self, id: &str) -> bool {
        self.sessions.write().remove(id).is_some()
    }

    /// Drop all expired sessions. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| !self.is_expired(s, now));
        let purged = before - sessions.len();
        if purged > 0 {
            info!(purged, "purged expired quiz sessions");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(ids: &[&str]) -> QuizSession {
        QuizSession::new("c", Strategy::Mixed, ids.iter().map(|s| s.to_string()).collect())
    }

    fn record(card_id: &str, verdict: Verdict) -> AnswerRecord {
        AnswerRecord {
            card_id: card_id.into(),
            verdict,
            quality: 4,
            answered_at: Utc::now(),
        }
    }

    #[test]
    fn test_reserve_once() {
        let s = session(&["a", "b"]);
        s.reserve("a").unwrap();
        assert!(matches!(s.reserve("a"), Err(Error::AlreadyAnswered(_))));
        assert!(matches!(s.reserve("z"), Err(Error::CardNotInSession { .. })));
        s.reserve("b").unwrap();
    }

    #[test]
    fn test_release_only_pending() {
        let s = session(&["a", "b"]);
        s.reserve("a").unwrap();
        s.release("a");
        s.reserve("a").unwrap();

        s.complete(record("a", Verdict::Correct));
        s.release("a");
        assert!(matches!(s.reserve("a"), Err(Error::AlreadyAnswered(_))));
    }

    #[test]
    fn test_progress_and_cursor() {
        let s = session(&["a", "b", "c"]);
        s.reserve("c").unwrap();
        s.reserve("a").unwrap();
        s.complete(record("c", Verdict::Incorrect));
        let p = s.complete(record("a", Verdict::Correct));
        assert_eq!(
            p,
            SessionProgress {
                answered: 2,
                correct: 1,
                total: 3,
                finished: false
            }
        );
        assert_eq!(s.cursor(), 2);
        let order: Vec<String> = s.answers().into_iter().map(|a| a.card_id).collect();
        assert_eq!(order, vec!["a", "c"]);
    }

    #[test]
    fn test_concurrent_reservations_are_exclusive() {
        let s = Arc::new(session(&["a"]));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let s = s.clone();
                std::thread::spawn(move || s.reserve("a").is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_manager_evicts_oldest() {
        let manager = SessionManager::new(2, 60);
        let first = manager.insert(session(&["a"]));
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = manager.insert(session(&["b"]));
        std::thread::sleep(std::time::Duration::from_millis(5));
        let third = manager.insert(session(&["c"]));

        assert_eq!(manager.len(), 2);
        assert!(manager.get(&first.id).is_none());
        assert!(manager.get(&second.id).is_some());
        assert!(manager.get(&third.id).is_some());
        assert!(manager.remove(&third.id));
        assert!(!manager.remove(&third.id));
    }

    #[test]
    fn test_manager_expiry() {
        let manager = SessionManager::new(10, 30);
        let stale = manager.insert(session(&["a"]));
        *stale.last_active.lock() = Utc::now() - Duration::minutes(31);
        let old = manager.insert(session(&["b"]));
        *old.last_active.lock() = Utc::now() - Duration::minutes(45);
        let fresh = manager.insert(session(&["c"]));

        assert!(manager.get(&stale.id).is_none());
        assert_eq!(manager.purge_expired(), 1);
        assert_eq!(manager.len(), 1);
        assert!(manager.get(&fresh.id).is_some());
    }
}
