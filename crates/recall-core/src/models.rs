//! Domain models shared by every Recall crate.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Initial easiness factor of a fresh card.
pub const INITIAL_EASINESS: f64 = 2.5;
/// Lower bound of the easiness factor.
pub const MIN_EASINESS: f64 = 1.3;
/// Longest review interval, about a century.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// A named group of source material and the flashcards derived from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Collection {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description,
            created_at: Utc::now(),
        }
    }

    /// Text used as the retrieval query when generating cards for the whole collection.
    pub fn topic_query(&self) -> String {
        match self.description.as_deref().map(str::trim) {
            Some(desc) if !desc.is_empty() => format!("{} {}", self.name, desc),
            _ => self.name.clone(),
        }
    }
}

/// A contiguous segment of an ingested document, with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub collection_id: String,
    pub document_id: String,
    pub position: u32,
    #[serde(default)]
    pub heading_path: Vec<String>,
    pub text: String,
    #[serde(default, skip_serializing)]
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Headings joined as `A > B > C`, if any.
    pub fn heading(&self) -> Option<String> {
        if self.heading_path.is_empty() {
            None
        } else {
            Some(self.heading_path.join(" > "))
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    /// Lenient parse; unknown values fall back to `Medium`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Self::Easy,
            "hard" => Self::Hard,
            _ => Self::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CardStyle {
    #[default]
    Basic,
    Cloze,
    Concept,
}

impl CardStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Cloze => "cloze",
            Self::Concept => "concept",
        }
    }
}

impl std::str::FromStr for CardStyle {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "cloze" => Ok(Self::Cloze),
            "concept" => Ok(Self::Concept),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown card style '{other}'"
            ))),
        }
    }
}

/// Learning phase derived from the repetition count. Never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Learning,
    Young,
    Mature,
}

impl Phase {
    pub fn from_repetitions(reps: u32) -> Self {
        match reps {
            0 => Self::Learning,
            1 | 2 => Self::Young,
            _ => Self::Mature,
        }
    }
}

/// SM-2 review state of a single flashcard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewState {
    pub repetition_count: u32,
    pub easiness_factor: f64,
    pub interval_days: u32,
    pub due_date: NaiveDate,
    /// `None` until the card has been reviewed once.
    pub last_quality: Option<u8>,
    pub review_count: u32,
    pub correct_count: u32,
    pub last_reviewed: Option<NaiveDate>,
}

impl ReviewState {
    /// State of a card that has never been reviewed, due on `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            repetition_count: 0,
            easiness_factor: INITIAL_EASINESS,
            interval_days: 0,
            due_date: today,
            last_quality: None,
            review_count: 0,
            correct_count: 0,
            last_reviewed: None,
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_repetitions(self.repetition_count)
    }

    pub fn is_new(&self) -> bool {
        self.last_quality.is_none()
    }

    /// Reviewed at least once and due on or before `as_of`.
    pub fn is_due(&self, as_of: NaiveDate) -> bool {
        !self.is_new() && self.due_date <= as_of
    }

    pub fn is_mastered(&self) -> bool {
        self.repetition_count >= 5 && self.easiness_factor >= INITIAL_EASINESS
    }

    /// Days past due as of the given date (0 if not yet due).
    pub fn days_overdue(&self, as_of: NaiveDate) -> i64 {
        (as_of - self.due_date).num_days().max(0)
    }

    /// `today + interval_days`, saturating at the last representable date.
    pub fn next_due_from(today: NaiveDate, interval_days: u32) -> NaiveDate {
        today
            .checked_add_days(Days::new(u64::from(interval_days)))
            .unwrap_or(NaiveDate::MAX)
    }
}

/// A question/answer pair with its review state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flashcard {
    pub id: String,
    pub collection_id: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub style: CardStyle,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source_chunk_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub review: ReviewState,
}

impl Flashcard {
    /// A fresh, never-reviewed card due on `today`.
    pub fn new(
        collection_id: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
        today: NaiveDate,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            collection_id: collection_id.into(),
            question: question.into(),
            answer: answer.into(),
            difficulty: Difficulty::default(),
            style: CardStyle::default(),
            tags: Vec::new(),
            source_chunk_ids: Vec::new(),
            created_at: Utc::now(),
            review: ReviewState::new(today),
        }
    }
}
