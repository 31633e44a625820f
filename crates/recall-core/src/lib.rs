//! Recall Core: errors, configuration, domain models, clock.

pub mod clock;
pub mod config;
pub mod deadline;
pub mod error;
pub mod models;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{DataPaths, GradingThresholds, RecallConfig};
pub use deadline::with_deadline;
pub use error::{Error, Result};
pub use models::{
    CardStyle, Chunk, Collection, Difficulty, Flashcard, Phase, ReviewState, INITIAL_EASINESS,
    MAX_INTERVAL_DAYS, MIN_EASINESS,
};
