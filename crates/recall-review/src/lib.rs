//! Recall Review: SM-2 arithmetic, the per-card scheduler, statistics.

pub mod scheduler;
pub mod sm2;
pub mod stats;

pub use scheduler::ReviewScheduler;
pub use sm2::{next_state, preview, quality_from_score, update_easiness, validate_quality, IntervalPreview};
pub use stats::{forecast, review_stats, Forecast, ForecastDay, ReviewStats};
