//! Recall server: JSON-over-HTTP binding for quizzes, review scheduling
//! and retrieval.

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::build_router;
pub use state::AppState;
