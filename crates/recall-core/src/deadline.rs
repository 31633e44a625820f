//! Deadline wrapper for calls to external collaborators.

use std::future::Future;
use std::time::Duration;

use crate::{Error, Result};

/// Run `fut` with a deadline. An elapsed deadline becomes [`Error::Timeout`].
///
/// No retry is attempted here; callers decide what to do with a timeout.
pub async fn with_deadline<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, seconds = limit.as_secs(), "collaborator call timed out");
            Err(Error::Timeout {
                operation: operation.to_string(),
                seconds: limit.as_secs(),
            })
        }
    }
}
