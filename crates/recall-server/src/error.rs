//! Maps core errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use recall_core::Error;

/// Handler error: a core error rendered as `{ "error", "kind" }`.
#[derive(Debug)]
pub struct ApiError(pub Error);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidQuality(_)
            | Error::DimensionMismatch { .. }
            | Error::CardNotInSession { .. }
            | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::CollectionNotFound(_) | Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyAnswered(_) => StatusCode::CONFLICT,
            Error::EmptyCollection(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::EmbeddingUnavailable(_)
            | Error::GenerationUnavailable(_)
            | Error::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::Storage(_)
            | Error::Database(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Config(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.0.kind(), "request failed: {}", self.0);
        }
        let body = serde_json::json!({
            "error": self.0.to_string(),
            "kind": self.0.kind(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::AlreadyAnswered("c".into()), StatusCode::CONFLICT),
            (Error::CollectionNotFound("c".into()), StatusCode::NOT_FOUND),
            (Error::InvalidQuality(8), StatusCode::BAD_REQUEST),
            (Error::EmptyCollection("c".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (
                Error::GenerationUnavailable("down".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::Timeout {
                    operation: "generate".into(),
                    seconds: 60,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (Error::Database("locked".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }
}
