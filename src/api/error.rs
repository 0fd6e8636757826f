//! Error → HTTP status mapping. Every failure body is `{"error": reason}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::error::{DatabaseError, IngestError, LlmError, PipelineError};

/// A failed request: status plus human-readable reason.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "Request failed");
        }
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}

fn llm_status(e: &LlmError) -> StatusCode {
    match e {
        LlmError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        LlmError::CallFailed { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        let status = match e {
            DatabaseError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        let status = match &e {
            PipelineError::NotFound { .. } => StatusCode::NOT_FOUND,
            PipelineError::ProcessingFailed { source, .. } => llm_status(source),
            PipelineError::Llm(llm) => llm_status(llm),
            PipelineError::Database(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
            PipelineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        let status = match &e {
            IngestError::NotConfigured => StatusCode::BAD_REQUEST,
            IngestError::Imap(_) => StatusCode::BAD_GATEWAY,
            IngestError::MockFile { .. } | IngestError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_statuses() {
        let cases = [
            (PipelineError::email_not_found("x"), StatusCode::NOT_FOUND),
            (
                PipelineError::ProcessingFailed {
                    email_id: "x".into(),
                    source: LlmError::Unavailable {
                        reason: "no key".into(),
                    },
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                PipelineError::Llm(LlmError::CallFailed {
                    provider: "p".into(),
                    reason: "boom".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                PipelineError::Database(DatabaseError::Query("q".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn ingest_not_configured_is_client_error() {
        assert_eq!(
            ApiError::from(IngestError::NotConfigured).status,
            StatusCode::BAD_REQUEST
        );
    }
}
