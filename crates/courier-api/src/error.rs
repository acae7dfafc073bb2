//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Engine errors keep their reason code; request-shape failures are
//! reported before the engine is reached. Internal error details are never
//! returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use courier_core::ValidationError;
use courier_engine::EngineError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable reason code (e.g. "NOT_FOUND", "SENSOR_BUSY").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Error, Debug)]
pub enum AppError {
    /// Error raised by a marketplace operation.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request parsed but a field is invalid (422).
    #[error("invalid input: {0}")]
    Validation(String),

    /// No authenticated principal (401).
    #[error("unauthenticated: {0}")]
    Unauthorized(String),

    /// A backing service is not ready (503).
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl AppError {
    /// HTTP status and reason code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Engine(err) => (engine_status(err), err.code()),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_INPUT"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            Self::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }

    fn is_internal(&self) -> bool {
        matches!(self, Self::Engine(EngineError::Internal(_)))
    }
}

fn engine_status(err: &EngineError) -> StatusCode {
    match err {
        EngineError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Unauthenticated => StatusCode::UNAUTHORIZED,
        EngineError::Forbidden(_) | EngineError::NotOwned(_) => StatusCode::FORBIDDEN,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::SensorBusy(_)
        | EngineError::AlreadyReported
        | EngineError::CourierHasNotReported
        | EngineError::ConflictingWrite(_) => StatusCode::CONFLICT,
        EngineError::PreconditionFailed(_) => StatusCode::BAD_REQUEST,
        EngineError::LedgerUnavailable(_) => StatusCode::BAD_GATEWAY,
        EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if self.is_internal() {
            tracing::error!(error = %self, "internal server error");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[test]
    fn engine_errors_map_to_documented_statuses() {
        let cases = [
            (EngineError::InvalidInput("x".into()), 422, "INVALID_INPUT"),
            (EngineError::Unauthenticated, 401, "UNAUTHENTICATED"),
            (EngineError::Forbidden("x".into()), 403, "FORBIDDEN"),
            (EngineError::NotFound("x".into()), 404, "NOT_FOUND"),
            (EngineError::NotOwned("x".into()), 403, "NOT_OWNED"),
            (EngineError::SensorBusy("x".into()), 409, "SENSOR_BUSY"),
            (EngineError::AlreadyReported, 409, "ALREADY_REPORTED"),
            (EngineError::CourierHasNotReported, 409, "COURIER_HAS_NOT_REPORTED"),
            (EngineError::PreconditionFailed("x".into()), 400, "PRECONDITION_FAILED"),
            (EngineError::LedgerUnavailable("x".into()), 502, "LEDGER_UNAVAILABLE"),
            (EngineError::ConflictingWrite("x".into()), 409, "CONFLICTING_WRITE"),
            (EngineError::Internal("x".into()), 500, "INTERNAL_ERROR"),
        ];
        for (err, status, code) in cases {
            let (s, c) = AppError::from(err).status_and_code();
            assert_eq!(s.as_u16(), status, "{code}");
            assert_eq!(c, code);
        }
    }

    #[test]
    fn validation_error_from_core() {
        let err = AppError::from(ValidationError::field("title", "must not be blank"));
        assert_eq!(err.status_and_code().1, "INVALID_INPUT");
    }

    #[tokio::test]
    async fn into_response_carries_reason_code() {
        let (status, body) = response_parts(EngineError::SensorBusy("pi-01".into()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.code, "SENSOR_BUSY");
        assert!(body.error.message.contains("pi-01"));
        assert!(body.error.details.is_none());
    }

    #[tokio::test]
    async fn into_response_internal_hides_details() {
        let (status, body) =
            response_parts(EngineError::Internal("pool timed out".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert_eq!(body.error.message, "An internal error occurred");
    }

    #[tokio::test]
    async fn into_response_bad_request() {
        let (status, body) = response_parts(AppError::BadRequest("malformed".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error.code, "BAD_REQUEST");
    }

    #[test]
    fn error_body_skips_empty_details() {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "NOT_FOUND".to_string(),
                message: "gone".to_string(),
                details: None,
            },
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("details"));
    }
}
