//! Error types for viva-rp
//!
//! `ApiError` is the HTTP boundary: permanent caller errors map to 4xx with
//! a stable reason code, transient downstream failures map to 5xx so
//! webhook senders and clients retry on their own schedule.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analytics::AnalyticsError;
use crate::providers::{ProviderError, ProviderErrorKind};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Signature or credential failure (401); deliberately detail-free
    #[error("Unauthorized")]
    Unauthorized,

    /// Respondent not on the interview's allow-list (403)
    #[error("Respondent is not invited to this interview")]
    NotInvited,

    /// Respondent already has an attempt on this interview (409)
    #[error("Respondent has already responded to this interview")]
    AlreadyResponded,

    /// Interview exists but is not accepting registrations (409)
    #[error("Interview is not active")]
    InterviewInactive,

    /// Permanent pipeline failure (422); precise code for operator surfaces
    #[error("{message}")]
    Unprocessable {
        code: &'static str,
        message: String,
    },

    /// Transient downstream failure (502); callers retry
    #[error("Upstream provider error: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// viva-common error
    #[error("Common error: {0}")]
    Common(#[from] viva_common::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "unauthorized".to_string(),
            ),
            ApiError::NotInvited => (
                StatusCode::FORBIDDEN,
                "NotInvited",
                "respondent is not invited to this interview".to_string(),
            ),
            ApiError::AlreadyResponded => (
                StatusCode::CONFLICT,
                "AlreadyResponded",
                "respondent has already responded to this interview".to_string(),
            ),
            ApiError::InterviewInactive => (
                StatusCode::CONFLICT,
                "InterviewInactive",
                "interview is not active".to_string(),
            ),
            ApiError::Unprocessable { code, message } => {
                (StatusCode::UNPROCESSABLE_ENTITY, code, message)
            }
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err.kind {
            // Webhook senders and clients retry 5xx on their own
            ProviderErrorKind::Transient => ApiError::Upstream(err.message),
            // Our credentials, our problem: never blame the caller
            ProviderErrorKind::Unauthorized => {
                ApiError::Internal(format!("provider rejected credentials: {}", err.message))
            }
            ProviderErrorKind::Permanent => ApiError::Internal(err.message),
        }
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::ResponseNotFound(call_id) => {
                ApiError::NotFound(format!("no response for call {}", call_id))
            }
            AnalyticsError::ResponseFailed => ApiError::Unprocessable {
                code: "RESPONSE_FAILED",
                message: "response is in Failed state; reset it before re-running analysis"
                    .to_string(),
            },
            AnalyticsError::NoTranscript => ApiError::Unprocessable {
                code: "NO_TRANSCRIPT",
                message: "no transcript available for this call".to_string(),
            },
            AnalyticsError::NoQuestions => ApiError::Unprocessable {
                code: "NO_QUESTIONS",
                message: "no questions configured for this interview".to_string(),
            },
            AnalyticsError::MalformedScoreDocument(detail) => ApiError::Unprocessable {
                code: "MALFORMED_SCORE_DOCUMENT",
                message: detail,
            },
            AnalyticsError::Provider(provider_err) => provider_err.into(),
            AnalyticsError::Storage(common_err) => ApiError::Common(common_err),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
