//! External provider adapters
//!
//! Thin clients for the voice call gateway and the LLM scoring service.
//! Both sit behind async traits so the orchestration layers can be
//! exercised against in-process fakes. Every failure carries a typed kind;
//! retry policy keys off the kind, never off the message text.

pub mod scoring;
pub mod voice;

pub use scoring::{CompletionScoringClient, ScoreProvider};
pub use voice::{CallDetail, CallRegistration, VoiceGatewayClient, VoiceProvider};

use thiserror::Error;

/// Classification applied to every provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Rate limits, timeouts, 5xx: safe to retry with backoff
    Transient,
    /// Bad request or unparseable payload: retrying cannot help
    Permanent,
    /// Invalid or exhausted credentials: surface immediately, never retry
    Unauthorized,
}

/// Error from a provider adapter, tagged with its retry classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Unauthorized,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ProviderErrorKind::Transient
    }
}

/// Map an HTTP error status to a provider error
///
/// 429 and 5xx are worth retrying; 401/403 mean the credentials are bad and
/// retrying would only burn the budget; everything else is permanent.
pub(crate) fn error_for_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let message = format!("provider returned {}: {}", status, body);
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        ProviderError::unauthorized(message)
    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ProviderError::transient(message)
    } else {
        ProviderError::permanent(message)
    }
}

/// Map a reqwest transport error to a provider error
///
/// Timeouts and connection failures are transient by definition.
pub(crate) fn error_for_transport(err: reqwest::Error) -> ProviderError {
    ProviderError::transient(format!("provider request failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, "").kind,
            ProviderErrorKind::Transient
        );
        assert_eq!(
            error_for_status(StatusCode::INTERNAL_SERVER_ERROR, "").kind,
            ProviderErrorKind::Transient
        );
        assert_eq!(
            error_for_status(StatusCode::UNAUTHORIZED, "").kind,
            ProviderErrorKind::Unauthorized
        );
        assert_eq!(
            error_for_status(StatusCode::FORBIDDEN, "").kind,
            ProviderErrorKind::Unauthorized
        );
        assert_eq!(
            error_for_status(StatusCode::BAD_REQUEST, "").kind,
            ProviderErrorKind::Permanent
        );
        assert_eq!(
            error_for_status(StatusCode::NOT_FOUND, "").kind,
            ProviderErrorKind::Permanent
        );
    }
}
