//! Registration endpoint
//!
//! Synchronous request/response: eligibility check, provider call
//! registration, response row creation. The access credential for joining
//! the call is returned only on success.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::db;
use crate::eligibility::{DenyReason, Eligibility};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Registration request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub interview_id: String,
    /// Respondent identity; required unless the interview is anonymous
    pub email: Option<String>,
    pub name: Option<String>,
    /// Opaque context forwarded to the voice agent (candidate name, role, ...)
    #[serde(default)]
    pub dynamic_context: serde_json::Map<String, Value>,
}

/// Registration response: what the client needs to join the call
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub call_id: String,
    pub access_token: String,
}

/// POST /api/register
pub async fn register_attempt(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    if request.interview_id.trim().is_empty() {
        return Err(ApiError::BadRequest("missing interview_id".to_string()));
    }

    let interview = db::interviews::load_interview(&state.db, &request.interview_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("interview {} not found", request.interview_id))
        })?;

    if !interview.is_active {
        return Err(ApiError::InterviewInactive);
    }

    // Usage cap: reaching it deactivates the interview. A boundary effect
    // on the interview record, not part of the response state machine.
    if let Some(cap) = interview.response_cap {
        let count = db::responses::count_for_interview(&state.db, &interview.interview_id).await?;
        if count >= cap {
            warn!(
                interview_id = %interview.interview_id,
                cap,
                "Response cap reached, deactivating interview"
            );
            db::interviews::set_active(&state.db, &interview.interview_id, false).await?;
            return Err(ApiError::InterviewInactive);
        }
    }

    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    if !interview.is_anonymous && email.is_none() {
        return Err(ApiError::BadRequest(
            "email is required for this interview".to_string(),
        ));
    }

    match state.eligibility.may_start(&interview, email).await {
        Eligibility::Allowed => {}
        Eligibility::Denied(DenyReason::NotInvited) => return Err(ApiError::NotInvited),
        Eligibility::Denied(DenyReason::AlreadyResponded) => {
            return Err(ApiError::AlreadyResponded)
        }
    }

    // The provider assigns the call_id; no row exists until it has.
    let registration = state
        .voice
        .register_call(interview.agent_id.as_deref(), &request.dynamic_context)
        .await?;

    // Identity is only persisted for non-anonymous interviews.
    let (stored_email, stored_name) = if interview.is_anonymous {
        (None, None)
    } else {
        (
            email.map(str::to_string),
            request
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        )
    };

    // AlreadyRegistered is success: provider call ids are unique per attempt.
    state
        .lifecycle
        .register_attempt(
            &interview.interview_id,
            &registration.call_id,
            stored_email,
            stored_name,
        )
        .await?;

    info!(
        interview_id = %interview.interview_id,
        call_id = %registration.call_id,
        "Registration complete"
    );

    Ok(Json(RegisterResponse {
        call_id: registration.call_id,
        access_token: registration.access_token,
    }))
}

/// Build registration routes
pub fn register_routes() -> Router<AppState> {
    Router::new().route("/api/register", post(register_attempt))
}
