//! Response endpoints: poll/refresh, analysis triggers, operator actions
//!
//! The poll endpoint is the client's fallback for unreliable webhooks; it
//! is safe to call repeatedly because analysis always short-circuits on an
//! existing document. The correction endpoint gives operators the same
//! triggers plus forced state fixes, with the operator identity logged for
//! audit.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Disposition, ResponseSnapshot, ScoreDocument};
use crate::AppState;

/// GET /api/responses/:call_id
///
/// Current snapshot: lifecycle state plus analytics when present.
pub async fn get_response(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> ApiResult<Json<ResponseSnapshot>> {
    let response = db::responses::load_response(&state.db, &call_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no response for call {}", call_id)))?;
    Ok(Json(response.into()))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub interview_id: String,
}

/// GET /api/responses?interview_id=...
pub async fn list_responses(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ResponseSnapshot>>> {
    if query.interview_id.trim().is_empty() {
        return Err(ApiError::BadRequest("missing interview_id".to_string()));
    }
    let responses = db::responses::list_for_interview(&state.db, &query.interview_id).await?;
    Ok(Json(responses.into_iter().map(Into::into).collect()))
}

/// POST /api/responses/:call_id/analyse
///
/// Polling fallback for the webhook path. Idempotent: an existing document
/// is returned without touching the scoring provider.
pub async fn analyse_response(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> ApiResult<Json<ScoreDocument>> {
    let document = state.analytics.analyse(&call_id).await?;
    Ok(Json(document))
}

#[derive(Debug, Deserialize)]
pub struct TabSwitchRequest {
    pub count: i64,
}

/// POST /api/responses/:call_id/tab-switch
///
/// Client heartbeat. Monotonic max, so racing heartbeats are harmless.
pub async fn record_tab_switch(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
    Json(request): Json<TabSwitchRequest>,
) -> ApiResult<StatusCode> {
    if request.count < 0 {
        return Err(ApiError::BadRequest(
            "tab switch count cannot be negative".to_string(),
        ));
    }
    state
        .lifecycle
        .record_tab_switches(&call_id, request.count)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Operator correction actions
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CorrectionRequest {
    /// Re-run analysis; same idempotency guarantees as the poll path
    Reanalyse,
    /// Failed -> Ended so the pipeline can be retried
    Reset,
    /// Force the response into Failed with a reason
    Fail { reason: String },
    /// Overwrite the candidate disposition
    Disposition { disposition: String },
}

/// POST /api/responses/:call_id/correct
///
/// Operator-triggered corrections. The operator identity (X-Operator
/// header) is logged for audit on every action.
pub async fn correct_response(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<CorrectionRequest>,
) -> ApiResult<Json<ResponseSnapshot>> {
    let operator = headers
        .get("x-operator")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    // The row must exist before any correction is attempted.
    db::responses::load_response(&state.db, &call_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no response for call {}", call_id)))?;

    match &request {
        CorrectionRequest::Reanalyse => {
            info!(call_id = %call_id, operator = %operator, "Operator correction: reanalyse");
            state.analytics.analyse(&call_id).await?;
        }
        CorrectionRequest::Reset => {
            info!(call_id = %call_id, operator = %operator, "Operator correction: reset failure");
            if !state.lifecycle.reset_failure(&call_id).await? {
                return Err(ApiError::BadRequest(
                    "only a Failed response can be reset".to_string(),
                ));
            }
        }
        CorrectionRequest::Fail { reason } => {
            info!(
                call_id = %call_id,
                operator = %operator,
                reason = %reason,
                "Operator correction: force failure"
            );
            state.lifecycle.hard_failure(&call_id, reason).await?;
        }
        CorrectionRequest::Disposition { disposition } => {
            let disposition = Disposition::parse(disposition).ok_or_else(|| {
                ApiError::BadRequest(format!("unknown disposition: {}", disposition))
            })?;
            info!(
                call_id = %call_id,
                operator = %operator,
                disposition = %disposition,
                "Operator correction: set disposition"
            );
            state.lifecycle.set_disposition(&call_id, disposition).await?;
        }
    }

    let response = db::responses::load_response(&state.db, &call_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no response for call {}", call_id)))?;
    Ok(Json(response.into()))
}

/// DELETE /api/responses/:call_id
///
/// Manual operator deletion; responses are never deleted automatically.
pub async fn delete_response(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let operator = headers
        .get("x-operator")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let deleted = db::responses::delete_response(&state.db, &call_id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("no response for call {}", call_id)));
    }

    info!(call_id = %call_id, operator = %operator, "Response deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Build response routes
pub fn response_routes() -> Router<AppState> {
    Router::new()
        .route("/api/responses", get(list_responses))
        .route(
            "/api/responses/:call_id",
            get(get_response).delete(delete_response),
        )
        .route("/api/responses/:call_id/analyse", post(analyse_response))
        .route("/api/responses/:call_id/tab-switch", post(record_tab_switch))
        .route("/api/responses/:call_id/correct", post(correct_response))
}
