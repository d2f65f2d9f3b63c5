//! Webhook receiver
//!
//! Entry point for the voice gateway's asynchronous event deliveries. The
//! signature is verified against the raw, unparsed body bytes before
//! anything else happens; an invalid signature mutates nothing and leaks
//! nothing beyond "unauthorized".
//!
//! Unknown event types are acknowledged with 2xx and ignored. Returning an
//! error would put the delivery on the provider's retry schedule forever
//! for events this service doesn't care about.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::providers::voice::verify_webhook_signature;
use crate::AppState;

/// Header carrying the hex signature of the raw body
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Inbound event envelope
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    pub call: WebhookCall,
}

/// Call payload within an envelope; unrecognized provider fields are ignored
#[derive(Debug, Deserialize)]
pub struct WebhookCall {
    #[serde(default)]
    pub call_id: String,
    pub start_timestamp_ms: Option<i64>,
    pub end_timestamp_ms: Option<i64>,
    pub tab_switch_count: Option<i64>,
    pub transcript: Option<String>,
}

/// POST /webhook
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    // Verify before parse; the hash covers the raw bytes.
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    if !verify_webhook_signature(&body, &state.webhook_secret, signature) {
        warn!("Webhook rejected: invalid signature");
        return Err(ApiError::Unauthorized);
    }

    let envelope: WebhookEnvelope = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("malformed webhook payload: {}", e)))?;

    if envelope.call.call_id.trim().is_empty() {
        return Err(ApiError::BadRequest("missing call_id".to_string()));
    }
    let call_id = envelope.call.call_id.clone();

    match envelope.event.as_str() {
        "call_started" => {
            state.lifecycle.call_started(&call_id).await?;
            Ok(StatusCode::OK)
        }
        "call_ended" => {
            state
                .lifecycle
                .call_ended(
                    &call_id,
                    envelope.call.start_timestamp_ms,
                    envelope.call.end_timestamp_ms,
                    envelope.call.tab_switch_count,
                )
                .await?;

            // Keep the transcript when the event carried one (set-once)
            if let Some(transcript) = envelope
                .call
                .transcript
                .as_deref()
                .filter(|t| !t.trim().is_empty())
            {
                crate::db::responses::attach_transcript(&state.db, &call_id, transcript).await?;
            }
            Ok(StatusCode::OK)
        }
        "call_analyzed" => {
            // Answer sub-second; the scoring pipeline takes seconds and
            // must not block the provider's delivery thread. The poll
            // endpoint converges on the same compare-and-set if this task
            // dies midway.
            let analytics = state.analytics.clone();
            tokio::spawn(async move {
                match analytics.analyse(&call_id).await {
                    Ok(document) => {
                        info!(
                            call_id = %call_id,
                            overall_score = document.overall_score,
                            "Webhook-triggered analysis complete"
                        );
                    }
                    Err(err) => {
                        error!(
                            call_id = %call_id,
                            error = %err,
                            "Webhook-triggered analysis failed"
                        );
                    }
                }
            });
            Ok(StatusCode::ACCEPTED)
        }
        other => {
            debug!(event = %other, call_id = %call_id, "Ignoring unrecognized webhook event");
            Ok(StatusCode::OK)
        }
    }
}

/// Build webhook routes
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhook", post(receive_webhook))
}
