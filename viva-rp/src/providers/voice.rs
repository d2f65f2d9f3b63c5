//! Voice gateway client
//!
//! Registers calls with the external realtime voice service, fetches call
//! detail after the fact, and verifies inbound webhook signatures. The
//! audio transport itself is entirely the gateway's problem; this adapter
//! only ever sees identifiers, transcripts and timestamps.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;

use crate::providers::{error_for_status, error_for_transport, ProviderError};

/// Default timeout for voice gateway API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Seam for the external call service
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Register a new call; the returned call_id becomes the response key
    async fn register_call(
        &self,
        agent_id: Option<&str>,
        dynamic_context: &serde_json::Map<String, Value>,
    ) -> Result<CallRegistration, ProviderError>;

    /// Fetch call metadata (transcript, timestamps, recording URL)
    async fn get_call_detail(&self, call_id: &str) -> Result<CallDetail, ProviderError>;
}

/// Provider response to a call registration
#[derive(Debug, Clone, Deserialize)]
pub struct CallRegistration {
    pub call_id: String,
    /// Credential the candidate's client needs to join the call
    pub access_token: String,
}

/// Call metadata as reported by the gateway
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallDetail {
    pub call_id: String,
    pub transcript: Option<String>,
    pub start_timestamp_ms: Option<i64>,
    pub end_timestamp_ms: Option<i64>,
    pub recording_url: Option<String>,
    pub sentiment: Option<String>,
    pub summary: Option<String>,
}

impl CallDetail {
    /// Call duration in whole seconds, when both timestamps were reported
    pub fn duration_seconds(&self) -> Option<i64> {
        duration_from_timestamps(self.start_timestamp_ms, self.end_timestamp_ms)
    }
}

/// Whole-second duration from provider millisecond timestamps
///
/// Rounded, clamped at zero; never derived from wall-clock polling.
pub fn duration_from_timestamps(start_ms: Option<i64>, end_ms: Option<i64>) -> Option<i64> {
    match (start_ms, end_ms) {
        (Some(start), Some(end)) => {
            let elapsed_ms = (end - start).max(0);
            Some(((elapsed_ms as f64) / 1000.0).round() as i64)
        }
        _ => None,
    }
}

/// Compute the webhook signature for a raw body and shared secret
///
/// Hex-encoded SHA-256 over `body || secret`. The hash must cover the raw,
/// unparsed bytes; re-serializing the JSON would change them.
pub fn compute_signature(body: &[u8], secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Verify an inbound webhook signature against the raw request body
pub fn verify_webhook_signature(body: &[u8], secret: &str, signature: &str) -> bool {
    compute_signature(body, secret) == signature.trim()
}

/// HTTP client for the voice gateway
pub struct VoiceGatewayClient {
    http_client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct RegisterCallRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_id: Option<&'a str>,
    dynamic_context: &'a serde_json::Map<String, Value>,
}

impl VoiceGatewayClient {
    /// Create a new client authenticating with a bearer API key
    pub fn new(base_url: impl Into<String>, api_key: &str) -> Self {
        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .unwrap_or_else(|_| header::HeaderValue::from_static("Bearer invalid"));
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .default_headers(headers)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl VoiceProvider for VoiceGatewayClient {
    async fn register_call(
        &self,
        agent_id: Option<&str>,
        dynamic_context: &serde_json::Map<String, Value>,
    ) -> Result<CallRegistration, ProviderError> {
        let url = format!("{}/v1/calls", self.base_url);
        debug!(agent_id = ?agent_id, "Registering call with voice gateway");

        let response = self
            .http_client
            .post(&url)
            .json(&RegisterCallRequest {
                agent_id,
                dynamic_context,
            })
            .send()
            .await
            .map_err(error_for_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        let registration: CallRegistration = response.json().await.map_err(|e| {
            ProviderError::permanent(format!("Failed to parse call registration: {}", e))
        })?;

        debug!(call_id = %registration.call_id, "Call registered");
        Ok(registration)
    }

    async fn get_call_detail(&self, call_id: &str) -> Result<CallDetail, ProviderError> {
        let url = format!("{}/v1/calls/{}", self.base_url, call_id);
        debug!(call_id = %call_id, "Fetching call detail");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(error_for_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        response.json().await.map_err(|e| {
            ProviderError::permanent(format!("Failed to parse call detail: {}", e))
        })
    }
}
