//! Scoring provider client
//!
//! Submits a transcript plus numbered question list to an LLM completion
//! API and returns the provider's raw score document. Transient failures
//! (rate limits, timeouts, 5xx) are retried here with bounded exponential
//! backoff; everything else surfaces immediately with its kind intact.
//! Parsing and validation of the returned document happen in the analytics
//! orchestrator, where a parse failure is permanent and must not trigger a
//! retry of the same prompt.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::providers::{error_for_status, error_for_transport, ProviderError};

/// Hard timeout on a single scoring request
const SCORING_TIMEOUT: Duration = Duration::from_secs(60);

/// Retry budget for transient failures
const MAX_ATTEMPTS: u32 = 5;

/// First backoff delay; doubles each attempt, capped below
const INITIAL_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 8_000;

/// Seam for the external scoring service
#[async_trait]
pub trait ScoreProvider: Send + Sync {
    /// Score a transcript against an interview's questions
    ///
    /// Returns the provider's raw score-document JSON.
    async fn score(
        &self,
        transcript: &str,
        objective: &str,
        questions: &[String],
    ) -> Result<String, ProviderError>;
}

/// LLM completion API client
pub struct CompletionScoringClient {
    http_client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

impl CompletionScoringClient {
    pub fn new(base_url: impl Into<String>, api_key: &str, model: impl Into<String>) -> Self {
        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .unwrap_or_else(|_| header::HeaderValue::from_static("Bearer invalid"));
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        Self {
            http_client: Client::builder()
                .timeout(SCORING_TIMEOUT)
                .default_headers(headers)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    /// One completion request, no retry
    async fn request_completion(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                {
                    "role": "system",
                    "content": "You are an expert interviewer evaluating a candidate's \
                                interview transcript. Respond with a single JSON object \
                                containing overall_score (0-100), overall_feedback, and \
                                question_summaries (one entry per numbered question, each \
                                with question, summary and an optional score)."
                },
                { "role": "user", "content": prompt }
            ]
        });

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(error_for_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            ProviderError::permanent(format!("Failed to parse completion response: {}", e))
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::permanent("completion response contained no choices"))
    }
}

/// Build the scoring prompt from transcript, objective and numbered questions
fn build_prompt(transcript: &str, objective: &str, questions: &[String]) -> String {
    let mut prompt = String::new();
    if !objective.trim().is_empty() {
        prompt.push_str("Interview objective: ");
        prompt.push_str(objective.trim());
        prompt.push_str("\n\n");
    }
    prompt.push_str("Questions:\n");
    for (idx, question) in questions.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", idx + 1, question));
    }
    prompt.push_str("\nTranscript:\n");
    prompt.push_str(transcript);
    prompt
}

#[async_trait]
impl ScoreProvider for CompletionScoringClient {
    async fn score(
        &self,
        transcript: &str,
        objective: &str,
        questions: &[String],
    ) -> Result<String, ProviderError> {
        let prompt = build_prompt(transcript, objective, questions);
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        for attempt in 1..=MAX_ATTEMPTS {
            debug!(attempt, model = %self.model, "Requesting score from provider");

            match self.request_completion(&prompt).await {
                Ok(content) => return Ok(content),
                Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                    warn!(
                        attempt,
                        backoff_ms,
                        error = %err,
                        "Transient scoring failure, will retry after backoff"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
                }
                Err(err) => return Err(err),
            }
        }

        unreachable!("retry loop always returns on the final attempt")
    }
}
