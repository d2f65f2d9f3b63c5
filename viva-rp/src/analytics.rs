//! Analytics orchestrator
//!
//! Drives the scoring pipeline for one response: gather transcript and
//! questions, call the scoring provider, validate, persist exactly once.
//! Invoked from three independent triggers (webhook, client poll, operator
//! retry), so idempotency is the whole game: an existing document
//! short-circuits before any provider call, and the final write is a
//! compare-and-set on `analytics IS NULL`.
//!
//! Within one process, concurrent analyse calls for the same call_id are
//! additionally coalesced through a per-call gate so the provider is billed
//! at most once. The gate never covers the database record itself; the
//! long-latency scoring call runs without any storage lock held, and
//! cross-process races still resolve through the CAS.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use viva_common::events::{EventBus, VivaEvent};

use crate::db;
use crate::models::ScoreDocument;
use crate::providers::voice::CallDetail;
use crate::providers::{ProviderError, ScoreProvider, VoiceProvider};
use sqlx::SqlitePool;

/// Pipeline failure, tagged so callers can apply the right policy
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// No response row for this call_id
    #[error("no response found for call {0}")]
    ResponseNotFound(String),

    /// The response is Failed; terminal for the automatic pipeline
    #[error("response is in Failed state; reset it before re-running analysis")]
    ResponseFailed,

    /// Neither the record nor the provider yielded a transcript (permanent)
    #[error("no transcript available")]
    NoTranscript,

    /// The owning interview has no questions configured (permanent)
    #[error("no questions configured for this interview")]
    NoQuestions,

    /// Provider returned something that is not a valid score document
    /// (permanent; retrying the same prompt is not assumed to help)
    #[error("malformed score document: {0}")]
    MalformedScoreDocument(String),

    /// Provider failure, kind preserved for retry policy
    #[error("scoring provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Storage failure
    #[error("storage error: {0}")]
    Storage(#[from] viva_common::Error),
}

/// Orchestrates the scoring pipeline over the response store
#[derive(Clone)]
pub struct AnalyticsOrchestrator {
    db: SqlitePool,
    event_bus: EventBus,
    voice: Arc<dyn VoiceProvider>,
    scoring: Arc<dyn ScoreProvider>,
    /// Per-call in-process gates coalescing concurrent analyse calls
    inflight: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl AnalyticsOrchestrator {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        voice: Arc<dyn VoiceProvider>,
        scoring: Arc<dyn ScoreProvider>,
    ) -> Self {
        Self {
            db,
            event_bus,
            voice,
            scoring,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run (or short-circuit) analysis for a call
    ///
    /// Returns the persisted document, whether this invocation produced it
    /// or an earlier one did.
    pub async fn analyse(&self, call_id: &str) -> Result<ScoreDocument, AnalyticsError> {
        let gate = self.claim(call_id).await;
        let result = {
            let _guard = gate.lock().await;
            self.analyse_locked(call_id).await
        };
        self.release(call_id, gate).await;
        result
    }

    async fn analyse_locked(&self, call_id: &str) -> Result<ScoreDocument, AnalyticsError> {
        // Step 1: load and short-circuit on an existing document. No
        // provider call is ever made for an already-analysed response.
        let response = db::responses::load_response(&self.db, call_id)
            .await?
            .ok_or_else(|| AnalyticsError::ResponseNotFound(call_id.to_string()))?;

        if let Some(existing) = response.analytics {
            info!(call_id = %call_id, "Analytics already present, returning existing document");
            return Ok(existing);
        }

        // Failed is terminal for the automatic pipeline; only a manual
        // reset reopens it.
        if response.lifecycle_state == crate::models::LifecycleState::Failed {
            return Err(AnalyticsError::ResponseFailed);
        }

        // Step 2: resolve the transcript, preferring the stored one
        let mut call_detail: Option<CallDetail> = None;
        let transcript = match response
            .transcript
            .as_deref()
            .filter(|t| !t.trim().is_empty())
        {
            Some(t) => t.to_string(),
            None => {
                let detail = self.voice.get_call_detail(call_id).await?;
                let transcript = detail
                    .transcript
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .ok_or(AnalyticsError::NoTranscript)?;

                // Keep the fetched transcript; the set-once guard makes a
                // concurrent writer harmless.
                db::responses::attach_transcript(&self.db, call_id, &transcript).await?;
                call_detail = Some(detail);
                transcript
            }
        };

        // Step 3: resolve the question set
        let interview = db::interviews::load_interview(&self.db, &response.interview_id)
            .await?
            .ok_or(AnalyticsError::NoQuestions)?;
        if interview.questions.is_empty() {
            return Err(AnalyticsError::NoQuestions);
        }

        // Step 4: score. The adapter owns transient retry/backoff; whatever
        // comes back as an error here is final for this invocation.
        let raw = self
            .scoring
            .score(&transcript, &interview.objective, &interview.questions)
            .await?;

        // Step 5: parse and validate at the boundary; failures are permanent
        let document =
            ScoreDocument::from_json(&raw).map_err(AnalyticsError::MalformedScoreDocument)?;

        // Step 6: duration fallback from provider timestamps
        let duration = response
            .duration_seconds
            .or_else(|| call_detail.as_ref().and_then(|d| d.duration_seconds()));

        // Step 7: conditional persist; losing the race is not an error
        let won = db::responses::persist_analytics(&self.db, call_id, &document, duration).await?;

        if won {
            info!(
                call_id = %call_id,
                overall_score = document.overall_score,
                "Analytics persisted"
            );
            self.event_bus.emit_lossy(VivaEvent::AnalyticsReady {
                call_id: call_id.to_string(),
                overall_score: document.overall_score,
                timestamp: chrono::Utc::now(),
            });
            return Ok(document);
        }

        // Another orchestration won the write; re-read and return its
        // document so all callers observe the same value.
        warn!(call_id = %call_id, "Lost analytics write race, returning winner's document");
        let winner = db::responses::load_response(&self.db, call_id)
            .await?
            .ok_or_else(|| AnalyticsError::ResponseNotFound(call_id.to_string()))?;
        winner
            .analytics
            .ok_or_else(|| AnalyticsError::Storage(viva_common::Error::Internal(
                "analytics missing after lost write race".to_string(),
            )))
    }

    /// Fetch (or create) the in-process gate for a call_id
    async fn claim(&self, call_id: &str) -> Arc<Mutex<()>> {
        let mut inflight = self.inflight.lock().await;
        inflight
            .entry(call_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the gate entry once no other caller holds it
    async fn release(&self, call_id: &str, gate: Arc<Mutex<()>>) {
        let mut inflight = self.inflight.lock().await;
        // Two strong counts: the map's and ours. Anything higher means
        // another caller is still queued on this gate.
        if Arc::strong_count(&gate) <= 2 {
            inflight.remove(call_id);
        }
    }
}
