//! Shared test helpers: scratch databases, fixtures and mock providers
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use viva_common::events::EventBus;

use viva_rp::db;
use viva_rp::models::Interview;
use viva_rp::providers::{
    CallDetail, CallRegistration, ProviderError, ScoreProvider, VoiceProvider,
};
use viva_rp::AppState;

pub const TEST_SECRET: &str = "test-webhook-secret";

/// Create a scratch database; the TempDir must outlive the pool
pub async fn setup_pool() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let db_path = dir.path().join("viva-test.db");
    let pool = db::init_database_pool(&db_path)
        .await
        .expect("Should initialize database");
    (pool, dir)
}

/// Seed an interview definition
pub async fn seed_interview(pool: &SqlitePool, interview: &Interview) {
    db::interviews::upsert_interview(pool, interview)
        .await
        .expect("Should seed interview");
}

/// Interview fixture with two questions, open allow-list
pub fn test_interview(interview_id: &str, is_anonymous: bool) -> Interview {
    Interview {
        interview_id: interview_id.to_string(),
        title: "Backend Engineer Screen".to_string(),
        objective: "Assess backend fundamentals".to_string(),
        questions: vec![
            "Tell me about a recent project.".to_string(),
            "How do you approach debugging?".to_string(),
        ],
        is_anonymous,
        allowlist: None,
        is_active: true,
        response_cap: None,
        agent_id: Some("agent_1".to_string()),
        created_at: Utc::now(),
    }
}

/// A score document the validator accepts
pub fn valid_score_json() -> String {
    serde_json::json!({
        "overall_score": 81.0,
        "overall_feedback": "Strong communication, concrete examples.",
        "question_summaries": [
            { "question": "Tell me about a recent project.", "summary": "Detailed walkthrough.", "score": 85.0 },
            { "question": "How do you approach debugging?", "summary": "Methodical.", "score": 77.0 }
        ]
    })
    .to_string()
}

/// Voice provider fake: deterministic call ids, configurable call detail
pub struct MockVoice {
    next_call: AtomicUsize,
    pub detail: Mutex<CallDetail>,
}

impl MockVoice {
    pub fn new() -> Self {
        Self {
            next_call: AtomicUsize::new(1),
            detail: Mutex::new(CallDetail::default()),
        }
    }

    pub fn with_detail(detail: CallDetail) -> Self {
        Self {
            next_call: AtomicUsize::new(1),
            detail: Mutex::new(detail),
        }
    }

    pub fn set_detail(&self, detail: CallDetail) {
        *self.detail.lock().unwrap() = detail;
    }
}

#[async_trait]
impl VoiceProvider for MockVoice {
    async fn register_call(
        &self,
        _agent_id: Option<&str>,
        _dynamic_context: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<CallRegistration, ProviderError> {
        let n = self.next_call.fetch_add(1, Ordering::SeqCst);
        Ok(CallRegistration {
            call_id: format!("call_{}", n),
            access_token: format!("tok_{}", n),
        })
    }

    async fn get_call_detail(&self, call_id: &str) -> Result<CallDetail, ProviderError> {
        let mut detail = self.detail.lock().unwrap().clone();
        detail.call_id = call_id.to_string();
        Ok(detail)
    }
}

/// Scoring provider fake: counts invocations, returns a configurable body
pub struct MockScoring {
    pub calls: AtomicUsize,
    raw: Mutex<String>,
    delay_ms: u64,
}

impl MockScoring {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            raw: Mutex::new(valid_score_json()),
            delay_ms: 0,
        }
    }

    /// Add artificial latency to widen race windows in concurrency tests
    pub fn with_delay_ms(delay_ms: u64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            raw: Mutex::new(valid_score_json()),
            delay_ms,
        }
    }

    pub fn set_raw(&self, raw: impl Into<String>) {
        *self.raw.lock().unwrap() = raw.into();
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoreProvider for MockScoring {
    async fn score(
        &self,
        _transcript: &str,
        _objective: &str,
        _questions: &[String],
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        Ok(self.raw.lock().unwrap().clone())
    }
}

/// Build application state over mocks
pub fn make_state(
    pool: SqlitePool,
    voice: Arc<MockVoice>,
    scoring: Arc<MockScoring>,
) -> AppState {
    AppState::new(
        pool,
        EventBus::new(100),
        voice,
        scoring,
        TEST_SECRET.to_string(),
    )
}
