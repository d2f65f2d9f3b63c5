//! Integration tests for the viva-rp gateway endpoints
//!
//! Drives the full router with tower's oneshot, covering webhook signature
//! enforcement, registration reason codes and the poll/correction surface.

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

use helpers::{make_state, seed_interview, setup_pool, test_interview, MockScoring, MockVoice, TEST_SECRET};
use viva_rp::db;
use viva_rp::models::LifecycleState;
use viva_rp::providers::voice::compute_signature;

/// Test helper: JSON request without webhook signature
fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: signed webhook delivery
fn webhook_request(body: Value, secret: &str) -> Request<Body> {
    let raw = body.to_string();
    let signature = compute_signature(raw.as_bytes(), secret);
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("x-signature", signature)
        .body(Body::from(raw))
        .unwrap()
}

/// Test helper: extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Build an app plus handles the tests need to reach behind the router
async fn setup_app() -> (
    axum::Router,
    viva_rp::AppState,
    sqlx::SqlitePool,
    Arc<MockScoring>,
    tempfile::TempDir,
) {
    let (pool, dir) = setup_pool().await;
    let voice = Arc::new(MockVoice::new());
    let scoring = Arc::new(MockScoring::new());
    let state = make_state(pool.clone(), voice, scoring.clone());
    let app = viva_rp::build_router(state.clone());
    (app, state, pool, scoring, dir)
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _state, _pool, _scoring, _dir) = setup_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "viva-rp");
    assert!(body["version"].is_string());
}

// =============================================================================
// Webhook receiver
// =============================================================================

#[tokio::test]
async fn test_webhook_invalid_signature_mutates_nothing() {
    let (app, state, pool, _scoring, _dir) = setup_app().await;
    seed_interview(&pool, &test_interview("iv_1", true)).await;
    state
        .lifecycle
        .register_attempt("iv_1", "call_sig", None, None)
        .await
        .unwrap();

    let body = json!({ "event": "call_started", "call": { "call_id": "call_sig" } });
    let request = webhook_request(body, "wrong-secret");
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let error = extract_json(response.into_body()).await;
    assert_eq!(error["error"]["code"], "UNAUTHORIZED");

    // No state change
    let row = db::responses::load_response(&pool, "call_sig")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.lifecycle_state, LifecycleState::Created);
}

#[tokio::test]
async fn test_webhook_missing_signature_header_rejected() {
    let (app, _state, _pool, _scoring, _dir) = setup_app().await;

    let request = json_request(
        "POST",
        "/webhook",
        json!({ "event": "call_started", "call": { "call_id": "c" } }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_call_started_advances_state() {
    let (app, state, pool, _scoring, _dir) = setup_app().await;
    seed_interview(&pool, &test_interview("iv_1", true)).await;
    state
        .lifecycle
        .register_attempt("iv_1", "call_ws", None, None)
        .await
        .unwrap();

    let body = json!({ "event": "call_started", "call": { "call_id": "call_ws" } });
    let response = app.oneshot(webhook_request(body, TEST_SECRET)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let row = db::responses::load_response(&pool, "call_ws")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.lifecycle_state, LifecycleState::Started);
}

#[tokio::test]
async fn test_webhook_call_ended_sets_duration_and_transcript() {
    let (app, state, pool, _scoring, _dir) = setup_app().await;
    seed_interview(&pool, &test_interview("iv_1", true)).await;
    state
        .lifecycle
        .register_attempt("iv_1", "call_we", None, None)
        .await
        .unwrap();

    let body = json!({
        "event": "call_ended",
        "call": {
            "call_id": "call_we",
            "start_timestamp_ms": 0,
            "end_timestamp_ms": 61_500,
            "tab_switch_count": 3,
            "transcript": "Agent: Hello\nUser: Hi"
        }
    });
    let response = app.oneshot(webhook_request(body, TEST_SECRET)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let row = db::responses::load_response(&pool, "call_we")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.lifecycle_state, LifecycleState::Ended);
    assert_eq!(row.duration_seconds, Some(62));
    assert_eq!(row.tab_switch_count, 3);
    assert_eq!(row.transcript.as_deref(), Some("Agent: Hello\nUser: Hi"));
}

#[tokio::test]
async fn test_webhook_unknown_event_acknowledged() {
    let (app, _state, _pool, _scoring, _dir) = setup_app().await;

    let body = json!({ "event": "call_transferred", "call": { "call_id": "whatever" } });
    let response = app.oneshot(webhook_request(body, TEST_SECRET)).await.unwrap();

    // 2xx so the provider does not retry forever
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_malformed_payload_is_client_error() {
    let (app, _state, _pool, _scoring, _dir) = setup_app().await;

    let raw = "{ not json";
    let signature = compute_signature(raw.as_bytes(), TEST_SECRET);
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("x-signature", signature)
        .body(Body::from(raw))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_call_analyzed_hands_off_and_converges() {
    let (app, state, pool, scoring, _dir) = setup_app().await;
    seed_interview(&pool, &test_interview("iv_1", true)).await;
    state
        .lifecycle
        .register_attempt("iv_1", "call_wa", None, None)
        .await
        .unwrap();
    state
        .lifecycle
        .call_ended("call_wa", Some(0), Some(30_000), None)
        .await
        .unwrap();
    db::responses::attach_transcript(&pool, "call_wa", "Agent: Hello\nUser: Hi")
        .await
        .unwrap();

    let body = json!({ "event": "call_analyzed", "call": { "call_id": "call_wa" } });
    let response = app.oneshot(webhook_request(body, TEST_SECRET)).await.unwrap();

    // Accepted immediately; analysis runs in a spawned task
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // Wait for the background task to land the document
    let mut analysed = false;
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let row = db::responses::load_response(&pool, "call_wa")
            .await
            .unwrap()
            .unwrap();
        if row.lifecycle_state == LifecycleState::Analysed {
            analysed = true;
            break;
        }
    }
    assert!(analysed, "webhook-triggered analysis should complete");
    assert_eq!(scoring.call_count(), 1);
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_register_success_returns_credentials() {
    let (app, _state, pool, _scoring, _dir) = setup_app().await;
    seed_interview(&pool, &test_interview("iv_1", false)).await;

    let request = json_request(
        "POST",
        "/api/register",
        json!({ "interview_id": "iv_1", "email": "ada@example.com", "name": "Ada" }),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let call_id = body["call_id"].as_str().unwrap();
    assert!(body["access_token"].is_string());

    let row = db::responses::load_response(&pool, call_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.lifecycle_state, LifecycleState::Created);
    assert_eq!(row.email.as_deref(), Some("ada@example.com"));
    assert_eq!(row.name.as_deref(), Some("Ada"));
}

#[tokio::test]
async fn test_register_anonymous_interview_skips_identity() {
    let (app, _state, pool, _scoring, _dir) = setup_app().await;
    seed_interview(&pool, &test_interview("iv_anon", true)).await;

    // No email at all; anonymous interviews don't need one
    let request = json_request("POST", "/api/register", json!({ "interview_id": "iv_anon" }));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let row = db::responses::load_response(&pool, body["call_id"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(row.email.is_none());
}

#[tokio::test]
async fn test_register_unknown_interview_not_found() {
    let (app, _state, _pool, _scoring, _dir) = setup_app().await;

    let request = json_request(
        "POST",
        "/api/register",
        json!({ "interview_id": "iv_missing", "email": "a@b.c" }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_inactive_interview_rejected() {
    let (app, _state, pool, _scoring, _dir) = setup_app().await;
    let mut interview = test_interview("iv_off", false);
    interview.is_active = false;
    seed_interview(&pool, &interview).await;

    let request = json_request(
        "POST",
        "/api/register",
        json!({ "interview_id": "iv_off", "email": "ada@example.com" }),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error = extract_json(response.into_body()).await;
    assert_eq!(error["error"]["code"], "InterviewInactive");
}

#[tokio::test]
async fn test_register_missing_email_for_named_interview() {
    let (app, _state, pool, _scoring, _dir) = setup_app().await;
    seed_interview(&pool, &test_interview("iv_1", false)).await;

    let request = json_request("POST", "/api/register", json!({ "interview_id": "iv_1" }));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_not_invited() {
    let (app, _state, pool, _scoring, _dir) = setup_app().await;
    let mut interview = test_interview("iv_vip", false);
    interview.allowlist = Some(vec!["ada@example.com".to_string()]);
    seed_interview(&pool, &interview).await;

    let request = json_request(
        "POST",
        "/api/register",
        json!({ "interview_id": "iv_vip", "email": "mallory@example.com" }),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let error = extract_json(response.into_body()).await;
    assert_eq!(error["error"]["code"], "NotInvited");
}

#[tokio::test]
async fn test_register_already_responded() {
    let (app, state, pool, _scoring, _dir) = setup_app().await;
    seed_interview(&pool, &test_interview("iv_1", false)).await;

    // First registration succeeds
    let request = json_request(
        "POST",
        "/api/register",
        json!({ "interview_id": "iv_1", "email": "ada@example.com" }),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;

    // Attempt progresses past Created
    state
        .lifecycle
        .call_started(body["call_id"].as_str().unwrap())
        .await
        .unwrap();

    // Second registration with the same identity is refused
    let request = json_request(
        "POST",
        "/api/register",
        json!({ "interview_id": "iv_1", "email": "ada@example.com" }),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error = extract_json(response.into_body()).await;
    assert_eq!(error["error"]["code"], "AlreadyResponded");
}

#[tokio::test]
async fn test_response_cap_deactivates_interview() {
    let (app, state, pool, _scoring, _dir) = setup_app().await;
    let mut interview = test_interview("iv_cap", true);
    interview.response_cap = Some(1);
    seed_interview(&pool, &interview).await;

    state
        .lifecycle
        .register_attempt("iv_cap", "call_cap_1", None, None)
        .await
        .unwrap();

    let request = json_request("POST", "/api/register", json!({ "interview_id": "iv_cap" }));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error = extract_json(response.into_body()).await;
    assert_eq!(error["error"]["code"], "InterviewInactive");

    // Boundary effect: the interview itself was switched off
    let interview = db::interviews::load_interview(&pool, "iv_cap")
        .await
        .unwrap()
        .unwrap();
    assert!(!interview.is_active);
}

// =============================================================================
// Poll / refresh and operator endpoints
// =============================================================================

#[tokio::test]
async fn test_poll_endpoint_returns_snapshot() {
    let (app, state, pool, _scoring, _dir) = setup_app().await;
    seed_interview(&pool, &test_interview("iv_1", true)).await;
    state
        .lifecycle
        .register_attempt("iv_1", "call_poll", None, None)
        .await
        .unwrap();
    state
        .lifecycle
        .call_ended("call_poll", Some(0), Some(62_000), Some(1))
        .await
        .unwrap();

    let request = Request::builder()
        .method("GET")
        .uri("/api/responses/call_poll")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["call_id"], "call_poll");
    assert_eq!(body["lifecycle_state"], "Ended");
    assert_eq!(body["duration_seconds"], 62);
    // No analytics yet, so the field is omitted entirely
    assert!(body.get("analytics").is_none());
}

#[tokio::test]
async fn test_poll_endpoint_unknown_call() {
    let (app, _state, _pool, _scoring, _dir) = setup_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/responses/call_nope")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_analyse_endpoint_is_repeat_safe() {
    let (app, state, pool, scoring, _dir) = setup_app().await;
    seed_interview(&pool, &test_interview("iv_1", true)).await;
    state
        .lifecycle
        .register_attempt("iv_1", "call_an", None, None)
        .await
        .unwrap();
    state
        .lifecycle
        .call_ended("call_an", Some(0), Some(15_000), None)
        .await
        .unwrap();
    db::responses::attach_transcript(&pool, "call_an", "Agent: Hello\nUser: Hi")
        .await
        .unwrap();

    for _ in 0..3 {
        let request = json_request("POST", "/api/responses/call_an/analyse", json!({}));
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = extract_json(response.into_body()).await;
        assert_eq!(body["overall_score"], 81.0);
    }

    // Three polls, one billed provider call
    assert_eq!(scoring.call_count(), 1);
}

#[tokio::test]
async fn test_tab_switch_endpoint_monotonic() {
    let (app, state, pool, _scoring, _dir) = setup_app().await;
    seed_interview(&pool, &test_interview("iv_1", true)).await;
    state
        .lifecycle
        .register_attempt("iv_1", "call_tab", None, None)
        .await
        .unwrap();

    for count in [4, 2] {
        let request = json_request(
            "POST",
            "/api/responses/call_tab/tab-switch",
            json!({ "count": count }),
        );
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let row = db::responses::load_response(&pool, "call_tab")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.tab_switch_count, 4);
}

#[tokio::test]
async fn test_correction_endpoint_disposition_and_reset() {
    let (app, state, pool, _scoring, _dir) = setup_app().await;
    seed_interview(&pool, &test_interview("iv_1", true)).await;
    state
        .lifecycle
        .register_attempt("iv_1", "call_fix", None, None)
        .await
        .unwrap();
    state.lifecycle.call_started("call_fix").await.unwrap();
    state
        .lifecycle
        .hard_failure("call_fix", "network drop")
        .await
        .unwrap();

    // Reset the failed row
    let request = Request::builder()
        .method("POST")
        .uri("/api/responses/call_fix/correct")
        .header("content-type", "application/json")
        .header("x-operator", "ops@example.com")
        .body(Body::from(json!({ "action": "reset" }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["lifecycle_state"], "Ended");

    // Disposition is independent of lifecycle state
    let request = json_request(
        "POST",
        "/api/responses/call_fix/correct",
        json!({ "action": "disposition", "disposition": "Potential" }),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["disposition"], "Potential");

    // Unknown disposition is a caller error
    let request = json_request(
        "POST",
        "/api/responses/call_fix/correct",
        json!({ "action": "disposition", "disposition": "Maybe" }),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let row = db::responses::load_response(&pool, "call_fix")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.disposition.as_str(), "Potential");
}

#[tokio::test]
async fn test_list_and_delete_responses() {
    let (app, state, pool, _scoring, _dir) = setup_app().await;
    seed_interview(&pool, &test_interview("iv_1", true)).await;
    state
        .lifecycle
        .register_attempt("iv_1", "call_a", None, None)
        .await
        .unwrap();
    state
        .lifecycle
        .register_attempt("iv_1", "call_b", None, None)
        .await
        .unwrap();

    let request = Request::builder()
        .method("GET")
        .uri("/api/responses?interview_id=iv_1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    // Manual operator deletion
    let request = Request::builder()
        .method("DELETE")
        .uri("/api/responses/call_a")
        .header("x-operator", "ops@example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert!(db::responses::load_response(&pool, "call_a")
        .await
        .unwrap()
        .is_none());
}
