//! viva-rp library interface
//!
//! Exposes the response pipeline's components and router for integration
//! testing.

pub mod analytics;
pub mod api;
pub mod config;
pub mod db;
pub mod eligibility;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod providers;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use viva_common::events::EventBus;

use crate::analytics::AnalyticsOrchestrator;
use crate::eligibility::EligibilityGuard;
use crate::lifecycle::LifecycleController;
use crate::providers::{ScoreProvider, VoiceProvider};

/// Application state shared across handlers
///
/// All client handles are constructed once at startup and injected here;
/// there are no process-wide singletons.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Voice gateway handle (registration + call detail)
    pub voice: Arc<dyn VoiceProvider>,
    /// State machine driver
    pub lifecycle: LifecycleController,
    /// Scoring pipeline driver
    pub analytics: AnalyticsOrchestrator,
    /// Registration policy guard
    pub eligibility: EligibilityGuard,
    /// Shared secret for webhook signature verification
    pub webhook_secret: String,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        voice: Arc<dyn VoiceProvider>,
        scoring: Arc<dyn ScoreProvider>,
        webhook_secret: String,
    ) -> Self {
        let lifecycle = LifecycleController::new(db.clone(), event_bus.clone());
        let analytics = AnalyticsOrchestrator::new(
            db.clone(),
            event_bus.clone(),
            voice.clone(),
            scoring,
        );
        let eligibility = EligibilityGuard::new(db.clone());

        Self {
            db,
            event_bus,
            voice,
            lifecycle,
            analytics,
            eligibility,
            webhook_secret,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::webhook_routes())
        .merge(api::register_routes())
        .merge(api::response_routes())
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
