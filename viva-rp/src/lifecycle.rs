//! Lifecycle controller
//!
//! The response state machine. Every transition takes a call_id and is
//! idempotent: the same logical event can arrive from the client's own
//! teardown path and the provider's webhook, in either order, and must not
//! corrupt state or double-count duration. Monotonicity is enforced by the
//! guarded UPDATE statements in `db::responses`, not by in-process locks.

use sqlx::SqlitePool;
use tracing::{debug, info};
use viva_common::events::{EventBus, VivaEvent};
use viva_common::Result;

use crate::db;
use crate::db::responses::NewResponse;
use crate::models::Disposition;
use crate::providers::voice::duration_from_timestamps;

/// Outcome of a registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A fresh Created row was inserted
    Registered,
    /// The call_id already had a row; callers treat this as success since
    /// provider call ids are unique per attempt
    AlreadyRegistered,
}

/// State machine driver over the response store
#[derive(Clone)]
pub struct LifecycleController {
    db: SqlitePool,
    event_bus: EventBus,
}

impl LifecycleController {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self { db, event_bus }
    }

    /// Create the response row for a freshly registered call
    ///
    /// The call_id comes from the provider's registration response; a row
    /// is never created without one. Identity fields are persisted only for
    /// non-anonymous interviews (the gateway passes None otherwise).
    pub async fn register_attempt(
        &self,
        interview_id: &str,
        call_id: &str,
        email: Option<String>,
        name: Option<String>,
    ) -> Result<RegisterOutcome> {
        let inserted = db::responses::insert_response(
            &self.db,
            &NewResponse {
                call_id: call_id.to_string(),
                interview_id: interview_id.to_string(),
                email,
                name,
            },
        )
        .await?;

        if inserted {
            info!(call_id = %call_id, interview_id = %interview_id, "Attempt registered");
            self.event_bus.emit_lossy(VivaEvent::ResponseRegistered {
                call_id: call_id.to_string(),
                interview_id: interview_id.to_string(),
                timestamp: chrono::Utc::now(),
            });
            Ok(RegisterOutcome::Registered)
        } else {
            info!(call_id = %call_id, "Attempt already registered, treating as success");
            Ok(RegisterOutcome::AlreadyRegistered)
        }
    }

    /// Created -> Started; duplicates and late arrivals are no-ops
    pub async fn call_started(&self, call_id: &str) -> Result<()> {
        let advanced = db::responses::mark_started(&self.db, call_id).await?;

        if advanced {
            info!(call_id = %call_id, "Call started");
            self.event_bus.emit_lossy(VivaEvent::CallStarted {
                call_id: call_id.to_string(),
                timestamp: chrono::Utc::now(),
            });
        } else {
            debug!(call_id = %call_id, "Ignoring call_started: state already past Created");
        }
        Ok(())
    }

    /// Created/Started -> Ended
    ///
    /// Duration is computed here from provider-reported timestamps, once.
    /// The same event arriving again (client teardown + webhook) changes
    /// nothing, so duration cannot be double-counted.
    pub async fn call_ended(
        &self,
        call_id: &str,
        start_timestamp_ms: Option<i64>,
        end_timestamp_ms: Option<i64>,
        tab_switch_count: Option<i64>,
    ) -> Result<()> {
        let duration = duration_from_timestamps(start_timestamp_ms, end_timestamp_ms);
        let advanced =
            db::responses::mark_ended(&self.db, call_id, duration, tab_switch_count).await?;

        if advanced {
            info!(
                call_id = %call_id,
                duration_seconds = ?duration,
                "Call ended"
            );
            self.event_bus.emit_lossy(VivaEvent::CallEnded {
                call_id: call_id.to_string(),
                duration_seconds: duration,
                timestamp: chrono::Utc::now(),
            });
        } else {
            debug!(call_id = %call_id, "Ignoring call_ended: state already past Started");
        }
        Ok(())
    }

    /// Started/Ended -> Failed; terminal for the automatic pipeline
    pub async fn hard_failure(&self, call_id: &str, reason: &str) -> Result<()> {
        let failed = db::responses::mark_failed(&self.db, call_id, reason).await?;

        if failed {
            info!(call_id = %call_id, reason = %reason, "Response marked failed");
            self.event_bus.emit_lossy(VivaEvent::PipelineFailed {
                call_id: call_id.to_string(),
                reason: reason.to_string(),
                timestamp: chrono::Utc::now(),
            });
        } else {
            debug!(call_id = %call_id, "Ignoring hard_failure: state not Started/Ended");
        }
        Ok(())
    }

    /// Failed -> Ended, clearing the failure reason (manual operator reset)
    pub async fn reset_failure(&self, call_id: &str) -> Result<bool> {
        let reset = db::responses::reset_failed(&self.db, call_id).await?;
        if reset {
            info!(call_id = %call_id, "Failed response reset to Ended");
        }
        Ok(reset)
    }

    /// Fold a heartbeat tab-switch count in (monotonic max)
    pub async fn record_tab_switches(&self, call_id: &str, count: i64) -> Result<()> {
        db::responses::record_tab_switches(&self.db, call_id, count).await?;
        Ok(())
    }

    /// Overwrite the operator disposition
    pub async fn set_disposition(&self, call_id: &str, disposition: Disposition) -> Result<bool> {
        let updated = db::responses::set_disposition(&self.db, call_id, disposition).await?;
        if updated {
            self.event_bus.emit_lossy(VivaEvent::DispositionChanged {
                call_id: call_id.to_string(),
                disposition: disposition.as_str().to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
        Ok(updated)
    }
}
