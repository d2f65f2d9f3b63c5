//! Response record database operations
//!
//! Every lifecycle transition is a single conditional UPDATE guarded on the
//! current state, so duplicate and out-of-order triggers collapse into
//! harmless no-ops at the storage layer. The functions return whether the
//! statement changed a row; callers decide what a no-op means.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use viva_common::Result;

use crate::db::retry::{retry_on_lock, DEFAULT_LOCK_WAIT_MS};
use crate::models::{Disposition, LifecycleState, Response, ScoreDocument};

/// Fields required to create a response row
#[derive(Debug, Clone)]
pub struct NewResponse {
    pub call_id: String,
    pub interview_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Insert a new response in the Created state
///
/// Returns false when the call_id already exists (the primary key absorbs
/// the duplicate); the caller treats that as AlreadyRegistered.
pub async fn insert_response(pool: &SqlitePool, new: &NewResponse) -> Result<bool> {
    let now = Utc::now().to_rfc3339();

    retry_on_lock("insert_response", DEFAULT_LOCK_WAIT_MS, || async {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO responses (
                call_id, interview_id, email, name,
                lifecycle_state, created_at, updated_at
            ) VALUES (?, ?, ?, ?, 'Created', ?, ?)
            "#,
        )
        .bind(&new.call_id)
        .bind(&new.interview_id)
        .bind(&new.email)
        .bind(&new.name)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .map_err(viva_common::Error::Database)?;

        Ok(result.rows_affected() > 0)
    })
    .await
}

/// Load a response by call_id
pub async fn load_response(pool: &SqlitePool, call_id: &str) -> Result<Option<Response>> {
    let row = sqlx::query(
        r#"
        SELECT call_id, interview_id, email, name, lifecycle_state,
               duration_seconds, tab_switch_count, transcript, analytics,
               disposition, failure_reason, created_at, updated_at
        FROM responses
        WHERE call_id = ?
        "#,
    )
    .bind(call_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(row_to_response(&row)?)),
        None => Ok(None),
    }
}

/// List responses for an interview, most recent first
pub async fn list_for_interview(pool: &SqlitePool, interview_id: &str) -> Result<Vec<Response>> {
    let rows = sqlx::query(
        r#"
        SELECT call_id, interview_id, email, name, lifecycle_state,
               duration_seconds, tab_switch_count, transcript, analytics,
               disposition, failure_reason, created_at, updated_at
        FROM responses
        WHERE interview_id = ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(interview_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_response).collect()
}

/// Count responses registered for an interview (any state)
pub async fn count_for_interview(pool: &SqlitePool, interview_id: &str) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM responses WHERE interview_id = ?")
            .bind(interview_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Whether an identity already has an attempt past Created on this interview
pub async fn identity_has_responded(
    pool: &SqlitePool,
    interview_id: &str,
    identity: &str,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM responses
        WHERE interview_id = ? AND email = ? COLLATE NOCASE
          AND lifecycle_state != 'Created'
        "#,
    )
    .bind(interview_id)
    .bind(identity)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// Created -> Started
///
/// A start event arriving after Ended (or a duplicate) changes nothing.
pub async fn mark_started(pool: &SqlitePool, call_id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE responses
        SET lifecycle_state = 'Started', updated_at = ?
        WHERE call_id = ? AND lifecycle_state = 'Created'
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(call_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Created/Started -> Ended
///
/// Accepts Created as a source state so an end event that outran its start
/// still wins (furthest-forward event semantics). Duration is set-once via
/// COALESCE; the reported tab switch count folds in via monotonic max.
pub async fn mark_ended(
    pool: &SqlitePool,
    call_id: &str,
    duration_seconds: Option<i64>,
    tab_switch_count: Option<i64>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE responses
        SET lifecycle_state = 'Ended',
            duration_seconds = COALESCE(duration_seconds, ?),
            tab_switch_count = MAX(tab_switch_count, COALESCE(?, 0)),
            updated_at = ?
        WHERE call_id = ? AND lifecycle_state IN ('Created', 'Started')
        "#,
    )
    .bind(duration_seconds)
    .bind(tab_switch_count)
    .bind(Utc::now().to_rfc3339())
    .bind(call_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Started/Ended -> Failed, recording the reason
pub async fn mark_failed(pool: &SqlitePool, call_id: &str, reason: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE responses
        SET lifecycle_state = 'Failed', failure_reason = ?, updated_at = ?
        WHERE call_id = ? AND lifecycle_state IN ('Started', 'Ended')
        "#,
    )
    .bind(reason)
    .bind(Utc::now().to_rfc3339())
    .bind(call_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Failed -> Ended (manual operator reset)
pub async fn reset_failed(pool: &SqlitePool, call_id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE responses
        SET lifecycle_state = 'Ended', failure_reason = NULL, updated_at = ?
        WHERE call_id = ? AND lifecycle_state = 'Failed'
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(call_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Fold a client heartbeat into the tab switch counter
///
/// Monotonic max: heartbeats race and may arrive out of order, so the
/// stored value never decreases. Accepted at any state before Analysed.
pub async fn record_tab_switches(pool: &SqlitePool, call_id: &str, count: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE responses
        SET tab_switch_count = MAX(tab_switch_count, ?), updated_at = ?
        WHERE call_id = ? AND lifecycle_state != 'Analysed'
        "#,
    )
    .bind(count.max(0))
    .bind(Utc::now().to_rfc3339())
    .bind(call_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Overwrite the operator disposition (last write wins, any state)
pub async fn set_disposition(
    pool: &SqlitePool,
    call_id: &str,
    disposition: Disposition,
) -> Result<bool> {
    let result = sqlx::query("UPDATE responses SET disposition = ?, updated_at = ? WHERE call_id = ?")
        .bind(disposition.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(call_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Attach the provider transcript, set-once
pub async fn attach_transcript(pool: &SqlitePool, call_id: &str, transcript: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE responses
        SET transcript = ?, updated_at = ?
        WHERE call_id = ? AND transcript IS NULL
        "#,
    )
    .bind(transcript)
    .bind(Utc::now().to_rfc3339())
    .bind(call_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Persist the analytics document: the pipeline's compare-and-set
///
/// The write is conditioned on `analytics` still being NULL, closing the
/// race between concurrent analyse calls (possibly in different processes).
/// Returns false when another writer got there first; the caller re-reads
/// the winner's document.
pub async fn persist_analytics(
    pool: &SqlitePool,
    call_id: &str,
    document: &ScoreDocument,
    duration_seconds: Option<i64>,
) -> Result<bool> {
    let analytics = serde_json::to_string(document)
        .map_err(|e| viva_common::Error::Internal(format!("Failed to serialize analytics: {}", e)))?;
    let now = Utc::now().to_rfc3339();

    retry_on_lock("persist_analytics", DEFAULT_LOCK_WAIT_MS, || async {
        let result = sqlx::query(
            r#"
            UPDATE responses
            SET analytics = ?,
                lifecycle_state = 'Analysed',
                duration_seconds = COALESCE(duration_seconds, ?),
                updated_at = ?
            WHERE call_id = ? AND analytics IS NULL
            "#,
        )
        .bind(&analytics)
        .bind(duration_seconds)
        .bind(&now)
        .bind(call_id)
        .execute(pool)
        .await
        .map_err(viva_common::Error::Database)?;

        Ok(result.rows_affected() > 0)
    })
    .await
}

/// Delete a response (manual operator action; never automatic)
pub async fn delete_response(pool: &SqlitePool, call_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM responses WHERE call_id = ?")
        .bind(call_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn row_to_response(row: &sqlx::sqlite::SqliteRow) -> Result<Response> {
    let state: String = row.get("lifecycle_state");
    let lifecycle_state = LifecycleState::parse(&state).ok_or_else(|| {
        viva_common::Error::Internal(format!("Unknown lifecycle_state in database: {}", state))
    })?;

    let disposition: String = row.get("disposition");
    let disposition = Disposition::parse(&disposition).ok_or_else(|| {
        viva_common::Error::Internal(format!("Unknown disposition in database: {}", disposition))
    })?;

    let analytics: Option<String> = row.get("analytics");
    let analytics: Option<ScoreDocument> = analytics
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| viva_common::Error::Internal(format!("Failed to deserialize analytics: {}", e)))?;

    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| viva_common::Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&Utc);

    let updated_at: String = row.get("updated_at");
    let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| viva_common::Error::Internal(format!("Failed to parse updated_at: {}", e)))?
        .with_timezone(&Utc);

    Ok(Response {
        call_id: row.get("call_id"),
        interview_id: row.get("interview_id"),
        email: row.get("email"),
        name: row.get("name"),
        lifecycle_state,
        duration_seconds: row.get("duration_seconds"),
        tab_switch_count: row.get("tab_switch_count"),
        transcript: row.get("transcript"),
        analytics,
        disposition,
        failure_reason: row.get("failure_reason"),
        created_at,
        updated_at,
    })
}
