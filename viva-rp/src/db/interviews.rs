//! Interview definition database operations
//!
//! Interviews are owned by the dashboard side of the product; this service
//! reads them for registration/eligibility/scoring and writes exactly one
//! thing: `is_active = 0` when the response cap is reached.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use viva_common::Result;

use crate::models::Interview;

/// Load an interview definition
pub async fn load_interview(pool: &SqlitePool, interview_id: &str) -> Result<Option<Interview>> {
    let row = sqlx::query(
        r#"
        SELECT interview_id, title, objective, questions, is_anonymous,
               allowlist, is_active, response_cap, agent_id, created_at
        FROM interviews
        WHERE interview_id = ?
        "#,
    )
    .bind(interview_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(row_to_interview(&row)?)),
        None => Ok(None),
    }
}

/// Insert or update an interview definition
///
/// Used by fixtures and the dashboard sync path; the pipeline itself never
/// creates interviews.
pub async fn upsert_interview(pool: &SqlitePool, interview: &Interview) -> Result<()> {
    let questions = serde_json::to_string(&interview.questions)
        .map_err(|e| viva_common::Error::Internal(format!("Failed to serialize questions: {}", e)))?;
    let allowlist = interview
        .allowlist
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| viva_common::Error::Internal(format!("Failed to serialize allowlist: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO interviews (
            interview_id, title, objective, questions, is_anonymous,
            allowlist, is_active, response_cap, agent_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(interview_id) DO UPDATE SET
            title = excluded.title,
            objective = excluded.objective,
            questions = excluded.questions,
            is_anonymous = excluded.is_anonymous,
            allowlist = excluded.allowlist,
            is_active = excluded.is_active,
            response_cap = excluded.response_cap,
            agent_id = excluded.agent_id
        "#,
    )
    .bind(&interview.interview_id)
    .bind(&interview.title)
    .bind(&interview.objective)
    .bind(&questions)
    .bind(interview.is_anonymous as i64)
    .bind(&allowlist)
    .bind(interview.is_active as i64)
    .bind(interview.response_cap)
    .bind(&interview.agent_id)
    .bind(interview.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Flip an interview's active flag
///
/// Returns false when the interview does not exist.
pub async fn set_active(pool: &SqlitePool, interview_id: &str, active: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE interviews SET is_active = ? WHERE interview_id = ?")
        .bind(active as i64)
        .bind(interview_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn row_to_interview(row: &sqlx::sqlite::SqliteRow) -> Result<Interview> {
    let questions: String = row.get("questions");
    let questions: Vec<String> = serde_json::from_str(&questions)
        .map_err(|e| viva_common::Error::Internal(format!("Failed to deserialize questions: {}", e)))?;

    let allowlist: Option<String> = row.get("allowlist");
    let allowlist: Option<Vec<String>> = allowlist
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| viva_common::Error::Internal(format!("Failed to deserialize allowlist: {}", e)))?;

    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| viva_common::Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&Utc);

    Ok(Interview {
        interview_id: row.get("interview_id"),
        title: row.get("title"),
        objective: row.get("objective"),
        questions,
        is_anonymous: row.get::<i64, _>("is_anonymous") != 0,
        allowlist,
        is_active: row.get::<i64, _>("is_active") != 0,
        response_cap: row.get("response_cap"),
        agent_id: row.get("agent_id"),
        created_at,
    })
}
