//! Database access for viva-rp
//!
//! SQLite storage; the `responses.call_id` primary key is the uniqueness
//! anchor the whole pipeline leans on.

pub mod interviews;
pub mod responses;
pub mod retry;
pub mod settings;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to the service database, creating the file and tables on first
/// run.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create viva-rp tables if they don't exist
async fn init_tables(pool: &SqlitePool) -> Result<()> {
    // Settings table for secrets and parameter persistence
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Interview definitions (owned by the dashboard; read-mostly here)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interviews (
            interview_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            objective TEXT NOT NULL DEFAULT '',
            questions TEXT NOT NULL DEFAULT '[]',
            is_anonymous INTEGER NOT NULL DEFAULT 0,
            allowlist TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            response_cap INTEGER,
            agent_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per interview attempt; call_id uniqueness is enforced here,
    // at the storage layer, not just in application logic.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS responses (
            call_id TEXT PRIMARY KEY,
            interview_id TEXT NOT NULL,
            email TEXT,
            name TEXT,
            lifecycle_state TEXT NOT NULL DEFAULT 'Created',
            duration_seconds INTEGER,
            tab_switch_count INTEGER NOT NULL DEFAULT 0,
            transcript TEXT,
            analytics TEXT,
            disposition TEXT NOT NULL DEFAULT 'NoStatus',
            failure_reason TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_responses_interview ON responses(interview_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_responses_identity ON responses(interview_id, email)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (settings, interviews, responses)");

    Ok(())
}
