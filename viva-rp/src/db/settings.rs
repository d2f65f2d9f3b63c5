//! Settings table access
//!
//! Key/value persistence for the webhook shared secret and provider
//! credentials (tier 1 of the DB -> ENV -> TOML resolution chain).

use sqlx::SqlitePool;
use viva_common::Result;

pub const KEY_WEBHOOK_SECRET: &str = "webhook_shared_secret";
pub const KEY_VOICE_API_KEY: &str = "voice_api_key";
pub const KEY_SCORING_API_KEY: &str = "scoring_api_key";

/// Read a setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value)
}

/// Write a setting value, replacing any previous one
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_webhook_secret(pool: &SqlitePool) -> Result<Option<String>> {
    get_setting(pool, KEY_WEBHOOK_SECRET).await
}

pub async fn set_webhook_secret(pool: &SqlitePool, secret: &str) -> Result<()> {
    set_setting(pool, KEY_WEBHOOK_SECRET, secret).await
}

pub async fn get_voice_api_key(pool: &SqlitePool) -> Result<Option<String>> {
    get_setting(pool, KEY_VOICE_API_KEY).await
}

pub async fn get_scoring_api_key(pool: &SqlitePool) -> Result<Option<String>> {
    get_setting(pool, KEY_SCORING_API_KEY).await
}
