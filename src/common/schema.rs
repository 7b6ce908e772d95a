// src/common/schema.rs
//! Database schema bootstrap
//!
//! Creates the tables this service owns if they do not exist yet. There is
//! no versioned migration tooling here; the schema is small enough that
//! additive CREATE TABLE IF NOT EXISTS statements at startup cover it.

use sqlx::SqlitePool;
use tracing::info;

/// Create the `users` and `revoked_tokens` tables and their indexes.
pub async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT,
            picture TEXT,
            provider TEXT,
            provider_user_id TEXT,
            provider_token TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS revoked_tokens (
            jti TEXT PRIMARY KEY,
            expires_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Speeds up the purge of denylist entries whose token already expired.
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_revoked_tokens_expires_at ON revoked_tokens(expires_at)",
    )
    .execute(pool)
    .await?;

    info!("✅ Database schema ready");

    Ok(())
}
