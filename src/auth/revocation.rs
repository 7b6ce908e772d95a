//! Persistent token denylist
//!
//! Revoked token ids live in SQLite rather than process memory so a
//! restart does not resurrect logged-out sessions. Every verify consults
//! this set after the signature and expiry checks pass. Entries whose
//! token has expired anyway are purged opportunistically.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

/// Mark a token id as revoked until `expires_at` (unix seconds), after
/// which natural expiry takes over. Idempotent.
pub async fn revoke(pool: &SqlitePool, jti: &str, expires_at: i64) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR REPLACE INTO revoked_tokens (jti, expires_at) VALUES (?, ?)")
        .bind(jti)
        .bind(expires_at)
        .execute(pool)
        .await?;

    debug!(jti = %jti, expires_at = expires_at, "Token revoked");
    Ok(())
}

/// Whether a token id is in the revocation set.
pub async fn is_revoked(pool: &SqlitePool, jti: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM revoked_tokens WHERE jti = ?")
        .bind(jti)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

/// Drop denylist entries whose token has expired on its own. Returns the
/// number of rows removed.
pub async fn purge_expired(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= ?")
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await?;

    let purged = result.rows_affected();
    if purged > 0 {
        debug!(purged = purged, "Purged expired revocation entries");
    }
    Ok(purged)
}
