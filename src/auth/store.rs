//! User persistence queries
//!
//! Uniqueness of username and email is enforced by the schema; callers
//! that insert must be prepared for a UNIQUE constraint violation.

use sqlx::SqlitePool;

use super::models::User;
use super::providers::ProviderClaim;

pub async fn find_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
}

/// Insert a locally-registered user and return the stored row.
pub async fn insert_local_user(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)",
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(pool)
        .await
}

/// Insert a user created by a first-time OAuth login and return the stored
/// row. No password hash: the account cannot log in locally until one is
/// set through some future password-change flow.
pub async fn insert_oauth_user(
    pool: &SqlitePool,
    claim: &ProviderClaim,
) -> Result<User, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, picture, provider, provider_user_id, provider_token)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&claim.display_name)
    .bind(&claim.email)
    .bind(claim.picture.as_deref())
    .bind(claim.provider.as_str())
    .bind(&claim.provider_user_id)
    .bind(&claim.provider_token)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(pool)
        .await
}

/// Overwrite the mutable profile and provider fields of an existing user.
/// The id, email and password hash are left untouched.
pub async fn update_user_profile(
    pool: &SqlitePool,
    id: i64,
    claim: &ProviderClaim,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE users
        SET username = ?, picture = ?, provider = ?, provider_user_id = ?, provider_token = ?
        WHERE id = ?
        "#,
    )
    .bind(&claim.display_name)
    .bind(claim.picture.as_deref())
    .bind(claim.provider.as_str())
    .bind(&claim.provider_user_id)
    .bind(&claim.provider_token)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}
