//! Identity reconciliation
//!
//! Maps an external provider claim onto a local user record. The lookup
//! key is the email address, not the provider user id: a Google login and
//! a Facebook login with the same email land on the same account, with the
//! provider fields overwritten each time (last login wins).
//!
//! Two concurrent first-time logins with the same email can both observe
//! "no user" and race on the insert. The UNIQUE(email) constraint decides
//! the race; the loser retries as an update. This performs no token
//! issuance and no revocation.

use sqlx::SqlitePool;
use tracing::{debug, info};

use super::models::User;
use super::providers::ProviderClaim;
use super::store;
use crate::common::{safe_email_log, ApiError};

/// Find-or-create the local user for an external identity claim and
/// refresh its mutable profile fields.
pub async fn reconcile(pool: &SqlitePool, claim: &ProviderClaim) -> Result<User, ApiError> {
    if let Some(user) = store::find_user_by_email(pool, &claim.email).await? {
        return update_existing(pool, user, claim).await;
    }

    match store::insert_oauth_user(pool, claim).await {
        Ok(user) => {
            info!(
                user_id = user.id,
                email = %safe_email_log(&user.email),
                provider = %claim.provider,
                "Created new user from provider claim"
            );
            Ok(user)
        }
        Err(e) if is_unique_violation(&e) => {
            // Lost the insert race: some other request created this email
            // between our lookup and our insert. Retry as an update.
            debug!(
                email = %safe_email_log(&claim.email),
                "Insert race on reconcile, retrying as update"
            );
            match store::find_user_by_email(pool, &claim.email).await? {
                Some(user) => update_existing(pool, user, claim).await,
                None => Err(ApiError::DuplicateIdentity(format!(
                    "unique violation without a matching user for {}",
                    safe_email_log(&claim.email)
                ))),
            }
        }
        Err(e) => Err(ApiError::DatabaseError(e)),
    }
}

async fn update_existing(
    pool: &SqlitePool,
    user: User,
    claim: &ProviderClaim,
) -> Result<User, ApiError> {
    store::update_user_profile(pool, user.id, claim).await?;

    debug!(
        user_id = user.id,
        provider = %claim.provider,
        "Refreshed profile fields from provider claim"
    );

    // Return the row as it now stands rather than patching fields by hand.
    store::find_user_by_id(pool, user.id)
        .await?
        .ok_or_else(|| ApiError::InternalServer("user vanished during reconcile".to_string()))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed")
    )
}
