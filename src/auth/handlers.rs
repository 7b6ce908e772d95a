//! Authentication handlers
//!
//! The session gateway: every way a session can start (local register,
//! local login, OAuth login), continue (refresh), or end (logout) goes
//! through here. Credential failures are reported generically so callers
//! cannot probe which part of a login was wrong.

use axum::extract::{Extension, Json, Path};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::extractors::AuthedUser;
use super::models::{
    LoginRequest, LogoutRequest, OAuthLoginRequest, RefreshRequest, RegisterRequest, TokenPurpose,
    User,
};
use super::providers::{self, Provider};
use super::tokens::TokenVerdict;
use super::{password, reconcile, revocation, store};
use crate::common::{safe_email_log, ApiError, AppState};

/// POST /api/auth/register
/// Registers a local account and opens a session.
///
/// # Request Body
/// ```json
/// {
///   "username": "alice",
///   "email": "alice@example.com",
///   "password": "s3cret!"
/// }
/// ```
pub async fn register(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    if payload.username.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.password.is_empty()
    {
        return Err(ApiError::BadRequest(
            "username, email and password are required".to_string(),
        ));
    }

    // Duplicate checks get specific messages here; this is registration,
    // not login, so there is no enumeration concern about telling a user
    // their name is taken.
    if store::find_user_by_username(&state.db, &payload.username)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "username already in use, please choose another one".to_string(),
        ));
    }

    if store::find_user_by_email(&state.db, &payload.email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "e-mail already registered".to_string(),
        ));
    }

    let hash = password::hash_password(&payload.password)
        .map_err(|e| ApiError::InternalServer(format!("password hashing failed: {}", e)))?;

    let user =
        match store::insert_local_user(&state.db, &payload.username, &payload.email, &hash).await {
            Ok(user) => user,
            // Concurrent registration can slip past the checks above; the
            // schema constraint catches it.
            Err(e) if is_unique_violation(&e) => {
                return Err(ApiError::Conflict(
                    "username or e-mail already registered".to_string(),
                ))
            }
            Err(e) => return Err(ApiError::DatabaseError(e)),
        };

    info!(
        user_id = user.id,
        email = %safe_email_log(&user.email),
        "New local user registered"
    );

    session_response(&state, user)
}

/// POST /api/auth/login
/// Local credential login. Unknown username and wrong password produce the
/// same generic failure.
pub async fn login(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let user = store::find_user_by_username(&state.db, &payload.username).await?;

    let user = match user {
        Some(u) if password::verify_password(&payload.password, u.password_hash.as_deref()) => u,
        _ => {
            debug!(username = %payload.username, "Local login rejected");
            return Err(ApiError::InvalidCredentials);
        }
    };

    info!(user_id = user.id, "Local login successful");

    session_response(&state, user)
}

/// POST /api/auth/oauth/:provider
/// OAuth login: exchange the one-time code with the provider, reconcile
/// the claim onto a local user, and open a session.
pub async fn oauth_login(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(provider_name): Path<String>,
    Json(payload): Json<OAuthLoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let provider = Provider::from_str(&provider_name)
        .map_err(|_| ApiError::BadRequest("unrecognized provider".to_string()))?;

    let app = match provider {
        Provider::Google => state.google.clone(),
        Provider::Facebook => state.facebook.clone(),
    }
    .ok_or_else(|| {
        ApiError::ProviderExchangeFailed(format!("{} login not configured", provider))
    })?;

    // The exchange is timeout-bounded; a silent provider fails the login
    // before any identity write happens.
    let claim = providers::exchange(provider, &app, &state.http, &payload.code)
        .await
        .map_err(|e| ApiError::ProviderExchangeFailed(e.to_string()))?;

    let user = reconcile::reconcile(&state.db, &claim).await?;

    info!(
        user_id = user.id,
        provider = %provider,
        "OAuth login successful"
    );

    session_response(&state, user)
}

/// POST /api/auth/refresh
/// Mints a new access token for a valid refresh token. The refresh token
/// itself is not rotated.
pub async fn refresh(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let verdict = state
        .tokens
        .verify(&state.db, &payload.refresh_token, TokenPurpose::Refresh)
        .await?;

    let user_id = match verdict {
        TokenVerdict::Valid { user_id, .. } => user_id,
        other => return Err(verdict_error(other)),
    };

    let access_token = state.tokens.issue(user_id, TokenPurpose::Access)?;

    debug!(user_id = user_id, "Access token refreshed");

    Ok(Json(serde_json::json!({ "access_token": access_token })))
}

/// POST /api/auth/logout
/// Revokes the current session's tokens. For provider-backed sessions the
/// provider grant is revoked too, best-effort: a provider-side failure is
/// logged and does not block local revocation.
pub async fn logout(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    body: Option<Json<LogoutRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    revocation::revoke(&state.db, &authed.jti, authed.expires_at).await?;

    // Clients that still hold their refresh token send it along so it dies
    // with the session instead of outliving it.
    if let Some(Json(LogoutRequest {
        refresh_token: Some(refresh_token),
    })) = body
    {
        match state
            .tokens
            .verify(&state.db, &refresh_token, TokenPurpose::Refresh)
            .await?
        {
            TokenVerdict::Valid {
                user_id,
                jti,
                expires_at,
            } if user_id == authed.user.id => {
                revocation::revoke(&state.db, &jti, expires_at).await?;
            }
            other => {
                // Expired or foreign refresh tokens need no denylist entry.
                debug!(verdict = ?other, "Refresh token not revoked at logout");
            }
        }
    }

    if let Err(e) = revocation::purge_expired(&state.db).await {
        warn!(error = %e, "Failed to purge expired revocation entries");
    }

    revoke_provider_grant(&state, &authed.user).await;

    info!(user_id = authed.user.id, "User logged out");

    Ok(Json(serde_json::json!({ "message": "Logout successful" })))
}

/// GET /api/me
/// Returns the current authenticated user's information.
pub async fn me(authed: AuthedUser) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(serde_json::json!({ "user": authed.user })))
}

// ---- Helper Functions ----

/// Issue the access/refresh pair for a freshly authenticated user and
/// build the session response body.
fn session_response(state: &AppState, user: User) -> Result<Json<serde_json::Value>, ApiError> {
    let access_token = state.tokens.issue(user.id, TokenPurpose::Access)?;
    let refresh_token = state.tokens.issue(user.id, TokenPurpose::Refresh)?;

    Ok(Json(serde_json::json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "user": user,
    })))
}

/// Best-effort provider-side revocation for provider-backed sessions.
async fn revoke_provider_grant(state: &AppState, user: &User) {
    let (provider, provider_token) = match (user.provider.as_deref(), user.provider_token.as_deref())
    {
        (Some(p), Some(t)) => (p, t),
        _ => return,
    };

    let provider = match Provider::from_str(provider) {
        Ok(p) => p,
        Err(_) => {
            warn!(provider = %provider, "Unknown provider on user record, skipping grant revocation");
            return;
        }
    };

    let provider_user_id = user.provider_user_id.as_deref().unwrap_or_default();

    if let Err(e) =
        providers::revoke_grant(provider, &state.http, provider_user_id, provider_token).await
    {
        warn!(
            user_id = user.id,
            provider = %provider,
            error = %e,
            "Provider-side grant revocation failed; local revocation stands"
        );
    }
}

/// Map a non-valid verdict onto the outward error taxonomy. A purpose
/// mismatch is reported as malformed: the caller presented a token that is
/// structurally wrong for the endpoint.
pub(super) fn verdict_error(verdict: TokenVerdict) -> ApiError {
    match verdict {
        TokenVerdict::Expired => ApiError::TokenExpired,
        TokenVerdict::Revoked => ApiError::TokenRevoked,
        TokenVerdict::PurposeMismatch => {
            debug!("Token presented with wrong purpose");
            ApiError::TokenMalformed
        }
        TokenVerdict::Malformed => ApiError::TokenMalformed,
        TokenVerdict::Valid { .. } => {
            // Callers only reach here with a non-valid verdict.
            ApiError::InternalServer("valid token routed to error mapping".to_string())
        }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed")
    )
}
