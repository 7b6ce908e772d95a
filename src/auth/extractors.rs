//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::handlers::verdict_error;
use super::models::{TokenPurpose, User};
use super::store;
use super::tokens::TokenVerdict;
use crate::common::{safe_email_log, safe_token_log, ApiError, AppState};

/// Authenticated user extractor
///
/// Validates the bearer access token (signature, expiry, purpose and
/// revocation set) and loads the user row it resolves to. Any non-valid
/// token yields a 401 whose code tells the transport whether to prompt a
/// fresh login (expired) or drop the session outright.
#[derive(Debug)]
pub struct AuthedUser {
    pub user: User,
    /// Token id of the presented access token; logout revokes it.
    pub jti: String,
    /// Expiry of the presented access token, bounds its denylist entry.
    pub expires_at: i64,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let app_state = state_lock.read().await.clone();

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        let token = match token {
            Some(t) => t,
            None => {
                warn!("Authentication failed: missing Authorization header");
                return Err(ApiError::Unauthorized("missing auth".into()));
            }
        };

        // Handle "Bearer <token>" format or raw token
        let bare_token = token.strip_prefix("Bearer ").unwrap_or(&token);

        let verdict = app_state
            .tokens
            .verify(&app_state.db, bare_token, TokenPurpose::Access)
            .await?;

        let (user_id, jti, expires_at) = match verdict {
            TokenVerdict::Valid {
                user_id,
                jti,
                expires_at,
            } => (user_id, jti, expires_at),
            other => {
                debug!(
                    verdict = ?other,
                    token = %safe_token_log(bare_token),
                    "Access token rejected"
                );
                return Err(verdict_error(other));
            }
        };

        match store::find_user_by_id(&app_state.db, user_id).await? {
            Some(user) => {
                debug!(
                    user_id = user.id,
                    email = %safe_email_log(&user.email),
                    "Request authenticated"
                );
                Ok(AuthedUser {
                    user,
                    jti,
                    expires_at,
                })
            }
            None => {
                warn!(user_id = user_id, "Authentication failed: user not found");
                Err(ApiError::Unauthorized("user not found".into()))
            }
        }
    }
}

/// Ownership check applied by every protected endpoint that mutates an
/// owned resource: the request's resolved user must be the owner.
#[allow(dead_code)]
pub fn ensure_owner(authed: &AuthedUser, owner_id: i64) -> Result<(), ApiError> {
    if authed.user.id == owner_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "you cannot modify another user's resource".to_string(),
        ))
    }
}
