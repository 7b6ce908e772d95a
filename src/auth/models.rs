//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// User database model.
///
/// `password_hash` is set only for accounts that registered locally;
/// accounts created by an OAuth login carry NULL there and cannot log in
/// with a password until one is set. The provider columns are refreshed on
/// every OAuth login and `provider_token` is kept so a later disconnect can
/// revoke the grant on the provider side.
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub picture: Option<String>,
    pub provider: Option<String>,
    pub provider_user_id: Option<String>,
    #[serde(skip_serializing)]
    pub provider_token: Option<String>,
    pub created_at: Option<String>,
}

/// JWT claims structure.
///
/// `sub` carries the user id, `jti` a unique token id used as the
/// revocation key, and `purpose` distinguishes access from refresh tokens.
#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    pub sub: String,
    pub jti: String,
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64,
}

/// Token purpose tag: access tokens are short-lived and presented on every
/// protected request; refresh tokens are long-lived and only accepted by
/// the refresh endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Access,
    Refresh,
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenPurpose::Access => write!(f, "access"),
            TokenPurpose::Refresh => write!(f, "refresh"),
        }
    }
}

/// Local registration payload
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Local login payload
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// OAuth login payload: the one-time code (Google) or short-lived token
/// (Facebook) the browser obtained from the provider out-of-band.
#[derive(Deserialize)]
pub struct OAuthLoginRequest {
    pub code: String,
}

/// Refresh payload
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout payload. The access token arrives in the Authorization header;
/// clients that still hold their refresh token send it here so it can be
/// revoked too.
#[derive(Deserialize, Default)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}
