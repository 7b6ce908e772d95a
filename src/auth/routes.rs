//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/auth/register` - Local account registration
/// - `POST /api/auth/login` - Local credential login
/// - `POST /api/auth/oauth/:provider` - OAuth login (google | facebook)
/// - `POST /api/auth/refresh` - Mint a new access token from a refresh token
/// - `POST /api/auth/logout` - Revoke the current session's tokens
/// - `GET /api/me` - Get current user information
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/oauth/:provider", post(handlers::oauth_login))
        .route("/api/auth/refresh", post(handlers::refresh))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/me", get(handlers::me))
}
