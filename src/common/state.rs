// Application state shared across all modules

use reqwest::Client;
use sqlx::SqlitePool;

use crate::auth::providers::OAuthApp;
use crate::auth::tokens::TokenService;

/// Application state containing the database pool, outbound HTTP client,
/// token service and OAuth provider credentials.
///
/// The token service (and the signing secret inside it) is built once at
/// startup and read-only afterwards, so cloning the state into concurrent
/// handlers is safe.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub http: Client,
    pub tokens: TokenService,
    pub google: Option<OAuthApp>,
    pub facebook: Option<OAuthApp>,
}
