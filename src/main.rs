// src/main.rs
use axum::{extract::Extension, Router};
use dotenv::dotenv;
use reqwest::Client;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::env;
use std::path::PathBuf;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod auth;
mod common;

use auth::providers::OAuthApp;
use auth::tokens::TokenService;
use common::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://catalog_auth.db".to_string());
    let jwt_secret =
        env::var("JWT_SECRET").unwrap_or_else(|_| "replace_with_strong_secret".to_string());
    if jwt_secret == "replace_with_strong_secret" {
        warn!("JWT_SECRET not set; using the insecure default");
    }

    let access_ttl_secs = env::var("ACCESS_TOKEN_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(15 * 60);
    let refresh_ttl_secs = env::var("REFRESH_TOKEN_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(30 * 24 * 60 * 60);

    let google = oauth_app_from_env("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET");
    let facebook = oauth_app_from_env("FACEBOOK_APP_ID", "FACEBOOK_APP_SECRET");
    if google.is_none() {
        warn!("Google OAuth not configured (GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET)");
    }
    if facebook.is_none() {
        warn!("Facebook OAuth not configured (FACEBOOK_APP_ID/FACEBOOK_APP_SECRET)");
    }

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options = SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    common::schema::create_schema(&pool).await?;

    // Clear out denylist entries for tokens that expired while we were down.
    let purged = auth::revocation::purge_expired(&pool).await?;
    if purged > 0 {
        info!(purged = purged, "Purged stale revocation entries at startup");
    }

    // ========================================================================
    // APPLICATION STATE
    // ========================================================================

    let http_client = Client::builder().build()?;

    let app_state = AppState {
        db: pool,
        http: http_client,
        tokens: TokenService::new(&jwt_secret, access_ttl_secs, refresh_ttl_secs),
        google,
        facebook,
    };

    let shared = Arc::new(RwLock::new(app_state));

    // ========================================================================
    // ROUTER COMPOSITION
    // ========================================================================

    let app = Router::new()
        .merge(auth::auth_routes())
        .layer(Extension(shared.clone()))
        .layer({
            let cors_origins = env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string());

            let origins: Vec<axum::http::HeaderValue> = cors_origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::AUTHORIZATION,
                ])
                .allow_credentials(true)
        })
        .layer(TraceLayer::new_for_http());

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn oauth_app_from_env(id_var: &str, secret_var: &str) -> Option<OAuthApp> {
    match (env::var(id_var), env::var(secret_var)) {
        (Ok(client_id), Ok(client_secret)) if !client_id.is_empty() && !client_secret.is_empty() => {
            Some(OAuthApp {
                client_id,
                client_secret,
            })
        }
        _ => None,
    }
}
