//! OAuth provider exchange and revocation clients
//!
//! Each provider is a thin client: exchange the one-time code/token the
//! browser obtained for a normalized identity claim, and revoke a
//! previously stored grant on disconnect. Claims are validated here at
//! the boundary, so nothing loosely-typed reaches the reconciler.
//!
//! Every outbound call carries an explicit timeout. A provider that does
//! not answer in time fails the login cleanly instead of hanging the
//! request.

use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::common::safe_email_log;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v1/userinfo";
const GOOGLE_REVOKE_URL: &str = "https://accounts.google.com/o/oauth2/revoke";
const FACEBOOK_TOKEN_URL: &str = "https://graph.facebook.com/oauth/access_token";
const FACEBOOK_ME_URL: &str = "https://graph.facebook.com/v3.2/me";
const FACEBOOK_PICTURE_URL: &str = "https://graph.facebook.com/v3.2/me/picture";
const FACEBOOK_GRAPH_URL: &str = "https://graph.facebook.com";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("provider rejected the exchange: {0}")]
    ExchangeDenied(String),

    #[error("provider claim missing required field: {0}")]
    IncompleteClaim(&'static str),

    #[error("provider revocation failed: {0}")]
    RevocationFailed(String),
}

/// Supported OAuth providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    Facebook,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Facebook => "facebook",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Provider::Google),
            "facebook" => Ok(Provider::Facebook),
            _ => Err(()),
        }
    }
}

/// Client id/secret pair for one registered OAuth application.
#[derive(Debug, Clone)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: String,
}

/// Normalized identity claim returned by a successful exchange.
#[derive(Debug, Clone)]
pub struct ProviderClaim {
    pub display_name: String,
    pub email: String,
    pub picture: Option<String>,
    pub provider: Provider,
    pub provider_user_id: String,
    pub provider_token: String,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    id: Option<String>,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Deserialize)]
struct FacebookUserInfo {
    id: Option<String>,
    email: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct FacebookPicture {
    data: Option<FacebookPictureData>,
}

#[derive(Deserialize)]
struct FacebookPictureData {
    url: Option<String>,
}

/// Exchange a one-time code/token with the named provider for a normalized
/// identity claim.
pub async fn exchange(
    provider: Provider,
    app: &OAuthApp,
    http: &Client,
    code: &str,
) -> Result<ProviderClaim, ProviderError> {
    match provider {
        Provider::Google => exchange_google(app, http, code).await,
        Provider::Facebook => exchange_facebook(app, http, code).await,
    }
}

/// Ask the provider to revoke a grant it issued earlier. Called on
/// disconnect; the caller decides what a failure means (for logout it is
/// logged and ignored).
pub async fn revoke_grant(
    provider: Provider,
    http: &Client,
    provider_user_id: &str,
    provider_token: &str,
) -> Result<(), ProviderError> {
    match provider {
        Provider::Google => revoke_google(http, provider_token).await,
        Provider::Facebook => revoke_facebook(http, provider_user_id, provider_token).await,
    }
}

async fn exchange_google(
    app: &OAuthApp,
    http: &Client,
    code: &str,
) -> Result<ProviderClaim, ProviderError> {
    // Upgrade the one-time authorization code into an access token.
    let token_resp: AccessTokenResponse = http
        .post(GOOGLE_TOKEN_URL)
        .timeout(PROVIDER_TIMEOUT)
        .form(&[
            ("code", code),
            ("client_id", app.client_id.as_str()),
            ("client_secret", app.client_secret.as_str()),
            ("redirect_uri", "postmessage"),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await?
        .json()
        .await?;

    let access_token = match (token_resp.access_token, token_resp.error) {
        (Some(t), _) => t,
        (None, err) => {
            return Err(ProviderError::ExchangeDenied(format!(
                "google code exchange: {}",
                err.unwrap_or_default()
            )))
        }
    };

    let info: GoogleUserInfo = http
        .get(GOOGLE_USERINFO_URL)
        .timeout(PROVIDER_TIMEOUT)
        .query(&[("access_token", access_token.as_str()), ("alt", "json")])
        .send()
        .await?
        .json()
        .await?;

    let email = info.email.ok_or(ProviderError::IncompleteClaim("email"))?;
    let provider_user_id = info.id.ok_or(ProviderError::IncompleteClaim("id"))?;
    let display_name = info.name.ok_or(ProviderError::IncompleteClaim("name"))?;

    debug!(
        email = %safe_email_log(&email),
        provider = "google",
        "Google exchange successful"
    );

    Ok(ProviderClaim {
        display_name,
        email,
        picture: info.picture,
        provider: Provider::Google,
        provider_user_id,
        provider_token: access_token,
    })
}

async fn exchange_facebook(
    app: &OAuthApp,
    http: &Client,
    short_lived_token: &str,
) -> Result<ProviderClaim, ProviderError> {
    // Exchange the short-lived client token for a long-lived one.
    let token_resp: AccessTokenResponse = http
        .get(FACEBOOK_TOKEN_URL)
        .timeout(PROVIDER_TIMEOUT)
        .query(&[
            ("grant_type", "fb_exchange_token"),
            ("client_id", app.client_id.as_str()),
            ("client_secret", app.client_secret.as_str()),
            ("fb_exchange_token", short_lived_token),
        ])
        .send()
        .await?
        .json()
        .await?;

    let access_token = match (token_resp.access_token, token_resp.error) {
        (Some(t), _) => t,
        (None, err) => {
            return Err(ProviderError::ExchangeDenied(format!(
                "facebook token exchange: {}",
                err.unwrap_or_default()
            )))
        }
    };

    let info: FacebookUserInfo = http
        .get(FACEBOOK_ME_URL)
        .timeout(PROVIDER_TIMEOUT)
        .query(&[
            ("access_token", access_token.as_str()),
            ("fields", "name,id,email"),
        ])
        .send()
        .await?
        .json()
        .await?;

    let email = info.email.ok_or(ProviderError::IncompleteClaim("email"))?;
    let provider_user_id = info.id.ok_or(ProviderError::IncompleteClaim("id"))?;
    let display_name = info.name.ok_or(ProviderError::IncompleteClaim("name"))?;

    // The picture is optional profile garnish; a failure here should not
    // fail the whole login.
    let picture = match fetch_facebook_picture(http, &access_token).await {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "Failed to fetch Facebook profile picture");
            None
        }
    };

    debug!(
        email = %safe_email_log(&email),
        provider = "facebook",
        "Facebook exchange successful"
    );

    Ok(ProviderClaim {
        display_name,
        email,
        picture,
        provider: Provider::Facebook,
        provider_user_id,
        provider_token: access_token,
    })
}

async fn fetch_facebook_picture(
    http: &Client,
    access_token: &str,
) -> Result<Option<String>, ProviderError> {
    let picture: FacebookPicture = http
        .get(FACEBOOK_PICTURE_URL)
        .timeout(PROVIDER_TIMEOUT)
        .query(&[
            ("access_token", access_token),
            ("redirect", "0"),
            ("height", "200"),
            ("width", "200"),
        ])
        .send()
        .await?
        .json()
        .await?;

    Ok(picture.data.and_then(|d| d.url))
}

async fn revoke_google(http: &Client, token: &str) -> Result<(), ProviderError> {
    let resp = http
        .get(GOOGLE_REVOKE_URL)
        .timeout(PROVIDER_TIMEOUT)
        .query(&[("token", token), ("alt", "json")])
        .send()
        .await?;

    if resp.status().is_success() {
        Ok(())
    } else {
        Err(ProviderError::RevocationFailed(format!(
            "google revoke returned {}",
            resp.status()
        )))
    }
}

async fn revoke_facebook(
    http: &Client,
    provider_user_id: &str,
    token: &str,
) -> Result<(), ProviderError> {
    #[derive(Deserialize)]
    struct RevokeResponse {
        success: Option<bool>,
        error: Option<serde_json::Value>,
    }

    let url = format!(
        "{}/{}/permissions",
        FACEBOOK_GRAPH_URL,
        urlencoding::encode(provider_user_id)
    );

    let resp: RevokeResponse = http
        .delete(&url)
        .timeout(PROVIDER_TIMEOUT)
        .query(&[("access_token", token)])
        .send()
        .await?
        .json()
        .await?;

    match resp {
        RevokeResponse {
            success: Some(true),
            ..
        } => Ok(()),
        RevokeResponse { error, .. } => Err(ProviderError::RevocationFailed(format!(
            "facebook revoke: {}",
            error.unwrap_or_default()
        ))),
    }
}
