//! Stateless signed token issuance and verification
//!
//! Tokens are self-verifying HS256 JWTs, so the signature check needs no
//! database round-trip; only the revocation lookup does. The signing
//! secret is injected at construction and stable for the process lifetime.
//! Swapping it invalidates every outstanding token, which is the accepted
//! rotation story.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::models::{Claims, TokenPurpose};
use super::revocation;
use crate::common::ApiError;

/// Outcome of verifying a presented token. Callers must be able to tell
/// these apart: an expired session is re-promptable, a malformed or
/// revoked one is rejected outright.
#[derive(Debug, PartialEq, Eq)]
pub enum TokenVerdict {
    Valid { user_id: i64, jti: String, expires_at: i64 },
    Expired,
    Malformed,
    PurposeMismatch,
    Revoked,
}

/// Issues and verifies the access/refresh token pair.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    /// Issue a token for `user_id` with the configured TTL for `purpose`.
    pub fn issue(&self, user_id: i64, purpose: TokenPurpose) -> Result<String, ApiError> {
        let ttl = match purpose {
            TokenPurpose::Access => self.access_ttl_secs,
            TokenPurpose::Refresh => self.refresh_ttl_secs,
        };
        self.issue_with_ttl(user_id, purpose, ttl)
    }

    /// Issue a token with an explicit TTL in seconds.
    ///
    /// Every token gets a fresh `jti`, so re-issuing for the same user is
    /// always safe and each token can be revoked independently.
    pub fn issue_with_ttl(
        &self,
        user_id: i64,
        purpose: TokenPurpose,
        ttl_secs: i64,
    ) -> Result<String, ApiError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            purpose,
            iat: now,
            exp: now + ttl_secs,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::InternalServer(format!("token encoding failed: {}", e)))
    }

    /// Verify a presented token against an expected purpose.
    ///
    /// Check order: signature/structure, expiry, purpose, revocation set.
    /// Expiry is strict at the verifying instant with zero leeway; clock
    /// skew is not compensated, and a ttl=0 token is already expired on
    /// its next verification.
    ///
    /// Only the revocation lookup touches the database; an Err here is an
    /// infrastructure failure, never an expected token condition.
    pub async fn verify(
        &self,
        pool: &SqlitePool,
        token: &str,
        expected_purpose: TokenPurpose,
    ) -> Result<TokenVerdict, sqlx::Error> {
        // Expiry is checked by hand below so that an expired token is
        // still decoded and reported as Expired rather than Malformed.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "Token failed signature/structure check");
                return Ok(TokenVerdict::Malformed);
            }
        };

        let user_id: i64 = match claims.sub.parse() {
            Ok(id) => id,
            Err(_) => return Ok(TokenVerdict::Malformed),
        };

        if Utc::now().timestamp() >= claims.exp {
            return Ok(TokenVerdict::Expired);
        }

        if claims.purpose != expected_purpose {
            debug!(
                presented = %claims.purpose,
                expected = %expected_purpose,
                "Token purpose mismatch"
            );
            return Ok(TokenVerdict::PurposeMismatch);
        }

        if revocation::is_revoked(pool, &claims.jti).await? {
            return Ok(TokenVerdict::Revoked);
        }

        Ok(TokenVerdict::Valid {
            user_id,
            jti: claims.jti,
            expires_at: claims.exp,
        })
    }
}
