//! Tests for the auth module
//!
//! Pure checks (password hashing, ownership) run as plain tests; anything
//! touching tokens-with-revocation or user persistence runs against an
//! in-memory SQLite pool bootstrapped with the real schema.

#[cfg(test)]
mod tests {
    use super::super::extractors::{ensure_owner, AuthedUser};
    use super::super::models::{
        LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest, TokenPurpose, User,
    };
    use super::super::providers::{Provider, ProviderClaim};
    use super::super::tokens::{TokenService, TokenVerdict};
    use super::super::{handlers, password, reconcile, revocation, store};
    use crate::common::{schema, ApiError, AppState};

    use axum::extract::{Extension, Json, Path};
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    async fn test_pool() -> SqlitePool {
        // A single connection, or every pooled connection would get its
        // own empty in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        schema::create_schema(&pool)
            .await
            .expect("Failed to create schema");
        pool
    }

    fn test_tokens() -> TokenService {
        TokenService::new("test_secret_key", 900, 3600)
    }

    async fn test_state() -> Arc<RwLock<AppState>> {
        let state = AppState {
            db: test_pool().await,
            http: reqwest::Client::new(),
            tokens: test_tokens(),
            google: None,
            facebook: None,
        };
        Arc::new(RwLock::new(state))
    }

    fn google_claim(email: &str, name: &str) -> ProviderClaim {
        ProviderClaim {
            display_name: name.to_string(),
            email: email.to_string(),
            picture: Some("https://example.com/pic.jpg".to_string()),
            provider: Provider::Google,
            provider_user_id: "g-1".to_string(),
            provider_token: "g-token".to_string(),
        }
    }

    // ---- Credential store ----

    #[test]
    fn test_password_roundtrip() {
        let hash = password::hash_password("s3cret!").expect("Failed to hash");
        assert!(password::verify_password("s3cret!", Some(&hash)));
        assert!(!password::verify_password("wrong", Some(&hash)));
    }

    #[test]
    fn test_password_hashes_differ_but_both_verify() {
        let h1 = password::hash_password("same input").unwrap();
        let h2 = password::hash_password("same input").unwrap();
        assert_ne!(h1, h2, "salts must vary across calls");
        assert!(password::verify_password("same input", Some(&h1)));
        assert!(password::verify_password("same input", Some(&h2)));
    }

    #[test]
    fn test_verify_password_rejects_malformed_or_missing_hash() {
        assert!(!password::verify_password("anything", Some("not-a-bcrypt-hash")));
        assert!(!password::verify_password("anything", Some("")));
        assert!(!password::verify_password("anything", None));
    }

    // ---- Token service ----

    #[tokio::test]
    async fn test_issue_and_verify_access_token() {
        let pool = test_pool().await;
        let tokens = test_tokens();

        let token = tokens.issue(42, TokenPurpose::Access).unwrap();
        let verdict = tokens
            .verify(&pool, &token, TokenPurpose::Access)
            .await
            .unwrap();

        match verdict {
            TokenVerdict::Valid { user_id, .. } => assert_eq!(user_id, 42),
            other => panic!("expected Valid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_ttl_token_is_immediately_expired() {
        let pool = test_pool().await;
        let tokens = test_tokens();

        let token = tokens.issue_with_ttl(7, TokenPurpose::Access, 0).unwrap();
        let verdict = tokens
            .verify(&pool, &token, TokenPurpose::Access)
            .await
            .unwrap();

        assert_eq!(verdict, TokenVerdict::Expired);
    }

    #[tokio::test]
    async fn test_purpose_mismatch_is_never_valid() {
        let pool = test_pool().await;
        let tokens = test_tokens();

        let refresh = tokens.issue(7, TokenPurpose::Refresh).unwrap();
        let verdict = tokens
            .verify(&pool, &refresh, TokenPurpose::Access)
            .await
            .unwrap();

        assert_eq!(verdict, TokenVerdict::PurposeMismatch);
    }

    #[tokio::test]
    async fn test_garbage_token_is_malformed() {
        let pool = test_pool().await;
        let tokens = test_tokens();

        let verdict = tokens
            .verify(&pool, "not.a.token", TokenPurpose::Access)
            .await
            .unwrap();

        assert_eq!(verdict, TokenVerdict::Malformed);
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_malformed() {
        let pool = test_pool().await;
        let tokens = test_tokens();
        let other = TokenService::new("another_secret_key", 900, 3600);

        let token = other.issue(42, TokenPurpose::Access).unwrap();
        let verdict = tokens
            .verify(&pool, &token, TokenPurpose::Access)
            .await
            .unwrap();

        assert_eq!(verdict, TokenVerdict::Malformed);
    }

    #[tokio::test]
    async fn test_revoked_token_fails_verification() {
        let pool = test_pool().await;
        let tokens = test_tokens();

        let token = tokens.issue(42, TokenPurpose::Access).unwrap();
        let (jti, expires_at) = match tokens
            .verify(&pool, &token, TokenPurpose::Access)
            .await
            .unwrap()
        {
            TokenVerdict::Valid {
                jti, expires_at, ..
            } => (jti, expires_at),
            other => panic!("expected Valid before revocation, got {:?}", other),
        };

        revocation::revoke(&pool, &jti, expires_at).await.unwrap();

        // Signature and expiry would still pass; the denylist wins.
        let verdict = tokens
            .verify(&pool, &token, TokenPurpose::Access)
            .await
            .unwrap();
        assert_eq!(verdict, TokenVerdict::Revoked);
    }

    #[tokio::test]
    async fn test_purge_drops_only_expired_entries() {
        let pool = test_pool().await;
        let now = Utc::now().timestamp();

        revocation::revoke(&pool, "dead-jti", now - 10).await.unwrap();
        revocation::revoke(&pool, "live-jti", now + 3600).await.unwrap();

        let purged = revocation::purge_expired(&pool).await.unwrap();
        assert_eq!(purged, 1);

        assert!(!revocation::is_revoked(&pool, "dead-jti").await.unwrap());
        assert!(revocation::is_revoked(&pool, "live-jti").await.unwrap());
    }

    // ---- Identity reconciliation ----

    #[tokio::test]
    async fn test_reconcile_creates_then_updates_same_user() {
        let pool = test_pool().await;

        let first = reconcile::reconcile(&pool, &google_claim("bob@x.com", "Bob"))
            .await
            .unwrap();
        assert_eq!(first.username, "Bob");
        assert_eq!(first.provider.as_deref(), Some("google"));
        assert!(first.password_hash.is_none(), "no local login for OAuth-created accounts");

        // Same email, new display name: mutable profile, stable identity.
        let second = reconcile::reconcile(&pool, &google_claim("bob@x.com", "Robert"))
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.username, "Robert");
    }

    #[tokio::test]
    async fn test_reconcile_cross_provider_updates_instead_of_duplicating() {
        let pool = test_pool().await;

        let created = reconcile::reconcile(&pool, &google_claim("bob@x.com", "Bob"))
            .await
            .unwrap();

        let facebook_claim = ProviderClaim {
            display_name: "Bob".to_string(),
            email: "bob@x.com".to_string(),
            picture: None,
            provider: Provider::Facebook,
            provider_user_id: "f-9".to_string(),
            provider_token: "f-token".to_string(),
        };

        let updated = reconcile::reconcile(&pool, &facebook_claim).await.unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.provider.as_deref(), Some("facebook"));
        assert_eq!(updated.provider_user_id.as_deref(), Some("f-9"));
        assert_eq!(updated.provider_token.as_deref(), Some("f-token"));

        // Still exactly one row for this email.
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind("bob@x.com")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    // ---- Gateway handlers ----

    #[tokio::test]
    async fn test_register_then_login_issues_resolvable_tokens() {
        let state = test_state().await;

        let resp = handlers::register(
            Extension(state.clone()),
            Json(RegisterRequest {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "s3cret!".to_string(),
            }),
        )
        .await
        .expect("registration should succeed");

        let user_id = resp.0["user"]["id"].as_i64().unwrap();

        let login = handlers::login(
            Extension(state.clone()),
            Json(LoginRequest {
                username: "alice".to_string(),
                password: "s3cret!".to_string(),
            }),
        )
        .await
        .expect("login should succeed");

        let access = login.0["access_token"].as_str().unwrap().to_string();

        let app = state.read().await.clone();
        let verdict = app
            .tokens
            .verify(&app.db, &access, TokenPurpose::Access)
            .await
            .unwrap();
        match verdict {
            TokenVerdict::Valid { user_id: id, .. } => assert_eq!(id, user_id),
            other => panic!("expected Valid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_is_generic_failure() {
        let state = test_state().await;

        handlers::register(
            Extension(state.clone()),
            Json(RegisterRequest {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "s3cret!".to_string(),
            }),
        )
        .await
        .unwrap();

        let err = handlers::login(
            Extension(state.clone()),
            Json(LoginRequest {
                username: "alice".to_string(),
                password: "wrong".to_string(),
            }),
        )
        .await
        .expect_err("wrong password must fail");
        assert!(matches!(err, ApiError::InvalidCredentials));

        // Unknown username gets the exact same condition.
        let err = handlers::login(
            Extension(state),
            Json(LoginRequest {
                username: "nobody".to_string(),
                password: "s3cret!".to_string(),
            }),
        )
        .await
        .expect_err("unknown user must fail");
        assert!(matches!(err, ApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_username_and_email() {
        let state = test_state().await;

        handlers::register(
            Extension(state.clone()),
            Json(RegisterRequest {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "s3cret!".to_string(),
            }),
        )
        .await
        .unwrap();

        let err = handlers::register(
            Extension(state.clone()),
            Json(RegisterRequest {
                username: "alice".to_string(),
                email: "other@example.com".to_string(),
                password: "pw".to_string(),
            }),
        )
        .await
        .expect_err("duplicate username must fail");
        assert!(matches!(err, ApiError::Conflict(_)));

        let err = handlers::register(
            Extension(state),
            Json(RegisterRequest {
                username: "alice2".to_string(),
                email: "alice@example.com".to_string(),
                password: "pw".to_string(),
            }),
        )
        .await
        .expect_err("duplicate email must fail");
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_refresh_mints_new_access_token_only() {
        let state = test_state().await;

        let resp = handlers::register(
            Extension(state.clone()),
            Json(RegisterRequest {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "s3cret!".to_string(),
            }),
        )
        .await
        .unwrap();

        let user_id = resp.0["user"]["id"].as_i64().unwrap();
        let refresh_token = resp.0["refresh_token"].as_str().unwrap().to_string();

        let refreshed = handlers::refresh(
            Extension(state.clone()),
            Json(RefreshRequest {
                refresh_token: refresh_token.clone(),
            }),
        )
        .await
        .expect("refresh should succeed");

        assert!(refreshed.0.get("refresh_token").is_none(), "refresh token is not rotated");

        let access = refreshed.0["access_token"].as_str().unwrap().to_string();
        let app = state.read().await.clone();
        match app
            .tokens
            .verify(&app.db, &access, TokenPurpose::Access)
            .await
            .unwrap()
        {
            TokenVerdict::Valid { user_id: id, .. } => assert_eq!(id, user_id),
            other => panic!("expected Valid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let state = test_state().await;
        let app = state.read().await.clone();

        let access = app.tokens.issue(1, TokenPurpose::Access).unwrap();
        let err = handlers::refresh(
            Extension(state),
            Json(RefreshRequest {
                refresh_token: access,
            }),
        )
        .await
        .expect_err("an access token must not refresh");
        assert!(matches!(err, ApiError::TokenMalformed));
    }

    #[tokio::test]
    async fn test_logout_revokes_both_tokens() {
        let state = test_state().await;

        let resp = handlers::register(
            Extension(state.clone()),
            Json(RegisterRequest {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "s3cret!".to_string(),
            }),
        )
        .await
        .unwrap();

        let access = resp.0["access_token"].as_str().unwrap().to_string();
        let refresh_token = resp.0["refresh_token"].as_str().unwrap().to_string();

        let app = state.read().await.clone();
        let (jti, expires_at) = match app
            .tokens
            .verify(&app.db, &access, TokenPurpose::Access)
            .await
            .unwrap()
        {
            TokenVerdict::Valid {
                jti, expires_at, ..
            } => (jti, expires_at),
            other => panic!("expected Valid, got {:?}", other),
        };

        let user = store::find_user_by_username(&app.db, "alice")
            .await
            .unwrap()
            .unwrap();

        handlers::logout(
            Extension(state.clone()),
            AuthedUser {
                user,
                jti,
                expires_at,
            },
            Some(Json(LogoutRequest {
                refresh_token: Some(refresh_token.clone()),
            })),
        )
        .await
        .expect("logout should succeed");

        assert_eq!(
            app.tokens
                .verify(&app.db, &access, TokenPurpose::Access)
                .await
                .unwrap(),
            TokenVerdict::Revoked
        );
        assert_eq!(
            app.tokens
                .verify(&app.db, &refresh_token, TokenPurpose::Refresh)
                .await
                .unwrap(),
            TokenVerdict::Revoked
        );
    }

    #[tokio::test]
    async fn test_oauth_login_rejects_unknown_provider() {
        let state = test_state().await;

        let err = handlers::oauth_login(
            Extension(state),
            Path("github".to_string()),
            Json(super::super::models::OAuthLoginRequest {
                code: "whatever".to_string(),
            }),
        )
        .await
        .expect_err("unknown provider must be rejected");
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    // ---- Authorization contract ----

    #[test]
    fn test_ensure_owner_equality_contract() {
        let user = User {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: None,
            picture: None,
            provider: None,
            provider_user_id: None,
            provider_token: None,
            created_at: None,
        };
        let authed = AuthedUser {
            user,
            jti: "jti".to_string(),
            expires_at: 0,
        };

        assert!(ensure_owner(&authed, 1).is_ok());
        assert!(matches!(
            ensure_owner(&authed, 2),
            Err(ApiError::Forbidden(_))
        ));
    }
}
