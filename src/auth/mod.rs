//! # Auth Module
//!
//! This module owns the authentication/session lifecycle:
//! - local registration and credential login (bcrypt)
//! - OAuth login via Google and Facebook (exchange + identity reconciliation)
//! - JWT access/refresh token issuance and verification
//! - token revocation (persistent denylist) and provider grant revocation
//! - AuthedUser extractor and ownership check for protected routes

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod password;
pub mod providers;
pub mod reconcile;
pub mod revocation;
pub mod routes;
pub mod store;
pub mod tokens;

#[cfg(test)]
mod tests;

pub use extractors::{ensure_owner, AuthedUser};
pub use models::User;
pub use routes::auth_routes;
