//! Authentication module for the stockwatch server.
//!
//! This module provides:
//! - OIDC authentication against an external identity provider
//! - Database-backed user and session persistence
//! - Authentication extractors for Axum routes
//!
//! The login state machine itself lives in `stockwatch_platform_access`;
//! the handlers here only move its inputs and outputs through cookies,
//! headers and redirects.

pub mod db;
pub mod middleware;
pub mod oidc;
pub mod routes;

use crate::config::{DeploymentMode, SessionConfig};
use stockwatch_platform_access::AuthFlow;

pub use middleware::RequireAuth;
pub use oidc::OpenIdProvider;
pub use routes::{AuthError, callback, login, logout, session};

/// Flow cookie holding the PKCE code verifier between login and callback.
pub const CODE_VERIFIER_COOKIE: &str = "code_verifier";

/// Flow cookie holding the CSRF state when the provider lacks PKCE.
pub const AUTH_STATE_COOKIE: &str = "auth_state";

/// Shared application state.
pub struct AppState {
    /// Login flow over the identity provider and stores.
    pub auth_flow: AuthFlow,
    /// Session configuration.
    pub session_config: SessionConfig,
    /// Deployment mode.
    pub environment: DeploymentMode,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        auth_flow: AuthFlow,
        session_config: SessionConfig,
        environment: DeploymentMode,
    ) -> Self {
        Self {
            auth_flow,
            session_config,
            environment,
        }
    }

    /// Whether cookies carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.environment.is_production()
    }

    /// Name of the session cookie.
    pub fn session_cookie_name(&self) -> &str {
        &self.session_config.cookie_name
    }
}
