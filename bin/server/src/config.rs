//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys use
//! a double underscore, e.g. `OIDC__ISSUER_URL` or `SESSION__COOKIE_NAME`.
//!
//! See [`OidcConfig`] for the configuration handed to the login flow.

use serde::Deserialize;
use stockwatch_platform_access::{CodeChallengeMethod, OidcConfig};

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Public base URL of the application (e.g. "https://stocks.example.com").
    pub app_url: String,

    /// Socket address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Deployment mode; production turns on `Secure` cookies and https defaults.
    #[serde(default)]
    pub environment: DeploymentMode,

    /// Path prefix for the auth routes.
    #[serde(default = "default_auth_prefix")]
    pub auth_prefix: String,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// OIDC provider settings.
    pub oidc: OidcSettings,
}

/// Whether the server runs in production.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Development,
    Production,
}

impl DeploymentMode {
    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Interval between expired-session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Delete the session row on logout instead of only clearing the cookie.
    #[serde(default)]
    pub revoke_on_logout: bool,
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_auth_prefix() -> String {
    "/api/auth".to_string()
}

fn default_cookie_name() -> String {
    "stocksession".to_string()
}

fn default_cleanup_interval_seconds() -> u64 {
    3600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            revoke_on_logout: false,
        }
    }
}

/// OIDC settings as they appear in the environment. Unset routes default
/// relative to `APP_URL`.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcSettings {
    pub issuer_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Comma-separated scopes.
    #[serde(default)]
    pub scopes: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub post_login_route: Option<String>,
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,
    #[serde(default)]
    pub code_challenge_method: CodeChallengeMethod,
    /// Timeout for each request to the identity provider, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    10
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Builds the OIDC configuration for the login flow.
    #[must_use]
    pub fn oidc_config(&self) -> OidcConfig {
        let app_url = self.app_url.trim_end_matches('/');
        let oidc = &self.oidc;

        let mut builder = OidcConfig::builder(
            oidc.issuer_url.clone(),
            oidc.client_id.clone(),
            oidc.client_secret.clone(),
            app_url,
        )
        .redirect_uri(
            oidc.redirect_uri
                .clone()
                .unwrap_or_else(|| format!("{app_url}{}/callback", self.auth_prefix)),
        )
        .code_challenge_method(oidc.code_challenge_method);

        if let Some(scopes) = &oidc.scopes {
            builder = builder.scopes(
                scopes
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            );
        }
        if let Some(route) = &oidc.post_login_route {
            builder = builder.post_login_route(route.clone());
        }
        if let Some(uri) = &oidc.post_logout_redirect_uri {
            builder = builder.post_logout_redirect_uri(uri.clone());
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> OidcSettings {
        OidcSettings {
            issuer_url: "https://auth.example.com".to_string(),
            client_id: "stockwatch".to_string(),
            client_secret: "secret".to_string(),
            scopes: None,
            redirect_uri: None,
            post_login_route: None,
            post_logout_redirect_uri: None,
            code_challenge_method: CodeChallengeMethod::S256,
            timeout_seconds: default_timeout_seconds(),
        }
    }

    fn server_config(oidc: OidcSettings) -> ServerConfig {
        ServerConfig {
            database_url: "postgres://localhost/stockwatch".to_string(),
            app_url: "https://stocks.example.com/".to_string(),
            listen_addr: default_listen_addr(),
            environment: DeploymentMode::Production,
            auth_prefix: default_auth_prefix(),
            session: SessionConfig::default(),
            oidc,
        }
    }

    #[test]
    fn session_config_has_correct_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.cookie_name, "stocksession");
        assert_eq!(config.cleanup_interval_seconds, 3600);
        assert!(!config.revoke_on_logout);
    }

    #[test]
    fn deployment_mode_defaults_to_development() {
        assert_eq!(DeploymentMode::default(), DeploymentMode::Development);
        assert!(!DeploymentMode::Development.is_production());
        assert!(DeploymentMode::Production.is_production());
    }

    #[test]
    fn oidc_config_derives_routes_from_app_url() {
        let config = server_config(settings()).oidc_config();

        assert_eq!(
            config.redirect_uri(),
            "https://stocks.example.com/api/auth/callback"
        );
        assert_eq!(config.post_login_route(), "https://stocks.example.com");
        assert_eq!(
            config.post_logout_redirect_uri(),
            "https://stocks.example.com"
        );
        assert_eq!(config.audience(), "https://stocks.example.com");
    }

    #[test]
    fn oidc_config_honors_overrides() {
        let mut oidc = settings();
        oidc.scopes = Some("openid, email".to_string());
        oidc.post_login_route = Some("https://stocks.example.com/news".to_string());
        oidc.redirect_uri = Some("https://stocks.example.com/cb".to_string());

        let config = server_config(oidc).oidc_config();

        assert_eq!(config.scopes(), vec!["openid", "email"]);
        assert_eq!(config.post_login_route(), "https://stocks.example.com/news");
        assert_eq!(config.redirect_uri(), "https://stocks.example.com/cb");
    }
}
