//! OIDC (OpenID Connect) client configuration.
//!
//! The configuration is an explicit value handed to the identity provider
//! client and the auth flow at construction; nothing in the flow reads the
//! environment.

use serde::{Deserialize, Serialize};

use crate::pkce::CodeChallengeMethod;

/// Configuration for the OIDC identity provider and the login round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    /// The OIDC issuer URL, used for discovery.
    issuer_url: String,
    /// Expected audience of issued tokens (the application's base URL).
    audience: String,
    /// The OAuth2 client ID registered with the provider.
    client_id: String,
    /// The OAuth2 client secret.
    client_secret: String,
    /// OAuth2 scopes to request as a comma-separated string.
    /// Default: "openid,email,profile"
    #[serde(default = "default_scopes")]
    scopes: String,
    /// Where the provider sends the browser back to.
    redirect_uri: String,
    /// Where the browser lands after a successful login.
    post_login_route: String,
    /// Where the browser lands after logout.
    post_logout_redirect_uri: String,
    #[serde(default)]
    code_challenge_method: CodeChallengeMethod,
}

fn default_scopes() -> String {
    "openid,email,profile".to_string()
}

impl OidcConfig {
    /// Creates a configuration for an application served at `app_url`.
    ///
    /// The callback is `{app_url}/api/auth/callback`; post-login and
    /// post-logout both return to `app_url`.
    #[must_use]
    pub fn for_app(
        issuer_url: String,
        client_id: String,
        client_secret: String,
        app_url: &str,
    ) -> Self {
        Self::builder(issuer_url, client_id, client_secret, app_url).build()
    }

    /// Creates a configuration builder for more customization.
    #[must_use]
    pub fn builder(
        issuer_url: String,
        client_id: String,
        client_secret: String,
        app_url: &str,
    ) -> OidcConfigBuilder {
        OidcConfigBuilder::new(issuer_url, client_id, client_secret, app_url)
    }

    #[must_use]
    pub fn issuer_url(&self) -> &str {
        &self.issuer_url
    }

    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the OAuth2 scopes to request, parsed from comma-separated string.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Returns the scopes in `scope` parameter form (space-separated).
    #[must_use]
    pub fn scope_param(&self) -> String {
        self.scopes().join(" ")
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    #[must_use]
    pub fn post_login_route(&self) -> &str {
        &self.post_login_route
    }

    #[must_use]
    pub fn post_logout_redirect_uri(&self) -> &str {
        &self.post_logout_redirect_uri
    }

    #[must_use]
    pub fn code_challenge_method(&self) -> CodeChallengeMethod {
        self.code_challenge_method
    }
}

/// Builder for `OidcConfig`.
#[derive(Debug)]
pub struct OidcConfigBuilder {
    issuer_url: String,
    audience: String,
    client_id: String,
    client_secret: String,
    scopes: Vec<String>,
    redirect_uri: String,
    post_login_route: String,
    post_logout_redirect_uri: String,
    code_challenge_method: CodeChallengeMethod,
}

impl OidcConfigBuilder {
    /// Creates a new builder with defaults derived from `app_url`.
    #[must_use]
    pub fn new(issuer_url: String, client_id: String, client_secret: String, app_url: &str) -> Self {
        let app_url = app_url.trim_end_matches('/');
        Self {
            issuer_url,
            audience: app_url.to_string(),
            client_id,
            client_secret,
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
            redirect_uri: format!("{app_url}/api/auth/callback"),
            post_login_route: app_url.to_string(),
            post_logout_redirect_uri: app_url.to_string(),
            code_challenge_method: CodeChallengeMethod::default(),
        }
    }

    /// Sets the OAuth2 scopes to request.
    #[must_use]
    pub fn scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Adds a scope to the list of scopes to request.
    #[must_use]
    pub fn add_scope(mut self, scope: String) -> Self {
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    #[must_use]
    pub fn redirect_uri(mut self, uri: String) -> Self {
        self.redirect_uri = uri;
        self
    }

    #[must_use]
    pub fn post_login_route(mut self, route: String) -> Self {
        self.post_login_route = route;
        self
    }

    #[must_use]
    pub fn post_logout_redirect_uri(mut self, uri: String) -> Self {
        self.post_logout_redirect_uri = uri;
        self
    }

    #[must_use]
    pub fn code_challenge_method(mut self, method: CodeChallengeMethod) -> Self {
        self.code_challenge_method = method;
        self
    }

    /// Builds the `OidcConfig`.
    #[must_use]
    pub fn build(self) -> OidcConfig {
        OidcConfig {
            issuer_url: self.issuer_url,
            audience: self.audience,
            client_id: self.client_id,
            client_secret: self.client_secret,
            scopes: self.scopes.join(","),
            redirect_uri: self.redirect_uri,
            post_login_route: self.post_login_route,
            post_logout_redirect_uri: self.post_logout_redirect_uri,
            code_challenge_method: self.code_challenge_method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OidcConfig {
        OidcConfig::for_app(
            "https://auth.example.com".to_string(),
            "client-id".to_string(),
            "client-secret".to_string(),
            "https://stocks.example.com/",
        )
    }

    #[test]
    fn for_app_derives_routes_from_app_url() {
        let config = test_config();

        assert_eq!(config.issuer_url(), "https://auth.example.com");
        assert_eq!(config.audience(), "https://stocks.example.com");
        assert_eq!(
            config.redirect_uri(),
            "https://stocks.example.com/api/auth/callback"
        );
        assert_eq!(config.post_login_route(), "https://stocks.example.com");
        assert_eq!(
            config.post_logout_redirect_uri(),
            "https://stocks.example.com"
        );
        assert_eq!(config.code_challenge_method(), CodeChallengeMethod::S256);
    }

    #[test]
    fn scope_param_is_space_separated() {
        let config = test_config();
        assert_eq!(config.scopes(), vec!["openid", "email", "profile"]);
        assert_eq!(config.scope_param(), "openid email profile");
    }

    #[test]
    fn builder_allows_customization() {
        let config = OidcConfig::builder(
            "https://auth.example.com".to_string(),
            "client-id".to_string(),
            "client-secret".to_string(),
            "http://localhost:5000",
        )
        .add_scope("offline_access".to_string())
        .add_scope("openid".to_string())
        .post_login_route("http://localhost:5000/news".to_string())
        .code_challenge_method(CodeChallengeMethod::Plain)
        .build();

        assert_eq!(
            config.scopes(),
            vec!["openid", "email", "profile", "offline_access"]
        );
        assert_eq!(config.post_login_route(), "http://localhost:5000/news");
        assert_eq!(config.code_challenge_method(), CodeChallengeMethod::Plain);
    }

    #[test]
    fn scopes_parses_comma_separated_with_whitespace() {
        let json = r#"{
            "issuer_url": "https://auth.example.com",
            "audience": "https://stocks.example.com",
            "client_id": "my-client",
            "client_secret": "secret",
            "scopes": "openid, email ,",
            "redirect_uri": "https://stocks.example.com/api/auth/callback",
            "post_login_route": "https://stocks.example.com",
            "post_logout_redirect_uri": "https://stocks.example.com"
        }"#;

        let config: OidcConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.scopes(), vec!["openid", "email"]);
        assert_eq!(config.code_challenge_method(), CodeChallengeMethod::S256);
    }
}
