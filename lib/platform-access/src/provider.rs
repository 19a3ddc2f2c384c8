//! Identity provider client interface.
//!
//! Everything that talks to the external authorization server sits behind
//! [`IdentityProvider`], so the login flow does not depend on any particular
//! OIDC library. URL construction and callback parsing are pure and live here.

use async_trait::async_trait;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::AuthenticationError;

/// The subset of provider metadata the login flow uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfiguration {
    issuer: String,
    authorization_endpoint: Url,
    #[serde(default)]
    code_challenge_methods_supported: Vec<String>,
}

impl ProviderConfiguration {
    #[must_use]
    pub fn new(
        issuer: String,
        authorization_endpoint: Url,
        code_challenge_methods_supported: Vec<String>,
    ) -> Self {
        Self {
            issuer,
            authorization_endpoint,
            code_challenge_methods_supported,
        }
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn authorization_endpoint(&self) -> &Url {
        &self.authorization_endpoint
    }

    /// True when the provider advertises `S256` PKCE, in which case no
    /// separate `state` parameter is sent.
    #[must_use]
    pub fn supports_pkce(&self) -> bool {
        self.code_challenge_methods_supported
            .iter()
            .any(|m| m == "S256")
    }
}

/// Parameters embedded in the authorization redirect.
#[derive(Debug, Clone)]
pub struct AuthorizationParams {
    pub redirect_uri: String,
    pub scope: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    /// Only set when the provider lacks native PKCE support.
    pub state: Option<String>,
}

/// Builds the URL the browser is redirected to for authentication.
#[must_use]
pub fn build_authorization_url(
    config: &ProviderConfiguration,
    client_id: &str,
    params: &AuthorizationParams,
) -> Url {
    let mut url = config.authorization_endpoint.clone();
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("client_id", client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &params.redirect_uri)
            .append_pair("scope", &params.scope)
            .append_pair("code_challenge", &params.code_challenge)
            .append_pair("code_challenge_method", &params.code_challenge_method);
        if let Some(state) = &params.state {
            query.append_pair("state", state);
        }
    }
    url
}

/// Proof material the callback must match.
#[derive(Clone)]
pub struct ExchangeChecks {
    pub code_verifier: String,
    /// The `state` issued at login, if one was issued.
    pub expected_state: Option<String>,
}

impl std::fmt::Debug for ExchangeChecks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeChecks")
            .field("code_verifier", &"<redacted>")
            .field("expected_state", &self.expected_state.is_some())
            .finish()
    }
}

/// Authorization response parameters extracted from the callback URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParameters {
    pub code: String,
    pub state: Option<String>,
}

impl CallbackParameters {
    /// Parses the callback URL and enforces the state rule: when a state was
    /// issued the callback must echo it exactly, and when none was issued the
    /// callback must not carry one.
    ///
    /// # Errors
    ///
    /// Returns `TokenExchange` if the provider reported an error, the state
    /// does not match, or no code is present.
    pub fn from_callback_url(
        url: &Url,
        expected_state: Option<&str>,
    ) -> Result<Self, Report<AuthenticationError>> {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut error_description = None;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => error_description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(AuthenticationError::TokenExchange {
                reason: format!(
                    "provider returned '{error}': {}",
                    error_description.as_deref().unwrap_or("no description")
                ),
            }
            .into());
        }

        match (expected_state, state.as_deref()) {
            (Some(expected), Some(actual)) if expected == actual => {}
            (Some(_), Some(_)) => {
                return Err(AuthenticationError::TokenExchange {
                    reason: "state mismatch".to_string(),
                }
                .into());
            }
            (Some(_), None) => {
                return Err(AuthenticationError::TokenExchange {
                    reason: "state missing from callback".to_string(),
                }
                .into());
            }
            (None, Some(_)) => {
                return Err(AuthenticationError::TokenExchange {
                    reason: "unexpected state in callback".to_string(),
                }
                .into());
            }
            (None, None) => {}
        }

        let code = code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthenticationError::TokenExchange {
                reason: "authorization code missing from callback".to_string(),
            })?;

        Ok(Self { code, state })
    }
}

/// Result of a successful code exchange.
#[derive(Debug, Clone)]
pub struct TokenSet {
    claims: Value,
}

impl TokenSet {
    /// Creates a token set from the decoded claims of a verified ID token.
    #[must_use]
    pub fn new(claims: Value) -> Self {
        Self { claims }
    }

    /// The `email` claim, if present as a non-empty string.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.claims
            .get("email")
            .and_then(Value::as_str)
            .filter(|e| !e.is_empty())
    }
}

/// Client for the external OIDC authorization server.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fetches the provider's metadata, memoised per issuer.
    async fn discover_configuration(
        &self,
    ) -> Result<ProviderConfiguration, Report<AuthenticationError>>;

    /// Drops any memoised metadata so the next discovery refetches it.
    async fn forget_configuration(&self);

    /// Performs the authorization-code grant for the callback the browser
    /// actually reached. Never retried: codes are single-use.
    async fn exchange_code_for_tokens(
        &self,
        config: &ProviderConfiguration,
        callback_url: &Url,
        checks: &ExchangeChecks,
    ) -> Result<TokenSet, Report<AuthenticationError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn provider(methods: &[&str]) -> ProviderConfiguration {
        ProviderConfiguration::new(
            "https://auth.example.com".to_string(),
            Url::parse("https://auth.example.com/authorize?prompt=login").expect("url"),
            methods.iter().map(|m| (*m).to_string()).collect(),
        )
    }

    fn params(state: Option<&str>) -> AuthorizationParams {
        AuthorizationParams {
            redirect_uri: "https://stocks.example.com/api/auth/callback".to_string(),
            scope: "openid email profile".to_string(),
            code_challenge: "challenge".to_string(),
            code_challenge_method: "S256".to_string(),
            state: state.map(str::to_string),
        }
    }

    fn query_map(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn supports_pkce_requires_s256() {
        assert!(provider(&["plain", "S256"]).supports_pkce());
        assert!(!provider(&["plain"]).supports_pkce());
        assert!(!provider(&[]).supports_pkce());
    }

    #[test]
    fn authorization_url_embeds_pkce_parameters() {
        let url = build_authorization_url(&provider(&["S256"]), "client-id", &params(None));
        let query = query_map(&url);

        assert_eq!(url.path(), "/authorize");
        assert_eq!(query["prompt"], "login");
        assert_eq!(query["client_id"], "client-id");
        assert_eq!(query["response_type"], "code");
        assert_eq!(
            query["redirect_uri"],
            "https://stocks.example.com/api/auth/callback"
        );
        assert_eq!(query["scope"], "openid email profile");
        assert_eq!(query["code_challenge"], "challenge");
        assert_eq!(query["code_challenge_method"], "S256");
        assert!(!query.contains_key("state"));
    }

    #[test]
    fn authorization_url_includes_state_when_given() {
        let url = build_authorization_url(&provider(&[]), "client-id", &params(Some("xyz")));
        assert_eq!(query_map(&url)["state"], "xyz");
    }

    fn callback(query: &str) -> Url {
        Url::parse(&format!("http://localhost/api/auth/callback?{query}")).expect("url")
    }

    #[test]
    fn callback_without_state_parses_code() {
        let params =
            CallbackParameters::from_callback_url(&callback("code=abc"), None).expect("params");
        assert_eq!(params.code, "abc");
        assert_eq!(params.state, None);
    }

    #[test]
    fn callback_with_matching_state_is_accepted() {
        let params = CallbackParameters::from_callback_url(
            &callback("code=abc&state=s1"),
            Some("s1"),
        )
        .expect("params");
        assert_eq!(params.state.as_deref(), Some("s1"));
    }

    #[test]
    fn callback_state_rules() {
        for (query, expected) in [
            ("code=abc&state=other", Some("s1")),
            ("code=abc", Some("s1")),
            ("code=abc&state=s1", None),
        ] {
            let err = CallbackParameters::from_callback_url(&callback(query), expected)
                .expect_err(query);
            assert!(matches!(
                err.current_context(),
                AuthenticationError::TokenExchange { .. }
            ));
        }
    }

    #[test]
    fn callback_reports_provider_error() {
        let err = CallbackParameters::from_callback_url(
            &callback("error=access_denied&error_description=user+cancelled"),
            None,
        )
        .expect_err("provider error");
        assert!(err.current_context().to_string().contains("access_denied"));
    }

    #[test]
    fn callback_requires_code() {
        assert!(CallbackParameters::from_callback_url(&callback("code="), None).is_err());
        assert!(CallbackParameters::from_callback_url(&callback(""), None).is_err());
    }

    #[test]
    fn token_set_email_requires_string_claim() {
        let tokens = TokenSet::new(serde_json::json!({"email": "user@example.com"}));
        assert_eq!(tokens.email(), Some("user@example.com"));

        let tokens = TokenSet::new(serde_json::json!({"email": 42}));
        assert_eq!(tokens.email(), None);

        let tokens = TokenSet::new(serde_json::json!({"email": ""}));
        assert_eq!(tokens.email(), None);

        let tokens = TokenSet::new(serde_json::json!({}));
        assert_eq!(tokens.email(), None);
    }
}
