//! Identity provider client implementation using the openidconnect crate.

use async_trait::async_trait;
use base64::Engine;
use openidconnect::core::{
    CoreAuthDisplay, CoreClaimName, CoreClaimType, CoreClient, CoreClientAuthMethod,
    CoreGrantType, CoreJsonWebKey, CoreJweContentEncryptionAlgorithm,
    CoreJweKeyManagementAlgorithm, CoreResponseMode, CoreResponseType, CoreSubjectIdentifierType,
};
use openidconnect::{
    AdditionalProviderMetadata, AuthorizationCode, ClientId, ClientSecret, IssuerUrl, Nonce,
    PkceCodeVerifier, ProviderMetadata, RedirectUrl, RequestTokenError, TokenResponse,
};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use stockwatch_platform_access::{
    AuthenticationError, CallbackParameters, ExchangeChecks, IdentityProvider, OidcConfig,
    ProviderConfiguration, TokenSet,
};
use tokio::sync::RwLock;
use tracing::{debug, error, instrument};
use url::Url;

/// Discovery fields beyond the OIDC core set that the login flow needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PkceProviderMetadata {
    /// RFC 8414 `code_challenge_methods_supported`.
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

impl AdditionalProviderMetadata for PkceProviderMetadata {}

/// Provider metadata with PKCE advertisement.
pub type DiscoveredMetadata = ProviderMetadata<
    PkceProviderMetadata,
    CoreAuthDisplay,
    CoreClientAuthMethod,
    CoreClaimName,
    CoreClaimType,
    CoreGrantType,
    CoreJweContentEncryptionAlgorithm,
    CoreJweKeyManagementAlgorithm,
    CoreJsonWebKey,
    CoreResponseMode,
    CoreResponseType,
    CoreSubjectIdentifierType,
>;

/// OIDC client for authenticating users.
///
/// Discovery results are memoised per issuer for the process lifetime.
/// Concurrent first discoveries may both hit the network; the last write wins
/// and both values are equivalent.
pub struct OpenIdProvider {
    config: OidcConfig,
    http_client: reqwest::Client,
    discovered: RwLock<HashMap<String, Arc<DiscoveredMetadata>>>,
}

impl OpenIdProvider {
    /// Creates a provider client. No network traffic happens until the first
    /// discovery.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the HTTP client cannot be built.
    pub fn new(
        config: OidcConfig,
        timeout: Duration,
    ) -> Result<Self, Report<AuthenticationError>> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| AuthenticationError::Configuration {
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            config,
            http_client,
            discovered: RwLock::new(HashMap::new()),
        })
    }

    async fn metadata(&self) -> Result<Arc<DiscoveredMetadata>, Report<AuthenticationError>> {
        let issuer = self.config.issuer_url();
        if let Some(metadata) = self.discovered.read().await.get(issuer) {
            return Ok(metadata.clone());
        }

        let issuer_url = IssuerUrl::new(issuer.to_string()).map_err(|e| {
            AuthenticationError::Configuration {
                reason: format!("invalid issuer URL: {e}"),
            }
        })?;

        debug!(issuer, "discovering OIDC provider");
        let metadata = DiscoveredMetadata::discover_async(issuer_url, &self.http_client)
            .await
            .map_err(|e| {
                error!(issuer, error = %e, "OIDC discovery failed");
                AuthenticationError::Discovery {
                    issuer: issuer.to_string(),
                    reason: e.to_string(),
                }
            })?;

        let metadata = Arc::new(metadata);
        self.discovered
            .write()
            .await
            .insert(issuer.to_string(), metadata.clone());
        Ok(metadata)
    }

    /// Decodes the raw ID token payload so every claim is available, not just
    /// the standard set.
    fn decode_id_token_claims<TR>(token_response: &TR) -> Result<serde_json::Value, String>
    where
        TR: Serialize,
    {
        let response_json = serde_json::to_value(token_response)
            .map_err(|e| format!("failed to serialize token response: {e}"))?;

        let id_token_str = response_json
            .get("id_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "no id_token in response".to_string())?;

        // JWT is base64url(header).base64url(payload).signature
        let parts: Vec<&str> = id_token_str.split('.').collect();
        if parts.len() != 3 {
            return Err("invalid JWT format".to_string());
        }

        let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|e| format!("failed to decode JWT payload: {e}"))?;

        serde_json::from_slice(&payload_bytes)
            .map_err(|e| format!("failed to parse JWT payload: {e}"))
    }
}

/// Projects the openidconnect metadata onto the flow's view of it.
pub fn provider_configuration(metadata: &DiscoveredMetadata) -> ProviderConfiguration {
    ProviderConfiguration::new(
        metadata.issuer().as_str().to_string(),
        metadata.authorization_endpoint().url().clone(),
        metadata
            .additional_metadata()
            .code_challenge_methods_supported
            .clone(),
    )
}

fn exchange_error(reason: String) -> AuthenticationError {
    AuthenticationError::TokenExchange { reason }
}

#[async_trait]
impl IdentityProvider for OpenIdProvider {
    async fn discover_configuration(
        &self,
    ) -> Result<ProviderConfiguration, Report<AuthenticationError>> {
        let metadata = self.metadata().await?;
        Ok(provider_configuration(&metadata))
    }

    async fn forget_configuration(&self) {
        self.discovered.write().await.remove(self.config.issuer_url());
    }

    #[instrument(skip_all, fields(issuer = %config.issuer()))]
    async fn exchange_code_for_tokens(
        &self,
        config: &ProviderConfiguration,
        callback_url: &Url,
        checks: &ExchangeChecks,
    ) -> Result<TokenSet, Report<AuthenticationError>> {
        let params =
            CallbackParameters::from_callback_url(callback_url, checks.expected_state.as_deref())?;

        let metadata = self.metadata().await?;
        if metadata.issuer().as_str() != config.issuer() {
            return Err(exchange_error(format!(
                "callback configuration is for issuer '{}'",
                config.issuer()
            ))
            .into());
        }
        let redirect_url = RedirectUrl::new(self.config.redirect_uri().to_string()).map_err(
            |e| AuthenticationError::Configuration {
                reason: format!("invalid redirect URI: {e}"),
            },
        )?;
        let client = CoreClient::from_provider_metadata(
            (*metadata).clone(),
            ClientId::new(self.config.client_id().to_string()),
            Some(ClientSecret::new(self.config.client_secret().to_string())),
        )
        .set_redirect_uri(redirect_url);

        let token_response = client
            .exchange_code(AuthorizationCode::new(params.code))
            .map_err(|e| exchange_error(format!("token endpoint error: {e}")))?
            .set_pkce_verifier(PkceCodeVerifier::new(checks.code_verifier.clone()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| {
                if let RequestTokenError::ServerResponse(response) = &e {
                    error!(
                        error = ?response.error(),
                        description = ?response.error_description(),
                        "provider rejected authorization code"
                    );
                } else {
                    error!(error = %e, "token exchange failed");
                }
                exchange_error(format!("token exchange failed: {e}"))
            })?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| exchange_error("no ID token in response".to_string()))?;

        // No nonce is sent at login; PKCE binds the code to this browser.
        let verified = id_token
            .claims(&client.id_token_verifier(), |_: Option<&Nonce>| {
                Ok::<(), String>(())
            })
            .map_err(|e| exchange_error(format!("ID token validation failed: {e}")))?;
        let subject = verified.subject().to_string();

        let claims = Self::decode_id_token_claims(&token_response).map_err(exchange_error)?;

        debug!(subject, "token exchange succeeded");
        Ok(TokenSet::new(claims))
    }
}
