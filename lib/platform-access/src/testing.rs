//! Scripted collaborators for exercising the auth flow without a live
//! identity provider.

use async_trait::async_trait;
use rootcause::prelude::Report;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use url::Url;

use crate::error::AuthenticationError;
use crate::provider::{
    CallbackParameters, ExchangeChecks, IdentityProvider, ProviderConfiguration, TokenSet,
};

#[derive(Debug, Clone)]
enum Script {
    Claims(Value),
    Reject(String),
}

/// Identity provider whose discovery and exchange results are fixed up front.
///
/// The exchange still enforces the callback state rule, so state handling is
/// exercised end to end.
#[derive(Debug)]
pub struct StaticIdentityProvider {
    configuration: ProviderConfiguration,
    discovery_failure: Option<String>,
    script: Mutex<Script>,
    discoveries: AtomicUsize,
    exchanges: AtomicUsize,
    forgets: AtomicUsize,
    last_checks: Mutex<Option<ExchangeChecks>>,
}

impl StaticIdentityProvider {
    /// A provider advertising `S256`, returning `email` as its only claim.
    #[must_use]
    pub fn with_pkce(email: &str) -> Self {
        Self::new(vec!["S256".to_string()], email)
    }

    /// A provider advertising no PKCE support, so logins carry `state`.
    #[must_use]
    pub fn without_pkce(email: &str) -> Self {
        Self::new(Vec::new(), email)
    }

    fn new(methods: Vec<String>, email: &str) -> Self {
        let authorization_endpoint =
            Url::parse("https://idp.example.com/authorize").expect("static authorization URL");
        Self {
            configuration: ProviderConfiguration::new(
                "https://idp.example.com".to_string(),
                authorization_endpoint,
                methods,
            ),
            discovery_failure: None,
            script: Mutex::new(Script::Claims(serde_json::json!({
                "sub": "subject-1",
                "email": email,
            }))),
            discoveries: AtomicUsize::new(0),
            exchanges: AtomicUsize::new(0),
            forgets: AtomicUsize::new(0),
            last_checks: Mutex::new(None),
        }
    }

    /// Makes every discovery fail.
    #[must_use]
    pub fn failing_discovery(mut self, reason: &str) -> Self {
        self.discovery_failure = Some(reason.to_string());
        self
    }

    /// Replaces the claims returned by subsequent exchanges.
    pub fn set_claims(&self, claims: Value) {
        *self.script.lock().unwrap_or_else(PoisonError::into_inner) = Script::Claims(claims);
    }

    /// Makes subsequent exchanges fail as a provider rejection would.
    pub fn reject_exchanges(&self, reason: &str) {
        *self.script.lock().unwrap_or_else(PoisonError::into_inner) =
            Script::Reject(reason.to_string());
    }

    #[must_use]
    pub fn discovery_count(&self) -> usize {
        self.discoveries.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    /// How many times the memoised configuration was dropped.
    #[must_use]
    pub fn forget_count(&self) -> usize {
        self.forgets.load(Ordering::SeqCst)
    }

    /// The checks passed to the most recent exchange.
    #[must_use]
    pub fn last_checks(&self) -> Option<ExchangeChecks> {
        self.last_checks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn discover_configuration(
        &self,
    ) -> Result<ProviderConfiguration, Report<AuthenticationError>> {
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        match &self.discovery_failure {
            Some(reason) => Err(AuthenticationError::Discovery {
                issuer: self.configuration.issuer().to_string(),
                reason: reason.clone(),
            }
            .into()),
            None => Ok(self.configuration.clone()),
        }
    }

    async fn forget_configuration(&self) {
        self.forgets.fetch_add(1, Ordering::SeqCst);
    }

    async fn exchange_code_for_tokens(
        &self,
        _config: &ProviderConfiguration,
        callback_url: &Url,
        checks: &ExchangeChecks,
    ) -> Result<TokenSet, Report<AuthenticationError>> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        *self
            .last_checks
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(checks.clone());

        CallbackParameters::from_callback_url(callback_url, checks.expected_state.as_deref())?;

        let script = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match script {
            Script::Claims(claims) => Ok(TokenSet::new(claims)),
            Script::Reject(reason) => Err(AuthenticationError::TokenExchange { reason }.into()),
        }
    }
}
