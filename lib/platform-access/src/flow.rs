//! The login/session state machine.
//!
//! ```text
//! ANONYMOUS -> LOGIN_INITIATED -> CALLBACK_PENDING -> AUTHENTICATED
//! AUTHENTICATED -> LOGGED_OUT -> ANONYMOUS
//! ```
//!
//! Transient state between login and callback lives only in the browser's
//! cookies; the flow persists nothing until a session is issued.

use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::auth::{
    AuthenticatedUser, CallbackOutcome, CallbackRequest, FlowStage, LoginInitiation, LogoutOutcome,
};
use crate::error::{AuthenticationError, Credential, StoreError};
use crate::id::SessionId;
use crate::oidc::OidcConfig;
use crate::pkce;
use crate::provider::{AuthorizationParams, ExchangeChecks, IdentityProvider, build_authorization_url};
use crate::session::Session;
use crate::store::{SessionStore, UserStore};
use crate::user::User;

fn storage_error(report: Report<StoreError>) -> AuthenticationError {
    AuthenticationError::Storage {
        details: report.to_string(),
    }
}

/// Orchestrates login initiation, callback handling, session validation and
/// logout.
pub struct AuthFlow {
    config: OidcConfig,
    provider: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    revoke_on_logout: bool,
}

impl AuthFlow {
    #[must_use]
    pub fn new(
        config: OidcConfig,
        provider: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            provider,
            users,
            sessions,
            revoke_on_logout: false,
        }
    }

    /// Deletes the server-side session row on logout, not just the cookie.
    #[must_use]
    pub fn with_logout_revocation(mut self, revoke: bool) -> Self {
        self.revoke_on_logout = revoke;
        self
    }

    /// Starts a login: PKCE material, provider discovery, authorization URL.
    ///
    /// # Errors
    ///
    /// Returns `Discovery` if the provider metadata cannot be fetched.
    #[instrument(skip(self))]
    pub async fn initiate_login(&self) -> Result<LoginInitiation, Report<AuthenticationError>> {
        let code_verifier = pkce::generate_verifier();
        let method = self.config.code_challenge_method();
        let code_challenge = pkce::challenge_for(method, &code_verifier);

        let provider_config = self.provider.discover_configuration().await?;
        let state = (!provider_config.supports_pkce()).then(pkce::generate_state);

        let params = AuthorizationParams {
            redirect_uri: self.config.redirect_uri().to_string(),
            scope: self.config.scope_param(),
            code_challenge,
            code_challenge_method: method.as_str().to_string(),
            state,
        };
        let authorization_url =
            build_authorization_url(&provider_config, self.config.client_id(), &params);

        debug!(
            from = %FlowStage::Anonymous,
            to = %FlowStage::LoginInitiated,
            with_state = params.state.is_some(),
            redirect_uri = %params.redirect_uri,
            "login initiated"
        );

        Ok(LoginInitiation {
            authorization_url: authorization_url.to_string(),
            code_verifier,
            state: params.state,
        })
    }

    /// Completes a login from the provider's redirect back to the callback.
    ///
    /// A missing verifier is rejected before the provider is contacted.
    ///
    /// # Errors
    ///
    /// `MissingCredential` for an absent verifier or email claim,
    /// `TokenExchange`/`Discovery` for provider failures, `Storage` for
    /// persistence failures. No session is written on any error.
    #[instrument(skip_all)]
    pub async fn handle_callback(
        &self,
        request: CallbackRequest,
    ) -> Result<CallbackOutcome, Report<AuthenticationError>> {
        let code_verifier = request
            .code_verifier
            .filter(|v| !v.is_empty())
            .ok_or(AuthenticationError::MissingCredential {
                credential: Credential::CodeVerifier,
            })?;

        debug!(
            from = %FlowStage::LoginInitiated,
            to = %FlowStage::CallbackPending,
            "exchanging authorization code"
        );

        let provider_config = self.provider.discover_configuration().await?;
        let checks = ExchangeChecks {
            code_verifier,
            expected_state: request.state.filter(|s| !s.is_empty()),
        };
        let tokens = match self
            .provider
            .exchange_code_for_tokens(&provider_config, &request.callback_url, &checks)
            .await
        {
            Ok(tokens) => tokens,
            Err(e) => {
                // Signing keys may have rotated since discovery.
                self.provider.forget_configuration().await;
                return Err(e);
            }
        };

        let email = tokens
            .email()
            .ok_or(AuthenticationError::MissingCredential {
                credential: Credential::EmailClaim,
            })?
            .to_string();

        let (user, is_new_user) = self.find_or_create_user(email).await?;

        let session = Session::issue(SessionId::generate(), user.id());
        self.sessions
            .create_session(&session)
            .await
            .map_err(storage_error)?;

        info!(
            from = %FlowStage::CallbackPending,
            to = %FlowStage::Authenticated,
            user_id = %user.id(),
            is_new_user,
            expires_at = %session.expires_at(),
            "session issued"
        );

        Ok(CallbackOutcome {
            user,
            session,
            is_new_user,
            redirect_to: self.config.post_login_route().to_string(),
        })
    }

    async fn find_or_create_user(
        &self,
        email: String,
    ) -> Result<(User, bool), Report<AuthenticationError>> {
        if let Some(user) = self
            .users
            .get_user_by_email(&email)
            .await
            .map_err(storage_error)?
        {
            return Ok((user, false));
        }

        let user = User::new(email);
        if self.users.create_user(&user).await.map_err(storage_error)? {
            return Ok((user, true));
        }

        // A concurrent first login for the same email won the insert.
        let existing = self
            .users
            .get_user_by_email(user.email())
            .await
            .map_err(storage_error)?
            .ok_or_else(|| AuthenticationError::Storage {
                details: "user vanished after conflicting insert".to_string(),
            })?;
        Ok((existing, false))
    }

    /// Resolves the session token presented by a request. Read only: expired
    /// rows are reported, not deleted.
    ///
    /// # Errors
    ///
    /// `NoSession`, `InvalidSession` or `SessionExpired` when the caller must
    /// re-authenticate; `Storage` if the lookup itself fails.
    pub async fn validate_session(
        &self,
        token: Option<&str>,
    ) -> Result<AuthenticatedUser, Report<AuthenticationError>> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(AuthenticationError::NoSession)?;

        let record = self
            .sessions
            .get_session_by_id(&SessionId::from(token))
            .await
            .map_err(storage_error)?
            .ok_or(AuthenticationError::InvalidSession)?;

        if record.session.is_expired() {
            return Err(AuthenticationError::SessionExpired {
                expired_at: record.session.expires_at(),
            }
            .into());
        }

        Ok(AuthenticatedUser::new(record.session, record.user))
    }

    /// Ends the browser's session.
    ///
    /// The row is deleted only when logout revocation is enabled; otherwise
    /// only the cookie is cleared by the caller.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if revocation is enabled and the delete fails.
    pub async fn logout(
        &self,
        token: Option<&str>,
    ) -> Result<LogoutOutcome, Report<AuthenticationError>> {
        let mut revoked = false;
        match token.filter(|t| !t.is_empty()) {
            Some(token) if self.revoke_on_logout => {
                self.sessions
                    .delete_session(&SessionId::from(token))
                    .await
                    .map_err(storage_error)?;
                revoked = true;
            }
            Some(_) => {}
            None => warn!("logout without a session cookie"),
        }

        debug!(
            from = %FlowStage::Authenticated,
            to = %FlowStage::LoggedOut,
            revoked,
            "logged out"
        );

        Ok(LogoutOutcome {
            redirect_to: self.config.post_logout_redirect_uri().to_string(),
            revoked,
        })
    }
}
