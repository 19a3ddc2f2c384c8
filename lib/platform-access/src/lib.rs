//! Authentication and session management for stockwatch.
//!
//! This crate provides:
//! - User and session domain types (`User`, `Session`, `SessionId`)
//! - PKCE helpers and the identity provider interface (`IdentityProvider`)
//! - User/session persistence interfaces with an in-memory implementation
//! - The login state machine (`AuthFlow`)
//!
//! It knows nothing about HTTP; the server crate maps requests and cookies
//! onto these operations.
//!
//! # Example
//!
//! ```
//! use stockwatch_platform_access::{Session, SessionId, User, pkce};
//! use chrono::Duration;
//!
//! let user = User::new("alice@example.com".to_string());
//! let session = Session::issue(SessionId::generate(), user.id());
//! assert_eq!(session.expires_at() - session.created_at(), Duration::days(7));
//!
//! let verifier = pkce::generate_verifier();
//! let challenge = pkce::compute_challenge(&verifier);
//! assert_eq!(challenge.len(), 43);
//! ```

pub mod auth;
pub mod error;
pub mod flow;
pub mod id;
pub mod oidc;
pub mod pkce;
pub mod provider;
pub mod session;
pub mod store;
pub mod user;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-export main types at crate root
pub use auth::{
    AuthenticatedUser, CallbackOutcome, CallbackRequest, FlowStage, LoginInitiation, LogoutOutcome,
};
pub use error::{AuthenticationError, Credential, StoreError};
pub use flow::AuthFlow;
pub use id::{ParseIdError, SessionId, UserId};
pub use oidc::{OidcConfig, OidcConfigBuilder};
pub use pkce::CodeChallengeMethod;
pub use provider::{
    AuthorizationParams, CallbackParameters, ExchangeChecks, IdentityProvider,
    ProviderConfiguration, TokenSet, build_authorization_url,
};
pub use session::{SESSION_TTL_DAYS, Session, session_ttl};
pub use store::{MemoryStore, SessionRecord, SessionStore, UserStore};
pub use user::User;
