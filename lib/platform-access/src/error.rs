//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `AuthenticationError`: failures anywhere in the login/session flow
//! - `StoreError`: failures from user and session persistence

use chrono::{DateTime, Utc};
use std::fmt;

/// A credential the flow requires but did not receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    /// The PKCE `code_verifier` cookie set at login.
    CodeVerifier,
    /// The `email` claim in the provider's ID token.
    EmailClaim,
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CodeVerifier => write!(f, "code verifier"),
            Self::EmailClaim => write!(f, "email claim"),
        }
    }
}

/// Errors from authentication operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// Provider metadata could not be fetched or was malformed.
    Discovery { issuer: String, reason: String },
    /// The authorization-code grant was rejected or could not be completed.
    TokenExchange { reason: String },
    /// A required credential was absent from the request or token.
    MissingCredential { credential: Credential },
    /// The callback request itself could not be interpreted.
    MalformedRequest { reason: String },
    /// No session token was presented.
    NoSession,
    /// The presented session token is unknown.
    InvalidSession,
    /// The session exists but is past its expiry.
    SessionExpired { expired_at: DateTime<Utc> },
    /// User or session persistence failed.
    Storage { details: String },
    /// Static configuration is unusable (bad URLs and the like).
    Configuration { reason: String },
}

impl AuthenticationError {
    /// Returns true for errors caused by the request rather than by a
    /// collaborator failing.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential { .. }
                | Self::MalformedRequest { .. }
                | Self::NoSession
                | Self::InvalidSession
                | Self::SessionExpired { .. }
        )
    }

    /// Message safe to show the browser.
    ///
    /// Provider and storage details stay server-side.
    #[must_use]
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::MissingCredential {
                credential: Credential::CodeVerifier,
            } => "Missing code verifier",
            Self::MissingCredential {
                credential: Credential::EmailClaim,
            } => "Email claim is missing in the token",
            Self::MalformedRequest { .. } => "Malformed callback request",
            Self::NoSession => "No session",
            Self::InvalidSession => "Invalid session",
            Self::SessionExpired { .. } => "Session expired",
            Self::TokenExchange { .. } => "Authentication failed",
            Self::Discovery { .. } => "Identity provider unavailable",
            Self::Storage { .. } | Self::Configuration { .. } => "Internal server error",
        }
    }
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovery { issuer, reason } => {
                write!(f, "OIDC discovery for '{issuer}' failed: {reason}")
            }
            Self::TokenExchange { reason } => {
                write!(f, "token exchange failed: {reason}")
            }
            Self::MissingCredential { credential } => {
                write!(f, "missing required credential: {credential}")
            }
            Self::MalformedRequest { reason } => write!(f, "malformed request: {reason}"),
            Self::NoSession => write!(f, "no session token presented"),
            Self::InvalidSession => write!(f, "session token is not recognised"),
            Self::SessionExpired { expired_at } => {
                write!(f, "session expired at {expired_at}")
            }
            Self::Storage { details } => write!(f, "storage error: {details}"),
            Self::Configuration { reason } => {
                write!(f, "authentication configuration error: {reason}")
            }
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Errors from user and session persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached or the query failed.
    Unavailable { details: String },
    /// A stored row could not be decoded into a domain type.
    Corrupt { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { details } => write!(f, "store unavailable: {details}"),
            Self::Corrupt { details } => write!(f, "corrupt stored row: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_are_client_errors() {
        assert!(AuthenticationError::NoSession.is_client_error());
        assert!(AuthenticationError::InvalidSession.is_client_error());
        assert!(
            AuthenticationError::SessionExpired {
                expired_at: Utc::now()
            }
            .is_client_error()
        );
    }

    #[test]
    fn provider_errors_are_not_client_errors() {
        let err = AuthenticationError::TokenExchange {
            reason: "invalid_grant".to_string(),
        };
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[test]
    fn client_message_does_not_leak_provider_details() {
        let err = AuthenticationError::TokenExchange {
            reason: "invalid_grant: code already used".to_string(),
        };
        assert_eq!(err.client_message(), "Authentication failed");

        let err = AuthenticationError::Discovery {
            issuer: "https://auth.example.com".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.client_message(), "Identity provider unavailable");
    }

    #[test]
    fn missing_credential_messages() {
        let verifier = AuthenticationError::MissingCredential {
            credential: Credential::CodeVerifier,
        };
        let email = AuthenticationError::MissingCredential {
            credential: Credential::EmailClaim,
        };
        assert_eq!(verifier.client_message(), "Missing code verifier");
        assert_eq!(email.client_message(), "Email claim is missing in the token");
        assert!(verifier.to_string().contains("code verifier"));
    }

    #[test]
    fn malformed_request_is_a_client_error() {
        let err = AuthenticationError::MalformedRequest {
            reason: "bad host".to_string(),
        };
        assert!(err.is_client_error());
        assert_eq!(err.client_message(), "Malformed callback request");
        assert!(err.to_string().contains("bad host"));
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::Unavailable {
            details: "pool timed out".to_string(),
        };
        assert!(err.to_string().contains("pool timed out"));
    }
}
