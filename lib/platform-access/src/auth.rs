//! Values passed between the web layer and the auth flow.

use std::fmt;
use url::Url;

use crate::session::Session;
use crate::user::User;

/// Stage of a browser's login round-trip.
///
/// Nothing is persisted between stages; the stage is only recorded on log
/// events so a single login can be followed through the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Anonymous,
    LoginInitiated,
    CallbackPending,
    Authenticated,
    LoggedOut,
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Anonymous => "anonymous",
            Self::LoginInitiated => "login_initiated",
            Self::CallbackPending => "callback_pending",
            Self::Authenticated => "authenticated",
            Self::LoggedOut => "logged_out",
        };
        f.write_str(name)
    }
}

/// An authenticated request context: the validated session and its user.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    session: Session,
    user: User,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn new(session: Session, user: User) -> Self {
        Self { session, user }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }
}

/// Login initiation data for redirecting to the OIDC provider.
#[derive(Clone)]
pub struct LoginInitiation {
    /// The URL to redirect the user to for authentication.
    pub authorization_url: String,
    /// PKCE code verifier, carried in the `code_verifier` cookie.
    pub code_verifier: String,
    /// CSRF state, issued only when the provider lacks PKCE support.
    pub state: Option<String>,
}

impl fmt::Debug for LoginInitiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginInitiation")
            .field("authorization_url", &self.authorization_url)
            .field("code_verifier", &"<redacted>")
            .field("state", &self.state.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Everything the callback handler read from the request.
#[derive(Debug, Clone)]
pub struct CallbackRequest {
    pub code_verifier: Option<String>,
    pub state: Option<String>,
    /// The callback URL as the browser reached it, query string included.
    pub callback_url: Url,
}

/// Result of a successful callback.
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub user: User,
    pub session: Session,
    /// Whether this login created the user.
    pub is_new_user: bool,
    pub redirect_to: String,
}

/// Result of a logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutOutcome {
    pub redirect_to: String,
    /// Whether the server-side session row was deleted.
    pub revoked: bool,
}
