//! Server-side sessions.
//!
//! A session is minted at the end of a successful callback and looked up on
//! every authenticated request. Expiry is checked lazily at read time; expired
//! rows are left for the store's periodic cleanup.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{SessionId, UserId};

/// Lifetime of every issued session.
pub const SESSION_TTL_DAYS: i64 = 7;

/// Returns the session lifetime as a chrono duration.
#[must_use]
pub fn session_ttl() -> Duration {
    Duration::days(SESSION_TTL_DAYS)
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Issues a session for `user_id` starting now.
    ///
    /// `expires_at` is exactly [`SESSION_TTL_DAYS`] after `created_at`.
    #[must_use]
    pub fn issue(id: SessionId, user_id: UserId) -> Self {
        Self::issue_at(id, user_id, Utc::now())
    }

    /// Issues a session with an explicit issuance time.
    #[must_use]
    pub fn issue_at(id: SessionId, user_id: UserId, issued_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            created_at: issued_at,
            expires_at: issued_at + session_ttl(),
        }
    }

    /// Reconstitutes a session from storage.
    #[must_use]
    pub fn with_all_fields(
        id: SessionId,
        user_id: UserId,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            created_at,
            expires_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true once `now >= expires_at`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
