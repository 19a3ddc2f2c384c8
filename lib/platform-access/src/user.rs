//! User domain type.
//!
//! Users are keyed by email: the email claim is the only identity attribute
//! this system trusts from the provider. The first successful login for an
//! email creates the user; later logins reuse it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// An application user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Internal user ID.
    user_id: UserId,
    /// Email address taken from the provider's `email` claim.
    email: String,
    /// Whether sentiment notifications are enabled for this user.
    notification_enabled: bool,
    /// When the user record was created.
    created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user for a first login.
    ///
    /// The user ID is generated and notifications start disabled.
    #[must_use]
    pub fn new(email: String) -> Self {
        Self {
            user_id: UserId::new(),
            email,
            notification_enabled: false,
            created_at: Utc::now(),
        }
    }

    /// Creates a user with all fields specified.
    ///
    /// Use this when reconstituting a user from storage.
    #[must_use]
    pub fn with_all_fields(
        user_id: UserId,
        email: String,
        notification_enabled: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            email,
            notification_enabled,
            created_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn notification_enabled(&self) -> bool {
        self.notification_enabled
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_has_generated_id_and_defaults() {
        let user = User::new("user@example.com".to_string());
        assert!(user.id().to_string().starts_with("usr_"));
        assert_eq!(user.email(), "user@example.com");
        assert!(!user.notification_enabled());
    }

    #[test]
    fn new_users_get_distinct_ids() {
        let a = User::new("a@example.com".to_string());
        let b = User::new("a@example.com".to_string());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let user = User::new("user@example.com".to_string());
        let json = serde_json::to_value(&user).expect("serialize");
        assert_eq!(json["email"], "user@example.com");
        assert_eq!(json["notificationEnabled"], false);
        assert_eq!(json["userId"], user.id().to_string());
    }

    #[test]
    fn with_all_fields_preserves_values() {
        let id = UserId::new();
        let created = Utc::now() - chrono::Duration::days(30);
        let user = User::with_all_fields(id, "bob@example.com".to_string(), true, created);

        assert_eq!(user.id(), id);
        assert_eq!(user.email(), "bob@example.com");
        assert!(user.notification_enabled());
        assert_eq!(user.created_at(), created);
    }
}
