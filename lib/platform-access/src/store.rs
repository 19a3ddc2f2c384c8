//! User and session persistence interfaces.
//!
//! Every operation is a single-row, key-based read, insert, or delete, so no
//! cross-request locking is needed on top of the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::id::{SessionId, UserId};
use crate::session::Session;
use crate::user::User;

/// A session row joined with the user it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session: Session,
    pub user: User,
}

/// Persistence for users.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Report<StoreError>>;

    /// Inserts the user. Returns `false` without inserting when a user with
    /// the same email already exists.
    async fn create_user(&self, user: &User) -> Result<bool, Report<StoreError>>;
}

/// Persistence for sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<(), Report<StoreError>>;

    /// Looks up a session and its user. Expired rows are returned as-is.
    async fn get_session_by_id(
        &self,
        id: &SessionId,
    ) -> Result<Option<SessionRecord>, Report<StoreError>>;

    async fn delete_session(&self, id: &SessionId) -> Result<(), Report<StoreError>>;
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    sessions: HashMap<SessionId, Session>,
}

/// In-process store for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Inserts a session row directly, bypassing the login flow.
    pub async fn insert_session(&self, session: Session) {
        self.state
            .write()
            .await
            .sessions
            .insert(session.id().clone(), session);
    }

    /// Removes sessions expired as of `now`, returning how many were removed.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| !s.is_expired_at(now));
        before - state.sessions.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Report<StoreError>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email() == email).cloned())
    }

    async fn create_user(&self, user: &User) -> Result<bool, Report<StoreError>> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email() == user.email()) {
            return Ok(false);
        }
        state.users.insert(user.id(), user.clone());
        Ok(true)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: &Session) -> Result<(), Report<StoreError>> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&session.user_id()) {
            return Err(StoreError::Unavailable {
                details: format!("no user {} for session", session.user_id()),
            }
            .into());
        }
        state.sessions.insert(session.id().clone(), session.clone());
        Ok(())
    }

    async fn get_session_by_id(
        &self,
        id: &SessionId,
    ) -> Result<Option<SessionRecord>, Report<StoreError>> {
        let state = self.state.read().await;
        let Some(session) = state.sessions.get(id) else {
            return Ok(None);
        };
        let user = state
            .users
            .get(&session.user_id())
            .cloned()
            .ok_or_else(|| StoreError::Corrupt {
                details: format!("session references missing user {}", session.user_id()),
            })?;
        Ok(Some(SessionRecord {
            session: session.clone(),
            user,
        }))
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), Report<StoreError>> {
        self.state.write().await.sessions.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn create_user_is_unique_by_email() {
        let store = MemoryStore::new();
        let first = User::new("user@example.com".to_string());
        let second = User::new("user@example.com".to_string());

        assert!(store.create_user(&first).await.expect("create"));
        assert!(!store.create_user(&second).await.expect("create"));
        assert_eq!(store.user_count().await, 1);

        let found = store
            .get_user_by_email("user@example.com")
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(found, first);
    }

    #[tokio::test]
    async fn session_lookup_joins_user() {
        let store = MemoryStore::new();
        let user = User::new("user@example.com".to_string());
        store.create_user(&user).await.expect("create user");

        let session = Session::issue(SessionId::generate(), user.id());
        store.create_session(&session).await.expect("create session");

        let record = store
            .get_session_by_id(session.id())
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(record.session, session);
        assert_eq!(record.user, user);
    }

    #[tokio::test]
    async fn session_for_unknown_user_is_rejected() {
        let store = MemoryStore::new();
        let session = Session::issue(SessionId::generate(), UserId::new());
        assert!(store.create_session(&session).await.is_err());
    }

    #[tokio::test]
    async fn delete_session_removes_row() {
        let store = MemoryStore::new();
        let user = User::new("user@example.com".to_string());
        store.create_user(&user).await.expect("create user");
        let session = Session::issue(SessionId::generate(), user.id());
        store.create_session(&session).await.expect("create session");

        store.delete_session(session.id()).await.expect("delete");

        assert!(
            store
                .get_session_by_id(session.id())
                .await
                .expect("lookup")
                .is_none()
        );
    }

    #[tokio::test]
    async fn delete_expired_keeps_live_sessions() {
        let store = MemoryStore::new();
        let user = User::new("user@example.com".to_string());
        store.create_user(&user).await.expect("create user");

        let stale = Session::issue_at(
            SessionId::generate(),
            user.id(),
            Utc::now() - Duration::days(8),
        );
        let live = Session::issue(SessionId::generate(), user.id());
        store.insert_session(stale).await;
        store.insert_session(live.clone()).await;

        assert_eq!(store.delete_expired(Utc::now()).await, 1);
        assert_eq!(store.session_count().await, 1);
        assert!(
            store
                .get_session_by_id(live.id())
                .await
                .expect("lookup")
                .is_some()
        );
    }
}
