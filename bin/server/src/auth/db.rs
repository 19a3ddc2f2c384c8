//! Database repositories for users and sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use stockwatch_platform_access::{
    Session, SessionId, SessionRecord, SessionStore, StoreError, User, UserId, UserStore,
};

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable {
        details: e.to_string(),
    }
}

fn parse_user_id(raw: &str) -> Result<UserId, StoreError> {
    UserId::from_str(raw).map_err(|e| StoreError::Corrupt {
        details: format!("invalid user id '{raw}': {e}"),
    })
}

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    notification_enabled: bool,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, StoreError> {
        let id = parse_user_id(&self.id)?;
        Ok(User::with_all_fields(
            id,
            self.email,
            self.notification_enabled,
            self.created_at,
        ))
    }
}

/// Row type for session queries, joined with the owning user.
#[derive(FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    email: String,
    notification_enabled: bool,
    user_created_at: DateTime<Utc>,
}

impl SessionRow {
    fn try_into_record(self) -> Result<SessionRecord, StoreError> {
        let user_id = parse_user_id(&self.user_id)?;
        Ok(SessionRecord {
            session: Session::with_all_fields(
                SessionId::new(self.id),
                user_id,
                self.created_at,
                self.expires_at,
            ),
            user: User::with_all_fields(
                user_id,
                self.email,
                self.notification_enabled,
                self.user_created_at,
            ),
        })
    }
}

/// Repository for user operations.
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Report<StoreError>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, email, notification_enabled, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        match row {
            Some(r) => Ok(Some(r.try_into_user()?)),
            None => Ok(None),
        }
    }

    async fn create_user(&self, user: &User) -> Result<bool, Report<StoreError>> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, notification_enabled, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.email())
        .bind(user.notification_enabled())
        .bind(user.created_at())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.rows_affected() == 1)
    }
}

/// Repository for session operations.
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Creates a new session repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes expired sessions.
    pub async fn delete_expired(&self) -> Result<u64, Report<StoreError>> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for SessionRepository {
    async fn create_session(&self, session: &Session) -> Result<(), Report<StoreError>> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(session.id().as_str())
        .bind(session.user_id().to_string())
        .bind(session.created_at())
        .bind(session.expires_at())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }

    async fn get_session_by_id(
        &self,
        id: &SessionId,
    ) -> Result<Option<SessionRecord>, Report<StoreError>> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT s.id, s.user_id, s.created_at, s.expires_at,
                   u.email, u.notification_enabled, u.created_at AS user_created_at
            FROM sessions s
            INNER JOIN users u ON u.id = s.user_id
            WHERE s.id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        match row {
            Some(r) => Ok(Some(r.try_into_record()?)),
            None => Ok(None),
        }
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), Report<StoreError>> {
        sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_row_joins_user_fields() {
        let user_id = UserId::new();
        let created = Utc::now();
        let row = SessionRow {
            id: "ab".repeat(32),
            user_id: user_id.to_string(),
            created_at: created,
            expires_at: created + chrono::Duration::days(7),
            email: "user@example.com".to_string(),
            notification_enabled: true,
            user_created_at: created - chrono::Duration::days(1),
        };

        let record = row.try_into_record().expect("valid row");

        assert_eq!(record.session.user_id(), user_id);
        assert_eq!(record.session.id().as_str(), "ab".repeat(32));
        assert_eq!(record.user.id(), user_id);
        assert_eq!(record.user.email(), "user@example.com");
        assert!(record.user.notification_enabled());
    }

    #[test]
    fn corrupt_user_id_is_reported() {
        let row = UserRow {
            id: "usr_garbage".to_string(),
            email: "user@example.com".to_string(),
            notification_enabled: false,
            created_at: Utc::now(),
        };

        let err = row.try_into_user().expect_err("corrupt id");
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
