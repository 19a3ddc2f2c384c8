//! Authentication extractors for Axum.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;
use stockwatch_platform_access::{AuthenticatedUser, AuthenticationError};
use std::sync::Arc;

use super::{AppState, routes::AuthError};

/// Extractor for requiring an authenticated user.
///
/// Rejects with `401` and the same JSON body as `/session` when the cookie
/// is missing, unknown or expired.
pub struct RequireAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthError::from(AuthenticationError::NoSession))?;

        let token = jar
            .get(app_state.session_cookie_name())
            .map(|c| c.value().to_string());

        let user = app_state
            .auth_flow
            .validate_session(token.as_deref())
            .await?;

        Ok(RequireAuth(user))
    }
}
