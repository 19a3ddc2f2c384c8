//! Authentication routes for login, callback, session lookup and logout.

use axum::{
    Json,
    extract::{OriginalUri, State},
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rootcause::prelude::Report;
use stockwatch_platform_access::{
    AuthenticationError, CallbackRequest, Credential, SESSION_TTL_DAYS,
};
use std::sync::Arc;
use time::Duration as TimeDuration;
use tracing::{debug, error, info};
use url::Url;

use super::{AUTH_STATE_COOKIE, AppState, CODE_VERIFIER_COOKIE, middleware::RequireAuth};
use crate::types::UserInfo;

/// Lifetime of the flow cookies set at login.
const FLOW_COOKIE_MINUTES: i64 = 10;

/// Redirects to the identity provider's authorization endpoint.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let initiation = state.auth_flow.initiate_login().await?;

    let mut jar = jar.add(flow_cookie(
        &state,
        CODE_VERIFIER_COOKIE,
        initiation.code_verifier,
    ));
    if let Some(csrf_state) = initiation.state {
        jar = jar.add(flow_cookie(&state, AUTH_STATE_COOKIE, csrf_state));
    }

    Ok((jar, found(&initiation.authorization_url)))
}

/// Handles the redirect back from the identity provider.
///
/// Flow cookies are cleared on every outcome; a session cookie is added only
/// on success. A missing verifier is rejected before anything else is read.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let code_verifier = jar
        .get(CODE_VERIFIER_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    let csrf_state = jar.get(AUTH_STATE_COOKIE).map(|c| c.value().to_string());

    let result: Result<_, Report<AuthenticationError>> = match code_verifier {
        None => Err(AuthenticationError::MissingCredential {
            credential: Credential::CodeVerifier,
        }
        .into()),
        Some(code_verifier) => match callback_url(&headers, &uri, state.secure_cookies()) {
            Ok(callback_url) => {
                state
                    .auth_flow
                    .handle_callback(CallbackRequest {
                        code_verifier: Some(code_verifier),
                        state: csrf_state,
                        callback_url,
                    })
                    .await
            }
            Err(e) => Err(e),
        },
    };

    let jar = jar
        .add(removal_cookie(CODE_VERIFIER_COOKIE))
        .add(removal_cookie(AUTH_STATE_COOKIE));

    match result {
        Ok(outcome) => {
            info!(
                user_id = %outcome.user.id(),
                is_new_user = outcome.is_new_user,
                "login completed"
            );
            let session_cookie = Cookie::build((
                state.session_cookie_name().to_string(),
                outcome.session.id().as_str().to_string(),
            ))
            .path("/")
            .http_only(true)
            .secure(state.secure_cookies())
            .same_site(SameSite::Lax)
            .max_age(TimeDuration::days(SESSION_TTL_DAYS));

            (jar.add(session_cookie), found(&outcome.redirect_to)).into_response()
        }
        Err(e) => (jar, AuthError(e)).into_response(),
    }
}

/// Returns the signed-in user.
pub async fn session(RequireAuth(user): RequireAuth) -> Json<UserInfo> {
    Json(UserInfo::from(user.user()))
}

/// Clears the session cookie and redirects to the post-logout URL.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let cookie_name = state.session_cookie_name().to_string();
    let token = jar.get(&cookie_name).map(|c| c.value().to_string());

    let outcome = state.auth_flow.logout(token.as_deref()).await?;

    let jar = jar.add(removal_cookie(cookie_name));
    Ok((jar, Redirect::to(&outcome.redirect_to)))
}

/// Rebuilds the URL the browser used to reach the callback.
///
/// Forwarded headers take precedence so the URL is correct behind a proxy.
pub fn callback_url(
    headers: &HeaderMap,
    uri: &Uri,
    production: bool,
) -> Result<Url, Report<AuthenticationError>> {
    let host = forwarded_value(headers, "x-forwarded-host")
        .or_else(|| forwarded_value(headers, header::HOST.as_str()))
        .unwrap_or("localhost");
    let scheme = forwarded_value(headers, "x-forwarded-proto")
        .unwrap_or(if production { "https" } else { "http" });
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());

    Url::parse(&format!("{scheme}://{host}{path_and_query}")).map_err(|e| {
        AuthenticationError::MalformedRequest {
            reason: format!("cannot reconstruct callback URL: {e}"),
        }
        .into()
    })
}

/// First value of a possibly comma-separated proxy header.
fn forwarded_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn flow_cookie(state: &AppState, name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(state.secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(FLOW_COOKIE_MINUTES))
        .into()
}

fn removal_cookie(name: impl Into<String>) -> Cookie<'static> {
    Cookie::build((name.into(), ""))
        .path("/")
        .max_age(TimeDuration::ZERO)
        .into()
}

/// `302 Found` with a `Location` header.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Authentication failure rendered as a JSON error body.
#[derive(Debug)]
pub struct AuthError(pub Report<AuthenticationError>);

impl From<Report<AuthenticationError>> for AuthError {
    fn from(report: Report<AuthenticationError>) -> Self {
        Self(report)
    }
}

impl From<AuthenticationError> for AuthError {
    fn from(error: AuthenticationError) -> Self {
        Self(error.into())
    }
}

impl AuthError {
    fn status(&self) -> StatusCode {
        match self.0.current_context() {
            AuthenticationError::MissingCredential { .. }
            | AuthenticationError::MalformedRequest { .. } => StatusCode::BAD_REQUEST,
            AuthenticationError::NoSession
            | AuthenticationError::InvalidSession
            | AuthenticationError::SessionExpired { .. }
            | AuthenticationError::TokenExchange { .. } => StatusCode::UNAUTHORIZED,
            AuthenticationError::Discovery { .. } => StatusCode::BAD_GATEWAY,
            AuthenticationError::Storage { .. } | AuthenticationError::Configuration { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let context = self.0.current_context();
        if context.is_client_error() {
            debug!(error = %context, "request rejected");
        } else {
            error!(error = %self.0, "authentication failed");
        }

        let body = Json(serde_json::json!({ "error": context.client_message() }));
        (self.status(), body).into_response()
    }
}
