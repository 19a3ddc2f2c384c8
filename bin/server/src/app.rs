//! HTTP routing for the stockwatch server.

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};

/// Builds the application router with the auth routes mounted under `prefix`.
pub fn router(state: Arc<AppState>, prefix: &str) -> Router {
    let auth_routes = Router::new()
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/callback/", get(auth::callback))
        .route("/session", get(auth::session))
        .route("/logout", post(auth::logout));

    let prefix = prefix.trim_end_matches('/');
    let app = if prefix.is_empty() {
        Router::new().merge(auth_routes)
    } else {
        Router::new().nest(prefix, auth_routes)
    };

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
