//! stockwatch authentication server.
//!
//! This crate provides the axum HTTP surface for signing in to the
//! stockwatch sentiment tracker: OIDC login, callback handling, session
//! lookup and logout, backed by PostgreSQL.

pub mod app;
pub mod auth;
pub mod config;
pub mod types;
