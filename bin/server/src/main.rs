use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use stockwatch_platform_access::{AuthFlow, IdentityProvider};
use stockwatch_server::{
    app,
    auth::{
        AppState, OpenIdProvider,
        db::{SessionRepository, UserRepository},
    },
    config::ServerConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!(environment = ?config.environment, "Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    // Cleanup expired sessions on startup
    let session_repo = SessionRepository::new(db_pool.clone());
    match session_repo.delete_expired().await {
        Ok(count) if count > 0 => {
            tracing::info!(
                deleted_sessions = count,
                "Cleaned up expired sessions on startup"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to cleanup expired sessions on startup");
        }
    }

    // Spawn periodic session cleanup task
    let cleanup_pool = db_pool.clone();
    let cleanup_interval_secs = config.session.cleanup_interval_seconds.max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            let repo = SessionRepository::new(cleanup_pool.clone());
            match repo.delete_expired().await {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_sessions = count, "Periodic session cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to cleanup expired sessions");
                }
            }
        }
    });

    // Initialize OIDC client; discovery is retried lazily on each login
    let oidc_config = config.oidc_config();
    let provider = Arc::new(
        OpenIdProvider::new(
            oidc_config.clone(),
            Duration::from_secs(config.oidc.timeout_seconds),
        )
        .expect("failed to create OIDC client"),
    );
    tracing::info!(issuer = oidc_config.issuer_url(), "Discovering OIDC provider...");
    if let Err(e) = provider.discover_configuration().await {
        tracing::warn!(error = %e, "OIDC discovery failed; logins will retry");
    }

    let auth_flow = AuthFlow::new(
        oidc_config,
        provider,
        Arc::new(UserRepository::new(db_pool.clone())),
        Arc::new(SessionRepository::new(db_pool)),
    )
    .with_logout_revocation(config.session.revoke_on_logout);

    // Create application state
    let app_state = Arc::new(AppState::new(
        auth_flow,
        config.session,
        config.environment,
    ));
    let app = app::router(app_state, &config.auth_prefix);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
