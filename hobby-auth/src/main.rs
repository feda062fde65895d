use hobby_auth::{
    build_router,
    config::AuthConfig,
    providers_from_config,
    services::{InMemoryUserDirectory, MongoUserDirectory, UserDirectory},
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::future::IntoFuture;
use std::time::Duration;
use tokio::signal;
use tracing::Instrument;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = AuthConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )
    .map_err(AppError::ConfigError)?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting hobby auth service"
    );

    let directory: Arc<dyn UserDirectory> = if config.mongodb.is_in_memory() {
        tracing::warn!("Using in-memory user directory; accounts are lost on restart");
        Arc::new(InMemoryUserDirectory::new())
    } else {
        let mongo = MongoUserDirectory::connect(
            &config.mongodb.uri,
            &config.mongodb.database,
            Duration::from_secs(config.oauth.http_timeout_seconds),
        )
        .await
        .map_err(AppError::DatabaseError)?;
        mongo
            .initialize_indexes()
            .await
            .map_err(AppError::DatabaseError)?;
        tracing::info!("User directory initialized");
        Arc::new(mongo)
    };

    let providers = providers_from_config(&config).map_err(AppError::ConfigError)?;
    tracing::info!(providers = ?providers.names(), "OAuth providers registered");

    let state = AppState::new(config.clone(), directory, providers).map_err(AppError::ConfigError)?;
    let app = build_router(state)?;

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );

    let addr = config.common.bind_address();
    service_span.in_scope(|| tracing::info!(address = %addr, "Listening"));

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .into_future()
    .instrument(service_span)
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
