use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use trip_dispatch::api;
use trip_dispatch::config::Config;
use trip_dispatch::error::DispatchError;
use trip_dispatch::state::AppState;

#[tokio::main]
async fn main() -> Result<(), DispatchError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    if config.google_maps_api_key.is_empty() {
        tracing::warn!("GOOGLE_MAPS_API_KEY is not set; route and place lookups will fail");
    }

    let shared_state = Arc::new(AppState::new(&config));
    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| DispatchError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        app_env = ?config.app_env,
        route_cache = config.route_cache_enabled,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| DispatchError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
