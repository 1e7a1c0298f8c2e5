use std::sync::Arc;

use driver_dashboard::api;
use driver_dashboard::config::{Config, LogFormat};
use driver_dashboard::error::AppError;
use driver_dashboard::platform::memory::{MemoryOptions, MemoryPlatform, SeedData};
use driver_dashboard::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let options = MemoryOptions {
        public_base_url: config.public_base_url.clone(),
        event_buffer_size: config.event_buffer_size,
        geolocation_enabled: config.geolocation_enabled,
        messaging_enabled: config.messaging_enabled,
        notification_permission: config.notification_permission,
    };
    let memory = MemoryPlatform::new(&options);

    if let Some(path) = &config.seed_file {
        let seed = SeedData::from_file(path)?;
        memory.seed(&seed).await?;
    }

    let app_state = AppState::with_platform(memory, config.event_buffer_size)
        .with_static_dir(config.static_dir.clone());
    let shared_state = Arc::new(app_state);

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        public_base_url = %config.public_base_url,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    shared_state.dashboard.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
