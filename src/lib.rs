pub mod api;
pub mod appointment;
pub mod chat;
pub mod community;
pub mod config;
pub mod core_state;
pub mod db;
pub mod doctor_directory;
pub mod error;
pub mod models;
pub mod relay;
pub mod reputation;
pub mod threads;
pub mod users;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Fatal errors while bringing the server up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Core(#[from] core_state::CoreError),
    #[error("{0}")]
    Server(String),
    #[error("Signal handler error: {0}")]
    Signal(#[from] std::io::Error),
}

/// Initialize tracing from `RUST_LOG`, falling back to the build default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Load settings, prepare state and serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    // A missing .env file is fine; real environment variables still apply.
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let settings = config::Settings::from_env()?;
    let core = Arc::new(core_state::CoreState::from_settings(&settings)?);
    let server = api::start_server_on(core, settings.bind_addr)
        .await
        .map_err(StartupError::Server)?;
    tracing::info!(addr = %server.session.server_addr, "Listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, shutting down");
    server.stop().await;
    Ok(())
}
