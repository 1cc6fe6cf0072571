use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use framecast::cli::{Cli, Commands};
use framecast::config::ServerConfig;
use framecast::core::{FfmpegEncoder, SessionManager};
use framecast::http::{router, AppState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "framecast=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::from_env()?;

    match cli.command {
        Some(Commands::CheckConfig) => {
            info!("configuration loaded successfully");
            info!("   files root: {:?}", config.files_root);
            info!("   bind address: {}", config.bind_address());
            info!("   authentication required: {}", config.require_auth);
            return Ok(());
        }
        Some(Commands::Serve) | None => {}
    }

    info!("starting framecast v{}", VERSION);
    info!("   bind address: {}", config.bind_address());
    info!("   files root: {:?}", config.files_root);
    info!("   authentication required: {}", config.require_auth);
    info!("   encoder deadline: {:?}", config.encoder_deadline);
    info!("   buffer TTL: {:?}", config.buffer_ttl);

    let encoder = Arc::new(FfmpegEncoder::new());
    let manager = SessionManager::with_limits(
        encoder,
        config.encoder_deadline,
        config.buffer_ttl,
        config.max_concurrent_encoders,
    );
    let state = Arc::new(AppState::new(config.clone(), manager));

    let app = router(state);

    let addr: SocketAddr = config.bind_address().parse()?;
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received shutdown signal");
}
