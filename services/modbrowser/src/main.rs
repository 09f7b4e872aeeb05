//! modbrowser - Modbus TCP register browser service
//! Polls configured servers and serves their register tables over HTTP

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use modbrowser::api::{create_router, AppState};
use modbrowser::bootstrap::{init_logging, wait_for_shutdown, Args};
use modbrowser::{
    AppConfig, ConfigFile, EngineSettings, ServerRegistry, TcpConnector, SERVICE_NAME,
    SERVICE_VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load_from(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    args.apply(&mut config);
    config.validate()?;

    init_logging(&config.logging.level);
    info!("Starting {} v{}", SERVICE_NAME, SERVICE_VERSION);

    let connector = Arc::new(TcpConnector::new(
        config.client.timeout(),
        config.client.unit_id,
    ));
    let registry = Arc::new(ServerRegistry::new(
        connector,
        EngineSettings {
            reconnect_delay: config.polling.reconnect_delay(),
        },
    ));

    if let Some(path) = &config.servers_file {
        let file = ConfigFile::from_path(path).map_err(|e| {
            error!("Failed to read server list {}: {}", path.display(), e);
            e
        })?;
        let count = registry.import(file).await?;
        info!("Imported {} server(s) from {}", count, path.display());
    }

    let bind = (config.api.host.as_str(), config.api.port);
    let listener = tokio::net::TcpListener::bind(bind).await.map_err(|e| {
        error!(
            "Failed to bind API server on {}:{}: {}",
            config.api.host, config.api.port, e
        );
        e
    })?;
    let addr: SocketAddr = listener.local_addr()?;
    info!("API listening on {}", addr);

    let app = create_router(AppState::new(registry.clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    info!("Shutdown signal received, stopping pollers");
    registry.shutdown().await;
    info!("{} stopped", SERVICE_NAME);
    Ok(())
}
