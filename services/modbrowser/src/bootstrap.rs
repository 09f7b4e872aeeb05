//! Service bootstrap
//!
//! Command-line arguments, logging setup and shutdown signal handling.

use std::path::PathBuf;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};

/// Command-line arguments for modbrowser
#[derive(Parser, Debug, Clone)]
#[command(
    name = "modbrowser",
    version = env!("CARGO_PKG_VERSION"),
    about = "Modbus register browser",
    long_about = None
)]
pub struct Args {
    /// API port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,

    /// Service configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Server list (JSON) imported at startup
    #[arg(short = 's', long)]
    pub servers: Option<PathBuf>,
}

impl Args {
    /// Command-line values win over file and environment values
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.api.port = port;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(servers) = &self.servers {
            config.servers_file = Some(servers.clone());
        }
    }
}

/// Filter from `RUST_LOG` when set, else from the configured level
pub fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("error"))
    })
}

/// Initialize the tracing subscriber
pub fn init_logging(level: &str) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(log_filter(level))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .try_init();
    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

/// Wait for Ctrl+C, or SIGTERM on Unix
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let term_signal = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!(
                    "Failed to install SIGTERM handler: {}. Service will only respond to Ctrl+C",
                    e
                );
                None
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(mut sig) = term_signal {
                    sig.recv().await;
                } else {
                    std::future::pending::<()>().await
                }
            } => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
