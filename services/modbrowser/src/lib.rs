//! modbrowser - Modbus register browser
//!
//! Polls Modbus TCP devices on an interval, keeps their register banks in
//! memory and serves decoded register values over a JSON API.

pub mod api;
pub mod bootstrap;
pub mod client;
pub mod config;
pub mod error;
pub mod polling;
pub mod registry;
pub mod server;

pub use client::{ClientConnector, ModbusClient, TcpConnector};
pub use config::{AppConfig, ConfigFile, ServerConfig};
pub use error::{BrowserError, Result};
pub use polling::{EngineSettings, PollingEngine};
pub use registry::ServerRegistry;
pub use server::{ConnectionStatus, EnginePhase, ServerState, ServerStatus};

pub const SERVICE_NAME: &str = "modbrowser";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
