//! Modbus client seam
//!
//! The polling engine only sees [`ClientConnector`] and [`ModbusClient`]. The
//! production implementation wraps a `tokio-modbus` TCP context and applies a
//! timeout to every connect and read.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_modbus::client::{tcp, Context};
use tokio_modbus::prelude::*;
use tracing::debug;

use crate::error::{BrowserError, Result};

/// Open connection to one device
#[async_trait]
pub trait ModbusClient: Send {
    async fn read_coils(&mut self, start: u16, count: u16) -> Result<Vec<bool>>;

    async fn read_discrete_inputs(&mut self, start: u16, count: u16) -> Result<Vec<bool>>;

    async fn read_input_registers(&mut self, start: u16, count: u16) -> Result<Vec<u16>>;

    async fn read_holding_registers(&mut self, start: u16, count: u16) -> Result<Vec<u16>>;

    /// Release the connection; later reads fail with a connection error
    async fn close(&mut self);
}

/// Factory for client handles
#[async_trait]
pub trait ClientConnector: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn ModbusClient>>;
}

/// Modbus TCP connector
#[derive(Debug, Clone)]
pub struct TcpConnector {
    timeout: Duration,
    unit_id: u8,
}

impl TcpConnector {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_UNIT_ID: u8 = 1;

    pub fn new(timeout: Duration, unit_id: u8) -> Self {
        Self { timeout, unit_id }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT, Self::DEFAULT_UNIT_ID)
    }
}

#[async_trait]
impl ClientConnector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn ModbusClient>> {
        let peer = format!("{}:{}", host, port);

        let socket_addr = timeout(self.timeout, tokio::net::lookup_host((host, port)))
            .await
            .map_err(|_| BrowserError::timeout(format!("Resolving {} timed out", peer)))?
            .map_err(|e| BrowserError::connection(format!("Failed to resolve {}: {}", peer, e)))?
            .next()
            .ok_or_else(|| BrowserError::connection(format!("No address found for {}", peer)))?;

        let context = timeout(
            self.timeout,
            tcp::connect_slave(socket_addr, Slave(self.unit_id)),
        )
        .await
        .map_err(|_| {
            BrowserError::timeout(format!(
                "Connection to {} timed out after {}ms",
                peer,
                self.timeout.as_millis()
            ))
        })?
        .map_err(|e| BrowserError::connection(format!("Failed to connect to {}: {}", peer, e)))?;

        debug!("Opened Modbus TCP connection to {} ({})", peer, socket_addr);
        Ok(Box::new(TcpModbusClient {
            context: Some(context),
            timeout: self.timeout,
            peer,
        }))
    }
}

/// Client handle backed by a `tokio-modbus` context
pub struct TcpModbusClient {
    context: Option<Context>,
    timeout: Duration,
    peer: String,
}

impl fmt::Debug for TcpModbusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpModbusClient")
            .field("peer", &self.peer)
            .field("connected", &self.context.is_some())
            .finish()
    }
}

impl TcpModbusClient {
    fn context(&mut self) -> Result<&mut Context> {
        self.context.as_mut().ok_or_else(BrowserError::not_connected)
    }

    fn elapsed(&self, what: &str) -> BrowserError {
        BrowserError::timeout(format!(
            "Reading {} from {} timed out after {}ms",
            what,
            self.peer,
            self.timeout.as_millis()
        ))
    }
}

/// Flatten the transport and exception layers of a `tokio-modbus` response
fn flatten<T>(response: tokio_modbus::Result<Vec<T>>, what: &str) -> Result<Vec<T>> {
    match response {
        Ok(Ok(values)) => Ok(values),
        Ok(Err(code)) => Err(BrowserError::protocol(format!(
            "Modbus exception while reading {}: {:?}",
            what, code
        ))),
        Err(e) => Err(BrowserError::protocol(format!(
            "Failed to read {}: {}",
            what, e
        ))),
    }
}

#[async_trait]
impl ModbusClient for TcpModbusClient {
    async fn read_coils(&mut self, start: u16, count: u16) -> Result<Vec<bool>> {
        let limit = self.timeout;
        let response = timeout(limit, self.context()?.read_coils(start, count))
            .await
            .map_err(|_| self.elapsed("coils"))?;
        flatten(response, "coils")
    }

    async fn read_discrete_inputs(&mut self, start: u16, count: u16) -> Result<Vec<bool>> {
        let limit = self.timeout;
        let response = timeout(limit, self.context()?.read_discrete_inputs(start, count))
            .await
            .map_err(|_| self.elapsed("discrete inputs"))?;
        flatten(response, "discrete inputs")
    }

    async fn read_input_registers(&mut self, start: u16, count: u16) -> Result<Vec<u16>> {
        let limit = self.timeout;
        let response = timeout(limit, self.context()?.read_input_registers(start, count))
            .await
            .map_err(|_| self.elapsed("input registers"))?;
        flatten(response, "input registers")
    }

    async fn read_holding_registers(&mut self, start: u16, count: u16) -> Result<Vec<u16>> {
        let limit = self.timeout;
        let response = timeout(limit, self.context()?.read_holding_registers(start, count))
            .await
            .map_err(|_| self.elapsed("holding registers"))?;
        flatten(response, "holding registers")
    }

    async fn close(&mut self) {
        // Dropping the context shuts the TCP stream down
        if self.context.take().is_some() {
            debug!("Closed Modbus TCP connection to {}", self.peer);
        }
    }
}
