//! Per-server state
//!
//! Everything that changes while a server is monitored sits in
//! [`ServerInner`] behind a single async mutex. A polling tick holds it for all
//! of its block reads, so configuration changes and snapshots always observe
//! a complete tick.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use register_model::{
    apply_blocks, render_block, RegisterBanks, RegisterBlock, RegisterConfig, RegisterRow,
};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::ModbusClient;
use crate::config::ServerConfig;
use crate::error::Result;

/// Outcome of the most recent connect or poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Ok,
    Error(String),
}

impl ConnectionStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ConnectionStatus::Ok)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ConnectionStatus::Ok => None,
            ConnectionStatus::Error(msg) => Some(msg),
        }
    }
}

/// Phase of the polling engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePhase {
    Connecting,
    Polling,
    Reconnecting,
    Stopped,
}

/// Mutable fields of a server, guarded by [`ServerState`]'s lock
pub struct ServerInner {
    pub blocks: Vec<RegisterBlock>,
    pub register_map: HashMap<u16, RegisterConfig>,
    pub banks: RegisterBanks,
    pub status: ConnectionStatus,
    pub last_data_received: Option<DateTime<Utc>>,
    pub client: Option<Box<dyn ModbusClient>>,
    pub phase: EnginePhase,
    pub cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ServerInner {
    /// Close and drop the client handle, if any
    pub async fn close_client(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.close().await;
        }
    }
}

/// Connection status snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub id: String,
    /// "ok" or "error"
    pub status: &'static str,
    pub error_message: Option<String>,
    pub address: String,
    pub port: u16,
    pub poll_interval_ms: u64,
    pub last_data_received: Option<DateTime<Utc>>,
    pub phase: EnginePhase,
}

/// One monitored device
pub struct ServerState {
    id: String,
    address: String,
    port: u16,
    poll_interval: Duration,
    inner: Mutex<ServerInner>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// New server with no blocks and a "not connected" error status
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            port,
            poll_interval,
            inner: Mutex::new(ServerInner {
                blocks: Vec::new(),
                register_map: HashMap::new(),
                banks: RegisterBanks::new(),
                status: ConnectionStatus::Error("not connected".to_string()),
                last_data_received: None,
                client: None,
                phase: EnginePhase::Connecting,
                cancel: CancellationToken::new(),
                task: None,
            }),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.id.clone(),
            config.address.clone(),
            config.port,
            config.poll_interval(),
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Exclusive access to the mutable fields
    pub async fn lock(&self) -> MutexGuard<'_, ServerInner> {
        self.inner.lock().await
    }

    pub async fn cancellation_token(&self) -> CancellationToken {
        self.inner.lock().await.cancel.clone()
    }

    pub(crate) async fn attach_task(&self, task: JoinHandle<()>) {
        self.inner.lock().await.task = Some(task);
    }

    /// Validate and merge a batch of register blocks
    ///
    /// The register map is replaced by the configs of this batch.
    pub async fn apply_blocks(&self, blocks: &[RegisterBlock]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let ServerInner {
            blocks: stored,
            register_map,
            ..
        } = &mut *inner;
        apply_blocks(stored, register_map, blocks)?;
        debug!(
            "Server {}: applied {} block(s), {} stored",
            self.id,
            blocks.len(),
            stored.len()
        );
        Ok(())
    }

    /// Decoded value of every address of every block, in block order
    pub async fn snapshot(&self) -> Result<Vec<RegisterRow>> {
        let inner = self.inner.lock().await;
        let mut rows = Vec::new();
        for block in &inner.blocks {
            rows.extend(render_block(block, &inner.register_map, &inner.banks)?);
        }
        Ok(rows)
    }

    pub async fn status(&self) -> ServerStatus {
        let inner = self.inner.lock().await;
        ServerStatus {
            id: self.id.clone(),
            status: if inner.status.is_ok() { "ok" } else { "error" },
            error_message: inner.status.error_message().map(str::to_string),
            address: self.address.clone(),
            port: self.port,
            poll_interval_ms: self.poll_interval.as_millis() as u64,
            last_data_received: inner.last_data_received,
            phase: inner.phase,
        }
    }

    /// Export in the import/export format
    pub async fn config(&self) -> ServerConfig {
        let inner = self.inner.lock().await;
        ServerConfig {
            id: self.id.clone(),
            address: self.address.clone(),
            port: self.port,
            poll_interval_ms: self.poll_interval.as_millis() as u64,
            register_blocks: inner.blocks.clone(),
        }
    }

    /// Cancel the engine, close the client and wait for the engine to finish
    ///
    /// The lock is released before waiting so the engine can observe the
    /// cancellation.
    pub async fn stop(&self) {
        let task = {
            let mut inner = self.inner.lock().await;
            inner.cancel.cancel();
            inner.close_client().await;
            inner.phase = EnginePhase::Stopped;
            inner.task.take()
        };

        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Server {}: engine task ended abnormally: {}", self.id, e);
            }
        }
        info!("Server {} stopped", self.id);
    }
}
