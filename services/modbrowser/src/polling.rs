//! Polling engine
//!
//! One supervising task per server drives the connection state machine:
//!
//! ```text
//! Connecting --ok--> Polling --read error--> Reconnecting --ok--> Polling
//!     |                                          ^    |
//!     +--------------------error-----------------+    +--error--> (retry after delay)
//! ```
//!
//! Any phase ends in `Stopped` once the server's cancellation token fires or
//! the registry no longer maps the server id to this server.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use register_model::{locate, Bank, RegisterBanks, RegisterBlock};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ClientConnector, ModbusClient};
use crate::error::{BrowserError, Result};
use crate::server::{ConnectionStatus, EnginePhase, ServerState};

/// Registry map shared with the engines for membership checks
pub type ServerDirectory = RwLock<HashMap<String, Arc<ServerState>>>;

/// Engine timing shared by all servers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub reconnect_delay: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

/// Supervising task of one server
pub struct PollingEngine {
    server: Arc<ServerState>,
    directory: Weak<ServerDirectory>,
    connector: Arc<dyn ClientConnector>,
    settings: EngineSettings,
    cancel: CancellationToken,
}

impl PollingEngine {
    pub async fn new(
        server: Arc<ServerState>,
        directory: Weak<ServerDirectory>,
        connector: Arc<dyn ClientConnector>,
        settings: EngineSettings,
    ) -> Self {
        let cancel = server.cancellation_token().await;
        Self {
            server,
            directory,
            connector,
            settings,
            cancel,
        }
    }

    /// Spawn the engine and hand its task to the server
    pub async fn spawn(self) {
        let server = self.server.clone();
        let task: JoinHandle<()> = tokio::spawn(self.run());
        server.attach_task(task).await;
    }

    /// Drive the state machine until stopped
    pub async fn run(self) {
        let mut phase = EnginePhase::Connecting;
        loop {
            phase = match phase {
                EnginePhase::Connecting => self.connect().await,
                EnginePhase::Polling => self.poll().await,
                EnginePhase::Reconnecting => self.reconnect().await,
                EnginePhase::Stopped => break,
            };
        }

        let mut inner = self.server.lock().await;
        inner.close_client().await;
        inner.phase = EnginePhase::Stopped;
        debug!("Server {}: polling engine exited", self.server.id());
    }

    async fn connect(&self) -> EnginePhase {
        let attempt = tokio::select! {
            _ = self.cancel.cancelled() => return EnginePhase::Stopped,
            result = self.connector.connect(self.server.address(), self.server.port()) => result,
        };
        self.install(attempt).await
    }

    /// Record a connect attempt and pick the next phase
    async fn install(&self, attempt: Result<Box<dyn ModbusClient>>) -> EnginePhase {
        let mut inner = self.server.lock().await;
        if inner.cancel.is_cancelled() {
            if let Ok(mut client) = attempt {
                client.close().await;
            }
            return EnginePhase::Stopped;
        }

        match attempt {
            Ok(client) => {
                info!(
                    "Server {}: connected to {}:{}",
                    self.server.id(),
                    self.server.address(),
                    self.server.port()
                );
                inner.client = Some(client);
                inner.status = ConnectionStatus::Ok;
                inner.phase = EnginePhase::Polling;
            }
            Err(e) => {
                warn!("Server {}: connect failed: {}", self.server.id(), e);
                inner.status = ConnectionStatus::Error(e.to_string());
                inner.phase = EnginePhase::Reconnecting;
            }
        }
        inner.phase
    }

    async fn poll(&self) -> EnginePhase {
        let period = self.server.poll_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return EnginePhase::Stopped,
                _ = ticker.tick() => {}
            }

            if !self.is_registered().await {
                info!("Server {}: no longer registered, stopping", self.server.id());
                return EnginePhase::Stopped;
            }

            let mut inner = self.server.lock().await;
            if inner.cancel.is_cancelled() {
                return EnginePhase::Stopped;
            }

            let inner = &mut *inner;
            let result = match inner.client.as_mut() {
                Some(client) => read_blocks(&mut **client, &inner.blocks, &mut inner.banks).await,
                None => Err(BrowserError::not_connected()),
            };

            match result {
                Ok(()) => {
                    inner.status = ConnectionStatus::Ok;
                    inner.last_data_received = Some(Utc::now());
                }
                Err(e) => {
                    warn!("Server {}: poll failed: {}", self.server.id(), e);
                    inner.status = ConnectionStatus::Error(e.to_string());
                    inner.close_client().await;
                    inner.phase = EnginePhase::Reconnecting;
                    return EnginePhase::Reconnecting;
                }
            }
        }
    }

    async fn reconnect(&self) -> EnginePhase {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return EnginePhase::Stopped,
                _ = sleep(self.settings.reconnect_delay) => {}
            }

            if !self.is_registered().await {
                info!("Server {}: no longer registered, stopping", self.server.id());
                return EnginePhase::Stopped;
            }

            debug!("Server {}: reconnecting", self.server.id());
            match self.connect().await {
                EnginePhase::Reconnecting => continue,
                next => return next,
            }
        }
    }

    /// The registry still maps this id to this exact server
    async fn is_registered(&self) -> bool {
        let Some(directory) = self.directory.upgrade() else {
            return false;
        };
        let servers = directory.read().await;
        servers
            .get(self.server.id())
            .is_some_and(|current| Arc::ptr_eq(current, &self.server))
    }
}

/// Read every block in order into the banks, stopping at the first error
pub async fn read_blocks(
    client: &mut dyn ModbusClient,
    blocks: &[RegisterBlock],
    banks: &mut RegisterBanks,
) -> Result<()> {
    for block in blocks {
        let location = locate(block.start_address);
        let offset = location.index()? as u16;
        let count = block.length;
        let len = usize::from(count);
        debug!(
            "Reading {} {} at offset {} (address {})",
            count, location.bank, offset, block.start_address
        );

        match location.bank {
            Bank::Coils => {
                let mut values = client.read_coils(offset, count).await?;
                values.truncate(len);
                banks.store_bits(Bank::Coils, offset, &values)?;
            }
            Bank::DiscreteInputs => {
                let mut values = client.read_discrete_inputs(offset, count).await?;
                values.truncate(len);
                banks.store_bits(Bank::DiscreteInputs, offset, &values)?;
            }
            Bank::InputRegisters => {
                let mut values = client.read_input_registers(offset, count).await?;
                values.truncate(len);
                banks.store_words(Bank::InputRegisters, offset, &values)?;
            }
            Bank::HoldingRegisters => {
                let mut values = client.read_holding_registers(offset, count).await?;
                values.truncate(len);
                banks.store_words(Bank::HoldingRegisters, offset, &values)?;
            }
        }
    }
    Ok(())
}
