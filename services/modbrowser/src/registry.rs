//! Server registry
//!
//! Directory of monitored servers by id. Membership changes take the write
//! lock, listings and the engines' membership checks take the read lock. The
//! lock is never held across network I/O.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::client::ClientConnector;
use crate::config::{ConfigFile, ServerConfig};
use crate::error::{BrowserError, Result};
use crate::polling::{EngineSettings, PollingEngine, ServerDirectory};
use crate::server::{ServerState, ServerStatus};

pub struct ServerRegistry {
    servers: Arc<ServerDirectory>,
    connector: Arc<dyn ClientConnector>,
    settings: EngineSettings,
}

impl ServerRegistry {
    pub fn new(connector: Arc<dyn ClientConnector>, settings: EngineSettings) -> Self {
        Self {
            servers: Arc::new(RwLock::new(HashMap::new())),
            connector,
            settings,
        }
    }

    /// Register a server and start its engine
    ///
    /// Blocks of the config go through validation and the planner.
    pub async fn add(&self, config: ServerConfig) -> Result<Arc<ServerState>> {
        config.validate()?;

        let server = Arc::new(ServerState::from_config(&config));
        if !config.register_blocks.is_empty() {
            server.apply_blocks(&config.register_blocks).await?;
        }

        let mut servers = self.servers.write().await;
        if servers.contains_key(&config.id) {
            return Err(BrowserError::server_exists(&config.id));
        }
        servers.insert(config.id.clone(), server.clone());

        // Spawned under the write lock so a concurrent removal finds the task
        PollingEngine::new(
            server.clone(),
            Arc::downgrade(&self.servers),
            self.connector.clone(),
            self.settings,
        )
        .await
        .spawn()
        .await;
        drop(servers);

        info!(
            "Server {} added ({}:{}, every {}ms)",
            config.id, config.address, config.port, config.poll_interval_ms
        );
        Ok(server)
    }

    pub async fn get(&self, id: &str) -> Result<Arc<ServerState>> {
        self.servers
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| BrowserError::server_not_found(id))
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.servers.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.servers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.servers.read().await.is_empty()
    }

    /// Remove a server, stop its engine and release its client
    pub async fn remove(&self, id: &str) -> Result<()> {
        let server = self
            .servers
            .write()
            .await
            .remove(id)
            .ok_or_else(|| BrowserError::server_not_found(id))?;

        server.stop().await;
        info!("Server {} removed", id);
        Ok(())
    }

    /// All servers sorted by id
    pub async fn list(&self) -> Vec<Arc<ServerState>> {
        let mut servers: Vec<_> = self.servers.read().await.values().cloned().collect();
        servers.sort_by(|a, b| a.id().cmp(b.id()));
        servers
    }

    pub async fn statuses(&self) -> Vec<ServerStatus> {
        let mut statuses = Vec::new();
        for server in self.list().await {
            statuses.push(server.status().await);
        }
        statuses
    }

    /// Export every server in the import/export format
    pub async fn export(&self) -> ConfigFile {
        let mut servers = Vec::new();
        for server in self.list().await {
            servers.push(server.config().await);
        }
        ConfigFile { servers }
    }

    /// Import a configuration document
    ///
    /// The whole document is validated first. Servers whose id is already
    /// registered are replaced.
    pub async fn import(&self, file: ConfigFile) -> Result<usize> {
        let mut seen = std::collections::HashSet::new();
        for server in &file.servers {
            server.validate()?;
            if !seen.insert(server.id.as_str()) {
                return Err(BrowserError::validation(format!(
                    "duplicate server id in import: {}",
                    server.id
                )));
            }
        }

        let count = file.servers.len();
        for config in file.servers {
            if self.contains(&config.id).await {
                info!("Server {} replaced by import", config.id);
                self.remove(&config.id).await?;
            }
            self.add(config).await?;
        }
        info!("Imported {} server(s)", count);
        Ok(count)
    }

    /// Stop every engine and empty the registry
    pub async fn shutdown(&self) {
        let servers: Vec<_> = self.servers.write().await.drain().map(|(_, s)| s).collect();
        if servers.is_empty() {
            return;
        }
        info!("Stopping {} server(s)", servers.len());
        join_all(servers.iter().map(|server| server.stop())).await;
        if !self.is_empty().await {
            warn!("Servers were added during shutdown");
        }
    }
}
