//! Configuration
//!
//! Two kinds of configuration live here:
//!
//! - [`AppConfig`]: service settings layered with figment
//!   (defaults < YAML file < `MODBROWSER_` environment variables)
//! - [`ConfigFile`] / [`ServerConfig`]: the JSON import/export format of the
//!   monitored servers and their register blocks

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use register_model::{validate_block, RegisterBlock};
use serde::{Deserialize, Serialize};

use crate::error::{BrowserError, Result};

/// Default location of the service configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/modbrowser.yaml";

/// Environment variable prefix, nested keys are separated by `__`
pub const ENV_PREFIX: &str = "MODBROWSER_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// error, warn, info, debug or trace
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "error".to_string(),
        }
    }
}

/// Modbus client settings shared by every server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub timeout_ms: u64,
    pub unit_id: u8,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            unit_id: 1,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Fixed delay between reconnection attempts
    pub reconnect_delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 1_000,
        }
    }
}

impl PollingConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Service configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    /// Server list imported at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load from the default file location
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load with `path` as the YAML layer; a missing file is not an error
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config: AppConfig = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.port == 0 {
            return Err(BrowserError::config("api.port must not be 0"));
        }
        if self.client.timeout_ms == 0 {
            return Err(BrowserError::config("client.timeout_ms must not be 0"));
        }
        if self.polling.reconnect_delay_ms == 0 {
            return Err(BrowserError::config(
                "polling.reconnect_delay_ms must not be 0",
            ));
        }
        Ok(())
    }
}

/// One monitored server in the import/export format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub id: String,
    pub address: String,
    pub port: u16,
    #[serde(alias = "pollRate")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub register_blocks: Vec<RegisterBlock>,
}

impl ServerConfig {
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        poll_interval_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            port,
            poll_interval_ms,
            register_blocks: Vec::new(),
        }
    }

    pub fn with_blocks(mut self, blocks: Vec<RegisterBlock>) -> Self {
        self.register_blocks = blocks;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check the target and every register block before anything is started
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(BrowserError::validation("server id must not be empty"));
        }
        if self.address.trim().is_empty() {
            return Err(BrowserError::validation(format!(
                "server {}: address must not be empty",
                self.id
            )));
        }
        if self.port == 0 {
            return Err(BrowserError::validation(format!(
                "server {}: port must not be 0",
                self.id
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(BrowserError::validation(format!(
                "server {}: poll interval must be greater than 0",
                self.id
            )));
        }
        for block in &self.register_blocks {
            validate_block(block)
                .map_err(|e| BrowserError::validation(format!("server {}: {}", self.id, e)))?;
        }
        Ok(())
    }
}

/// Whole-configuration import/export document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

impl ConfigFile {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BrowserError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
