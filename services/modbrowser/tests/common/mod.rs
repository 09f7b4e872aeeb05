//! In-memory Modbus device for integration tests

#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use modbrowser::{
    BrowserError, ClientConnector, EngineSettings, ModbusClient, Result, ServerRegistry,
};
use tokio::time::{sleep, Instant};

const SLOTS: usize = 10_000;

/// Device memory and fault switches
#[derive(Debug)]
pub struct DeviceState {
    pub coils: Vec<bool>,
    pub discrete_inputs: Vec<bool>,
    pub input_registers: Vec<u16>,
    pub holding_registers: Vec<u16>,
    pub fail_reads: bool,
    pub fail_connects: bool,
    pub connects: usize,
    pub connect_attempts: usize,
    pub reads: usize,
    pub closes: usize,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            coils: vec![false; SLOTS],
            discrete_inputs: vec![false; SLOTS],
            input_registers: vec![0; SLOTS],
            holding_registers: vec![0; SLOTS],
            fail_reads: false,
            fail_connects: false,
            connects: 0,
            connect_attempts: 0,
            reads: 0,
            closes: 0,
        }
    }
}

/// Shared handle to a mock device
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut DeviceState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn connector(&self) -> Arc<dyn ClientConnector> {
        Arc::new(MockConnector {
            device: self.clone(),
        })
    }

    pub fn reads(&self) -> usize {
        self.with(|s| s.reads)
    }

    pub fn connect_attempts(&self) -> usize {
        self.with(|s| s.connect_attempts)
    }
}

pub struct MockConnector {
    device: MockDevice,
}

#[async_trait]
impl ClientConnector for MockConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn ModbusClient>> {
        let refused = self.device.with(|s| {
            s.connect_attempts += 1;
            if !s.fail_connects {
                s.connects += 1;
            }
            s.fail_connects
        });
        if refused {
            return Err(BrowserError::connection(format!(
                "connection to {}:{} refused",
                host, port
            )));
        }
        Ok(Box::new(MockClient {
            device: self.device.clone(),
            open: true,
        }))
    }
}

pub struct MockClient {
    device: MockDevice,
    open: bool,
}

impl MockClient {
    fn read<T: Clone>(
        &self,
        start: u16,
        count: u16,
        bank: impl FnOnce(&DeviceState) -> &Vec<T>,
    ) -> Result<Vec<T>> {
        if !self.open {
            return Err(BrowserError::not_connected());
        }
        self.device.with(|s| {
            if s.fail_reads {
                return Err(BrowserError::protocol("device did not answer"));
            }
            s.reads += 1;
            let start = usize::from(start);
            let end = start + usize::from(count);
            bank(s)
                .get(start..end)
                .map(<[T]>::to_vec)
                .ok_or_else(|| BrowserError::protocol("illegal data address"))
        })
    }
}

#[async_trait]
impl ModbusClient for MockClient {
    async fn read_coils(&mut self, start: u16, count: u16) -> Result<Vec<bool>> {
        self.read(start, count, |s| &s.coils)
    }

    async fn read_discrete_inputs(&mut self, start: u16, count: u16) -> Result<Vec<bool>> {
        self.read(start, count, |s| &s.discrete_inputs)
    }

    async fn read_input_registers(&mut self, start: u16, count: u16) -> Result<Vec<u16>> {
        self.read(start, count, |s| &s.input_registers)
    }

    async fn read_holding_registers(&mut self, start: u16, count: u16) -> Result<Vec<u16>> {
        self.read(start, count, |s| &s.holding_registers)
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.device.with(|s| s.closes += 1);
        }
    }
}

pub fn init_test_logging() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("modbrowser=debug")
        .try_init()
        .ok();
}

/// Registry with a short reconnect delay
pub fn registry(device: &MockDevice) -> Arc<ServerRegistry> {
    Arc::new(ServerRegistry::new(
        device.connector(),
        EngineSettings {
            reconnect_delay: Duration::from_millis(30),
        },
    ))
}

/// Poll `condition` until it holds or five seconds pass
pub async fn wait_for<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition().await {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}
