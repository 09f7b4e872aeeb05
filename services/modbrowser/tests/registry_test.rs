//! Registry lifecycle and import/export

mod common;

use common::{init_test_logging, registry, wait_for, MockDevice};
use modbrowser::{BrowserError, ConfigFile, ServerConfig};
use register_model::{RegisterBlock, RegisterConfig, RegisterFormat};

fn config(id: &str) -> ServerConfig {
    ServerConfig::new(id, "mock", 502, 50)
}

#[tokio::test]
async fn test_duplicate_id_is_rejected() {
    init_test_logging();
    let device = MockDevice::new();
    let registry = registry(&device);

    registry.add(config("plc1")).await.unwrap();
    let err = registry.add(config("plc1")).await.unwrap_err();
    assert!(matches!(err, BrowserError::ServerError(ref msg) if msg.contains("exists")));
    assert_eq!(registry.len().await, 1);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_unknown_server() {
    let device = MockDevice::new();
    let registry = registry(&device);

    assert!(matches!(
        registry.remove("ghost").await,
        Err(BrowserError::ServerError(_))
    ));
    assert!(registry.get("ghost").await.is_err());
}

#[tokio::test]
async fn test_invalid_server_is_rejected_before_start() {
    let device = MockDevice::new();
    let registry = registry(&device);

    let bad = config("plc1").with_blocks(vec![RegisterBlock::new(20_000, 10)]);
    assert!(matches!(
        registry.add(bad).await,
        Err(BrowserError::ValidationError(_))
    ));
    assert!(registry.is_empty().await);
    assert_eq!(device.connect_attempts(), 0);
}

#[tokio::test]
async fn test_list_is_sorted_by_id() {
    let device = MockDevice::new();
    let registry = registry(&device);
    for id in ["c", "a", "b"] {
        registry.add(config(id)).await.unwrap();
    }

    let ids: Vec<_> = registry
        .statuses()
        .await
        .into_iter()
        .map(|status| status.id)
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    registry.shutdown().await;
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_import_then_export() {
    init_test_logging();
    let device = MockDevice::new();
    let registry = registry(&device);

    let json = r#"{
        "servers": [
            {
                "id": "meter",
                "address": "mock",
                "port": 502,
                "pollRate": 100,
                "registerBlocks": [
                    {
                        "startAddress": 30000,
                        "length": 300,
                        "registers": [
                            {"name": "Voltage", "format": "float", "address": 30000},
                            {"name": "Serial", "format": "string-word", "address": 30200, "stringLength": 8}
                        ]
                    }
                ]
            },
            {"id": "boiler", "address": "mock", "port": 1502, "pollIntervalMs": 250}
        ]
    }"#;
    let imported = registry
        .import(ConfigFile::from_json(json).unwrap())
        .await
        .unwrap();
    assert_eq!(imported, 2);

    let exported = registry.export().await;
    assert_eq!(exported.servers.len(), 2);
    assert_eq!(exported.servers[0].id, "boiler");
    assert_eq!(exported.servers[0].poll_interval_ms, 250);

    let meter = &exported.servers[1];
    assert_eq!(meter.poll_interval_ms, 100);
    let spans: Vec<_> = meter
        .register_blocks
        .iter()
        .map(|b| (b.start_address, b.length))
        .collect();
    assert_eq!(spans, vec![(30_000, 125), (30_125, 125), (30_250, 50)]);
    assert_eq!(meter.register_blocks[1].registers[0].name, "Serial");

    let server = registry.get("meter").await.unwrap();
    assert!(wait_for(|| async { server.status().await.status == "ok" }).await);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_import_replaces_existing_server() {
    let device = MockDevice::new();
    let registry = registry(&device);
    let previous = registry.add(config("plc1")).await.unwrap();

    let replacement = config("plc1").with_blocks(vec![RegisterBlock::new(40_000, 2)
        .with_registers(vec![RegisterConfig::new(40_000, "Speed", RegisterFormat::Decimal)])]);
    registry
        .import(ConfigFile {
            servers: vec![replacement.clone()],
        })
        .await
        .unwrap();

    assert_eq!(registry.len().await, 1);
    let current = registry.get("plc1").await.unwrap();
    assert!(!std::sync::Arc::ptr_eq(&previous, &current));
    assert_eq!(current.config().await, replacement);
    assert_eq!(
        previous.status().await.phase,
        modbrowser::EnginePhase::Stopped
    );

    registry.shutdown().await;
}

#[tokio::test]
async fn test_invalid_import_changes_nothing() {
    let device = MockDevice::new();
    let registry = registry(&device);
    registry.add(config("keep")).await.unwrap();

    let file = ConfigFile {
        servers: vec![
            config("new"),
            config("broken").with_blocks(vec![RegisterBlock::new(49_990, 20)]),
        ],
    };
    assert!(registry.import(file).await.is_err());

    let duplicate = ConfigFile {
        servers: vec![config("twin"), config("twin")],
    };
    assert!(registry.import(duplicate).await.is_err());

    let ids: Vec<_> = registry.list().await.iter().map(|s| s.id().to_string()).collect();
    assert_eq!(ids, vec!["keep"]);

    registry.shutdown().await;
}
