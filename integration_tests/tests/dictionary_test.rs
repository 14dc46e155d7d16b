use std::{io::Write, path::PathBuf};

use assertables::assert_contains;
use integration_tests::{
    sim_bus::{SimBus, SimConnector},
    sim_device::SimDevice,
};
use sdolink_client::{
    CompositeWidth, DictionarySource, ModeReport, ScanError, Session, SessionConfig,
    TomlDictionaryProvider, TransactionError,
};
use sdolink_common::{codec::Representation, objects::AccessType, NodeId};

mod utils;
use utils::{init_logging, test_device};

fn device_configs() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("device_configs")
}

fn device_with_composites(node: u8) -> SimDevice {
    test_device(node)
        .with_object(0x2100, 0, AccessType::Const, &[2])
        .with_object(0x2100, 1, AccessType::Rw, &[0])
        .with_object(0x2100, 2, AccessType::Rw, &[0])
        .with_object(0x2200, 1, AccessType::Rw, &[0, 0])
        .with_object(0x2200, 2, AccessType::Rw, &[0, 0])
}

fn toml_session(
    config: SessionConfig,
    devices: Vec<SimDevice>,
) -> (Session<SimConnector, TomlDictionaryProvider>, SimBus) {
    init_logging();
    let bus = SimBus::new(devices);
    let session = Session::new(
        SimConnector::new(bus.clone()),
        TomlDictionaryProvider::with_base_dir(device_configs()),
        config,
    );
    (session, bus)
}

const CONFIG: &str = r#"
[bus]
channel = "vcan0"

[scan]
settle_ms = 20

[sdo]
timeout_ms = 50

[mode]
heartbeat_period_ms = 1000

[dictionary]
path = "test_device.toml"
"#;

#[tokio::test]
async fn test_scan_with_toml_dictionary() {
    let config = SessionConfig::load_from_str(CONFIG).unwrap();
    let (mut session, bus) = toml_session(config, vec![device_with_composites(20)]);
    session.connect().unwrap();
    session.scan(None).await.unwrap();

    let node = NodeId::new(20).unwrap();
    assert_eq!(Some(node), session.active_device());
    assert_eq!(Some(&ModeReport::Operational), session.last_mode_report());
    // 1000 ms from the config file
    assert_eq!(
        Some(&[0xe8, 0x03][..]),
        bus.device(20).unwrap().value(0x1017, 0)
    );

    let dictionary = session.active_dictionary().unwrap();
    assert_eq!(7, dictionary.len());
    assert_eq!("Gains[2]", dictionary.get(0x2100, 2).unwrap().name);
    assert_eq!("Lower", dictionary.get(0x2200, 1).unwrap().name);

    let objects = session.objects();
    // Array sub 0 is const, so only readable
    assert!(objects.find_sendable(0x2100, 0).is_none());
    assert!(objects.find_receivable(0x2100, 0).is_some());
    // Members take the width of the whole composite by default
    assert_eq!(24, objects.find_sendable(0x2100, 1).unwrap().bit_width);
    assert_eq!(32, objects.find_sendable(0x2200, 2).unwrap().bit_width);

    let trim = objects.find_sendable(0x2001, 0).unwrap().clone();
    session.write(&trim, "-3").await.unwrap();
    let report = session
        .read(&trim, Representation::Hexadecimal)
        .await
        .unwrap();
    assert_eq!("0xfd", report.value);
}

#[tokio::test]
async fn test_inherited_composite_width_overflows_member() {
    let config = SessionConfig::load_from_str(CONFIG).unwrap();
    let (mut session, _bus) = toml_session(config, vec![device_with_composites(21)]);
    session.connect().unwrap();
    session.scan(None).await.unwrap();

    // Three bytes are sent to a one byte object, so the device rejects it
    let gain = session.objects().find_sendable(0x2100, 1).unwrap().clone();
    let err = session.write(&gain, "7").await.unwrap_err();
    assert!(matches!(err, TransactionError::Remote { .. }));
}

#[tokio::test]
async fn test_per_entry_composite_width() {
    let mut config = SessionConfig::load_from_str(CONFIG).unwrap();
    config.dictionary.composite_width = CompositeWidth::PerEntry;
    let (mut session, bus) = toml_session(config, vec![device_with_composites(22)]);
    session.connect().unwrap();
    session.scan(None).await.unwrap();

    let gain = session.objects().find_sendable(0x2100, 1).unwrap().clone();
    assert_eq!(8, gain.bit_width);
    session.write(&gain, "7").await.unwrap();
    assert_eq!(Some(&[7][..]), bus.device(22).unwrap().value(0x2100, 1));

    let upper = session.objects().find_sendable(0x2200, 2).unwrap().clone();
    session.write(&upper, "-2").await.unwrap();
    assert_eq!(
        Some(&[0xfe, 0xff][..]),
        bus.device(22).unwrap().value(0x2200, 2)
    );
}

#[tokio::test]
async fn test_config_and_dictionary_from_files() {
    let dir = tempfile::tempdir().unwrap();

    let dict_path = dir.path().join("minimal.toml");
    let mut dict_file = std::fs::File::create(&dict_path).unwrap();
    dict_file
        .write_all(
            br#"
[[objects]]
index = 0x1000
parameter_name = "Device Type"
data_type = "uint32"
"#,
        )
        .unwrap();

    let config_path = dir.path().join("session.toml");
    let mut config_file = std::fs::File::create(&config_path).unwrap();
    config_file
        .write_all(b"[scan]\nsettle_ms = 20\n[sdo]\ntimeout_ms = 50\n")
        .unwrap();

    let config = SessionConfig::load_from_file(&config_path).unwrap();
    let (mut session, bus) = toml_session(config, vec![test_device(30)]);
    session.connect().unwrap();

    // No default dictionary is configured
    assert!(matches!(
        session.scan(None).await.unwrap_err(),
        ScanError::NoDictionaryConfigured
    ));

    // Absolute paths ignore the provider's base directory
    let source = DictionarySource::new(dict_path.to_string_lossy());
    session.scan(Some(&source)).await.unwrap();
    assert_eq!(Some(NodeId::new(30).unwrap()), session.active_device());
    // There is no heartbeat object in this dictionary
    assert!(matches!(
        session.last_mode_report(),
        Some(ModeReport::Stopped(_))
    ));
    assert_eq!(
        sdolink_common::messages::NmtState::Stopped,
        bus.device(30).unwrap().state()
    );
}

#[tokio::test]
async fn test_missing_dictionary_file() {
    let config = SessionConfig::load_from_str(CONFIG).unwrap();
    let (mut session, _bus) = toml_session(config, vec![test_device(31)]);
    session.connect().unwrap();

    let source = DictionarySource::new("does_not_exist.toml");
    let err = session.scan(Some(&source)).await.unwrap_err();
    assert_contains!(err.to_string(), "does_not_exist.toml");
    assert!(session.discovered_devices().is_empty());
}
