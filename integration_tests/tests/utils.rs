#![allow(dead_code)]
use integration_tests::{
    sim_bus::{SimBus, SimBusReceiver, SimConnector},
    sim_device::SimDevice,
};
use sdolink_client::{Session, SessionConfig, StaticDictionaryProvider};
use sdolink_common::{
    dictionary::{DictEntry, ObjectDictionary, Variable},
    messages::BusMessage,
    objects::{AccessType, DataType},
    AsyncCanReceiver,
};

/// Name the test dictionary is registered under
pub const DICTIONARY: &str = "test_device";

pub type SimSession = Session<SimConnector, StaticDictionaryProvider>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn var(
    index: u16,
    sub: u8,
    name: &str,
    data_type: DataType,
    bit_width: usize,
    access_type: AccessType,
) -> DictEntry {
    DictEntry::Scalar(Variable {
        index,
        sub,
        name: name.into(),
        data_type,
        bit_width,
        access_type,
    })
}

/// A dictionary matching the objects of [`test_device`]
pub fn test_dictionary() -> ObjectDictionary {
    ObjectDictionary::new()
        .with_entry(var(0x1000, 0, "Device Type", DataType::UInt32, 32, AccessType::Ro))
        .with_entry(var(
            0x1017,
            0,
            "Producer Heartbeat Time",
            DataType::UInt16,
            16,
            AccessType::Rw,
        ))
        .with_entry(var(0x2000, 0, "Setpoint", DataType::UInt16, 16, AccessType::Rw))
        .with_entry(var(0x2001, 0, "Trim", DataType::Int8, 8, AccessType::Rw))
        .with_entry(var(0x2002, 0, "Status", DataType::UInt32, 32, AccessType::Ro))
        .with_entry(var(0x2003, 0, "Odd", DataType::UInt32, 12, AccessType::Rw))
}

pub fn test_device(node: u8) -> SimDevice {
    SimDevice::new(node)
        .with_heartbeat()
        .with_object(0x2000, 0, AccessType::Rw, &[0, 0])
        .with_object(0x2001, 0, AccessType::Rw, &[0])
        .with_object(0x2002, 0, AccessType::Ro, &[0x64, 0, 0, 0])
        .with_object(0x2003, 0, AccessType::Rw, &[0, 0])
}

/// Session settings suitable for a simulated bus
pub fn test_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.bus.channel = "sim0".into();
    config.scan.settle_ms = 20;
    config.sdo.timeout_ms = 50;
    config.dictionary.path = Some(DICTIONARY.into());
    config
}

pub fn setup_session(devices: Vec<SimDevice>) -> (SimSession, SimBus, SimConnector) {
    init_logging();
    let bus = SimBus::new(devices);
    let connector = SimConnector::new(bus.clone());
    let provider = StaticDictionaryProvider::new().with_dictionary(DICTIONARY, test_dictionary());
    let session = Session::new(connector.clone(), provider, test_config());
    (session, bus, connector)
}

pub struct BusLogger {
    rx: SimBusReceiver,
}

impl BusLogger {
    pub fn new(rx: SimBusReceiver) -> Self {
        Self { rx }
    }

    pub fn print(&mut self) {
        println!("Bus message history");
        println!("-------------------");
        while let Some(msg) = self.rx.try_recv() {
            let parsed_msg: Result<BusMessage, _> = msg.try_into();
            if let Ok(msg) = parsed_msg {
                println!("{:?}", msg);
            } else {
                println!("{:?}", msg);
            }
        }
    }
}

impl Drop for BusLogger {
    fn drop(&mut self) {
        self.print();
    }
}
