//! Constants defining standard object and special values
//!
//!

/// Object indices for standard objects
pub mod object_ids {
    /// The Device Type object index
    ///
    /// Every device implements it, which makes it the probe used during discovery
    pub const DEVICE_TYPE: u16 = 0x1000;
    /// The Device Name object index
    pub const DEVICE_NAME: u16 = 0x1008;
    /// The hardware version object index
    pub const HARDWARE_VERSION: u16 = 0x1009;
    /// The software version object index
    pub const SOFTWARE_VERSION: u16 = 0x100A;
    /// The heartbeat producer time object index
    pub const HEARTBEAT_PRODUCER_TIME: u16 = 0x1017;
    /// The identity object index
    pub const IDENTITY: u16 = 0x1018;
}

/// Default values used by the session when no configuration overrides them
pub mod values {
    /// Heartbeat production interval written when a device is activated, in milliseconds
    pub const DEFAULT_HEARTBEAT_PERIOD_MS: u16 = 500;
    /// How long discovery listens for responses after the broadcast, in milliseconds
    pub const DEFAULT_SCAN_SETTLE_MS: u64 = 500;
    /// How long the SDO client waits for each server response, in milliseconds
    pub const DEFAULT_SDO_TIMEOUT_MS: u64 = 300;
}
