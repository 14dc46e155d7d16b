//! Session configuration
//!
//! A [`SessionConfig`] is loaded from a TOML file. Every field has a default, so an empty file (or
//! no file at all) is a valid configuration.
//!
//! # An example TOML file
//!
//! ```toml
//! [bus]
//! channel = "can0"
//! bitrate = 250000
//!
//! [scan]
//! settle_ms = 500
//!
//! [sdo]
//! timeout_ms = 300
//!
//! [mode]
//! heartbeat_period_ms = 500
//!
//! [dictionary]
//! path = "device.toml"
//! composite_width = "inherited"
//! ```
use std::{path::Path, time::Duration};

use serde::Deserialize;
use snafu::{ResultExt, Snafu};

use sdolink_common::constants::values::{
    DEFAULT_HEARTBEAT_PERIOD_MS, DEFAULT_SCAN_SETTLE_MS, DEFAULT_SDO_TIMEOUT_MS,
};

use crate::classifier::CompositeWidth;

/// Error returned when loading a session configuration
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// The file could not be read
    #[snafu(display("IO error loading {path}: {source}"))]
    Io {
        /// Path of the file
        path: String,
        /// The underlying IO error
        source: std::io::Error,
    },
    /// The file is not a valid configuration
    #[snafu(display("Error parsing TOML: {source}"))]
    TomlDeserialization {
        /// The toml error which led to this error
        source: toml::de::Error,
    },
}

/// Bus transport settings
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BusConfig {
    /// Name of the bus channel, e.g. "can0" or "vcan0"
    pub channel: String,
    /// The nominal bit rate of the bus
    ///
    /// This is informational only; interface bit rates are configured by the operating system.
    pub bitrate: Option<u32>,
}

impl BusConfig {
    /// Create a bus config for the named channel
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            bitrate: None,
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new("can0")
    }
}

/// Node discovery settings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScanConfig {
    /// How long to collect responses after the discovery broadcast, in milliseconds
    pub settle_ms: u64,
}

impl ScanConfig {
    /// The settle window as a duration
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            settle_ms: DEFAULT_SCAN_SETTLE_MS,
        }
    }
}

/// SDO transfer settings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SdoConfig {
    /// How long to wait for each SDO response, in milliseconds
    pub timeout_ms: u64,
}

impl SdoConfig {
    /// The response timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SdoConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_SDO_TIMEOUT_MS,
        }
    }
}

/// Operating mode settings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ModeConfig {
    /// The heartbeat producer time written to a device when it is activated
    pub heartbeat_period_ms: u16,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            heartbeat_period_ms: DEFAULT_HEARTBEAT_PERIOD_MS,
        }
    }
}

/// Object dictionary settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DictionaryConfig {
    /// Dictionary source used by a scan when none is given explicitly
    pub path: Option<String>,
    /// How sub objects of arrays and records are sized
    pub composite_width: CompositeWidth,
}

/// All settings for a [`Session`](crate::Session)
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SessionConfig {
    /// Bus transport settings
    pub bus: BusConfig,
    /// Node discovery settings
    pub scan: ScanConfig,
    /// SDO transfer settings
    pub sdo: SdoConfig,
    /// Operating mode settings
    pub mode: ModeConfig,
    /// Object dictionary settings
    pub dictionary: DictionaryConfig,
}

impl SessionConfig {
    /// Read a configuration from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<SessionConfig, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).context(IoSnafu {
            path: path.to_string_lossy(),
        })?;
        Self::load_from_str(&content)
    }

    /// Read a configuration from a string
    pub fn load_from_str(s: &str) -> Result<SessionConfig, ConfigError> {
        toml::from_str(s).context(TomlDeserializationSnafu)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SessionConfig::load_from_str("").unwrap();
        assert_eq!(SessionConfig::default(), config);
        assert_eq!("can0", config.bus.channel);
        assert_eq!(Duration::from_millis(500), config.scan.settle());
        assert_eq!(Duration::from_millis(300), config.sdo.timeout());
        assert_eq!(500, config.mode.heartbeat_period_ms);
        assert_eq!(CompositeWidth::Inherited, config.dictionary.composite_width);
    }

    #[test]
    fn test_full_config() {
        let config = SessionConfig::load_from_str(
            r#"
            [bus]
            channel = "vcan0"
            bitrate = 500000

            [scan]
            settle_ms = 50

            [sdo]
            timeout_ms = 1000

            [mode]
            heartbeat_period_ms = 250

            [dictionary]
            path = "device.toml"
            composite_width = "per_entry"
            "#,
        )
        .unwrap();

        assert_eq!("vcan0", config.bus.channel);
        assert_eq!(Some(500000), config.bus.bitrate);
        assert_eq!(50, config.scan.settle_ms);
        assert_eq!(1000, config.sdo.timeout_ms);
        assert_eq!(250, config.mode.heartbeat_period_ms);
        assert_eq!(Some("device.toml".to_string()), config.dictionary.path);
        assert_eq!(CompositeWidth::PerEntry, config.dictionary.composite_width);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result = SessionConfig::load_from_str("[scan]\nsettle = 5\n");
        assert!(matches!(result, Err(ConfigError::TomlDeserialization { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bus]\nchannel = \"vcan1\"").unwrap();
        let config = SessionConfig::load_from_file(file.path()).unwrap();
        assert_eq!("vcan1", config.bus.channel);

        let missing = SessionConfig::load_from_file("/nonexistent/sdolink.toml");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
