//! Device session management
//!
//! A [`Session`] owns the bus transport, the set of discovered devices and the active device
//! selection. It is the caller-facing API: everything a front end does goes through it, one
//! operation at a time.
use std::collections::BTreeMap;

use snafu::{ResultExt, Snafu};

use sdolink_common::{
    codec::Representation, dictionary::ObjectDictionary, messages::NmtCommandCmd,
    objects::ObjectDescriptor, NodeId,
};

use crate::{
    classifier::{classify, ClassifiedObjectList},
    config::{BusConfig, SessionConfig},
    connector::{BusConnector, ConnectorError},
    dictionary_provider::{DictionaryError, DictionaryProvider, DictionarySource},
    mode::{ModeController, ModeReport},
    nmt_master::{NmtError, NmtMaster},
    scanner::{BusScanner, ScannerError},
    sdo_client::SdoClient,
    transaction::{self, ReadReport, TransactionError, TransactionReport},
};

/// Error returned when the transport cannot be brought up
#[derive(Debug, Snafu)]
pub enum ConnectError {
    /// The channel could not be opened
    #[snafu(display("Unable to open bus channel '{channel}': {source}"))]
    TransportUnavailable {
        /// The channel name
        channel: String,
        /// The connector's error
        source: ConnectorError,
    },
}

/// Error returned by [`Session::scan`]
#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum ScanError {
    /// No dictionary source was given
    #[snafu(display("Provide a valid object dictionary before scanning nodes."))]
    NoDictionaryConfigured,
    /// The session has no open transport
    #[snafu(display("Not connected to a bus"))]
    NotConnected,
    /// The discovery broadcast could not be sent
    #[snafu(display("Discovery failed: {source}"))]
    Discovery {
        /// The scanner error
        source: ScannerError,
    },
    /// A discovered node's dictionary could not be loaded
    #[snafu(display("Could not load dictionary '{dictionary}' for node {node}: {source}"))]
    Dictionary {
        /// The node being registered
        node: NodeId,
        /// The dictionary source
        dictionary: DictionarySource,
        /// The provider error
        source: DictionaryError,
    },
}

/// Error returned by device selection and NMT operations
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(module)]
pub enum ModeError {
    /// The session has no open transport
    #[snafu(display("Not connected to a bus"))]
    NotConnected,
    /// The node was not found by the last scan
    #[snafu(display("Node {node} was not discovered"))]
    UnknownDevice {
        /// The requested node
        node: NodeId,
    },
    /// The NMT command could not be sent
    #[snafu(display("{source}"))]
    Nmt {
        /// The send failure
        source: NmtError,
    },
}

/// The result of a successful scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// This many devices responded
    Found(usize),
    /// No device responded
    NoneFound,
}

impl core::fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ScanOutcome::Found(_) => write!(f, "Node scan successful."),
            ScanOutcome::NoneFound => write!(f, "No nodes were found."),
        }
    }
}

/// Coarse state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport
    Disconnected,
    /// Transport is up, but no devices are known
    NoDevices,
    /// Transport is up and at least one device is known
    DevicesAvailable {
        /// The selected device, if any
        active: Option<NodeId>,
    },
}

/// A connection to a bus, and the devices found on it
pub struct Session<C: BusConnector, P: DictionaryProvider> {
    connector: C,
    provider: P,
    config: SessionConfig,
    transport: Option<(C::Sender, C::Receiver)>,
    devices: BTreeMap<NodeId, ObjectDictionary>,
    active: Option<NodeId>,
    objects: ClassifiedObjectList,
    last_mode: Option<ModeReport>,
}

impl<C: BusConnector, P: DictionaryProvider> core::fmt::Debug for Session<C, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("channel", &self.config.bus.channel)
            .field("connected", &self.transport.is_some())
            .field("devices", &self.devices.keys().collect::<Vec<_>>())
            .field("active", &self.active)
            .finish()
    }
}

impl<C: BusConnector, P: DictionaryProvider> Session<C, P> {
    /// Create a disconnected session
    pub fn new(connector: C, provider: P, config: SessionConfig) -> Self {
        Self {
            connector,
            provider,
            config,
            transport: None,
            devices: BTreeMap::new(),
            active: None,
            objects: ClassifiedObjectList::placeholder(),
            last_mode: None,
        }
    }

    /// The session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open the transport on the configured channel
    ///
    /// Any existing transport is closed first. On failure the session stays usable, but
    /// disconnected.
    pub fn connect(&mut self) -> Result<(), ConnectError> {
        let bus = self.config.bus.clone();
        self.connect_to(bus)
    }

    /// Open the transport on the given channel, replacing the configured one
    pub fn connect_to(&mut self, bus: BusConfig) -> Result<(), ConnectError> {
        self.disconnect();
        self.config.bus = bus;
        match self.connector.open(&self.config.bus) {
            Ok(transport) => {
                log::info!("Connected to {}", self.config.bus.channel);
                self.transport = Some(transport);
                Ok(())
            }
            Err(source) => {
                log::warn!(
                    "Unable to open {}, continuing without a bus: {source}",
                    self.config.bus.channel
                );
                Err(ConnectError::TransportUnavailable {
                    channel: self.config.bus.channel.clone(),
                    source,
                })
            }
        }
    }

    /// Close the transport and forget all devices
    ///
    /// Safe to call at any time, including when never connected.
    pub fn disconnect(&mut self) {
        if self.transport.take().is_some() {
            log::info!("Disconnected from {}", self.config.bus.channel);
        }
        self.clear_devices();
    }

    /// True if the transport is open
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// The current session state
    pub fn state(&self) -> SessionState {
        if self.transport.is_none() {
            SessionState::Disconnected
        } else if self.devices.is_empty() {
            SessionState::NoDevices
        } else {
            SessionState::DevicesAvailable {
                active: self.active,
            }
        }
    }

    fn clear_devices(&mut self) {
        self.devices.clear();
        self.active = None;
        self.objects = ClassifiedObjectList::placeholder();
    }

    /// Discover devices, registering each with the dictionary from `dictionary`
    ///
    /// When `dictionary` is None, the configured default is used. Previously discovered devices are
    /// forgotten, and if any responding node's dictionary fails to load none are registered. If
    /// exactly one device responds it becomes the active device, and the mode sequence runs on it;
    /// see [`last_mode_report`](Self::last_mode_report).
    pub async fn scan(
        &mut self,
        dictionary: Option<&DictionarySource>,
    ) -> Result<ScanOutcome, ScanError> {
        let source = match dictionary {
            Some(source) => source.clone(),
            None => self
                .config
                .dictionary
                .path
                .clone()
                .map(DictionarySource::new)
                .ok_or(ScanError::NoDictionaryConfigured)?,
        };
        if source.is_empty() {
            return scan_error::NoDictionaryConfiguredSnafu.fail();
        }

        self.clear_devices();
        let Some((sender, receiver)) = self.transport.as_mut() else {
            return scan_error::NotConnectedSnafu.fail();
        };

        let scanner = BusScanner::new(self.config.scan.settle());
        let found = scanner
            .search(sender, receiver)
            .await
            .context(scan_error::DiscoverySnafu)?;

        // Devices are only registered once every dictionary has loaded
        let mut devices = BTreeMap::new();
        for node in found {
            let dictionary = self
                .provider
                .load(&source, node)
                .context(scan_error::DictionarySnafu {
                    node,
                    dictionary: source.clone(),
                })?;
            devices.insert(node, dictionary);
        }
        self.devices = devices;

        if self.devices.is_empty() {
            log::info!("No nodes found on {}", self.config.bus.channel);
            return Ok(ScanOutcome::NoneFound);
        }

        log::info!("Found {} node(s)", self.devices.len());
        if self.devices.len() == 1 {
            if let Some(node) = self.devices.keys().next().copied() {
                if let Err(e) = self.set_active_device(node).await {
                    log::warn!("Could not activate node {node}: {e}");
                }
            }
        }
        Ok(ScanOutcome::Found(self.devices.len()))
    }

    /// Select the device which transactions are addressed to
    ///
    /// Always runs the operational mode sequence on the device. The report is also retained, and
    /// available from [`last_mode_report`](Self::last_mode_report).
    pub async fn set_active_device(&mut self, node: NodeId) -> Result<ModeReport, ModeError> {
        let Some((sender, receiver)) = self.transport.as_mut() else {
            return mode_error::NotConnectedSnafu.fail();
        };
        let Some(dictionary) = self.devices.get(&node) else {
            return mode_error::UnknownDeviceSnafu { node }.fail();
        };

        self.active = Some(node);
        self.objects = classify(dictionary, self.config.dictionary.composite_width);
        log::info!("Node {node} is now active");

        let controller =
            ModeController::new(self.config.mode.heartbeat_period_ms, self.config.sdo.timeout());
        let report = controller
            .apply_operational_mode(node, dictionary, sender, receiver)
            .await;
        self.last_mode = Some(report.clone());
        Ok(report)
    }

    /// The active device, if any
    pub fn active_device(&self) -> Option<NodeId> {
        self.active
    }

    /// All discovered devices, in ascending order
    pub fn discovered_devices(&self) -> Vec<NodeId> {
        self.devices.keys().copied().collect()
    }

    /// The dictionary of the active device
    pub fn active_dictionary(&self) -> Option<&ObjectDictionary> {
        self.devices.get(&self.active?)
    }

    /// The classified objects of the active device
    ///
    /// Holds the placeholder lists when no device is active
    pub fn objects(&self) -> &ClassifiedObjectList {
        &self.objects
    }

    /// The report from the most recent device activation
    pub fn last_mode_report(&self) -> Option<&ModeReport> {
        self.last_mode.as_ref()
    }

    fn sdo_client(
        &mut self,
    ) -> Result<SdoClient<&mut C::Sender, &mut C::Receiver>, TransactionError> {
        let Some((sender, receiver)) = self.transport.as_mut() else {
            return Err(TransactionError::NotConnected);
        };
        let Some(node) = self.active else {
            return Err(TransactionError::NoActiveDevice);
        };
        Ok(SdoClient::new_std(node.raw(), sender, receiver).with_timeout(self.config.sdo.timeout()))
    }

    /// Write a literal value to an object on the active device
    pub async fn write(
        &mut self,
        descriptor: &ObjectDescriptor,
        literal: &str,
    ) -> Result<TransactionReport, TransactionError> {
        // Nothing is sent unless the value is valid for the object
        transaction::prepare_write(descriptor, literal)?;
        let mut client = self.sdo_client()?;
        transaction::write(&mut client, descriptor, literal).await
    }

    /// Read an object from the active device
    pub async fn read(
        &mut self,
        descriptor: &ObjectDescriptor,
        representation: Representation,
    ) -> Result<ReadReport, TransactionError> {
        let mut client = self.sdo_client()?;
        transaction::read(&mut client, descriptor, representation).await
    }

    /// Send an NMT command to `target`, or to all nodes when `target` is 0
    pub async fn nmt_command(&mut self, cmd: NmtCommandCmd, target: u8) -> Result<(), ModeError> {
        let Some((sender, _)) = self.transport.as_mut() else {
            return mode_error::NotConnectedSnafu.fail();
        };
        NmtMaster::new(sender)
            .send(cmd, target)
            .await
            .context(mode_error::NmtSnafu)
    }
}
