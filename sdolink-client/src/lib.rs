//! A host-side client for managing CANopen devices over SDO
//!
//! The crate provides everything needed to discover devices on a bus, and to read and write their
//! objects:
//!
//! - A [`Session`], which owns the bus transport and the discovered devices, and is the intended
//!   engine behind an application such as `sdolink-cli`
//! - A [`BusScanner`] for finding the nodes present on a bus
//! - An [object classifier](classify), which splits a device's dictionary into sendable and
//!   receivable objects
//! - An [SDO client](SdoClient) for reading and writing a node's object dictionary via its SDO
//!   server, and an [NMT master](NmtMaster) for commanding node states
//! - [Dictionary providers](DictionaryProvider), which supply the object metadata of each device
//! - A TOML [session configuration](SessionConfig)
//!
//! Transports are anything implementing the [`AsyncCanSender`](common::AsyncCanSender) and
//! [`AsyncCanReceiver`](common::AsyncCanReceiver) traits, opened by a [`BusConnector`]. A
//! socketcan transport is available with the `socketcan` feature.
#![warn(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod classifier;
pub mod config;
pub mod connector;
pub mod dictionary_provider;
pub mod mode;
pub mod nmt_master;
pub mod scanner;
mod sdo_client;
pub mod session;
#[cfg(feature = "socketcan")]
mod socketcan;
pub mod transaction;

pub use sdolink_common as common;

pub use classifier::{classify, ClassifiedEntry, ClassifiedObjectList, CompositeWidth};
pub use config::{BusConfig, ConfigError, SessionConfig};
pub use connector::{BusConnector, ConnectorError};
pub use dictionary_provider::{
    DictionaryError, DictionaryProvider, DictionarySource, StaticDictionaryProvider,
    TomlDictionaryProvider,
};
pub use mode::{ModeController, ModeReport};
pub use nmt_master::{NmtError, NmtMaster};
pub use scanner::{BusScanner, ScannerError};
pub use sdo_client::{RawAbortCode, SdoClient, SdoClientError};
pub use session::{ConnectError, ModeError, ScanError, ScanOutcome, Session, SessionState};
#[cfg(feature = "socketcan")]
#[cfg_attr(docsrs, doc(cfg(feature = "socketcan")))]
pub use socketcan::{open_socketcan, SocketCanConnector, SocketCanReceiver, SocketCanSender};
pub use transaction::{ReadReport, TransactionError, TransactionReport};
