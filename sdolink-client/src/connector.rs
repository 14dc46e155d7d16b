//! Opening bus transports
use sdolink_common::{AsyncCanReceiver, AsyncCanSender};

use crate::config::BusConfig;

/// Error returned by a connector which could not open its transport
pub type ConnectorError = Box<dyn std::error::Error + Send + Sync>;

/// Something which can open a bus channel, producing a sender/receiver pair
///
/// A [`Session`](crate::Session) owns a connector so that it can bring the transport up, tear it
/// down, and bring it up again later.
pub trait BusConnector {
    /// The sender half of an open transport
    type Sender: AsyncCanSender;
    /// The receiver half of an open transport
    type Receiver: AsyncCanReceiver;

    /// Open the channel described by `config`
    fn open(&self, config: &BusConfig) -> Result<(Self::Sender, Self::Receiver), ConnectorError>;
}
