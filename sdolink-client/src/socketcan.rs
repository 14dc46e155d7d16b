use std::sync::Arc;

use futures::FutureExt as _;
use sdolink_common::{
    messages::{CanId, CanMessage},
    traits::{AsyncCanReceiver, AsyncCanSender, CanSendError},
};
use snafu::Snafu;
use socketcan::{tokio::CanSocket, CanFrame, EmbeddedFrame, ShouldRetry};

use crate::{
    config::BusConfig,
    connector::{BusConnector, ConnectorError},
};

fn socketcan_id_to_sdolink_id(id: socketcan::Id) -> CanId {
    match id {
        socketcan::Id::Standard(id) => CanId::std(id.as_raw()),
        socketcan::Id::Extended(id) => CanId::extended(id.as_raw()),
    }
}

fn sdolink_id_to_socketcan_id(id: CanId) -> Option<socketcan::Id> {
    match id {
        CanId::Extended(id) => socketcan::ExtendedId::new(id).map(Into::into),
        CanId::Std(id) => socketcan::StandardId::new(id).map(Into::into),
    }
}

fn sdolink_message_to_socket_frame(msg: CanMessage) -> Option<CanFrame> {
    CanFrame::new(sdolink_id_to_socketcan_id(msg.id())?, msg.data())
}

/// Error returned by [`SocketCanReceiver`]
#[derive(Debug, Snafu)]
pub enum ReceiveError {
    /// The socket failed
    #[snafu(display("Socket error: {source}"))]
    Io {
        /// The underlying IO error
        source: socketcan::IoError,
    },
}

/// Receives frames from a socketcan interface
#[derive(Debug, Clone)]
pub struct SocketCanReceiver {
    socket: Arc<CanSocket>,
}

impl SocketCanReceiver {
    /// Only data frames are of interest; remote and error frames are dropped
    fn convert(frame: CanFrame) -> Option<CanMessage> {
        match frame {
            CanFrame::Data(frame) => Some(CanMessage::new(
                socketcan_id_to_sdolink_id(frame.id()),
                frame.data(),
            )),
            CanFrame::Remote(_) => None,
            CanFrame::Error(frame) => {
                log::warn!("Received CAN error frame: {frame:?}");
                None
            }
        }
    }
}

impl AsyncCanReceiver for SocketCanReceiver {
    type Error = ReceiveError;

    fn try_recv(&mut self) -> Option<CanMessage> {
        // Poll the read once: ready frames are returned, and an empty socket returns None
        loop {
            match self.socket.read_frame().now_or_never()? {
                Ok(frame) => {
                    if let Some(msg) = Self::convert(frame) {
                        return Some(msg);
                    }
                }
                Err(_) => return None,
            }
        }
    }

    async fn recv(&mut self) -> Result<CanMessage, ReceiveError> {
        loop {
            match self.socket.read_frame().await {
                Ok(frame) => {
                    if let Some(msg) = Self::convert(frame) {
                        return Ok(msg);
                    }
                }
                Err(e) => {
                    if !e.should_retry() {
                        return Err(ReceiveError::Io { source: e });
                    }
                }
            }
        }
    }
}

/// Sends frames to a socketcan interface
#[derive(Debug, Clone)]
pub struct SocketCanSender {
    socket: Arc<CanSocket>,
}

impl AsyncCanSender for SocketCanSender {
    async fn send(&mut self, msg: CanMessage) -> Result<(), CanSendError> {
        let frame = sdolink_message_to_socket_frame(msg).ok_or(CanSendError(msg))?;
        self.socket
            .write_frame(frame)
            .await
            .map_err(|_| CanSendError(msg))
    }
}

/// Open a socketcan device and split it into a sender and receiver object for use with the
/// sdolink library
///
/// # Arguments
/// * `device` - The name of the socketcan device to open, e.g. "vcan0", or "can0"
///
/// A key benefit of this is that by creating both sender and receiver objects from a shared socket,
/// the receiver will not receive messages sent by the sender.
#[cfg_attr(docsrs, doc(cfg(feature = "socketcan")))]
pub fn open_socketcan<S: AsRef<str>>(
    device: S,
) -> Result<(SocketCanSender, SocketCanReceiver), socketcan::IoError> {
    let socket = Arc::new(CanSocket::open(device.as_ref())?);
    let receiver = SocketCanReceiver {
        socket: socket.clone(),
    };
    let sender = SocketCanSender { socket };
    Ok((sender, receiver))
}

/// A [`BusConnector`] which opens socketcan interfaces by name
#[cfg_attr(docsrs, doc(cfg(feature = "socketcan")))]
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketCanConnector;

impl BusConnector for SocketCanConnector {
    type Sender = SocketCanSender;
    type Receiver = SocketCanReceiver;

    fn open(&self, config: &BusConfig) -> Result<(Self::Sender, Self::Receiver), ConnectorError> {
        Ok(open_socketcan(&config.channel)?)
    }
}
