//! NMT commands
use sdolink_common::{
    messages::{NmtCommand, NmtCommandCmd},
    traits::CanSendError,
    AsyncCanSender,
};
use snafu::{ResultExt, Snafu};

/// Error returned when an NMT command cannot be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[snafu(display("Failed to send NMT {cmd:?} to node {node}: {source}"))]
pub struct NmtError {
    cmd: NmtCommandCmd,
    node: u8,
    source: CanSendError,
}

/// Sends NMT commands to nodes on the bus
///
/// For every command, `node` is the node ID to command, or 0 to broadcast to all nodes
#[derive(Debug)]
pub struct NmtMaster<S> {
    sender: S,
}

impl<S: AsyncCanSender> NmtMaster<S> {
    /// Create a new NMT master
    pub fn new(sender: S) -> Self {
        Self { sender }
    }

    /// Send application reset command
    pub async fn reset_app(&mut self, node: u8) -> Result<(), NmtError> {
        self.send(NmtCommandCmd::ResetApp, node).await
    }

    /// Send communications reset command
    pub async fn reset_comms(&mut self, node: u8) -> Result<(), NmtError> {
        self.send(NmtCommandCmd::ResetComm, node).await
    }

    /// Send start operation command
    pub async fn start(&mut self, node: u8) -> Result<(), NmtError> {
        self.send(NmtCommandCmd::Start, node).await
    }

    /// Send stop command
    pub async fn stop(&mut self, node: u8) -> Result<(), NmtError> {
        self.send(NmtCommandCmd::Stop, node).await
    }

    /// Send enter pre-operational command
    pub async fn enter_preop(&mut self, node: u8) -> Result<(), NmtError> {
        self.send(NmtCommandCmd::EnterPreOp, node).await
    }

    /// Send an arbitrary NMT command
    pub async fn send(&mut self, cmd: NmtCommandCmd, node: u8) -> Result<(), NmtError> {
        log::info!("Sending NMT {cmd:?} to node {node}");
        let message = NmtCommand { cmd, node };
        self.sender
            .send(message.into())
            .await
            .context(NmtSnafu { cmd, node })
    }
}
