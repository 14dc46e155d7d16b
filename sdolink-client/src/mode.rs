//! Operating mode control
use std::time::Duration;

use sdolink_common::{
    codec,
    constants::object_ids::HEARTBEAT_PRODUCER_TIME,
    dictionary::ObjectDictionary,
    AsyncCanReceiver, AsyncCanSender, NodeId,
};

use crate::{nmt_master::NmtMaster, sdo_client::SdoClient};

/// The outcome of activating a device
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModeReport {
    /// The heartbeat was configured and the device was commanded to operational
    Operational,
    /// The device was commanded to stopped, for the given reason
    Stopped(String),
}

impl core::fmt::Display for ModeReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ModeReport::Operational => write!(f, "NMT mode is operational."),
            ModeReport::Stopped(reason) => {
                write!(f, "NMT mode could not be changed due to {reason}")
            }
        }
    }
}

/// Moves a freshly activated device into its operating mode
///
/// The heartbeat producer time is written first. A device which accepts it is started, and any
/// device which does not (missing object, abort, no response) is stopped instead. A device which
/// could not be sent the start command is also sent stop. This is a heuristic: failing to
/// configure the heartbeat just means the device profile doesn't support it.
#[derive(Debug, Clone, Copy)]
pub struct ModeController {
    heartbeat_period_ms: u16,
    sdo_timeout: Duration,
}

impl ModeController {
    /// Create a mode controller
    pub fn new(heartbeat_period_ms: u16, sdo_timeout: Duration) -> Self {
        Self {
            heartbeat_period_ms,
            sdo_timeout,
        }
    }

    /// Run the operational mode sequence on `node`
    ///
    /// Never fails; problems are reported via [`ModeReport::Stopped`].
    pub async fn apply_operational_mode<S, R>(
        &self,
        node: NodeId,
        dictionary: &ObjectDictionary,
        sender: &mut S,
        receiver: &mut R,
    ) -> ModeReport
    where
        S: AsyncCanSender,
        R: AsyncCanReceiver,
    {
        let reason = match self.configure_heartbeat(node, dictionary, sender, receiver).await {
            Ok(()) => match NmtMaster::new(&mut *sender).start(node.raw()).await {
                Ok(()) => {
                    log::info!("Node {node} is operational");
                    return ModeReport::Operational;
                }
                Err(e) => {
                    log::warn!("Could not start node {node}: {e}");
                    e.to_string()
                }
            },
            Err(reason) => {
                log::warn!("Could not configure heartbeat on node {node}: {reason}");
                reason
            }
        };

        if let Err(e) = NmtMaster::new(&mut *sender).stop(node.raw()).await {
            log::warn!("{e}");
        }
        ModeReport::Stopped(reason)
    }

    async fn configure_heartbeat<S, R>(
        &self,
        node: NodeId,
        dictionary: &ObjectDictionary,
        sender: &mut S,
        receiver: &mut R,
    ) -> Result<(), String>
    where
        S: AsyncCanSender,
        R: AsyncCanReceiver,
    {
        let Some(var) = dictionary.get(HEARTBEAT_PRODUCER_TIME, 0) else {
            return Err(format!(
                "object {HEARTBEAT_PRODUCER_TIME:#x}.0x0 missing from the object dictionary"
            ));
        };
        let bytes = codec::encode(self.heartbeat_period_ms as i128, var.bit_width)
            .map_err(|e| e.to_string())?;

        let mut client =
            SdoClient::new_std(node.raw(), sender, receiver).with_timeout(self.sdo_timeout);
        client
            .download(HEARTBEAT_PRODUCER_TIME, 0, &bytes)
            .await
            .map_err(|e| e.to_string())
    }
}
