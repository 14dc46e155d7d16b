//! Node discovery
use std::{collections::BTreeSet, time::Duration};

use sdolink_common::{
    constants::object_ids::DEVICE_TYPE,
    messages::{producer_node_id, SDO_REQ_BASE},
    sdo::SdoRequest,
    traits::CanSendError,
    AsyncCanReceiver, AsyncCanSender, CanId, NodeId,
};
use snafu::{ResultExt, Snafu};

/// Error returned by scanner operations
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
pub enum ScannerError {
    /// Failed to put a discovery request on the bus
    #[snafu(display("Failed to send discovery request to node {node}: {source}"))]
    DiscoverySend {
        /// The node being probed
        node: NodeId,
        /// The send failure
        source: CanSendError,
    },
}

/// Discovers which nodes are present on a bus
///
/// Every possible node ID is sent an SDO upload request for the device type object. After a fixed
/// settle window, every node which has produced a message in the meantime is considered present.
/// Responses are not required to be SDO responses: a heartbeat, boot-up, emergency or PDO from a
/// node also reveals it.
#[derive(Debug, Clone, Copy)]
pub struct BusScanner {
    settle: Duration,
}

impl BusScanner {
    /// Create a scanner which waits `settle` for responses
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }

    /// Broadcast the discovery request, and collect responding nodes
    ///
    /// Blocks for the full settle window; there is no early exit once nodes respond.
    pub async fn search<S, R>(
        &self,
        sender: &mut S,
        receiver: &mut R,
    ) -> Result<BTreeSet<NodeId>, ScannerError>
    where
        S: AsyncCanSender,
        R: AsyncCanReceiver,
    {
        receiver.flush();

        for node in NodeId::all() {
            let msg = SdoRequest::initiate_upload(DEVICE_TYPE, 0)
                .to_can_message(CanId::std(SDO_REQ_BASE + node.raw() as u16));
            sender
                .send(msg)
                .await
                .context(DiscoverySendSnafu { node })?;
        }

        tokio::time::sleep(self.settle).await;

        let mut found = BTreeSet::new();
        while let Some(msg) = receiver.try_recv() {
            let Some(node) = producer_node_id(msg.id()).and_then(|id| NodeId::new(id).ok()) else {
                continue;
            };
            if found.insert(node) {
                log::info!("Discovered node {node} from message {:?}", msg.id());
            }
        }
        Ok(found)
    }
}
