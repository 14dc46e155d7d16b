use std::time::Duration;

use sdolink_common::{
    constants::values::DEFAULT_SDO_TIMEOUT_MS,
    messages::{SDO_REQ_BASE, SDO_RESP_BASE},
    sdo::{AbortCode, SdoRequest, SdoResponse},
    AsyncCanReceiver, AsyncCanSender, CanId, CanMessage,
};
use snafu::Snafu;
use tokio::time::{timeout_at, Instant};

/// An abort code as received from a server, which may not be one of the standard codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawAbortCode {
    /// A recognized abort code
    Valid(AbortCode),
    /// An unrecognized abort code
    Unknown(u32),
}

impl From<u32> for RawAbortCode {
    fn from(value: u32) -> Self {
        match AbortCode::try_from(value) {
            Ok(code) => Self::Valid(code),
            Err(code) => Self::Unknown(code),
        }
    }
}

impl core::fmt::Display for RawAbortCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RawAbortCode::Valid(code) => write!(f, "{code}"),
            RawAbortCode::Unknown(code) => write!(f, "Unknown abort code (0x{code:08X})"),
        }
    }
}

/// Error returned by [`SdoClient`] methods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
pub enum SdoClientError {
    /// Timeout while awaiting an expected response
    #[snafu(display("No response from SDO server"))]
    NoResponse,
    /// Received a response that could not be interpreted
    #[snafu(display("Malformed SDO response"))]
    MalformedResponse,
    /// Received a valid SDO response, but with an unexpected command specifier
    #[snafu(display("Unexpected SDO response"))]
    UnexpectedResponse,
    /// Received an abort message from the server
    #[snafu(display("SDO server aborted: {}", RawAbortCode::from(*abort_code)))]
    ServerAbort {
        /// Abort code sent by the server
        abort_code: u32,
    },
    /// Received a segment with a toggle bit which did not alternate
    #[snafu(display("Toggle bit not alternated"))]
    ToggleNotAlternated,
    /// Failed to write a message to the bus
    #[snafu(display("Failed to send CAN frame"))]
    SocketSend,
}

type Result<T> = std::result::Result<T, SdoClientError>;

/// A client for reading and writing objects on a node's SDO server
///
/// One outstanding transfer at a time; every call is a single attempt with no retries.
#[derive(Debug)]
pub struct SdoClient<S, R> {
    req_cob_id: CanId,
    resp_cob_id: CanId,
    timeout: Duration,
    sender: S,
    receiver: R,
}

impl<S: AsyncCanSender, R: AsyncCanReceiver> SdoClient<S, R> {
    /// Create a client for the default SDO server of a node, using standard IDs
    pub fn new_std(server_node_id: u8, sender: S, receiver: R) -> Self {
        Self {
            req_cob_id: CanId::std(SDO_REQ_BASE + server_node_id as u16),
            resp_cob_id: CanId::std(SDO_RESP_BASE + server_node_id as u16),
            timeout: Duration::from_millis(DEFAULT_SDO_TIMEOUT_MS),
            sender,
            receiver,
        }
    }

    /// Set how long to wait for each response from the server
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Write data to a sub object
    ///
    /// Up to 4 bytes are written with an expedited transfer, anything longer is segmented.
    pub async fn download(&mut self, index: u16, sub: u8, data: &[u8]) -> Result<()> {
        self.receiver.flush();

        if data.len() <= 4 {
            log::debug!("Expedited download of {} bytes to {index:#x}.{sub:#x}", data.len());
            let msg =
                SdoRequest::expedited_download(index, sub, data).to_can_message(self.req_cob_id);
            self.send(msg).await?;

            return match self.wait_for_response().await? {
                SdoResponse::ConfirmDownload { .. } => Ok(()),
                SdoResponse::Abort { abort_code, .. } => ServerAbortSnafu { abort_code }.fail(),
                _ => UnexpectedResponseSnafu.fail(),
            };
        }

        log::debug!("Segmented download of {} bytes to {index:#x}.{sub:#x}", data.len());
        let msg = SdoRequest::initiate_download(index, sub, Some(data.len() as u32))
            .to_can_message(self.req_cob_id);
        self.send(msg).await?;

        match self.wait_for_response().await? {
            SdoResponse::ConfirmDownload { .. } => (),
            SdoResponse::Abort { abort_code, .. } => return ServerAbortSnafu { abort_code }.fail(),
            _ => return UnexpectedResponseSnafu.fail(),
        }

        let mut toggle = false;
        let total_segments = data.len().div_ceil(7);
        for (n, segment) in data.chunks(7).enumerate() {
            let last_segment = n == total_segments - 1;
            let msg = SdoRequest::download_segment(toggle, last_segment, segment)
                .to_can_message(self.req_cob_id);
            self.send(msg).await?;

            match self.wait_for_response().await? {
                SdoResponse::ConfirmDownloadSegment { t } => {
                    if t != toggle {
                        self.abort_toggle(index, sub).await;
                        return ToggleNotAlternatedSnafu.fail();
                    }
                }
                SdoResponse::Abort { abort_code, .. } => {
                    return ServerAbortSnafu { abort_code }.fail()
                }
                _ => return UnexpectedResponseSnafu.fail(),
            }
            toggle = !toggle;
        }
        Ok(())
    }

    /// Read a sub object
    pub async fn upload(&mut self, index: u16, sub: u8) -> Result<Vec<u8>> {
        self.receiver.flush();

        let mut read_buf = Vec::new();
        self.send(SdoRequest::initiate_upload(index, sub).to_can_message(self.req_cob_id))
            .await?;

        let expedited = match self.wait_for_response().await? {
            SdoResponse::ConfirmUpload { n, e, s, data, .. } => {
                if e {
                    // Without the size flag, all 4 bytes are data
                    let len = if s { 4 - n as usize } else { 4 };
                    read_buf.extend_from_slice(&data[..len]);
                }
                e
            }
            SdoResponse::Abort { abort_code, .. } => return ServerAbortSnafu { abort_code }.fail(),
            _ => return UnexpectedResponseSnafu.fail(),
        };

        if !expedited {
            let mut toggle = false;
            loop {
                let msg =
                    SdoRequest::upload_segment_request(toggle).to_can_message(self.req_cob_id);
                self.send(msg).await?;

                match self.wait_for_response().await? {
                    SdoResponse::UploadSegment { t, n, c, data } => {
                        if t != toggle {
                            self.abort_toggle(index, sub).await;
                            return ToggleNotAlternatedSnafu.fail();
                        }
                        read_buf.extend_from_slice(&data[..7 - n as usize]);
                        if c {
                            break;
                        }
                    }
                    SdoResponse::Abort { abort_code, .. } => {
                        return ServerAbortSnafu { abort_code }.fail()
                    }
                    _ => return UnexpectedResponseSnafu.fail(),
                }
                toggle = !toggle;
            }
        }
        log::debug!("Uploaded {} bytes from {index:#x}.{sub:#x}", read_buf.len());
        Ok(read_buf)
    }

    async fn send(&mut self, msg: CanMessage) -> Result<()> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| SocketSendSnafu.build())
    }

    async fn abort_toggle(&mut self, index: u16, sub: u8) {
        let msg = SdoRequest::abort(index, sub, AbortCode::ToggleNotAlternated)
            .to_can_message(self.req_cob_id);
        if self.send(msg).await.is_err() {
            log::warn!("Failed to send SDO abort for {index:#x}.{sub:#x}");
        }
    }

    async fn wait_for_response(&mut self) -> Result<SdoResponse> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let msg = match timeout_at(deadline, self.receiver.recv()).await {
                Ok(Ok(msg)) => msg,
                Ok(Err(e)) => {
                    log::error!("Error receiving SDO response: {e}");
                    return NoResponseSnafu.fail();
                }
                Err(_) => return NoResponseSnafu.fail(),
            };
            if msg.id() == self.resp_cob_id {
                return msg.try_into().map_err(|_| MalformedResponseSnafu.build());
            }
        }
    }
}
