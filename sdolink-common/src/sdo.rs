//! SDO message framing
//!
//! SDO transfers read (upload) or write (download) one sub object on a node. Transfers of up to 4
//! bytes are "expedited", and complete in a single request/response. Longer transfers are
//! "segmented", and move 7 bytes per request/response after the initiating exchange.
use crate::messages::{CanId, CanMessage};

/// Specifies the possible server command specifier (SCS) values in SDO response packets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerCommand {
    /// Response to an upload segment request
    SegmentUpload = 0,
    /// Acknowledge a download segment
    SegmentDownload = 1,
    /// Response to an initiate upload request
    Upload = 2,
    /// Acknowledge a download command
    Download = 3,
    /// Abort the transfer
    Abort = 4,
}

impl TryFrom<u8> for ServerCommand {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use ServerCommand::*;
        match value {
            0 => Ok(SegmentUpload),
            1 => Ok(SegmentDownload),
            2 => Ok(Upload),
            3 => Ok(Download),
            4 => Ok(Abort),
            _ => Err(()),
        }
    }
}

/// Standard SDO abort codes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum AbortCode {
    /// Toggle bit not alternated
    ToggleNotAlternated = 0x0503_0000,
    /// SDO protocol timed out
    SdoTimeout = 0x0504_0000,
    /// Client/server command specifier not valid or unknown
    InvalidCommandSpecifier = 0x0504_0001,
    /// Out of memory
    OutOfMemory = 0x0504_0005,
    /// Unsupported access to an object
    UnsupportedAccess = 0x0601_0000,
    /// Attempt to read a write only object
    WriteOnly = 0x0601_0001,
    /// Attempt to write a read only object
    ReadOnly = 0x0601_0002,
    /// Object does not exist in the dictionary
    NoSuchObject = 0x0602_0000,
    /// General parameter incompatibility
    IncompatibleParameter = 0x0604_0043,
    /// Access failed due to hardware error
    HardwareError = 0x0606_0000,
    /// Data type does not match, length of service parameter does not match
    DataTypeMismatch = 0x0607_0010,
    /// Data type does not match, length of service parameter too high
    DataTypeMismatchLengthHigh = 0x0607_0012,
    /// Data type does not match, length of service parameter too low
    DataTypeMismatchLengthLow = 0x0607_0013,
    /// Sub-index does not exist
    NoSuchSubIndex = 0x0609_0011,
    /// Invalid value for parameter (download only)
    InvalidValue = 0x0609_0030,
    /// Value of parameter too high (download only)
    ValueTooHigh = 0x0609_0031,
    /// Value of parameter too low (download only)
    ValueTooLow = 0x0609_0032,
    /// Resource not available: SDO connection
    ResourceNotAvailable = 0x060A_0023,
    /// General error
    GeneralError = 0x0800_0000,
    /// Data cannot be transferred or stored to the application
    CantStore = 0x0800_0020,
    /// Data cannot be transferred or stored to the application because of local control
    CantStoreLocalControl = 0x0800_0021,
    /// Data cannot be transferred or stored to the application because of the device state
    CantStoreDeviceState = 0x0800_0022,
    /// No object dictionary is present
    NoObjectDict = 0x0800_0023,
    /// No data available
    NoData = 0x0800_0024,
}

impl AbortCode {
    const ALL: [AbortCode; 24] = [
        AbortCode::ToggleNotAlternated,
        AbortCode::SdoTimeout,
        AbortCode::InvalidCommandSpecifier,
        AbortCode::OutOfMemory,
        AbortCode::UnsupportedAccess,
        AbortCode::WriteOnly,
        AbortCode::ReadOnly,
        AbortCode::NoSuchObject,
        AbortCode::IncompatibleParameter,
        AbortCode::HardwareError,
        AbortCode::DataTypeMismatch,
        AbortCode::DataTypeMismatchLengthHigh,
        AbortCode::DataTypeMismatchLengthLow,
        AbortCode::NoSuchSubIndex,
        AbortCode::InvalidValue,
        AbortCode::ValueTooHigh,
        AbortCode::ValueTooLow,
        AbortCode::ResourceNotAvailable,
        AbortCode::GeneralError,
        AbortCode::CantStore,
        AbortCode::CantStoreLocalControl,
        AbortCode::CantStoreDeviceState,
        AbortCode::NoObjectDict,
        AbortCode::NoData,
    ];

    /// A human readable description of the abort code
    pub fn description(&self) -> &'static str {
        match self {
            AbortCode::ToggleNotAlternated => "Toggle bit not alternated",
            AbortCode::SdoTimeout => "SDO protocol timed out",
            AbortCode::InvalidCommandSpecifier => "Command specifier not valid or unknown",
            AbortCode::OutOfMemory => "Out of memory",
            AbortCode::UnsupportedAccess => "Unsupported access to an object",
            AbortCode::WriteOnly => "Attempt to read a write only object",
            AbortCode::ReadOnly => "Attempt to write a read only object",
            AbortCode::NoSuchObject => "Object does not exist in the object dictionary",
            AbortCode::IncompatibleParameter => "General parameter incompatibility",
            AbortCode::HardwareError => "Access failed due to a hardware error",
            AbortCode::DataTypeMismatch => "Data type does not match, length does not match",
            AbortCode::DataTypeMismatchLengthHigh => "Data type does not match, length too high",
            AbortCode::DataTypeMismatchLengthLow => "Data type does not match, length too low",
            AbortCode::NoSuchSubIndex => "Sub-index does not exist",
            AbortCode::InvalidValue => "Invalid value for parameter",
            AbortCode::ValueTooHigh => "Value of parameter written too high",
            AbortCode::ValueTooLow => "Value of parameter written too low",
            AbortCode::ResourceNotAvailable => "Resource not available: SDO connection",
            AbortCode::GeneralError => "General error",
            AbortCode::CantStore => "Data cannot be transferred or stored to the application",
            AbortCode::CantStoreLocalControl => {
                "Data cannot be transferred or stored to the application because of local control"
            }
            AbortCode::CantStoreDeviceState => {
                "Data cannot be transferred or stored to the application because of the device state"
            }
            AbortCode::NoObjectDict => "Object dictionary not present",
            AbortCode::NoData => "No data available",
        }
    }
}

impl TryFrom<u32> for AbortCode {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        AbortCode::ALL
            .iter()
            .find(|code| **code as u32 == value)
            .copied()
            .ok_or(value)
    }
}

impl core::fmt::Display for AbortCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} (0x{:08X})", self.description(), *self as u32)
    }
}

/// Specifies the client command specifier (CCS) values in SDO request packets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientCommand {
    /// Send a download segment
    DownloadSegment = 0,
    /// Start a download
    InitiateDownload = 1,
    /// Start an upload
    InitiateUpload = 2,
    /// Request the next upload segment
    ReqUploadSegment = 3,
    /// Abort the transfer
    Abort = 4,
}

impl TryFrom<u8> for ClientCommand {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use ClientCommand::*;
        match value {
            0 => Ok(DownloadSegment),
            1 => Ok(InitiateDownload),
            2 => Ok(InitiateUpload),
            3 => Ok(ReqUploadSegment),
            4 => Ok(Abort),
            _ => Err(()),
        }
    }
}

/// An SDO request, sent by a client to a server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdoRequest {
    /// Start a download
    InitiateDownload {
        /// Number of unused bytes in data
        n: u8,
        /// Expedited
        e: bool,
        /// size valid
        s: bool,
        /// Object index
        index: u16,
        /// Object sub-index
        sub: u8,
        /// data (value on expedited, size when e=0 and s=1)
        data: [u8; 4],
    },
    /// One segment of a segmented download
    DownloadSegment {
        /// Toggle flag
        t: bool,
        /// Number of unused bytes in data
        n: u8,
        /// When set, indicates there are no more segments to be sent
        c: bool,
        /// Segment data
        data: [u8; 7],
    },
    /// Start an upload
    InitiateUpload {
        /// Object index
        index: u16,
        /// Object sub-index
        sub: u8,
    },
    /// Request the next upload segment
    ReqUploadSegment {
        /// Toggle flag
        t: bool,
    },
    /// Abort the transfer
    Abort {
        /// Object index
        index: u16,
        /// Object sub-index
        sub: u8,
        /// Reason for the abort
        abort_code: u32,
    },
}

fn write_address(payload: &mut [u8; 8], index: u16, sub: u8) {
    payload[1..3].copy_from_slice(&index.to_le_bytes());
    payload[3] = sub;
}

fn read_address(payload: &[u8]) -> (u16, u8) {
    (u16::from_le_bytes([payload[1], payload[2]]), payload[3])
}

impl SdoRequest {
    /// Create an abort message
    pub fn abort(index: u16, sub: u8, abort_code: AbortCode) -> Self {
        SdoRequest::Abort {
            index,
            sub,
            abort_code: abort_code as u32,
        }
    }

    /// Create an initiate download message for a segmented download
    pub fn initiate_download(index: u16, sub: u8, size: Option<u32>) -> Self {
        let data = size.unwrap_or(0).to_le_bytes();

        SdoRequest::InitiateDownload {
            n: 0,
            e: false,
            s: size.is_some(),
            index,
            sub,
            data,
        }
    }

    /// Create a download segment message
    ///
    /// `segment_data` must not be longer than 7 bytes
    pub fn download_segment(toggle: bool, last_segment: bool, segment_data: &[u8]) -> Self {
        let mut data = [0; 7];
        data[0..segment_data.len()].copy_from_slice(segment_data);
        SdoRequest::DownloadSegment {
            t: toggle,
            n: 7 - segment_data.len() as u8,
            c: last_segment,
            data,
        }
    }

    /// Create an expedited download message
    ///
    /// `data` must not be longer than 4 bytes
    pub fn expedited_download(index: u16, sub: u8, data: &[u8]) -> Self {
        let mut msg_data = [0; 4];
        msg_data[0..data.len()].copy_from_slice(data);

        SdoRequest::InitiateDownload {
            n: (4 - data.len()) as u8,
            e: true,
            s: true,
            index,
            sub,
            data: msg_data,
        }
    }

    /// Create an initiate upload message
    pub fn initiate_upload(index: u16, sub: u8) -> Self {
        SdoRequest::InitiateUpload { index, sub }
    }

    /// Create an upload segment request
    pub fn upload_segment_request(toggle: bool) -> Self {
        SdoRequest::ReqUploadSegment { t: toggle }
    }

    /// Serialize the request into an 8 byte CAN message
    pub fn to_can_message(self, id: CanId) -> CanMessage {
        let mut payload = [0; 8];

        match self {
            SdoRequest::InitiateDownload {
                n,
                e,
                s,
                index,
                sub,
                data,
            } => {
                payload[0] = (ClientCommand::InitiateDownload as u8) << 5
                    | ((n & 0x3) << 2)
                    | ((e as u8) << 1)
                    | s as u8;
                write_address(&mut payload, index, sub);
                payload[4..8].copy_from_slice(&data);
            }
            SdoRequest::DownloadSegment { t, n, c, data } => {
                payload[0] = (ClientCommand::DownloadSegment as u8) << 5
                    | (t as u8) << 4
                    | (n & 7) << 1
                    | (c as u8);

                payload[1..8].copy_from_slice(&data);
            }
            SdoRequest::InitiateUpload { index, sub } => {
                payload[0] = (ClientCommand::InitiateUpload as u8) << 5;
                write_address(&mut payload, index, sub);
            }
            SdoRequest::ReqUploadSegment { t } => {
                payload[0] = (ClientCommand::ReqUploadSegment as u8) << 5 | (t as u8) << 4;
            }
            SdoRequest::Abort {
                index,
                sub,
                abort_code,
            } => {
                payload[0] = (ClientCommand::Abort as u8) << 5;
                write_address(&mut payload, index, sub);
                payload[4..8].copy_from_slice(&abort_code.to_le_bytes());
            }
        }

        CanMessage::new(id, &payload)
    }
}

impl TryFrom<&[u8]> for SdoRequest {
    type Error = AbortCode;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() < 8 {
            return Err(AbortCode::DataTypeMismatchLengthLow);
        }
        let ccs: ClientCommand = (value[0] >> 5)
            .try_into()
            .map_err(|_| AbortCode::InvalidCommandSpecifier)?;

        match ccs {
            ClientCommand::DownloadSegment => {
                let t = (value[0] & (1 << 4)) != 0;
                let n = (value[0] >> 1) & 0x7;
                let c = (value[0] & (1 << 0)) != 0;
                let mut data = [0; 7];
                data.copy_from_slice(&value[1..8]);
                Ok(SdoRequest::DownloadSegment { t, n, c, data })
            }
            ClientCommand::InitiateDownload => {
                let n = (value[0] >> 2) & 0x3;
                let e = (value[0] & (1 << 1)) != 0;
                let s = (value[0] & (1 << 0)) != 0;
                let (index, sub) = read_address(value);
                let mut data = [0; 4];
                data.copy_from_slice(&value[4..8]);
                Ok(SdoRequest::InitiateDownload {
                    n,
                    e,
                    s,
                    index,
                    sub,
                    data,
                })
            }
            ClientCommand::InitiateUpload => {
                let (index, sub) = read_address(value);
                Ok(SdoRequest::InitiateUpload { index, sub })
            }
            ClientCommand::ReqUploadSegment => {
                let t = ((value[0] >> 4) & 1) != 0;
                Ok(SdoRequest::ReqUploadSegment { t })
            }
            ClientCommand::Abort => {
                let (index, sub) = read_address(value);
                let abort_code = u32::from_le_bytes([value[4], value[5], value[6], value[7]]);
                Ok(SdoRequest::Abort {
                    index,
                    sub,
                    abort_code,
                })
            }
        }
    }
}

/// An SDO response, sent by a server to a client
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SdoResponse {
    /// Response to an initiate upload
    ConfirmUpload {
        /// Number of unused bytes in data
        n: u8,
        /// Expedited flag
        e: bool,
        /// size flag
        s: bool,
        /// Object index
        index: u16,
        /// Object sub-index
        sub: u8,
        /// Value if e=1, or size if s=1
        data: [u8; 4],
    },
    /// One segment of a segmented upload
    UploadSegment {
        /// Toggle flag
        t: bool,
        /// Number of unused bytes in data
        n: u8,
        /// Set on the last segment
        c: bool,
        /// Segment data
        data: [u8; 7],
    },
    /// Acknowledge an initiate download
    ConfirmDownload {
        /// Object index
        index: u16,
        /// Object sub-index
        sub: u8,
    },
    /// Acknowledge a download segment
    ConfirmDownloadSegment {
        /// Toggle flag
        t: bool,
    },
    /// The server aborted the transfer
    Abort {
        /// Object index
        index: u16,
        /// Object sub-index
        sub: u8,
        /// Reason for the abort
        abort_code: u32,
    },
}

/// Returned when a CAN message cannot be interpreted as an SDO response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MalformedSdoResponse;

impl TryFrom<CanMessage> for SdoResponse {
    type Error = MalformedSdoResponse;

    fn try_from(msg: CanMessage) -> Result<Self, Self::Error> {
        let data = msg.data();
        if data.len() < 8 {
            return Err(MalformedSdoResponse);
        }

        let command: ServerCommand = (data[0] >> 5).try_into().map_err(|_| MalformedSdoResponse)?;
        match command {
            ServerCommand::SegmentUpload => {
                let t = (data[0] & (1 << 4)) != 0;
                let n = (data[0] >> 1) & 7;
                let c = (data[0] & (1 << 0)) != 0;
                let mut buf = [0; 7];
                buf.copy_from_slice(&data[1..8]);
                Ok(SdoResponse::UploadSegment { t, n, c, data: buf })
            }
            ServerCommand::SegmentDownload => {
                let t = (data[0] & (1 << 4)) != 0;
                Ok(SdoResponse::ConfirmDownloadSegment { t })
            }
            ServerCommand::Upload => {
                let n = (data[0] >> 2) & 0x3;
                let e = (data[0] & (1 << 1)) != 0;
                let s = (data[0] & (1 << 0)) != 0;
                let (index, sub) = read_address(data);
                let mut buf = [0; 4];
                buf.copy_from_slice(&data[4..8]);
                Ok(SdoResponse::ConfirmUpload {
                    n,
                    e,
                    s,
                    index,
                    sub,
                    data: buf,
                })
            }
            ServerCommand::Download => {
                let (index, sub) = read_address(data);
                Ok(SdoResponse::ConfirmDownload { index, sub })
            }
            ServerCommand::Abort => {
                let (index, sub) = read_address(data);
                let abort_code = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
                Ok(SdoResponse::Abort {
                    index,
                    sub,
                    abort_code,
                })
            }
        }
    }
}

impl SdoResponse {
    /// Create an expedited upload response
    ///
    /// `data` must not be longer than 4 bytes
    pub fn expedited_upload(index: u16, sub: u8, data: &[u8]) -> SdoResponse {
        let mut msg_data = [0; 4];
        msg_data[0..data.len()].copy_from_slice(data);

        SdoResponse::ConfirmUpload {
            index,
            sub,
            e: true,
            s: true,
            n: 4 - data.len() as u8,
            data: msg_data,
        }
    }

    /// Create a response to start a segmented upload of `size` bytes
    pub fn upload_acknowledge(index: u16, sub: u8, size: u32) -> SdoResponse {
        SdoResponse::ConfirmUpload {
            n: 0,
            e: false,
            s: true,
            index,
            sub,
            data: size.to_le_bytes(),
        }
    }

    /// Create an upload segment
    ///
    /// `data` must not be longer than 7 bytes
    pub fn upload_segment(t: bool, c: bool, data: &[u8]) -> SdoResponse {
        let n = (7 - data.len()) as u8;
        let mut buf = [0; 7];
        buf[0..data.len()].copy_from_slice(data);
        SdoResponse::UploadSegment { t, n, c, data: buf }
    }

    /// Create a download acknowledge
    pub fn download_acknowledge(index: u16, sub: u8) -> SdoResponse {
        SdoResponse::ConfirmDownload { index, sub }
    }

    /// Create a download segment acknowledge
    pub fn download_segment_acknowledge(t: bool) -> SdoResponse {
        SdoResponse::ConfirmDownloadSegment { t }
    }

    /// Create an abort response
    pub fn abort(index: u16, sub: u8, abort_code: AbortCode) -> SdoResponse {
        let abort_code = abort_code as u32;
        SdoResponse::Abort {
            index,
            sub,
            abort_code,
        }
    }

    /// Serialize the response into an 8 byte CAN message
    pub fn to_can_message(self, id: CanId) -> CanMessage {
        let mut payload = [0; 8];

        match self {
            SdoResponse::ConfirmUpload {
                n,
                e,
                s,
                index,
                sub,
                data,
            } => {
                payload[0] = (ServerCommand::Upload as u8) << 5
                    | ((n & 0x3) << 2)
                    | ((e as u8) << 1)
                    | (s as u8);
                write_address(&mut payload, index, sub);
                payload[4..8].copy_from_slice(&data);
            }
            SdoResponse::ConfirmDownload { index, sub } => {
                payload[0] = (ServerCommand::Download as u8) << 5;
                write_address(&mut payload, index, sub);
            }
            SdoResponse::UploadSegment { t, n, c, data } => {
                payload[0] = (ServerCommand::SegmentUpload as u8) << 5
                    | (t as u8) << 4
                    | (n & 7) << 1
                    | c as u8;
                payload[1..8].copy_from_slice(&data);
            }
            SdoResponse::Abort {
                index,
                sub,
                abort_code,
            } => {
                payload[0] = (ServerCommand::Abort as u8) << 5;
                write_address(&mut payload, index, sub);
                payload[4..8].copy_from_slice(&abort_code.to_le_bytes());
            }
            SdoResponse::ConfirmDownloadSegment { t } => {
                payload[0] = (ServerCommand::SegmentDownload as u8) << 5 | (t as u8) << 4;
            }
        }
        CanMessage::new(id, &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expedited_download_frame() {
        let msg = SdoRequest::expedited_download(0x2000, 1, &[0x64, 0x00])
            .to_can_message(CanId::Std(0x605));
        // ccs=1, n=2, e=1, s=1
        assert_eq!(&[0x2B, 0x00, 0x20, 0x01, 0x64, 0x00, 0x00, 0x00], msg.data());

        let parsed = SdoRequest::try_from(msg.data()).unwrap();
        assert_eq!(
            SdoRequest::InitiateDownload {
                n: 2,
                e: true,
                s: true,
                index: 0x2000,
                sub: 1,
                data: [0x64, 0, 0, 0]
            },
            parsed
        );
    }

    #[test]
    fn test_initiate_upload_frame() {
        let msg = SdoRequest::initiate_upload(0x1000, 0).to_can_message(CanId::Std(0x601));
        assert_eq!(&[0x40, 0x00, 0x10, 0x00, 0, 0, 0, 0], msg.data());
    }

    #[test]
    fn test_abort_response_parse() {
        let msg = SdoResponse::abort(0x1017, 0, AbortCode::NoSuchObject)
            .to_can_message(CanId::Std(0x581));
        assert_eq!(&[0x80, 0x17, 0x10, 0x00, 0x00, 0x00, 0x02, 0x06], msg.data());
        assert_eq!(
            Ok(SdoResponse::Abort {
                index: 0x1017,
                sub: 0,
                abort_code: 0x0602_0000
            }),
            SdoResponse::try_from(msg)
        );
    }

    #[test]
    fn test_short_response_is_malformed() {
        let msg = CanMessage::new(CanId::Std(0x581), &[0x60, 0x00]);
        assert_eq!(Err(MalformedSdoResponse), SdoResponse::try_from(msg));
    }

    #[test]
    fn test_abort_code_lookup() {
        assert_eq!(Ok(AbortCode::ReadOnly), AbortCode::try_from(0x0601_0002));
        assert_eq!(Err(0x1234), AbortCode::try_from(0x1234));
        assert_eq!(
            "Attempt to write a read only object (0x06010002)",
            AbortCode::ReadOnly.to_string()
        );
    }
}
