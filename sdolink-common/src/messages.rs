//! CAN frames and the protocol messages carried in them
//!
use snafu::Snafu;

use crate::sdo::{SdoRequest, SdoResponse};

/// A CAN identifier, either 11-bit standard or 29-bit extended
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CanId {
    /// An extended 29-bit ID
    Extended(u32),
    /// A standard 11-bit ID
    Std(u16),
}

impl CanId {
    /// Create an extended ID
    pub const fn extended(id: u32) -> CanId {
        CanId::Extended(id)
    }

    /// Create a standard ID
    pub const fn std(id: u16) -> CanId {
        CanId::Std(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u32 {
        match self {
            CanId::Extended(id) => *id,
            CanId::Std(id) => *id as u32,
        }
    }

    /// True if this is an extended ID
    pub fn is_extended(&self) -> bool {
        match self {
            CanId::Extended(_) => true,
            CanId::Std(_) => false,
        }
    }
}

const MAX_DATA_LENGTH: usize = 8;

/// A classic CAN data frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanMessage {
    /// Frame payload; only the first `dlc` bytes are valid
    pub data: [u8; MAX_DATA_LENGTH],
    /// Data length code
    pub dlc: u8,
    /// Frame ID
    pub id: CanId,
}

impl Default for CanMessage {
    fn default() -> Self {
        Self {
            data: [0; MAX_DATA_LENGTH],
            dlc: 0,
            id: CanId::Std(0),
        }
    }
}

impl CanMessage {
    /// Create a new message
    ///
    /// Data beyond 8 bytes is truncated
    pub fn new(id: CanId, data: &[u8]) -> Self {
        let dlc = data.len().min(MAX_DATA_LENGTH);
        let mut buf = [0u8; MAX_DATA_LENGTH];
        buf[0..dlc].copy_from_slice(&data[0..dlc]);

        Self {
            id,
            dlc: dlc as u8,
            data: buf,
        }
    }

    /// Get the message ID
    pub fn id(&self) -> CanId {
        self.id
    }

    /// Get the valid payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data[0..self.dlc as usize]
    }
}

/// The NMT command specifier
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum NmtCommandCmd {
    /// Move to the Operational state
    Start = 1,
    /// Move to the Stopped state
    Stop = 2,
    /// Move to the PreOperational state
    EnterPreOp = 128,
    /// Reset the application
    ResetApp = 129,
    /// Reset communications
    ResetComm = 130,
}

impl NmtCommandCmd {
    /// Parse a command specifier byte
    pub fn from_byte(b: u8) -> Result<Self, MessageError> {
        match b {
            1 => Ok(Self::Start),
            2 => Ok(Self::Stop),
            128 => Ok(Self::EnterPreOp),
            129 => Ok(Self::ResetApp),
            130 => Ok(Self::ResetComm),
            _ => Err(MessageError::InvalidField),
        }
    }
}

/// COB-ID of NMT commands
pub const NMT_CMD_ID: CanId = CanId::Std(0);
/// Base COB-ID for heartbeat and boot-up messages (node ID is added)
pub const HEARTBEAT_ID: u16 = 0x700;
/// Base COB-ID for emergency messages (node ID is added)
pub const EMCY_BASE: u16 = 0x80;
/// The default base ID for sending SDO requests (server node ID is added)
pub const SDO_REQ_BASE: u16 = 0x600;
/// The default base ID for sending SDO responses (server node ID is added)
pub const SDO_RESP_BASE: u16 = 0x580;
/// Default base COB-IDs of the four transmit PDOs (node ID is added)
pub const TPDO_BASES: [u16; 4] = [0x180, 0x280, 0x380, 0x480];

/// An NMT command addressed to one node, or to all nodes when `node` is 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NmtCommand {
    /// The command
    pub cmd: NmtCommandCmd,
    /// The target node, 0 to broadcast
    pub node: u8,
}

impl TryFrom<CanMessage> for NmtCommand {
    type Error = MessageError;

    fn try_from(msg: CanMessage) -> Result<Self, Self::Error> {
        let payload = msg.data();
        if msg.id() != NMT_CMD_ID {
            Err(MessageError::UnexpectedId {
                cob_id: msg.id(),
                expected: NMT_CMD_ID,
            })
        } else if payload.len() >= 2 {
            let cmd = NmtCommandCmd::from_byte(payload[0])?;
            let node = payload[1];
            Ok(NmtCommand { cmd, node })
        } else {
            Err(MessageError::MessageTooShort)
        }
    }
}

impl From<NmtCommand> for CanMessage {
    fn from(cmd: NmtCommand) -> Self {
        let mut msg = CanMessage {
            id: NMT_CMD_ID,
            dlc: 2,
            ..Default::default()
        };
        msg.data[0] = cmd.cmd as u8;
        msg.data[1] = cmd.node;
        msg
    }
}

/// The NMT state of a node, as reported in its heartbeat
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum NmtState {
    /// Boot-up
    Bootup = 0,
    /// Stopped
    Stopped = 4,
    /// Operational
    Operational = 5,
    /// Pre-operational
    PreOperational = 127,
}

impl core::fmt::Display for NmtState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NmtState::Bootup => write!(f, "Bootup"),
            NmtState::Stopped => write!(f, "Stopped"),
            NmtState::Operational => write!(f, "Operational"),
            NmtState::PreOperational => write!(f, "PreOperational"),
        }
    }
}

/// Returned when a byte does not hold a valid NMT state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidNmtStateError(u8);

impl TryFrom<u8> for NmtState {
    type Error = InvalidNmtStateError;

    /// Attempt to convert a u8 to an NmtState enum
    ///
    /// Fails with InvalidNmtStateError if value is not a valid state
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use NmtState::*;
        match value {
            x if x == Bootup as u8 => Ok(Bootup),
            x if x == Stopped as u8 => Ok(Stopped),
            x if x == Operational as u8 => Ok(Operational),
            x if x == PreOperational as u8 => Ok(PreOperational),
            _ => Err(InvalidNmtStateError(value)),
        }
    }
}

/// A heartbeat (or boot-up) message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// The producing node
    pub node: u8,
    /// Toggle bit
    pub toggle: bool,
    /// The node's current state
    pub state: NmtState,
}

impl From<Heartbeat> for CanMessage {
    fn from(value: Heartbeat) -> Self {
        let mut msg = CanMessage {
            id: CanId::Std(HEARTBEAT_ID | value.node as u16),
            dlc: 1,
            ..Default::default()
        };
        msg.data[0] = value.state as u8;
        if value.toggle {
            msg.data[0] |= 1 << 7;
        }
        msg
    }
}

/// Get the node ID of a message which is sent by a node about itself
///
/// These are the messages which reveal the presence of a node during discovery: SDO responses,
/// heartbeats/boot-ups, emergencies and default TPDOs. Returns None for anything else, including
/// node ID 0.
pub fn producer_node_id(id: CanId) -> Option<u8> {
    let CanId::Std(raw) = id else {
        return None;
    };
    let function = raw & 0x780;
    let node = (raw & 0x7f) as u8;
    if node == 0 {
        return None;
    }
    let known = function == SDO_RESP_BASE
        || function == HEARTBEAT_ID
        || function == EMCY_BASE
        || TPDO_BASES.contains(&function);
    if known {
        Some(node)
    } else {
        None
    }
}

/// A message parsed into one of the types understood by sdolink
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BusMessage {
    /// An NMT command
    NmtCommand(NmtCommand),
    /// A heartbeat or boot-up message
    Heartbeat(Heartbeat),
    /// A request to an SDO server
    SdoRequest(SdoRequest),
    /// A response from an SDO server
    SdoResponse(SdoResponse),
}

impl TryFrom<CanMessage> for BusMessage {
    type Error = MessageError;

    fn try_from(msg: CanMessage) -> Result<Self, Self::Error> {
        let cob_id = msg.id();
        if cob_id == NMT_CMD_ID {
            Ok(BusMessage::NmtCommand(msg.try_into()?))
        } else if cob_id.raw() & !0x7f == HEARTBEAT_ID as u32 {
            let node = (cob_id.raw() & 0x7f) as u8;
            let first = *msg.data().first().ok_or(MessageError::MessageTooShort)?;
            let toggle = (first & (1 << 7)) != 0;
            let state: NmtState = (first & 0x7f)
                .try_into()
                .map_err(|e: InvalidNmtStateError| MessageError::InvalidNmtState { value: e.0 })?;
            Ok(BusMessage::Heartbeat(Heartbeat {
                node,
                toggle,
                state,
            }))
        } else if cob_id.raw() & !0x7f == SDO_RESP_BASE as u32 {
            let resp: SdoResponse = msg
                .try_into()
                .map_err(|_| MessageError::MalformedMsg { cob_id })?;
            Ok(BusMessage::SdoResponse(resp))
        } else if cob_id.raw() & !0x7f == SDO_REQ_BASE as u32 {
            let req: SdoRequest = msg
                .data()
                .try_into()
                .map_err(|_| MessageError::MalformedMsg { cob_id })?;
            Ok(BusMessage::SdoRequest(req))
        } else {
            Err(MessageError::UnrecognizedId { cob_id })
        }
    }
}

/// Errors which occur when interpreting a CAN frame
#[derive(Debug, Clone, Copy, PartialEq, Snafu)]
pub enum MessageError {
    /// The payload is shorter than the message requires
    MessageTooShort,
    /// The payload could not be interpreted
    #[snafu(display("Malformed message with ID {cob_id:?}"))]
    MalformedMsg {
        /// ID of the offending message
        cob_id: CanId,
    },
    /// The message ID was not the expected value
    #[snafu(display("Unexpected message ID found: {cob_id:?}, expected: {expected:?}"))]
    UnexpectedId {
        /// The ID received
        cob_id: CanId,
        /// The ID expected
        expected: CanId,
    },
    /// A field holds a value which is not allowed
    InvalidField,
    /// The message ID does not belong to a known message type
    #[snafu(display("Unrecognized message ID {cob_id:?}"))]
    UnrecognizedId {
        /// ID of the offending message
        cob_id: CanId,
    },
    /// The NMT state integer in the message is not a valid NMT state
    #[snafu(display("Invalid NMT state {value}"))]
    InvalidNmtState {
        /// The value found
        value: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nmt_command_frame() {
        let msg: CanMessage = NmtCommand {
            cmd: NmtCommandCmd::Start,
            node: 5,
        }
        .into();
        assert_eq!(NMT_CMD_ID, msg.id());
        assert_eq!(&[1, 5], msg.data());

        let parsed = NmtCommand::try_from(msg).unwrap();
        assert_eq!(NmtCommandCmd::Start, parsed.cmd);
        assert_eq!(5, parsed.node);
    }

    #[test]
    fn test_heartbeat_parse() {
        let msg: CanMessage = Heartbeat {
            node: 3,
            toggle: true,
            state: NmtState::Operational,
        }
        .into();
        assert_eq!(CanId::Std(0x703), msg.id());
        match BusMessage::try_from(msg).unwrap() {
            BusMessage::Heartbeat(hb) => {
                assert_eq!(3, hb.node);
                assert!(hb.toggle);
                assert_eq!(NmtState::Operational, hb.state);
            }
            other => panic!("Unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_producer_node_id() {
        assert_eq!(Some(4), producer_node_id(CanId::Std(0x584)));
        assert_eq!(Some(4), producer_node_id(CanId::Std(0x704)));
        assert_eq!(Some(9), producer_node_id(CanId::Std(0x89)));
        assert_eq!(Some(9), producer_node_id(CanId::Std(0x289)));
        // SDO requests are sent by the client, not the node
        assert_eq!(None, producer_node_id(CanId::Std(0x604)));
        assert_eq!(None, producer_node_id(CanId::Std(0x580)));
        assert_eq!(None, producer_node_id(CanId::Std(0x80)));
        assert_eq!(None, producer_node_id(CanId::Extended(0x584)));
    }
}
