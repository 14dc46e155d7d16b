//! Read and write transactions on single objects
//!
//! A write parses and encodes its value completely before anything is sent, so a malformed
//! request is never partially transmitted. Failures reported by the device or the transport are
//! returned as [`TransactionError::Remote`], carrying the underlying error text.
use sdolink_common::{
    codec::{self, CodecError, Representation},
    objects::{ObjectDescriptor, ObjectId},
    AsyncCanReceiver, AsyncCanSender,
};
use snafu::Snafu;

use crate::sdo_client::SdoClient;

/// The direction of a transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Host to device
    Send,
    /// Device to host
    Read,
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Operation::Send => f.write_str("Send"),
            Operation::Read => f.write_str("Read"),
        }
    }
}

/// Error returned by a read or write transaction
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TransactionError {
    /// The session has no open transport
    #[snafu(display("Not connected to a bus"))]
    NotConnected,
    /// No device has been selected
    #[snafu(display("No active device"))]
    NoActiveDevice,
    /// The value to write is not an integer literal
    #[snafu(display("Send {object} failed with error 'invalid literal {text:?}'"))]
    InvalidLiteral {
        /// The object being written
        object: ObjectId,
        /// The rejected text
        text: String,
    },
    /// The object's width is not a whole number of bytes
    #[snafu(display(
        "{operation} {object} failed with error 'bit width {bit_width} is not a multiple of 8'"
    ))]
    InvalidWidth {
        /// The transaction direction
        operation: Operation,
        /// The object being transacted
        object: ObjectId,
        /// The object's width
        bit_width: usize,
    },
    /// The value does not fit the object's width
    #[snafu(display(
        "Send {object} failed with error 'value {value} does not fit in {bit_width} bits'"
    ))]
    ValueOutOfRange {
        /// The object being written
        object: ObjectId,
        /// The value
        value: i128,
        /// The object's width
        bit_width: usize,
    },
    /// The device or the transport failed the transaction
    #[snafu(display("{operation} {object} failed with error '{description}'"))]
    Remote {
        /// The transaction direction
        operation: Operation,
        /// The object being transacted
        object: ObjectId,
        /// The underlying failure
        description: String,
    },
}

impl TransactionError {
    fn from_codec(operation: Operation, object: ObjectId, err: CodecError) -> Self {
        match err {
            CodecError::InvalidLiteral { text } => Self::InvalidLiteral { object, text },
            CodecError::InvalidWidth { bit_width } => Self::InvalidWidth {
                operation,
                object,
                bit_width,
            },
            CodecError::ValueOutOfRange { value, bit_width } => Self::ValueOutOfRange {
                object,
                value,
                bit_width,
            },
        }
    }
}

/// The result of a successful write
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionReport {
    /// The object written
    pub object: ObjectId,
    /// The value written
    pub value: i128,
    /// The bytes sent
    pub bytes: Vec<u8>,
}

impl core::fmt::Display for TransactionReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Send {}, data: {} {} {}",
            self.object,
            self.value,
            codec::format_signed_hex(self.value),
            codec::format_signed_binary(self.value)
        )
    }
}

/// The result of a successful read
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadReport {
    /// The object read
    pub object: ObjectId,
    /// The rendered value
    pub value: String,
    /// The bytes received
    pub bytes: Vec<u8>,
}

impl core::fmt::Display for ReadReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Read {}, received {}", self.object, self.value)
    }
}

/// Parse and encode a write request without sending anything
pub fn prepare_write(
    descriptor: &ObjectDescriptor,
    literal: &str,
) -> Result<(i128, Vec<u8>), TransactionError> {
    let object = descriptor.id();
    let to_err = |e| TransactionError::from_codec(Operation::Send, object, e);
    // Width is checked before the literal, so an unusable object is reported as such
    codec::byte_len(descriptor.bit_width).map_err(to_err)?;
    let value = codec::parse_int_literal(literal).map_err(to_err)?;
    let bytes = codec::encode(value, descriptor.bit_width).map_err(to_err)?;
    Ok((value, bytes))
}

/// Write a literal value to an object
pub async fn write<S, R>(
    client: &mut SdoClient<S, R>,
    descriptor: &ObjectDescriptor,
    literal: &str,
) -> Result<TransactionReport, TransactionError>
where
    S: AsyncCanSender,
    R: AsyncCanReceiver,
{
    let object = descriptor.id();
    let (value, bytes) = prepare_write(descriptor, literal)?;

    match client.download(descriptor.index, descriptor.sub, &bytes).await {
        Ok(()) => {
            let report = TransactionReport {
                object,
                value,
                bytes,
            };
            log::info!("{report}");
            Ok(report)
        }
        Err(e) => {
            log::warn!("Write to {object} failed: {e}");
            RemoteSnafu {
                operation: Operation::Send,
                object,
                description: e.to_string(),
            }
            .fail()
        }
    }
}

/// Read an object, rendering the value as requested
///
/// The received bytes are always interpreted as an unsigned little-endian integer.
pub async fn read<S, R>(
    client: &mut SdoClient<S, R>,
    descriptor: &ObjectDescriptor,
    representation: Representation,
) -> Result<ReadReport, TransactionError>
where
    S: AsyncCanSender,
    R: AsyncCanReceiver,
{
    let object = descriptor.id();
    match client.upload(descriptor.index, descriptor.sub).await {
        Ok(bytes) => {
            let report = ReadReport {
                object,
                value: codec::render(&bytes, representation),
                bytes,
            };
            log::info!("{report}");
            Ok(report)
        }
        Err(e) => {
            log::warn!("Read of {object} failed: {e}");
            RemoteSnafu {
                operation: Operation::Read,
                object,
                description: e.to_string(),
            }
            .fail()
        }
    }
}

#[cfg(test)]
mod tests {
    use sdolink_common::objects::{AccessType, DataType};

    use super::*;

    fn descriptor(bit_width: usize) -> ObjectDescriptor {
        ObjectDescriptor {
            index: 0x2000,
            sub: 0,
            bit_width,
            name: "Setpoint".into(),
            data_type: DataType::UInt16,
            access_type: AccessType::Rw,
        }
    }

    #[test]
    fn test_prepare_write() {
        assert_eq!(Ok((100, vec![0x64, 0x00])), prepare_write(&descriptor(16), "100"));
        assert_eq!(Ok((-1, vec![0xFF])), prepare_write(&descriptor(8), "-1"));
        assert_eq!(Ok((5, vec![5, 0, 0, 0])), prepare_write(&descriptor(32), "0b101"));
    }

    #[test]
    fn test_prepare_write_errors() {
        let object = ObjectId::new(0x2000, 0);
        assert_eq!(
            Err(TransactionError::InvalidWidth {
                operation: Operation::Send,
                object,
                bit_width: 12
            }),
            prepare_write(&descriptor(12), "1")
        );
        assert_eq!(
            Err(TransactionError::ValueOutOfRange {
                object,
                value: 256,
                bit_width: 8
            }),
            prepare_write(&descriptor(8), "256")
        );
        assert_eq!(
            Err(TransactionError::InvalidLiteral {
                object,
                text: "2*3".into()
            }),
            prepare_write(&descriptor(8), "2*3")
        );
    }

    #[test]
    fn test_report_display() {
        let report = TransactionReport {
            object: ObjectId::new(0x2000, 0),
            value: 100,
            bytes: vec![0x64, 0x00],
        };
        assert_eq!("Send 0x2000.0x0, data: 100 0x64 0b1100100", report.to_string());

        let report = TransactionReport {
            object: ObjectId::new(0x2000, 0),
            value: -1,
            bytes: vec![0xFF],
        };
        assert_eq!("Send 0x2000.0x0, data: -1 -0x1 -0b1", report.to_string());

        let read = ReadReport {
            object: ObjectId::new(0x2000, 0),
            value: "0x64".into(),
            bytes: vec![0x64, 0x00],
        };
        assert_eq!("Read 0x2000.0x0, received 0x64", read.to_string());
    }

    #[test]
    fn test_remote_error_display() {
        let err = TransactionError::Remote {
            operation: Operation::Read,
            object: ObjectId::new(0x2000, 1),
            description: "No response from SDO server".into(),
        };
        assert_eq!(
            "Read 0x2000.0x1 failed with error 'No response from SDO server'",
            err.to_string()
        );
    }
}
