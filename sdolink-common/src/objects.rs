//! Object Definitions
//!
use serde::Deserialize;

/// A container for the address of a subobject
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId {
    /// Object index
    pub index: u16,
    /// Sub index
    pub sub: u8,
}

impl ObjectId {
    /// Create a new object ID
    pub const fn new(index: u16, sub: u8) -> Self {
        Self { index, sub }
    }
}

impl core::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#x}.{:#x}", self.index, self.sub)
    }
}

/// Object Code value
///
/// Defines the type of an object or sub object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ObjectCode {
    /// An object which has a single sub object
    #[default]
    Var = 7,
    /// An array of sub-objects all with the same data type
    Array = 8,
    /// A collection of sub-objects with varying types
    Record = 9,
}

/// Access type enum
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    /// Read-only
    #[default]
    Ro,
    /// Write-only
    Wo,
    /// Read-write
    Rw,
    /// Read-write, mapped on receive PDOs
    Rwr,
    /// Read-write, mapped on transmit PDOs
    Rww,
    /// Read-only, and also will never be changed, even internally by the device
    Const,
}

impl AccessType {
    /// Returns true if an object with this access type can be read
    pub fn is_readable(&self) -> bool {
        matches!(
            self,
            AccessType::Ro | AccessType::Rw | AccessType::Rwr | AccessType::Rww | AccessType::Const
        )
    }

    /// Returns true if an object with this access type can be written
    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            AccessType::Rw | AccessType::Rwr | AccessType::Rww | AccessType::Wo
        )
    }
}

/// Indicate the type of data stored in an object
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "u16")]
#[repr(u16)]
#[allow(missing_docs)]
pub enum DataType {
    Boolean = 1,
    #[default]
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    UInt8 = 5,
    UInt16 = 6,
    UInt32 = 7,
    Real32 = 8,
    VisibleString = 9,
    OctetString = 0xa,
    UnicodeString = 0xb,
    TimeOfDay = 0xc,
    TimeDifference = 0xd,
    Domain = 0xf,
    Real64 = 0x11,
    Int64 = 0x15,
    UInt64 = 0x1b,
    Other(u16),
}

impl From<u16> for DataType {
    fn from(value: u16) -> Self {
        use DataType::*;
        match value {
            1 => Boolean,
            2 => Int8,
            3 => Int16,
            4 => Int32,
            5 => UInt8,
            6 => UInt16,
            7 => UInt32,
            8 => Real32,
            9 => VisibleString,
            0xa => OctetString,
            0xb => UnicodeString,
            0xc => TimeOfDay,
            0xd => TimeDifference,
            0xf => Domain,
            0x11 => Real64,
            0x15 => Int64,
            0x1b => UInt64,
            _ => Other(value),
        }
    }
}

impl DataType {
    /// Get the numeric data type code
    pub fn code(&self) -> u16 {
        use DataType::*;
        match self {
            Boolean => 1,
            Int8 => 2,
            Int16 => 3,
            Int32 => 4,
            UInt8 => 5,
            UInt16 => 6,
            UInt32 => 7,
            Real32 => 8,
            VisibleString => 9,
            OctetString => 0xa,
            UnicodeString => 0xb,
            TimeOfDay => 0xc,
            TimeDifference => 0xd,
            Domain => 0xf,
            Real64 => 0x11,
            Int64 => 0x15,
            UInt64 => 0x1b,
            Other(code) => *code,
        }
    }

    /// Returns true if data type is one of the string types
    pub fn is_str(&self) -> bool {
        matches!(
            self,
            Self::VisibleString | Self::OctetString | Self::UnicodeString
        )
    }

    /// The size of a value of this type, in bits
    ///
    /// Returns None for variable length types, and for codes which are not known
    pub fn bit_width(&self) -> Option<usize> {
        use DataType::*;
        match self {
            // Booleans occupy a full byte in SDO transfers
            Boolean | Int8 | UInt8 => Some(8),
            Int16 | UInt16 => Some(16),
            Int32 | UInt32 | Real32 => Some(32),
            TimeOfDay | TimeDifference => Some(48),
            Int64 | UInt64 | Real64 => Some(64),
            VisibleString | OctetString | UnicodeString | Domain | Other(_) => None,
        }
    }

    /// The display name of the data type
    ///
    /// Names are resolved from a fixed table of data type codes; codes not in the table are
    /// "Unknown".
    pub fn type_name(&self) -> &'static str {
        match self.code() {
            0x01 => "Boolean",
            0x02..=0x04 => "Integer",
            0x05..=0x07 => "Unsigned Integer",
            0x08 => "Float",
            0x09 => "String",
            0x0A => "Octet String",
            0x0B => "Date",
            0x0C => "Time of Day",
            0x0D => "Time Difference",
            0x0E => "Bit String",
            0x0F => "Domain",
            0x20 => "PDO CommPar",
            0x21 => "PDO Mapping",
            0x22 => "SDO Parameter",
            _ => "Unknown",
        }
    }
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Identifies one addressable sub object on a device, and everything needed to transact with it
///
/// Descriptors are plain values, produced by classifying an object dictionary, and consumed by
/// read and write transactions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectDescriptor {
    /// Object index
    pub index: u16,
    /// Sub index
    pub sub: u8,
    /// The width, in bits, used to size write transactions
    pub bit_width: usize,
    /// Display name
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Access rights
    pub access_type: AccessType,
}

impl ObjectDescriptor {
    /// Get the object address
    pub fn id(&self) -> ObjectId {
        ObjectId::new(self.index, self.sub)
    }

    /// The label shown to users for this object
    ///
    /// e.g. `0x1017.0x0: Producer Heartbeat Time, Unsigned Integer, 16-bit`
    pub fn label(&self) -> String {
        format!(
            "{}: {}, {}, {}-bit",
            self.id(),
            self.name,
            self.data_type.type_name(),
            self.bit_width
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!("Boolean", DataType::Boolean.type_name());
        assert_eq!("Integer", DataType::Int8.type_name());
        assert_eq!("Integer", DataType::Int16.type_name());
        assert_eq!("Integer", DataType::Int32.type_name());
        assert_eq!("Unsigned Integer", DataType::UInt8.type_name());
        assert_eq!("Unsigned Integer", DataType::UInt16.type_name());
        assert_eq!("Unsigned Integer", DataType::UInt32.type_name());
        assert_eq!("Octet String", DataType::OctetString.type_name());
        assert_eq!("Date", DataType::UnicodeString.type_name());
        assert_eq!("Time of Day", DataType::from(0x0C).type_name());
        assert_eq!("PDO Mapping", DataType::from(0x21).type_name());
        assert_eq!("Unknown", DataType::Int64.type_name());
        assert_eq!("Unknown", DataType::from(0x99).type_name());
    }

    #[test]
    fn test_data_type_code_round_trip() {
        for code in 0..0x30u16 {
            assert_eq!(code, DataType::from(code).code());
        }
    }

    #[test]
    fn test_access_routing_flags() {
        assert!(AccessType::Rww.is_readable() && AccessType::Rww.is_writable());
        assert!(AccessType::Const.is_readable() && !AccessType::Const.is_writable());
        assert!(!AccessType::Wo.is_readable() && AccessType::Wo.is_writable());
    }

    #[test]
    fn test_descriptor_label() {
        let desc = ObjectDescriptor {
            index: 0x1017,
            sub: 0,
            bit_width: 16,
            name: "Producer Heartbeat Time".into(),
            data_type: DataType::UInt16,
            access_type: AccessType::Rw,
        };
        assert_eq!(
            "0x1017.0x0: Producer Heartbeat Time, Unsigned Integer, 16-bit",
            desc.label()
        );
    }
}
