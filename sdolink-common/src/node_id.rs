//! Node ID type

/// The node ID of a device on the bus
///
/// A device which can be addressed by SDO and NMT commands must have an ID between 1 and 127.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u8);

impl NodeId {
    /// The lowest valid node ID
    pub const MIN: u8 = 1;
    /// The highest valid node ID
    pub const MAX: u8 = 127;

    /// Create a new node ID, checking that the value is in range
    pub const fn new(value: u8) -> Result<Self, InvalidNodeIdError> {
        if value >= Self::MIN && value <= Self::MAX {
            Ok(NodeId(value))
        } else {
            Err(InvalidNodeIdError(value))
        }
    }

    /// Get the node ID as a u8
    pub const fn raw(&self) -> u8 {
        self.0
    }

    /// Iterate over every valid node ID
    pub fn all() -> impl Iterator<Item = NodeId> {
        (Self::MIN..=Self::MAX).map(NodeId)
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when converting an out of range value to a [`NodeId`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidNodeIdError(pub u8);

impl core::fmt::Display for InvalidNodeIdError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Invalid node ID {}, must be between 1 and 127", self.0)
    }
}
impl core::error::Error for InvalidNodeIdError {}

impl TryFrom<u8> for NodeId {
    type Error = InvalidNodeIdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        NodeId::new(value)
    }
}

impl From<NodeId> for u8 {
    fn from(value: NodeId) -> Self {
        value.raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_range() {
        assert_eq!(Err(InvalidNodeIdError(0)), NodeId::new(0));
        assert_eq!(1, NodeId::new(1).unwrap().raw());
        assert_eq!(127, NodeId::new(127).unwrap().raw());
        assert!(NodeId::try_from(128).is_err());
        assert!(NodeId::try_from(255).is_err());
        assert_eq!(127, NodeId::all().count());
    }
}
