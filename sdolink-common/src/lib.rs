//! Common functionality shared among other sdolink crates.
//!
//! Most users will have no reason to depend on this crate directly, as it is re-exported by
//! `sdolink-client`.
//!
//! It contains:
//!
//! - CAN frame types and the async [sender](traits::AsyncCanSender) /
//!   [receiver](traits::AsyncCanReceiver) traits a bus transport must implement
//! - NMT and SDO message framing
//! - Object dictionary metadata, as consumed from a dictionary provider
//! - The [value codec](codec), which converts integer literals to and from the little-endian byte
//!   buffers transferred by SDO
#![warn(missing_docs, missing_copy_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod constants;
pub mod dictionary;
pub mod messages;
pub mod node_id;
pub mod objects;
pub mod sdo;
pub mod traits;

pub use node_id::NodeId;

pub use messages::{CanId, CanMessage};
pub use traits::{AsyncCanReceiver, AsyncCanSender};
