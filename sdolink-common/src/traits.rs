//! Common traits
//!
//! These traits are the seam between sdolink and a bus transport. Anything that can put a frame
//! on the bus and hand back received frames can be driven by the client.

use std::error;

use crate::messages::CanMessage;

/// Error type for CAN send operations containing the failed message
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub struct CanSendError(pub CanMessage);

impl core::fmt::Display for CanSendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Failed to send CAN message: {:?}", self.0)
    }
}

impl error::Error for CanSendError {}

/// An async CAN sender trait
pub trait AsyncCanSender: Send {
    /// Send a message to the bus
    fn send(
        &mut self,
        msg: CanMessage,
    ) -> impl core::future::Future<Output = Result<(), CanSendError>>;
}

/// An async CAN receiver trait
pub trait AsyncCanReceiver: Send {
    /// The error type returned by recv
    type Error: error::Error + Send + 'static;

    /// Receive available message immediately
    ///
    /// Returns None if there is no message waiting
    fn try_recv(&mut self) -> Option<CanMessage>;

    /// A blocking receive
    fn recv(
        &mut self,
    ) -> impl core::future::Future<Output = Result<CanMessage, Self::Error>> + Send;

    /// Remove any pending messages from the receiver
    fn flush(&mut self) {
        while self.try_recv().is_some() {}
    }
}

// Borrowed senders and receivers are senders and receivers too. This lets short lived clients,
// e.g. an SDO client for a single transaction, use a transport which is owned elsewhere.
impl<T: AsyncCanSender> AsyncCanSender for &mut T {
    fn send(
        &mut self,
        msg: CanMessage,
    ) -> impl core::future::Future<Output = Result<(), CanSendError>> {
        (**self).send(msg)
    }
}

impl<T: AsyncCanReceiver> AsyncCanReceiver for &mut T {
    type Error = T::Error;

    fn try_recv(&mut self) -> Option<CanMessage> {
        (**self).try_recv()
    }

    fn recv(
        &mut self,
    ) -> impl core::future::Future<Output = Result<CanMessage, Self::Error>> + Send {
        (**self).recv()
    }
}
