//! An in-process CAN bus
//!
//! Frames sent on the bus are delivered synchronously to every [`SimDevice`], and queued to every
//! receiver except the one paired with the sending sender. Frames produced by devices are queued
//! to all receivers.
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use sdolink_client::{BusConfig, BusConnector, ConnectorError};
use sdolink_common::{
    traits::{AsyncCanReceiver, AsyncCanSender, CanSendError},
    CanMessage,
};
use snafu::Snafu;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::sim_device::SimDevice;

#[derive(Debug, Default)]
struct BusState {
    listeners: Vec<(usize, UnboundedSender<CanMessage>)>,
    devices: Vec<SimDevice>,
    log: Vec<CanMessage>,
    next_listener: usize,
}

impl BusState {
    fn queue(&mut self, msg: CanMessage, skip: Option<usize>) {
        // Receivers which have been dropped are removed
        self.listeners
            .retain(|(id, tx)| Some(*id) == skip || tx.send(msg).is_ok());
    }

    fn transmit(&mut self, msg: CanMessage, origin: Option<usize>) {
        log::trace!("sim bus: {msg:?}");
        self.log.push(msg);
        self.queue(msg, origin);

        let responses: Vec<CanMessage> = self
            .devices
            .iter_mut()
            .flat_map(|dev| dev.handle(msg))
            .collect();
        for resp in responses {
            self.log.push(resp);
            self.queue(resp, None);
        }
    }
}

/// A simulated bus shared by any number of senders, receivers and devices
#[derive(Debug, Clone, Default)]
pub struct SimBus {
    state: Arc<Mutex<BusState>>,
}

impl SimBus {
    /// Create a bus with the given devices attached
    pub fn new(devices: Vec<SimDevice>) -> Self {
        let state = BusState {
            devices,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().expect("sim bus mutex poisoned")
    }

    /// Create a sender which is not paired with any receiver
    pub fn new_sender(&self) -> SimBusSender {
        SimBusSender {
            bus: self.clone(),
            listener: None,
        }
    }

    /// Create a receiver which gets every frame on the bus
    pub fn new_receiver(&self) -> SimBusReceiver {
        self.add_listener().1
    }

    /// Create a sender and receiver pair, like the two halves of a socket
    ///
    /// The receiver does not see frames sent by its own sender.
    pub fn new_pair(&self) -> (SimBusSender, SimBusReceiver) {
        let (id, receiver) = self.add_listener();
        let sender = SimBusSender {
            bus: self.clone(),
            listener: Some(id),
        };
        (sender, receiver)
    }

    fn add_listener(&self) -> (usize, SimBusReceiver) {
        let (tx, rx) = unbounded_channel();
        let mut state = self.lock();
        let id = state.next_listener;
        state.next_listener += 1;
        state.listeners.push((id, tx));
        (id, SimBusReceiver { rx })
    }

    /// Put a frame on the bus as though it came from a node outside the simulation
    pub fn inject(&self, msg: CanMessage) {
        self.lock().transmit(msg, None);
    }

    /// A snapshot of the device with the given node ID
    pub fn device(&self, node: u8) -> Option<SimDevice> {
        self.lock().devices.iter().find(|d| d.node() == node).cloned()
    }

    /// Every frame seen on the bus so far, in order
    pub fn log(&self) -> Vec<CanMessage> {
        self.lock().log.clone()
    }

    /// Forget all logged frames
    pub fn clear_log(&self) {
        self.lock().log.clear();
    }
}

/// Sender half of a [`SimBus`] connection
#[derive(Debug, Clone)]
pub struct SimBusSender {
    bus: SimBus,
    listener: Option<usize>,
}

impl AsyncCanSender for SimBusSender {
    async fn send(&mut self, msg: CanMessage) -> Result<(), CanSendError> {
        self.bus.lock().transmit(msg, self.listener);
        Ok(())
    }
}

/// Error returned by [`SimBusReceiver`]
#[derive(Debug, Clone, Copy, Snafu)]
pub enum SimBusError {
    /// Every sender has been dropped
    #[snafu(display("Simulated bus channel closed"))]
    ChannelClosed,
}

/// Receiver half of a [`SimBus`] connection
#[derive(Debug)]
pub struct SimBusReceiver {
    rx: UnboundedReceiver<CanMessage>,
}

impl AsyncCanReceiver for SimBusReceiver {
    type Error = SimBusError;

    fn try_recv(&mut self) -> Option<CanMessage> {
        self.rx.try_recv().ok()
    }

    async fn recv(&mut self) -> Result<CanMessage, Self::Error> {
        self.rx.recv().await.ok_or(SimBusError::ChannelClosed)
    }
}

/// Opens connections to a [`SimBus`]
///
/// The connector can be made unavailable, to simulate a missing interface.
#[derive(Debug, Clone)]
pub struct SimConnector {
    bus: SimBus,
    available: Arc<AtomicBool>,
}

impl SimConnector {
    /// Create a connector for `bus`
    pub fn new(bus: SimBus) -> Self {
        Self {
            bus,
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Control whether [`open`](BusConnector::open) succeeds
    ///
    /// Clones of the connector share this setting.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }
}

impl BusConnector for SimConnector {
    type Sender = SimBusSender;
    type Receiver = SimBusReceiver;

    fn open(&self, config: &BusConfig) -> Result<(Self::Sender, Self::Receiver), ConnectorError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(format!("No such device: {}", config.channel).into());
        }
        Ok(self.bus.new_pair())
    }
}
