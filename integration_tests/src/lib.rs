//! Simulated bus and devices for exercising sdolink-client without hardware
pub mod sim_bus;
pub mod sim_device;
