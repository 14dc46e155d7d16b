//! Command-line utilities for sdolink
//!
//! # sdolink-cli
//!
//! A REPL-style interactive shell for discovering CANopen devices on a socketcan interface, and
//! reading and writing their objects.
//!
//! Usage example: `sdolink-cli can0 --config sdolink.toml`
//!
//! Inside the shell, `scan device.toml` discovers the devices on the bus using the given object
//! dictionary, `objects` lists what can be read and written on the active device, and
//! `read`/`write` transact with individual objects.

pub mod command;
