use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_num::maybe_hex;
use sdolink_client::common::{codec::Representation, messages::NmtCommandCmd};
use std::str::FromStr;

#[derive(Debug, Parser)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Open the bus channel, optionally switching to a different one
    Connect {
        /// Channel to open instead of the current one
        channel: Option<String>,
    },
    /// Close the bus channel
    Disconnect,
    /// Discover devices on the bus
    Scan {
        /// Object dictionary (TOML) describing the devices; defaults to the configured one
        #[arg(value_hint=clap::ValueHint::FilePath)]
        dictionary: Option<String>,
    },
    /// List discovered devices
    Nodes,
    /// Make a device the active device
    Select {
        /// The node ID of the device
        node: u8,
    },
    /// List the sendable and receivable objects of the active device
    Objects,
    /// Read an object from the active device
    Read(ReadArgs),
    /// Write a value to an object on the active device
    Write(WriteArgs),
    /// NMT commands
    Nmt(NmtArgs),
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Object index (decimal or 0x hex)
    #[arg(value_parser=maybe_hex::<u16>)]
    pub index: u16,
    /// Sub index (decimal or 0x hex)
    #[arg(value_parser=maybe_hex::<u8>)]
    pub sub: u8,
    /// How to display the value
    #[arg(long, value_enum, default_value_t = ReprArg::Decimal)]
    pub repr: ReprArg,
}

#[derive(Debug, Args)]
pub struct WriteArgs {
    /// Object index (decimal or 0x hex)
    #[arg(value_parser=maybe_hex::<u16>)]
    pub index: u16,
    /// Sub index (decimal or 0x hex)
    #[arg(value_parser=maybe_hex::<u8>)]
    pub sub: u8,
    /// Integer value: decimal, 0x hex, or 0b binary, optionally negative
    #[arg(allow_hyphen_values = true)]
    pub value: String,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
pub enum ReprArg {
    Decimal,
    Hexadecimal,
    Binary,
    Text,
}

impl From<ReprArg> for Representation {
    fn from(value: ReprArg) -> Self {
        match value {
            ReprArg::Decimal => Representation::Decimal,
            ReprArg::Hexadecimal => Representation::Hexadecimal,
            ReprArg::Binary => Representation::Binary,
            ReprArg::Text => Representation::Text,
        }
    }
}

/// Specifies a node to apply an NMT command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NmtNodeArg {
    All,
    Specific(u8),
}

impl NmtNodeArg {
    pub fn raw(&self) -> u8 {
        match self {
            Self::All => 0,
            Self::Specific(id) => *id,
        }
    }
}

impl FromStr for NmtNodeArg {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<u8>() {
            Ok(0) => Ok(Self::All),
            Ok(num) if num < 128 => Ok(Self::Specific(num)),
            Ok(_) => Err("Node ID must be between 0 and 127"),
            Err(_) if s == "all" => Ok(Self::All),
            Err(_) => Err("Must specify a node ID, or 'all' to broadcast"),
        }
    }
}

#[derive(Debug, Args)]
pub struct NmtArgs {
    pub action: NmtAction,
    /// Specify the node ID to command. Use '0' or 'all' to broadcast to all nodes.
    pub node: NmtNodeArg,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
pub enum NmtAction {
    Start,
    Stop,
    PreOp,
    ResetApp,
    ResetComms,
}

impl From<NmtAction> for NmtCommandCmd {
    fn from(value: NmtAction) -> Self {
        match value {
            NmtAction::Start => NmtCommandCmd::Start,
            NmtAction::Stop => NmtCommandCmd::Stop,
            NmtAction::PreOp => NmtCommandCmd::EnterPreOp,
            NmtAction::ResetApp => NmtCommandCmd::ResetApp,
            NmtAction::ResetComms => NmtCommandCmd::ResetComm,
        }
    }
}
