//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "z80sp")]
#[command(author, version, about = "Z80 support board flash loader", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Serial session options shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct SessionArgs {
    /// Milliseconds to wait for each record acknowledgement
    #[arg(long, default_value_t = 1000)]
    pub ack_timeout: u64,

    /// Data bytes per record (1-64)
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub record_len: u8,
}

/// What the loader erases before the first record
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseArg {
    /// Whole device
    Chip,
    /// 64 KiB window only
    Bank,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the built-in Z80 programs
    Programs,

    /// Find the board on the serial ports
    Find {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Download a binary image into the board's flash
    Load {
        /// Image file (raw binary, at most 65535 bytes)
        #[arg(short, long)]
        input: PathBuf,

        /// Serial port (default: probe all ports)
        #[arg(short, long)]
        port: Option<String>,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Run operations against a simulated board
    #[command(subcommand)]
    Sim(SimCommands),
}

/// Simulated board subcommands
#[derive(Subcommand)]
pub enum SimCommands {
    /// Download an image through the flash loader protocol
    Load {
        /// Image file (raw binary, at most 65535 bytes)
        #[arg(short, long)]
        input: PathBuf,

        /// Erase scope used by the loader
        #[arg(long, value_enum, default_value_t = EraseArg::Chip)]
        erase: EraseArg,

        /// Write the resulting 64 KiB window to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Identify the flash and write a built-in program to it
    Flash {
        /// Built-in program index (see `z80sp programs`)
        #[arg(short, long, default_value_t = 0)]
        program: usize,

        /// Number of bytes to dump after writing
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x40")]
        dump: u32,
    },

    /// Partition the SD card and write a built-in program to a partition
    Sd {
        /// Built-in program index (see `z80sp programs`)
        #[arg(short, long, default_value_t = 0)]
        program: usize,

        /// Target partition (0-3)
        #[arg(long, default_value_t = 0)]
        partition: usize,

        /// Leave the card unformatted
        #[arg(long)]
        no_format: bool,

        /// Simulate an empty card slot
        #[arg(long)]
        no_card: bool,
    },
}
