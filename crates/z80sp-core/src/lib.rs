//! z80sp-core - Core library for the Z80 support processor
//!
//! This crate implements everything the support microcontroller does on the
//! Z80 bus: acquiring the bus, driving memory and IO cycles, programming the
//! parallel NOR flash, bit-banging SPI through the board's IO latches to reach
//! the SD card, and the hex record protocol used to download flash images over
//! the serial console. It is `no_std` so the same code runs on the board and
//! against the simulated board used by the tests and the host tools.
//!
//! # Features
//!
//! - `std` - Enable standard library support (`std::error::Error` impls)
//!
//! # Layering
//!
//! ```text
//!   FlashLoader ──► RecordParser
//!        │
//!        ▼
//!   ParallelFlash        SdCard
//!        │                 │
//!        │              SoftSpi
//!        │                 │
//!        │              IoPort
//!        ▼                 ▼
//!        BusArbiter ──► BusPins (board / simulation)
//! ```
//!
//! # Example
//!
//! ```
//! use z80sp_core::bus::BusArbiter;
//! use z80sp_core::flash::ParallelFlash;
//!
//! fn identify<P: z80sp_core::hal::BusPins>(bus: &mut BusArbiter<P>) {
//!     let mut flash = ParallelFlash::new(bus);
//!     flash.set_mode(true);
//!     let id = flash.read_chip_identification();
//!     flash.set_mode(false);
//!     log::info!("vendor {:02X} device {:02X}", id.vendor, id.device);
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod bus;
pub mod error;
pub mod flash;
pub mod hal;
pub mod loader;
pub mod programs;
pub mod record;
pub mod sd;
pub mod spi;

pub use error::{Error, Result};
