//! Parallel NOR flash
//!
//! The board carries an SST39SF0x0 in the Z80 memory map. [`ParallelFlash`]
//! drives it directly over the arbitrated bus; [`FlashTarget`] is the narrow
//! interface the load sequencer programs against.

mod chip;
pub mod commands;
mod parallel;

pub use chip::{ChipId, ChipInfo, KNOWN_CHIPS, VENDOR_SST};
pub use commands::WriteStrobe;
pub use parallel::{FlashMode, ParallelFlash};

/// Byte-programmable flash as seen by the load sequencer
pub trait FlashTarget {
    /// Take the bus and keep the CPU off it
    fn activate(&mut self);

    /// Give the bus back
    fn deactivate(&mut self);

    /// Erase the whole device
    fn erase_chip(&mut self);

    /// Erase the 64 KiB window addressed by the Z80
    fn erase_bank(&mut self);

    /// Program one byte
    fn write_byte(&mut self, address: u16, data: u8);

    /// Read one byte
    fn read_byte(&mut self, address: u16) -> u8;
}

impl<T: FlashTarget + ?Sized> FlashTarget for &mut T {
    fn activate(&mut self) {
        (**self).activate()
    }

    fn deactivate(&mut self) {
        (**self).deactivate()
    }

    fn erase_chip(&mut self) {
        (**self).erase_chip()
    }

    fn erase_bank(&mut self) {
        (**self).erase_bank()
    }

    fn write_byte(&mut self, address: u16, data: u8) {
        (**self).write_byte(address, data)
    }

    fn read_byte(&mut self, address: u16) -> u8 {
        (**self).read_byte(address)
    }
}
