//! SPI master for the SD card slot
//!
//! The board has no SPI peripheral wired to the SD card. Instead an output
//! latch on IO port 0x10 drives MOSI, CLK and SSEL, and an input buffer on IO
//! port 0x00 returns MISO and the card-detect switch. The Z80 bit-bangs SPI
//! through these ports, and so does the support processor while it holds the
//! bus.
//!
//! Mode 0 is used: data changes on the falling clock edge and is sampled on
//! the rising edge.
//!
//! ```text
//!         __                                             ___
//!  /SSEL    \______________________ ... ________________/
//!                  __    __    __   ... _    __    __
//!  CLK    ________/  \__/  \__/  \__     \__/  \__/  \______
//! ```

mod soft;

use bitflags::bitflags;

pub use soft::SoftSpi;

/// IO port of the SPI output latch
pub const SPI_OUT_PORT: u16 = 0x10;
/// IO port of the SPI input buffer
pub const SPI_IN_PORT: u16 = 0x00;

bitflags! {
    /// Bits of the SPI output latch
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpiOut: u8 {
        /// Master out, slave in
        const MOSI = 0x01;
        /// Serial clock
        const CLK  = 0x02;
        /// Slave select (low = card selected)
        const SSEL = 0x04;

        /// Latch state between transfers
        const IDLE = Self::MOSI.bits() | Self::SSEL.bits();
    }
}

bitflags! {
    /// Bits of the SPI input buffer
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpiIn: u8 {
        /// Card detect switch (high = slot empty)
        const SDDET = 0x40;
        /// Master in, slave out
        const MISO  = 0x80;
    }
}

/// Byte-level SPI access as used by the SD card driver
pub trait SpiPort {
    /// Acquire (`true`) or release (`false`) the underlying bus
    ///
    /// Returns whether the bus is now owned as requested.
    fn request_bus(&mut self, request: bool) -> bool;

    /// Drive the slave select line to the given level
    fn slave_select(&mut self, high: bool);

    /// Clock out one byte, MSB first
    fn write_byte(&mut self, data: u8);

    /// Clock in one byte, MSB first, with MOSI held at its current level
    fn read_byte(&mut self) -> u8;

    /// Raw level of the card detect input (`true` = no card)
    fn check_sd_detect(&mut self) -> bool;

    /// Busy-wait for at least `us` microseconds
    fn delay_us(&mut self, us: u32);

    /// Busy-wait for at least `ms` milliseconds
    fn delay_ms(&mut self, ms: u32);

    /// Whether a card sits in the slot
    fn card_present(&mut self) -> bool {
        !self.check_sd_detect()
    }
}

impl<T: SpiPort + ?Sized> SpiPort for &mut T {
    fn request_bus(&mut self, request: bool) -> bool {
        (**self).request_bus(request)
    }

    fn slave_select(&mut self, high: bool) {
        (**self).slave_select(high)
    }

    fn write_byte(&mut self, data: u8) {
        (**self).write_byte(data)
    }

    fn read_byte(&mut self) -> u8 {
        (**self).read_byte()
    }

    fn check_sd_detect(&mut self) -> bool {
        (**self).check_sd_detect()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}
