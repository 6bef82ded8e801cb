//! Hardware abstraction for the Z80 bus pins
//!
//! The board connects the support processor to the Z80 address bus (16 lines),
//! data bus (8 lines) and control bus through open-drain outputs with external
//! pull-ups. A released line therefore reads high, and any driver on the bus
//! can pull it low.
//!
//! `BusPins` is the raw handle over those ports. It is owned by the
//! [`BusArbiter`](crate::bus::BusArbiter), which is the only code that should
//! touch it; everything above the arbiter goes through arbiter methods. Boards
//! implement it over their GPIO registers, the simulation crate implements it
//! over an in-memory model.

use bitflags::bitflags;

bitflags! {
    /// Control bus lines driven by the support processor
    ///
    /// All lines except `RESET` are active low. `RESET` drives an inverter on
    /// the board: a high level holds the Z80 in reset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlLines: u8 {
        /// Z80 reset (high = CPU held in reset)
        const RESET  = 1 << 0;
        /// IO request strobe
        const IOREQ  = 1 << 1;
        /// Memory request strobe
        const MREQ   = 1 << 2;
        /// Read strobe
        const RD     = 1 << 3;
        /// Write strobe
        const WR     = 1 << 4;
        /// Wait line
        const WAIT   = 1 << 5;
        /// Bus request to the Z80
        const BUSREQ = 1 << 6;

        /// Lines switched to push-pull while the bus is owned
        const BUS_CONTROL = Self::IOREQ.bits()
            | Self::MREQ.bits()
            | Self::RD.bits()
            | Self::WR.bits()
            | Self::WAIT.bits();
    }
}

/// Output driver configuration of a GPIO line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMode {
    /// Line is only pulled low; high comes from the external pull-up
    OpenDrain,
    /// Line is actively driven both high and low
    PushPull,
}

/// Raw access to the bus ports of the board
///
/// Implementations perform exactly the requested register access and nothing
/// else: no ownership checks, no implicit delays. Timing is the caller's job
/// and is expressed through `delay_us`/`delay_ms`.
pub trait BusPins {
    /// Switch the output driver of the given control lines
    fn set_drive_mode(&mut self, lines: ControlLines, mode: DriveMode);

    /// Drive the given control lines high (`true`) or low (`false`)
    fn set_lines(&mut self, lines: ControlLines, high: bool);

    /// Drive the address bus
    fn write_address(&mut self, address: u16);

    /// Float the address bus (all lines high)
    fn release_address(&mut self);

    /// Drive the data bus
    fn write_data(&mut self, data: u8);

    /// Float the data bus (all lines high)
    fn release_data(&mut self);

    /// Sample the electrical level of the data bus
    fn read_data(&self) -> u8;

    /// Sample the electrical level of the address bus
    fn read_address(&self) -> u16;

    /// Busy-wait for at least `us` microseconds
    fn delay_us(&mut self, us: u32);

    /// Busy-wait for at least `ms` milliseconds
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1000);
        }
    }
}

/// Monotonic millisecond clock
pub trait Clock {
    /// Milliseconds since an arbitrary fixed point
    fn now_ms(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
