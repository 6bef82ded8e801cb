//! Z80 bus arbitration
//!
//! The Z80 owns its bus until the support processor asserts BUSREQ. The
//! arbiter does not wait for BUSACK: the board may run without a CPU, and a
//! Z80 always grants the bus at the end of the current machine cycle, which
//! is well inside the settle delay.

use crate::hal::{BusPins, ControlLines, DriveMode};

/// Hold time of the reset pulse issued by [`BusArbiter::reset_z80`]
pub const RESET_PULSE_MS: u32 = 100;

/// Delay between asserting BUSREQ and driving the bus
pub const BUS_REQUEST_SETTLE_US: u32 = 10;

/// Settle time after every line change while the bus is owned
pub const LINE_SETTLE_US: u32 = 1;

/// Who is currently allowed to drive the bus lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOwnership {
    /// The Z80 owns the bus, all our lines are released
    Passive,
    /// The support processor owns the bus
    Active,
}

/// A single control line, as addressed by bus cycle code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlBit {
    /// Z80 reset (high = held in reset)
    Reset,
    /// IO request strobe
    Ioreq,
    /// Memory request strobe
    Mreq,
    /// Read strobe
    Rd,
    /// Write strobe
    Wr,
    /// Wait line
    Wait,
}

impl ControlBit {
    /// The pin mask for this control bit
    pub fn line(self) -> ControlLines {
        match self {
            Self::Reset => ControlLines::RESET,
            Self::Ioreq => ControlLines::IOREQ,
            Self::Mreq => ControlLines::MREQ,
            Self::Rd => ControlLines::RD,
            Self::Wr => ControlLines::WR,
            Self::Wait => ControlLines::WAIT,
        }
    }
}

/// Sole owner of the physical bus pins
///
/// Drivers that need bus cycles (flash, IO ports) borrow the arbiter; none of
/// them hold pins of their own. While the ownership is `Passive` every write
/// except the reset line is silently dropped, so a driver that forgot to
/// request the bus cannot fight the Z80 for it.
pub struct BusArbiter<P: BusPins> {
    pins: P,
    ownership: BusOwnership,
}

impl<P: BusPins> BusArbiter<P> {
    /// Take ownership of the board pins
    ///
    /// All bus lines are switched to open-drain and released. The Z80 is held
    /// in reset until [`reset_z80`](Self::reset_z80) is called, matching the
    /// power-up sequence of the board.
    pub fn new(mut pins: P) -> Self {
        pins.set_drive_mode(ControlLines::all(), DriveMode::OpenDrain);
        pins.set_lines(ControlLines::RESET, true);

        let mut bus = Self {
            pins,
            ownership: BusOwnership::Passive,
        };
        bus.release_bus();
        bus
    }

    /// Current bus ownership
    pub fn ownership(&self) -> BusOwnership {
        self.ownership
    }

    /// Whether the support processor currently owns the bus
    pub fn is_active(&self) -> bool {
        self.ownership == BusOwnership::Active
    }

    /// Request the bus from the Z80
    ///
    /// Returns `false` without touching any line if the bus is already owned;
    /// ownership does not nest.
    pub fn request_bus(&mut self) -> bool {
        if self.is_active() {
            log::debug!("bus: request ignored, bus already active");
            return false;
        }

        self.release_bus();
        self.pins.set_lines(ControlLines::BUSREQ, false);
        self.pins.delay_us(BUS_REQUEST_SETTLE_US);
        // push-pull edges are needed for reliable flash programming
        self.pins
            .set_drive_mode(ControlLines::BUS_CONTROL, DriveMode::PushPull);
        self.ownership = BusOwnership::Active;
        log::trace!("bus: acquired");
        true
    }

    /// Release all lines and hand the bus back to the Z80
    ///
    /// Idempotent. The reset line is left as it is.
    pub fn release_bus(&mut self) {
        self.pins
            .set_drive_mode(ControlLines::BUS_CONTROL, DriveMode::OpenDrain);
        self.release_data_bus();
        self.release_address_bus();
        self.release_control_bus();
        self.pins.set_lines(ControlLines::BUSREQ, true);
        if self.is_active() {
            log::trace!("bus: released");
        }
        self.ownership = BusOwnership::Passive;
    }

    /// Float the data bus
    pub fn release_data_bus(&mut self) {
        self.pins.release_data();
    }

    /// Float the address bus
    pub fn release_address_bus(&mut self) {
        self.pins.release_address();
    }

    /// Float all control lines except reset and BUSREQ
    pub fn release_control_bus(&mut self) {
        self.pins.set_lines(ControlLines::BUS_CONTROL, true);
    }

    /// Set a single control line to the given electrical level
    ///
    /// The reset line can be controlled at any time; all other lines only
    /// while the bus is owned.
    pub fn write_control_bit(&mut self, bit: ControlBit, high: bool) {
        if bit == ControlBit::Reset {
            self.pins.set_lines(ControlLines::RESET, high);
            return;
        }
        if !self.is_active() {
            return;
        }
        self.pins.set_lines(bit.line(), high);
        self.pins.delay_us(LINE_SETTLE_US);
    }

    /// Drive the data bus (ignored while passive)
    pub fn write_data_bus(&mut self, data: u8) {
        if !self.is_active() {
            return;
        }
        self.pins.write_data(data);
        self.pins.delay_us(LINE_SETTLE_US);
    }

    /// Drive the address bus (ignored while passive)
    pub fn write_address_bus(&mut self, address: u16) {
        if !self.is_active() {
            return;
        }
        self.pins.write_address(address);
        self.pins.delay_us(LINE_SETTLE_US);
    }

    /// Sample the data bus
    ///
    /// Always returns the electrical level; it is only meaningful while the
    /// bus is owned and a read strobe is asserted.
    pub fn read_data_bus(&self) -> u8 {
        self.pins.read_data()
    }

    /// Sample the address bus
    pub fn read_address_bus(&self) -> u16 {
        self.pins.read_address()
    }

    /// Hold the Z80 in reset (`true`) or let it run (`false`)
    pub fn hold_reset(&mut self, asserted: bool) {
        self.write_control_bit(ControlBit::Reset, asserted);
    }

    /// Pulse the Z80 reset line, independent of bus ownership
    pub fn reset_z80(&mut self) {
        log::debug!("bus: resetting Z80 ({} ms pulse)", RESET_PULSE_MS);
        self.pins.set_lines(ControlLines::RESET, true);
        self.pins.delay_ms(RESET_PULSE_MS);
        self.pins.set_lines(ControlLines::RESET, false);
    }

    /// Busy-wait for at least `us` microseconds
    pub fn delay_us(&mut self, us: u32) {
        self.pins.delay_us(us);
    }

    /// Busy-wait for at least `ms` milliseconds
    pub fn delay_ms(&mut self, ms: u32) {
        self.pins.delay_ms(ms);
    }

    /// Shared access to the board pins, for inspection
    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Mutable access to the board pins
    ///
    /// Writes made through this handle bypass the ownership checks.
    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    /// Release the bus and give the pins back
    pub fn into_pins(mut self) -> P {
        self.release_bus();
        self.pins
    }
}
