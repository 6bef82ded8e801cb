//! Z80 IO request cycles

use super::arbiter::{BusArbiter, ControlBit};
use crate::hal::BusPins;

/// Time the addressed IO device gets to drive the data bus before sampling
pub const IO_READ_SETTLE_US: u32 = 1;

/// IO cycle generator on a borrowed bus
///
/// Only the low byte of the address bus matters to the IO decoders on the
/// board, but the full 16-bit port number is driven. All cycles are dropped by
/// the arbiter unless the bus has been requested first.
pub struct IoPort<'a, P: BusPins> {
    bus: &'a mut BusArbiter<P>,
}

impl<'a, P: BusPins> IoPort<'a, P> {
    /// Create an IO port generator on the given bus
    pub fn new(bus: &'a mut BusArbiter<P>) -> Self {
        Self { bus }
    }

    /// Request (`true`) or release (`false`) the bus
    ///
    /// Returns the result of the request; releasing always returns `true`.
    pub fn request_bus(&mut self, request: bool) -> bool {
        if request {
            self.bus.request_bus()
        } else {
            self.bus.release_bus();
            true
        }
    }

    /// Run an IO write cycle
    pub fn write(&mut self, port: u16, data: u8) {
        self.bus.write_address_bus(port);
        self.bus.write_data_bus(data);
        self.bus.write_control_bit(ControlBit::Ioreq, false);
        self.bus.write_control_bit(ControlBit::Wr, false);
        self.bus.write_control_bit(ControlBit::Wr, true);
        self.bus.write_control_bit(ControlBit::Ioreq, true);
        self.bus.release_address_bus();
        self.bus.release_data_bus();
    }

    /// Run an IO read cycle and return the sampled data bus
    pub fn read(&mut self, port: u16) -> u8 {
        self.bus.write_address_bus(port);
        self.bus.write_control_bit(ControlBit::Ioreq, false);
        self.bus.write_control_bit(ControlBit::Rd, false);
        self.bus.delay_us(IO_READ_SETTLE_US);
        let data = self.bus.read_data_bus();
        self.bus.write_control_bit(ControlBit::Rd, true);
        self.bus.write_control_bit(ControlBit::Ioreq, true);
        self.bus.release_address_bus();
        data
    }

    /// Busy-wait for at least `us` microseconds
    pub fn delay_us(&mut self, us: u32) {
        self.bus.delay_us(us);
    }

    /// Busy-wait for at least `ms` milliseconds
    pub fn delay_ms(&mut self, ms: u32) {
        self.bus.delay_ms(ms);
    }

    /// The underlying bus
    pub fn bus(&mut self) -> &mut BusArbiter<P> {
        self.bus
    }
}
