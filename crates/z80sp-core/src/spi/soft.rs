//! Bit-banged SPI over Z80 IO cycles

use super::{SpiIn, SpiOut, SpiPort, SPI_IN_PORT, SPI_OUT_PORT};
use crate::bus::{BusArbiter, IoPort};
use crate::hal::BusPins;

/// SPI master built from IO write/read cycles
///
/// Keeps a shadow of the output latch, since the latch cannot be read back.
/// Every bit costs two or three full IO cycles, so throughput is in the low
/// kilobytes per second; enough for single blocks.
pub struct SoftSpi<'a, P: BusPins> {
    io: IoPort<'a, P>,
    out: SpiOut,
}

impl<'a, P: BusPins> SoftSpi<'a, P> {
    /// Create an SPI master on the given bus
    pub fn new(bus: &'a mut BusArbiter<P>) -> Self {
        Self {
            io: IoPort::new(bus),
            out: SpiOut::IDLE,
        }
    }

    /// Shadow copy of the output latch
    pub fn output(&self) -> SpiOut {
        self.out
    }

    fn latch(&mut self) {
        self.io.write(SPI_OUT_PORT, self.out.bits());
    }
}

impl<P: BusPins> SpiPort for SoftSpi<'_, P> {
    fn request_bus(&mut self, request: bool) -> bool {
        let owned = self.io.request_bus(request);
        if request {
            // the Z80 may have left the latch in any state
            self.out = SpiOut::IDLE;
            self.latch();
        }
        owned
    }

    fn slave_select(&mut self, high: bool) {
        self.out.set(SpiOut::SSEL, high);
        self.latch();
    }

    fn write_byte(&mut self, data: u8) {
        for bit in (0..8).rev() {
            self.out.remove(SpiOut::CLK);
            self.out.set(SpiOut::MOSI, data & (1 << bit) != 0);
            self.latch();
            self.out.insert(SpiOut::CLK);
            self.latch();
        }
        self.out.remove(SpiOut::CLK);
        self.out.insert(SpiOut::MOSI);
        self.latch();
    }

    fn read_byte(&mut self) -> u8 {
        let mut result = 0u8;
        for _ in 0..8 {
            result <<= 1;
            self.out.insert(SpiOut::CLK);
            self.latch();
            let input = SpiIn::from_bits_retain(self.io.read(SPI_IN_PORT));
            if input.contains(SpiIn::MISO) {
                result |= 0x01;
            }
            self.out.remove(SpiOut::CLK);
            self.latch();
        }
        result
    }

    fn check_sd_detect(&mut self) -> bool {
        SpiIn::from_bits_retain(self.io.read(SPI_IN_PORT)).contains(SpiIn::SDDET)
    }

    fn delay_us(&mut self, us: u32) {
        self.io.delay_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.io.delay_ms(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::MockPins;
    use std::vec::Vec;

    fn latch_writes(bus: &BusArbiter<MockPins>) -> Vec<u8> {
        bus.pins()
            .strobes
            .iter()
            .filter(|s| s.io && s.write && s.address == SPI_OUT_PORT)
            .map(|s| s.data)
            .collect()
    }

    #[test]
    fn test_request_idles_latch() {
        let mut bus = BusArbiter::new(MockPins::new());
        let mut spi = SoftSpi::new(&mut bus);
        assert!(spi.request_bus(true));
        assert_eq!(spi.output(), SpiOut::IDLE);
        assert_eq!(latch_writes(&bus), [0x05]);
    }

    #[test]
    fn test_write_byte_mode0() {
        let mut bus = BusArbiter::new(MockPins::new());
        let mut spi = SoftSpi::new(&mut bus);
        spi.request_bus(true);
        spi.slave_select(false);
        spi.write_byte(0xA5);

        let writes = latch_writes(&bus);
        // idle, select, 8 x (clock low + data, clock high), final idle
        assert_eq!(writes.len(), 2 + 16 + 1);
        let bits: Vec<u8> = writes[2..18]
            .chunks(2)
            .map(|pair| {
                assert_eq!(pair[0] & 0x02, 0);
                assert_eq!(pair[1] & 0x02, 0x02);
                assert_eq!(pair[0] & 0x01, pair[1] & 0x01);
                pair[0] & 0x01
            })
            .collect();
        assert_eq!(bits, [1, 0, 1, 0, 0, 1, 0, 1]);
        // SSEL stays low, MOSI returns high, clock low
        assert_eq!(writes[18], 0x01);
    }

    #[test]
    fn test_read_byte_samples_miso() {
        let mut bus = BusArbiter::new(MockPins::new());
        bus.pins()
            .queue_input(&[0x80, 0x00, 0x80, 0x80, 0x00, 0x00, 0x00, 0x80]);
        let mut spi = SoftSpi::new(&mut bus);
        spi.request_bus(true);
        assert_eq!(spi.read_byte(), 0b1011_0001);
        assert!(!spi.output().contains(SpiOut::CLK));
    }

    #[test]
    fn test_sd_detect() {
        let mut bus = BusArbiter::new(MockPins::new());
        bus.pins().queue_input(&[0x40, 0x00]);
        let mut spi = SoftSpi::new(&mut bus);
        spi.request_bus(true);
        assert!(!spi.card_present());
        assert!(spi.card_present());
    }
}
