//! SST39SF0x0 driver over the Z80 memory bus

use super::chip::ChipId;
use super::commands::*;
use super::FlashTarget;
use crate::bus::{BusArbiter, ControlBit};
use crate::error::{Error, Result};
use crate::hal::BusPins;
use crate::programs;

/// Whether the flash driver currently owns the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashMode {
    /// Z80 runs, all flash operations are ignored
    Inactive,
    /// Bus requested and Z80 held in reset
    Active,
}

/// Parallel NOR flash on the Z80 memory bus
///
/// Works on the 64 KiB window the Z80 sees. Every operation except the mode
/// transitions is ignored while the driver is [`FlashMode::Inactive`]: reads
/// return 0xFF and counts return 0.
pub struct ParallelFlash<'a, P: BusPins> {
    bus: &'a mut BusArbiter<P>,
    mode: FlashMode,
    chip_id: ChipId,
    strobe: WriteStrobe,
}

impl<'a, P: BusPins> ParallelFlash<'a, P> {
    /// Create a driver with the default write strobe timing
    pub fn new(bus: &'a mut BusArbiter<P>) -> Self {
        Self::with_strobe(bus, WriteStrobe::default())
    }

    /// Create a driver with a custom write strobe timing
    pub fn with_strobe(bus: &'a mut BusArbiter<P>, strobe: WriteStrobe) -> Self {
        Self {
            bus,
            mode: FlashMode::Inactive,
            chip_id: ChipId::default(),
            strobe,
        }
    }

    /// Current mode
    pub fn mode(&self) -> FlashMode {
        self.mode
    }

    /// Whether the driver owns the bus
    pub fn is_active(&self) -> bool {
        self.mode == FlashMode::Active
    }

    /// Last ID captured by [`read_chip_identification`](Self::read_chip_identification)
    pub fn chip_id(&self) -> ChipId {
        self.chip_id
    }

    /// Enter (`true`) or leave (`false`) flash mode
    pub fn set_mode(&mut self, active: bool) {
        if active {
            self.enter();
        } else {
            self.exit();
        }
    }

    /// Request the bus and hold the Z80 in reset
    ///
    /// The Z80 must stay in reset so it does not drive the bus the moment
    /// BUSREQ is released in the middle of a session.
    pub fn enter(&mut self) {
        self.bus.request_bus();
        self.bus.hold_reset(true);
        self.mode = FlashMode::Active;
    }

    /// Release the bus and let the Z80 run
    pub fn exit(&mut self) {
        self.bus.release_bus();
        self.bus.hold_reset(false);
        self.mode = FlashMode::Inactive;
    }

    /// Read a byte from the 64 KiB window
    pub fn read_byte(&mut self, address: u16) -> u8 {
        if !self.is_active() {
            return 0xFF;
        }
        self.bus.write_address_bus(address);
        self.bus.write_control_bit(ControlBit::Mreq, false);
        self.bus.write_control_bit(ControlBit::Rd, false);
        let data = self.bus.read_data_bus();
        self.bus.write_control_bit(ControlBit::Rd, true);
        self.bus.write_control_bit(ControlBit::Mreq, true);
        data
    }

    /// Read consecutive bytes starting at `start`, wrapping at the window end
    pub fn read_into(&mut self, start: u16, buf: &mut [u8]) {
        let mut address = start;
        for byte in buf.iter_mut() {
            *byte = self.read_byte(address);
            address = address.wrapping_add(1);
        }
    }

    /// Program a single byte
    ///
    /// Programming can only clear bits; the byte must have been erased for
    /// the result to equal `data`.
    pub fn write_byte(&mut self, address: u16, data: u8) {
        if !self.is_active() {
            return;
        }
        self.bus.write_control_bit(ControlBit::Mreq, false);
        self.strobe_sequence(&PROGRAM_PREFIX);
        self.strobe_write(address, data);
        self.bus.write_control_bit(ControlBit::Mreq, true);
        self.bus.release_data_bus();
        self.bus.delay_us(BYTE_WRITE_WAIT_US);
    }

    /// Erase the whole chip, all banks included
    pub fn erase_flash(&mut self) {
        if !self.is_active() {
            return;
        }
        log::debug!("flash: chip erase");
        self.bus.write_control_bit(ControlBit::Mreq, false);
        self.strobe_sequence(&ERASE_PREFIX);
        self.strobe_write(UNLOCK_ADDR_1, CHIP_ERASE);
        self.bus.write_control_bit(ControlBit::Mreq, true);
        self.bus.release_data_bus();
        self.bus.delay_ms(CHIP_ERASE_WAIT_MS);
    }

    /// Erase the 64 KiB window, one 4 KiB sector at a time
    pub fn erase_bank(&mut self) {
        if !self.is_active() {
            return;
        }
        log::debug!("flash: erasing {} sectors", SECTORS_PER_BANK);
        self.bus.write_control_bit(ControlBit::Mreq, false);
        for sector in 0..SECTORS_PER_BANK {
            self.strobe_sequence(&ERASE_PREFIX);
            self.strobe_write(sector << 12, SECTOR_ERASE);
            self.bus.delay_ms(SECTOR_ERASE_WAIT_MS);
        }
        self.bus.write_control_bit(ControlBit::Mreq, true);
        self.bus.release_data_bus();
        self.bus.delay_ms(CHIP_ERASE_WAIT_MS);
    }

    /// Read vendor and device ID in software ID mode
    ///
    /// Returns the cached ID (zero until the first successful read) while
    /// inactive.
    pub fn read_chip_identification(&mut self) -> ChipId {
        if !self.is_active() {
            return self.chip_id;
        }
        self.bus.write_control_bit(ControlBit::Mreq, false);
        self.command(ID_ENTRY);
        self.bus.delay_us(ID_MODE_ACCESS_US);

        self.bus.release_data_bus();
        self.bus.write_control_bit(ControlBit::Rd, false);
        self.bus.write_address_bus(0x0000);
        self.bus.delay_us(ID_MODE_ACCESS_US);
        let vendor = self.bus.read_data_bus();
        self.bus.write_address_bus(0x0001);
        self.bus.delay_us(ID_MODE_ACCESS_US);
        let device = self.bus.read_data_bus();
        self.bus.write_control_bit(ControlBit::Rd, true);

        self.command(ID_EXIT);
        self.bus.delay_us(ID_MODE_ACCESS_US);
        self.bus.write_control_bit(ControlBit::Mreq, true);
        self.bus.release_data_bus();

        self.chip_id = ChipId::new(vendor, device);
        log::debug!("flash: id {:02X}:{:02X}", vendor, device);
        self.chip_id
    }

    /// Number of bytes in use, counted from the start of the window
    ///
    /// Scans down from 0xFFFF to the highest byte that is not 0xFF and returns
    /// its address plus one, or 0 for a blank window.
    pub fn bytes_programmed(&mut self) -> u32 {
        if !self.is_active() {
            return 0;
        }
        for address in (0..=u16::MAX).rev() {
            if self.read_byte(address) != 0xFF {
                return u32::from(address) + 1;
            }
        }
        0
    }

    /// Write a built-in program to the start of the window and verify it
    ///
    /// Enters flash mode, erases the window, programs, verifies and leaves
    /// flash mode again, also on failure.
    pub fn write_program(&mut self, index: usize) -> Result<()> {
        let program = programs::get(index).ok_or(Error::InvalidProgram)?;
        log::info!("flash: writing program '{}'", program.name);

        self.enter();
        self.erase_bank();
        for (address, &byte) in (0u16..).zip(program.data) {
            self.write_byte(address, byte);
        }
        let result = self.verify(0, program.data);
        self.exit();
        result
    }

    /// Compare the window contents at `start` with `expected`
    pub fn verify(&mut self, start: u16, expected: &[u8]) -> Result<()> {
        if !self.is_active() {
            return Err(Error::FlashInactive);
        }
        let mut address = start;
        for &want in expected {
            let found = self.read_byte(address);
            if found != want {
                log::warn!(
                    "flash: verify failed at 0x{:04X}: {:02X} != {:02X}",
                    address,
                    found,
                    want
                );
                return Err(Error::VerifyFailed {
                    addr: address,
                    expected: want,
                    found,
                });
            }
            address = address.wrapping_add(1);
        }
        Ok(())
    }

    /// Unlock pattern followed by `command` to the first unlock address
    fn command(&mut self, command: u8) {
        self.strobe_write(UNLOCK_ADDR_1, UNLOCK_DATA_1);
        self.strobe_write(UNLOCK_ADDR_2, UNLOCK_DATA_2);
        self.strobe_write(UNLOCK_ADDR_1, command);
    }

    fn strobe_sequence(&mut self, writes: &[(u16, u8)]) {
        for &(address, data) in writes {
            self.strobe_write(address, data);
        }
    }

    /// One write strobe; MREQ is handled by the caller
    fn strobe_write(&mut self, address: u16, data: u8) {
        self.bus.write_data_bus(data);
        self.bus.write_address_bus(address);
        self.bus.delay_us(self.strobe.setup_us);
        self.bus.write_control_bit(ControlBit::Wr, false);
        self.bus.delay_us(self.strobe.pulse_us);
        self.bus.write_control_bit(ControlBit::Wr, true);
        self.bus.delay_us(self.strobe.hold_us);
    }
}

impl<P: BusPins> FlashTarget for ParallelFlash<'_, P> {
    fn activate(&mut self) {
        self.enter();
    }

    fn deactivate(&mut self) {
        self.exit();
    }

    fn erase_chip(&mut self) {
        self.erase_flash();
    }

    fn erase_bank(&mut self) {
        ParallelFlash::erase_bank(self);
    }

    fn write_byte(&mut self, address: u16, data: u8) {
        ParallelFlash::write_byte(self, address, data);
    }

    fn read_byte(&mut self, address: u16) -> u8 {
        ParallelFlash::read_byte(self, address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::{MockPins, PinEvent};
    use crate::hal::ControlLines;
    use std::vec::Vec;

    fn flash_bus() -> BusArbiter<MockPins> {
        BusArbiter::new(MockPins::new())
    }

    #[test]
    fn test_inactive_is_noop() {
        let mut bus = flash_bus();
        bus.pins_mut().events.clear();
        let mut flash = ParallelFlash::new(&mut bus);

        assert_eq!(flash.read_byte(0x0000), 0xFF);
        flash.write_byte(0x0000, 0x12);
        flash.erase_flash();
        flash.erase_bank();
        assert_eq!(flash.bytes_programmed(), 0);
        assert_eq!(flash.read_chip_identification(), ChipId::default());
        assert!(bus.pins().events.is_empty());
    }

    #[test]
    fn test_mode_transitions() {
        let mut bus = flash_bus();
        let mut flash = ParallelFlash::new(&mut bus);
        flash.set_mode(true);
        assert_eq!(flash.mode(), FlashMode::Active);
        flash.set_mode(false);
        assert_eq!(flash.mode(), FlashMode::Inactive);

        assert!(!bus.is_active());
        assert!(!bus.pins().is_high(ControlLines::RESET));
    }

    #[test]
    fn test_enter_holds_reset() {
        let mut bus = flash_bus();
        let mut flash = ParallelFlash::new(&mut bus);
        flash.enter();
        drop(flash);
        assert!(bus.is_active());
        assert!(bus.pins().is_high(ControlLines::RESET));
    }

    #[test]
    fn test_write_byte_sequence() {
        let mut bus = flash_bus();
        let mut flash = ParallelFlash::new(&mut bus);
        flash.enter();
        flash.write_byte(0x1234, 0x5A);

        let pins = bus.pins();
        assert_eq!(
            pins.writes(),
            [(0x5555, 0xAA), (0x2AAA, 0x55), (0x5555, 0xA0), (0x1234, 0x5A)]
        );
        assert!(pins.strobes.iter().all(|s| !s.io));
        assert!(pins.is_high(ControlLines::MREQ));
        assert_eq!(pins.data_out, None);
        assert_eq!(
            pins.events.last(),
            Some(&PinEvent::DelayUs(BYTE_WRITE_WAIT_US))
        );
    }

    #[test]
    fn test_chip_erase_sequence() {
        let mut bus = flash_bus();
        let mut flash = ParallelFlash::new(&mut bus);
        flash.enter();
        flash.erase_flash();

        assert_eq!(
            bus.pins().writes(),
            [
                (0x5555, 0xAA),
                (0x2AAA, 0x55),
                (0x5555, 0x80),
                (0x5555, 0xAA),
                (0x2AAA, 0x55),
                (0x5555, 0x10)
            ]
        );
        assert!(bus
            .pins()
            .events
            .contains(&PinEvent::DelayMs(CHIP_ERASE_WAIT_MS)));
    }

    #[test]
    fn test_bank_erase_covers_all_sectors() {
        let mut bus = flash_bus();
        let mut flash = ParallelFlash::new(&mut bus);
        flash.enter();
        flash.erase_bank();

        let writes = bus.pins().writes();
        assert_eq!(writes.len(), 16 * 6);
        let sectors: Vec<u16> = writes
            .chunks(6)
            .map(|cmd| {
                assert_eq!(&cmd[..5], &ERASE_PREFIX);
                assert_eq!(cmd[5].1, SECTOR_ERASE);
                cmd[5].0
            })
            .collect();
        assert_eq!(sectors.first(), Some(&0x0000));
        assert_eq!(sectors.last(), Some(&0xF000));

        let waits = bus
            .pins()
            .events
            .iter()
            .filter(|e| **e == PinEvent::DelayMs(SECTOR_ERASE_WAIT_MS))
            .count();
        assert_eq!(waits, 16);
    }

    #[test]
    fn test_read_chip_identification() {
        let mut bus = flash_bus();
        bus.pins().queue_input(&[0xBF, 0xB7]);
        let mut flash = ParallelFlash::new(&mut bus);
        flash.enter();
        let id = flash.read_chip_identification();
        assert_eq!(id, ChipId::new(0xBF, 0xB7));
        assert_eq!(flash.chip_id(), id);
        assert_eq!(id.lookup().map(|c| c.name), Some("SST39SF040"));

        let writes = bus.pins().writes();
        assert_eq!(writes[2], (0x5555, ID_ENTRY));
        assert_eq!(writes[5], (0x5555, ID_EXIT));
    }

    #[test]
    fn test_bytes_programmed_blank() {
        let mut bus = flash_bus();
        let mut flash = ParallelFlash::new(&mut bus);
        flash.enter();
        assert_eq!(flash.bytes_programmed(), 0);
    }

    #[test]
    fn test_bytes_programmed_top_byte() {
        let mut bus = flash_bus();
        bus.pins().queue_input(&[0x00]);
        let mut flash = ParallelFlash::new(&mut bus);
        flash.enter();
        assert_eq!(flash.bytes_programmed(), 0x10000);
    }

    #[test]
    fn test_write_program_unknown_index() {
        let mut bus = flash_bus();
        let mut flash = ParallelFlash::new(&mut bus);
        assert_eq!(flash.write_program(7), Err(Error::InvalidProgram));
        assert_eq!(flash.mode(), FlashMode::Inactive);
    }

    #[test]
    fn test_write_program_verify_failure_leaves_mode() {
        // the mock never returns what was programmed
        let mut bus = flash_bus();
        let mut flash = ParallelFlash::new(&mut bus);
        let err = flash.write_program(0).unwrap_err();
        assert_eq!(
            err,
            Error::VerifyFailed {
                addr: 0,
                expected: 0x21,
                found: 0xFF
            }
        );
        assert_eq!(flash.mode(), FlashMode::Inactive);
        drop(flash);
        assert!(!bus.is_active());
    }
}
