//! z80sp-sim - In-memory simulation of the Z80 support board
//!
//! This crate provides a pin-level model of the board that implements
//! [`BusPins`](z80sp_core::hal::BusPins), so the real drivers from
//! `z80sp-core` can be run without hardware. The model contains an
//! SST39SF0x0 flash on the memory bus and an SD card behind the IO-port SPI
//! latch.
//!
//! ```
//! use z80sp_core::bus::BusArbiter;
//! use z80sp_core::flash::ParallelFlash;
//! use z80sp_sim::{SimBoard, SimConfig};
//!
//! let mut bus = BusArbiter::new(SimBoard::new(SimConfig::default()));
//! let mut flash = ParallelFlash::new(&mut bus);
//! flash.enter();
//! let id = flash.read_chip_identification();
//! flash.exit();
//! assert_eq!(id.vendor, 0xBF);
//! ```

mod board;
mod flash;
mod sdcard;

use std::cell::Cell;

use z80sp_core::flash::VENDOR_SST;
use z80sp_core::hal::Clock;

pub use board::SimBoard;
pub use flash::SimFlash;
pub use sdcard::{CardConfig, SimSdCard, WAKEUP_CLOCKS};

/// Configuration for the simulated board
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Flash manufacturer ID
    pub flash_vendor: u8,
    /// Flash device ID
    pub flash_device: u8,
    /// Flash size in bytes
    pub flash_size: usize,
    /// Card in the slot, `None` for an empty slot
    pub card: Option<CardConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            flash_vendor: VENDOR_SST,
            flash_device: 0xB7, // SST39SF040
            flash_size: 512 * 1024,
            card: Some(CardConfig::default()),
        }
    }
}

/// Millisecond clock that only moves when told to
#[derive(Debug, Default)]
pub struct SimClock {
    now: Cell<u64>,
}

impl SimClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    /// Set the clock to an absolute time
    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use z80sp_core::bus::BusArbiter;
    use z80sp_core::flash::{ChipId, FlashTarget, ParallelFlash};
    use z80sp_core::loader::{FlashLoader, LoaderMode, ACTIVATION_PHRASE};
    use z80sp_core::programs;
    use z80sp_core::record::{CommCode, HexRecord, ParseResult, RecordParser};
    use z80sp_core::sd::{
        Mbr, SdCard, SdError, BLOCK_SIZE, FORMAT_FIRST_BLOCK, FORMAT_PARTITION_BLOCKS,
    };
    use z80sp_core::spi::{SoftSpi, SpiPort};
    use z80sp_core::Error;

    fn board() -> BusArbiter<SimBoard> {
        BusArbiter::new(SimBoard::new(SimConfig::default()))
    }

    #[derive(Default)]
    struct Sink(Vec<u8>);

    impl embedded_io::ErrorType for Sink {
        type Error = Infallible;
    }

    impl embedded_io::Write for Sink {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    fn replies(bytes: &[u8]) -> Vec<Option<CommCode>> {
        let mut parser = RecordParser::new();
        bytes
            .iter()
            .filter_map(|&c| {
                (parser.update(c) == ParseResult::Valid).then(|| parser.record().comm_code())
            })
            .collect()
    }

    #[test]
    fn test_identify() {
        let mut bus = board();
        let mut flash = ParallelFlash::new(&mut bus);
        flash.enter();
        let id = flash.read_chip_identification();
        // array mode again afterwards
        assert_eq!(flash.read_byte(0x0000), 0xFF);
        flash.exit();

        assert_eq!(id, ChipId::new(0xBF, 0xB7));
        assert_eq!(id.lookup().map(|c| c.name), Some("SST39SF040"));
        assert!(!bus.pins().flash().in_id_mode());
        assert_eq!(bus.pins().bus_violations(), 0);
    }

    #[test]
    fn test_flash_write_program() {
        let mut bus = board();
        let program = programs::get(1).unwrap();
        bus.pins_mut().flash_mut().data_mut()[0x8000] = 0x00;

        let mut flash = ParallelFlash::new(&mut bus);
        flash.write_program(1).unwrap();
        assert!(!flash.is_active());

        flash.enter();
        assert_eq!(flash.bytes_programmed(), program.len() as u32);
        flash.exit();

        let pins = bus.pins();
        assert_eq!(&pins.flash().data()[..program.len()], program.data);
        // whole window erased
        assert_eq!(pins.flash().data()[0x8000], 0xFF);
        assert_eq!(pins.flash().sector_erases(), 16);
        assert!(!pins.z80_in_reset());
        assert!(!pins.bus_requested());
        assert_eq!(pins.bus_violations(), 0);
    }

    #[test]
    fn test_flash_unknown_program() {
        let mut bus = board();
        let mut flash = ParallelFlash::new(&mut bus);
        assert_eq!(flash.write_program(7), Err(Error::InvalidProgram));
        assert_eq!(bus.pins().flash().sector_erases(), 0);
    }

    #[test]
    fn test_flash_dirty_byte_fails_verify() {
        let mut bus = board();
        let mut flash = ParallelFlash::new(&mut bus);
        flash.enter();
        flash.write_byte(0x0010, 0x0F);
        // programming cannot set bits again
        flash.write_byte(0x0010, 0xF0);
        let result = flash.verify(0x0010, &[0xF0]);
        flash.exit();
        assert_eq!(
            result,
            Err(Error::VerifyFailed {
                addr: 0x0010,
                expected: 0xF0,
                found: 0x00
            })
        );
    }

    #[test]
    fn test_sd_format_and_read_mbr() {
        let mut bus = board();
        let mbr = {
            let mut card = SdCard::new(SoftSpi::new(&mut bus));
            card.format_card().unwrap();
            card.read_mbr().unwrap()
        };

        assert_eq!(mbr, Mbr::formatted());
        assert_eq!(mbr.partitions, 4);
        let sd = bus.pins().card().unwrap();
        assert_eq!(&sd.block(0)[510..], &[0x55, 0xAA]);
        assert_eq!(sd.written_blocks().collect::<Vec<_>>(), [0]);
        assert!(!bus.is_active());
        assert_eq!(bus.pins().bus_violations(), 0);
    }

    #[test]
    fn test_sd_block_round_trip() {
        let mut bus = board();
        let mut pattern = [0u8; BLOCK_SIZE];
        for (i, byte) in pattern.iter_mut().enumerate() {
            *byte = (i * 7) as u8;
        }

        let mut readback = [0u8; BLOCK_SIZE];
        {
            let mut card = SdCard::new(SoftSpi::new(&mut bus));
            card.access_card(true).unwrap();
            card.write_block(1234, &pattern).unwrap();
            card.read_block(1234, &mut readback).unwrap();
            card.access_card(false).unwrap();
        }

        assert_eq!(readback, pattern);
        assert_eq!(bus.pins().card().unwrap().block(1234), pattern);
    }

    #[test]
    fn test_sd_write_program() {
        let mut bus = board();
        let program = programs::get(0).unwrap();
        {
            let mut card = SdCard::new(SoftSpi::new(&mut bus));
            card.format_card().unwrap();
            card.write_program(1, 0).unwrap();
            assert_eq!(card.write_program(1, 9), Err(SdError::InvalidProgram));
        }

        let start = FORMAT_FIRST_BLOCK + FORMAT_PARTITION_BLOCKS;
        let block = bus.pins().card().unwrap().block(start);
        assert_eq!(&block[..program.len()], program.data);
        assert!(block[program.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_sd_write_program_unformatted() {
        let mut bus = board();
        let mut card = SdCard::new(SoftSpi::new(&mut bus));
        assert_eq!(card.write_program(0, 0), Err(SdError::InvalidPartition));
    }

    #[test]
    fn test_sd_no_card() {
        let config = SimConfig {
            card: None,
            ..Default::default()
        };
        let mut bus = BusArbiter::new(SimBoard::new(config));
        let mut spi = SoftSpi::new(&mut bus);
        spi.request_bus(true);
        assert!(!spi.card_present());
        spi.request_bus(false);

        let result = SdCard::new(SoftSpi::new(&mut bus)).read_mbr();
        assert_eq!(result.map_err(|e| e.sd_error()), Err(SdError::NoCard));
        assert!(!bus.is_active());
    }

    #[test]
    fn test_sd_standard_capacity_rejected() {
        let config = SimConfig {
            card: Some(CardConfig {
                high_capacity: false,
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut bus = BusArbiter::new(SimBoard::new(config));
        let mut card = SdCard::new(SoftSpi::new(&mut bus));
        assert_eq!(card.access_card(true), Err(SdError::InvalidCapacity));
        card.access_card(false).unwrap();
    }

    #[test]
    fn test_sd_out_of_range_block() {
        let config = SimConfig {
            card: Some(CardConfig {
                blocks: 16,
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut bus = BusArbiter::new(SimBoard::new(config));
        let mut card = SdCard::new(SoftSpi::new(&mut bus));
        card.access_card(true).unwrap();
        let mut block = [0u8; BLOCK_SIZE];
        assert_eq!(card.read_block(16, &mut block), Err(SdError::CommandRejected));
        assert_eq!(card.write_block(16, &block), Err(SdError::CommandRejected));
        card.access_card(false).unwrap();
    }

    #[test]
    fn test_loader_session() {
        let mut bus = board();
        let clock = SimClock::new();
        let program = programs::get(0).unwrap();

        let mut tx = Sink::default();
        let records = {
            let mut loader = FlashLoader::new(ParallelFlash::new(&mut bus), &clock);
            for &byte in ACTIVATION_PHRASE {
                loader.serial_update(byte, &mut tx).unwrap();
            }
            assert_eq!(loader.mode(), LoaderMode::Active);

            let mut stream = Vec::new();
            for (address, chunk) in (0u16..).step_by(16).zip(program.data.chunks(16)) {
                let record = HexRecord::data(address, chunk).unwrap();
                stream.extend_from_slice(record.encode().as_bytes());
                stream.extend_from_slice(b"\r\n");
            }
            stream.extend_from_slice(HexRecord::end_of_file().encode().as_bytes());
            for byte in stream {
                clock.advance(1);
                loader.process();
                assert!(loader.serial_update(byte, &mut tx).unwrap());
            }
            assert_eq!(loader.mode(), LoaderMode::Inactive);
            loader.records_received()
        };

        let expected = program.len().div_ceil(16);
        assert_eq!(records as usize, expected);
        assert_eq!(
            replies(&tx.0),
            vec![Some(CommCode::Acknowledge1); expected + 1]
        );
        let pins = bus.pins();
        assert_eq!(&pins.flash().data()[..program.len()], program.data);
        assert_eq!(pins.flash().chip_erases(), 1);
        assert!(!pins.bus_requested());
        assert!(!pins.z80_in_reset());
    }

    #[test]
    fn test_loader_timeout_releases_bus() {
        let mut bus = board();
        let clock = SimClock::new();
        {
            let mut loader = FlashLoader::new(ParallelFlash::new(&mut bus), &clock);
            loader.toggle();
            assert!(loader.flash().is_active());

            clock.advance(10_001);
            loader.process();
            assert!(!loader.is_active());
        }
        assert!(!bus.pins().bus_requested());
    }

    #[test]
    fn test_flash_target_through_reference() {
        let mut bus = board();
        let mut flash = ParallelFlash::new(&mut bus);
        let target: &mut dyn FlashTarget = &mut flash;
        target.activate();
        target.write_byte(0x0042, 0x5A);
        assert_eq!(target.read_byte(0x0042), 0x5A);
        target.deactivate();
    }
}
