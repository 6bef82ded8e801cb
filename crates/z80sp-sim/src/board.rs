//! Pin-level model of the board

use z80sp_core::hal::{BusPins, ControlLines, DriveMode};
use z80sp_core::spi::{SpiIn, SpiOut, SPI_IN_PORT, SPI_OUT_PORT};

use crate::flash::SimFlash;
use crate::sdcard::SimSdCard;
use crate::SimConfig;

/// The board as seen through the bus pins
///
/// Memory cycles go to the flash model, IO cycles to the SPI latch and input
/// buffer. Write cycles take effect on the rising edge of WR; reads are
/// combinational, so the data bus follows the address while RD is low. The
/// Z80 itself is not modelled.
#[derive(Debug, Clone)]
pub struct SimBoard {
    lines: ControlLines,
    push_pull: ControlLines,
    address: Option<u16>,
    data: Option<u8>,
    flash: SimFlash,
    card: Option<SimSdCard>,
    spi_out: SpiOut,
    elapsed_us: u64,
    bus_violations: u32,
}

impl SimBoard {
    /// Build a board from its configuration
    pub fn new(config: SimConfig) -> Self {
        Self {
            lines: ControlLines::all(),
            push_pull: ControlLines::empty(),
            address: None,
            data: None,
            flash: SimFlash::new(config.flash_vendor, config.flash_device, config.flash_size),
            card: config.card.map(SimSdCard::new),
            spi_out: SpiOut::IDLE,
            elapsed_us: 0,
            bus_violations: 0,
        }
    }

    /// The flash part
    pub fn flash(&self) -> &SimFlash {
        &self.flash
    }

    /// The flash part, mutable
    pub fn flash_mut(&mut self) -> &mut SimFlash {
        &mut self.flash
    }

    /// The card in the slot, if any
    pub fn card(&self) -> Option<&SimSdCard> {
        self.card.as_ref()
    }

    /// The card in the slot, mutable
    pub fn card_mut(&mut self) -> Option<&mut SimSdCard> {
        self.card.as_mut()
    }

    /// Insert a card, or empty the slot with `None`
    pub fn set_card(&mut self, card: Option<SimSdCard>) {
        self.card = card;
    }

    /// Current level of the control lines (set = high)
    pub fn lines(&self) -> ControlLines {
        self.lines
    }

    /// Lines currently configured as push-pull
    pub fn push_pull(&self) -> ControlLines {
        self.push_pull
    }

    /// Whether the Z80 is held in reset
    pub fn z80_in_reset(&self) -> bool {
        self.lines.contains(ControlLines::RESET)
    }

    /// Whether BUSREQ is asserted
    pub fn bus_requested(&self) -> bool {
        !self.lines.contains(ControlLines::BUSREQ)
    }

    /// Last value written to the SPI output latch
    pub fn spi_output(&self) -> SpiOut {
        self.spi_out
    }

    /// Simulated time spent in delays
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    /// Write cycles issued without BUSREQ asserted
    pub fn bus_violations(&self) -> u32 {
        self.bus_violations
    }

    fn address_bus(&self) -> u16 {
        self.address.unwrap_or(0xFFFF)
    }

    fn spi_input(&self) -> u8 {
        // undriven bits float high
        let mut input = SpiIn::from_bits_retain(0x3F);
        match &self.card {
            Some(card) => input.set(SpiIn::MISO, card.miso()),
            None => input.insert(SpiIn::SDDET | SpiIn::MISO),
        }
        input.bits()
    }

    /// React to a change of the control lines
    fn edges(&mut self, previous: ControlLines) {
        let wr_rise =
            !previous.contains(ControlLines::WR) && self.lines.contains(ControlLines::WR);
        if !wr_rise {
            return;
        }

        let address = self.address_bus();
        let data = self.data.unwrap_or(0xFF);
        if !self.bus_requested() {
            self.bus_violations += 1;
            log::warn!("sim: write cycle at {:04X} without bus request", address);
        }

        if !previous.contains(ControlLines::MREQ) {
            self.flash.write(address, data);
        }
        if !previous.contains(ControlLines::IOREQ) {
            self.io_write(address, data);
        }
    }

    fn io_write(&mut self, port: u16, data: u8) {
        if port & 0xFF != SPI_OUT_PORT {
            log::trace!("sim: IO write {:02X} to unmapped port {:04X}", data, port);
            return;
        }
        self.spi_out = SpiOut::from_bits_retain(data);
        if let Some(card) = &mut self.card {
            card.update(self.spi_out);
        }
    }
}

impl BusPins for SimBoard {
    fn set_drive_mode(&mut self, lines: ControlLines, mode: DriveMode) {
        self.push_pull.set(lines, mode == DriveMode::PushPull);
    }

    fn set_lines(&mut self, lines: ControlLines, high: bool) {
        let previous = self.lines;
        self.lines.set(lines, high);
        self.edges(previous);
    }

    fn write_address(&mut self, address: u16) {
        self.address = Some(address);
    }

    fn release_address(&mut self) {
        self.address = None;
    }

    fn write_data(&mut self, data: u8) {
        self.data = Some(data);
    }

    fn release_data(&mut self) {
        self.data = None;
    }

    fn read_data(&self) -> u8 {
        if self.lines.contains(ControlLines::RD) {
            return self.data.unwrap_or(0xFF);
        }
        if !self.lines.contains(ControlLines::MREQ) {
            return self.flash.read(self.address_bus());
        }
        if !self.lines.contains(ControlLines::IOREQ) && self.address_bus() & 0xFF == SPI_IN_PORT
        {
            return self.spi_input();
        }
        self.data.unwrap_or(0xFF)
    }

    fn read_address(&self) -> u16 {
        self.address_bus()
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_us += u64::from(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_us += u64::from(ms) * 1000;
    }
}
