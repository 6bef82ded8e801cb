//! SD card block driver

use super::command::*;
use super::mbr::Mbr;
use crate::error::{MbrError, SdError};
use crate::programs;
use crate::spi::SpiPort;

/// Command response bytes; only the first `rx_len` are meaningful
pub type Response = [u8; RESPONSE_LEN];

/// Minimal SD card driver in SPI mode
///
/// Only SDHC/SDXC cards are supported, which always use 512-byte blocks and
/// block addressing. Use it as `access_card(true)`, any number of block reads
/// and writes, then `access_card(false)`. The Z80 should be held in reset for
/// the whole sequence, since the SPI latch is shared with it.
pub struct SdCard<S: SpiPort> {
    spi: S,
}

impl<S: SpiPort> SdCard<S> {
    /// Create a driver on the given SPI port
    pub fn new(spi: S) -> Self {
        Self { spi }
    }

    /// The underlying SPI port
    pub fn spi(&mut self) -> &mut S {
        &mut self.spi
    }

    /// Give the SPI port back
    pub fn into_inner(self) -> S {
        self.spi
    }

    /// Bring the card up (`true`) or give the bus back (`false`)
    ///
    /// On failure the bus stays requested; call `access_card(false)` in
    /// either case when done.
    pub fn access_card(&mut self, access: bool) -> Result<(), SdError> {
        if !access {
            self.release();
            return Ok(());
        }

        if !self.spi.request_bus(true) {
            log::debug!("sd: bus already owned");
        }
        if !self.spi.card_present() {
            return Err(SdError::NoCard);
        }

        self.wakeup();

        let r1 = self.command(CMD0, 1, CMD_RESPONSE_TRIES, true)[0];
        if r1 != R1_IDLE {
            log::debug!("sd: CMD0 answered 0x{:02X}", r1);
            return Err(SdError::NotIdle);
        }

        let r7 = self.command(CMD8, 5, CMD_RESPONSE_TRIES, true);
        if r7[0] != R1_IDLE {
            log::debug!("sd: CMD8 answered {:02X?}", r7);
            return Err(SdError::InvalidStatus);
        }

        let mut ready = false;
        for attempt in 0..INIT_TRIES {
            if self.command(CMD55, 1, CMD_RESPONSE_TRIES, true)[0] == R1_IDLE
                && self.command(ACMD41, 1, CMD_RESPONSE_TRIES, true)[0] == R1_READY
            {
                log::debug!("sd: ready after {} rounds", attempt + 1);
                ready = true;
                break;
            }
            self.spi.delay_us(INIT_RETRY_DELAY_US);
        }
        if !ready {
            return Err(SdError::NotReady);
        }

        let r3 = self.command(CMD58, 5, CMD_RESPONSE_TRIES, true);
        if r3[0] != R1_READY || r3[1] & OCR_CCS == 0 {
            log::debug!("sd: CMD58 answered {:02X?}", r3);
            return Err(SdError::InvalidCapacity);
        }
        Ok(())
    }

    /// Release the bus without talking to the card
    pub fn release(&mut self) {
        self.spi.request_bus(false);
    }

    /// Read one block
    pub fn read_block(&mut self, block: u32, dst: &mut [u8; BLOCK_SIZE]) -> Result<(), SdError> {
        self.select_card(true);
        let r1 = self.command(
            SdCommand::read_single_block(block),
            1,
            CMD_RESPONSE_TRIES,
            false,
        )[0];
        if r1 != R1_READY {
            self.select_card(false);
            return Err(SdError::CommandRejected);
        }

        if self.poll(READ_TOKEN_TRIES, |b| b != 0xFF).is_none() {
            self.select_card(false);
            log::warn!("sd: no data token for block {}", block);
            return Err(SdError::ReadTimeout);
        }
        for byte in dst.iter_mut() {
            *byte = self.spi.read_byte();
        }
        // CRC, not checked
        self.spi.read_byte();
        self.spi.read_byte();

        self.select_card(false);
        Ok(())
    }

    /// Write one block
    ///
    /// The card stays selected until it has finished programming, so no other
    /// device can be addressed in between.
    pub fn write_block(&mut self, block: u32, src: &[u8; BLOCK_SIZE]) -> Result<(), SdError> {
        self.select_card(true);
        let r1 = self.command(SdCommand::write_block(block), 1, CMD_RESPONSE_TRIES, false)[0];
        if r1 != R1_READY {
            self.select_card(false);
            return Err(SdError::CommandRejected);
        }

        self.spi.write_byte(0xFF);
        self.spi.write_byte(START_BLOCK);
        for &byte in src {
            self.spi.write_byte(byte);
        }

        let token = match self.poll(WRITE_RESPONSE_TRIES, |b| b != 0xFF) {
            Some(token) => token,
            None => {
                self.select_card(false);
                return Err(SdError::WriteTimeoutResponse);
            }
        };
        if token & DATA_RESPONSE_MASK != DATA_ACCEPTED {
            self.select_card(false);
            log::warn!("sd: block {} rejected, token 0x{:02X}", block, token);
            return Err(SdError::WriteError);
        }

        let done = self.poll(WRITE_BUSY_TRIES, |b| b == 0xFF).is_some();
        self.select_card(false);
        if done {
            Ok(())
        } else {
            Err(SdError::WriteTimeoutBusy)
        }
    }

    /// Access the card, read the partition table and release the card
    pub fn read_mbr(&mut self) -> Result<Mbr, MbrError> {
        if let Err(e) = self.access_card(true) {
            self.release();
            return Err(MbrError::Access(e));
        }
        let mut block = [0u8; BLOCK_SIZE];
        let read = self.read_block(0, &mut block);
        self.release();
        read.map_err(MbrError::Read)?;
        Ok(Mbr::parse(&block))
    }

    /// Write a fresh partition table with four equal partitions
    ///
    /// Only block 0 is written; partition contents are left as they are.
    pub fn format_card(&mut self) -> Result<(), SdError> {
        let block = Mbr::formatted().to_block();
        log::info!("sd: writing new partition table");
        self.with_access(|card| card.write_block(0, &block))
    }

    /// Write a built-in program to the start of a partition
    ///
    /// The last block is padded with zeros.
    pub fn write_program(&mut self, partition: usize, program: usize) -> Result<(), SdError> {
        let program = programs::get(program).ok_or(SdError::InvalidProgram)?;
        let mbr = self.read_mbr()?;
        let target = *mbr.partition(partition).ok_or(SdError::InvalidPartition)?;

        let blocks = program.len().div_ceil(BLOCK_SIZE);
        if blocks as u64 > u64::from(target.size) {
            return Err(SdError::InvalidProgram);
        }

        log::info!(
            "sd: writing '{}' to partition {} at block {}",
            program.name,
            partition,
            target.block
        );
        self.with_access(|card| {
            for (offset, chunk) in (0u32..).zip(program.data.chunks(BLOCK_SIZE)) {
                let mut block = [0u8; BLOCK_SIZE];
                block[..chunk.len()].copy_from_slice(chunk);
                card.write_block(target.block + offset, &block)?;
            }
            Ok(())
        })
    }

    /// Send a command and collect its response
    ///
    /// Clocks out the command, then reads until a byte with bit 7 clear
    /// arrives (at most `max_tries` reads) and reads `rx_len - 1` more bytes.
    /// With `control_select` the card is selected around the exchange.
    pub fn command(
        &mut self,
        cmd: SdCommand,
        rx_len: usize,
        max_tries: usize,
        control_select: bool,
    ) -> Response {
        let mut response = [0xFF; RESPONSE_LEN];
        if control_select {
            self.select_card(true);
        }

        for &byte in cmd.as_bytes() {
            self.spi.write_byte(byte);
        }
        response[0] = self
            .poll(max_tries, |b| b & 0x80 == 0)
            .unwrap_or(0xFF);
        for slot in response.iter_mut().take(rx_len).skip(1) {
            *slot = self.spi.read_byte();
        }

        if control_select {
            self.select_card(false);
        }
        log::trace!("sd: CMD{} -> {:02X?}", cmd.index(), &response[..rx_len.min(RESPONSE_LEN)]);
        response
    }

    /// Select (`true`) or deselect the card, with 8 clocks on either side
    fn select_card(&mut self, selected: bool) {
        self.spi.write_byte(0xFF);
        self.spi.slave_select(!selected);
        self.spi.write_byte(0xFF);
    }

    /// At least 74 clocks with the card deselected
    fn wakeup(&mut self) {
        self.spi.slave_select(true);
        self.spi.delay_ms(1);
        for _ in 0..WAKEUP_BYTES {
            self.spi.write_byte(0xFF);
        }
    }

    fn poll(&mut self, tries: usize, accept: impl Fn(u8) -> bool) -> Option<u8> {
        (0..tries)
            .map(|_| self.spi.read_byte())
            .find(|&b| accept(b))
    }

    fn with_access<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, SdError>,
    ) -> Result<T, SdError> {
        let result = self.access_card(true).and_then(|()| f(self));
        self.release();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::vec::Vec;

    /// SPI double replaying a fixed MISO script (0xFF once exhausted)
    #[derive(Default)]
    struct ScriptedSpi {
        miso: VecDeque<u8>,
        mosi: Vec<u8>,
        select: Vec<bool>,
        no_card: bool,
        owned: bool,
    }

    impl ScriptedSpi {
        fn with_script(script: &[u8]) -> Self {
            Self {
                miso: script.iter().copied().collect(),
                ..Default::default()
            }
        }

        fn level(&self) -> bool {
            self.select.last().copied().unwrap_or(true)
        }
    }

    impl SpiPort for ScriptedSpi {
        fn request_bus(&mut self, request: bool) -> bool {
            self.owned = request;
            true
        }

        fn slave_select(&mut self, high: bool) {
            self.select.push(high);
        }

        fn write_byte(&mut self, data: u8) {
            self.mosi.push(data);
        }

        fn read_byte(&mut self) -> u8 {
            self.miso.pop_front().unwrap_or(0xFF)
        }

        fn check_sd_detect(&mut self) -> bool {
            self.no_card
        }

        fn delay_us(&mut self, _us: u32) {}

        fn delay_ms(&mut self, _ms: u32) {}
    }

    #[test]
    fn test_no_card() {
        let mut spi = ScriptedSpi::default();
        spi.no_card = true;
        let mut card = SdCard::new(spi);
        assert_eq!(card.access_card(true), Err(SdError::NoCard));
        assert!(card.spi().mosi.is_empty());
    }

    #[test]
    fn test_not_idle() {
        // CMD0 gets no answer at all
        let mut card = SdCard::new(ScriptedSpi::default());
        assert_eq!(card.access_card(true), Err(SdError::NotIdle));
        // 10 wakeup bytes, select clocks, CMD0
        let mosi = &card.spi().mosi;
        assert_eq!(&mosi[12..18], CMD0.as_bytes());
    }

    #[test]
    fn test_access_sequence() {
        let script = [
            0x01, // CMD0
            0x01, 0x00, 0x00, 0x01, 0xAA, // CMD8
            0x01, 0x01, // CMD55, ACMD41 still busy
            0x01, 0x00, // CMD55, ACMD41 ready
            0x00, 0xC0, 0xFF, 0x80, 0x00, // CMD58
        ];
        let mut card = SdCard::new(ScriptedSpi::with_script(&script));
        assert_eq!(card.access_card(true), Ok(()));
        assert!(card.spi().owned);
        assert!(card.spi().level());
        card.access_card(false).unwrap();
        assert!(!card.spi().owned);
    }

    #[test]
    fn test_standard_capacity_rejected() {
        let script = [
            0x01, 0x01, 0x00, 0x00, 0x01, 0xAA, 0x01, 0x00, 0x00, 0x80, 0xFF, 0x80, 0x00,
        ];
        let mut card = SdCard::new(ScriptedSpi::with_script(&script));
        assert_eq!(card.access_card(true), Err(SdError::InvalidCapacity));
    }

    #[test]
    fn test_response_skips_busy_bytes() {
        let mut card = SdCard::new(ScriptedSpi::with_script(&[0xFF, 0xFF, 0x01]));
        let r = card.command(CMD0, 1, CMD_RESPONSE_TRIES, true);
        assert_eq!(r[0], 0x01);
    }

    #[test]
    fn test_read_block() {
        let mut script = std::vec![0x00, 0xFF, 0xFF, START_BLOCK];
        script.extend((0..BLOCK_SIZE).map(|i| i as u8));
        script.extend([0x12, 0x34]);
        let mut card = SdCard::new(ScriptedSpi::with_script(&script));

        let mut block = [0u8; BLOCK_SIZE];
        card.read_block(3, &mut block).unwrap();
        assert_eq!(block[0], 0);
        assert_eq!(block[511], 0xFF);
        assert!(card.spi().miso.is_empty());
        assert!(card.spi().level());

        let mosi = &card.spi().mosi;
        assert_eq!(&mosi[2..8], SdCommand::read_single_block(3).as_bytes());
    }

    #[test]
    fn test_read_block_rejected() {
        let mut card = SdCard::new(ScriptedSpi::with_script(&[0x04]));
        let mut block = [0u8; BLOCK_SIZE];
        assert_eq!(
            card.read_block(0, &mut block),
            Err(SdError::CommandRejected)
        );
        assert!(card.spi().level());
    }

    #[test]
    fn test_read_block_timeout() {
        let mut card = SdCard::new(ScriptedSpi::with_script(&[0x00]));
        let mut block = [0u8; BLOCK_SIZE];
        assert_eq!(card.read_block(0, &mut block), Err(SdError::ReadTimeout));
    }

    #[test]
    fn test_write_block() {
        let mut card = SdCard::new(ScriptedSpi::with_script(&[0x00, 0xFF, 0xE5, 0x00, 0x00, 0xFF]));
        let block = [0xA5u8; BLOCK_SIZE];
        assert_eq!(card.write_block(9, &block), Ok(()));

        let spi = card.spi();
        // select clocks, CMD24, dummy byte, start token, data
        assert_eq!(&spi.mosi[2..8], SdCommand::write_block(9).as_bytes());
        assert_eq!(spi.mosi[8], 0xFF);
        assert_eq!(spi.mosi[9], START_BLOCK);
        assert!(spi.mosi[10..10 + BLOCK_SIZE].iter().all(|&b| b == 0xA5));
        // selected once, deselected only after the busy phase
        assert_eq!(spi.select, [false, true]);
        assert!(spi.miso.is_empty());
    }

    #[test]
    fn test_write_block_error_token() {
        let mut card = SdCard::new(ScriptedSpi::with_script(&[0x00, 0x0B]));
        let block = [0u8; BLOCK_SIZE];
        assert_eq!(card.write_block(0, &block), Err(SdError::WriteError));
        assert!(card.spi().level());
    }

    #[test]
    fn test_write_block_timeouts() {
        let block = [0u8; BLOCK_SIZE];

        let mut card = SdCard::new(ScriptedSpi::with_script(&[0x00]));
        assert_eq!(
            card.write_block(0, &block),
            Err(SdError::WriteTimeoutResponse)
        );

        let mut busy = std::vec![0x00, 0x05];
        busy.extend(core::iter::repeat(0x00).take(WRITE_BUSY_TRIES));
        let mut card = SdCard::new(ScriptedSpi::with_script(&busy));
        assert_eq!(card.write_block(0, &block), Err(SdError::WriteTimeoutBusy));
        assert!(card.spi().level());
    }

    #[test]
    fn test_read_mbr_access_failure() {
        let mut spi = ScriptedSpi::default();
        spi.no_card = true;
        let mut card = SdCard::new(spi);
        assert_eq!(card.read_mbr(), Err(MbrError::Access(SdError::NoCard)));
        assert!(!card.spi().owned);
    }

    #[test]
    fn test_write_program_unknown() {
        let mut card = SdCard::new(ScriptedSpi::default());
        assert_eq!(card.write_program(0, 99), Err(SdError::InvalidProgram));
        assert!(card.spi().mosi.is_empty());
    }
}
