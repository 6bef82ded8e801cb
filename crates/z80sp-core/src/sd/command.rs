//! SD SPI-mode command framing
//!
//! Every command is six bytes: the index with the transmission bit set, a
//! 32-bit big-endian argument, and a CRC7 with the end bit set. The CRC is
//! only checked by the card for CMD0 and CMD8, so the others carry a dummy.

/// Block size of SDHC/SDXC cards
pub const BLOCK_SIZE: usize = 512;

/// Longest command response read by this driver (R3/R7)
pub const RESPONSE_LEN: usize = 5;

/// R1: card is in idle state
pub const R1_IDLE: u8 = 0x01;
/// R1: no error, initialisation complete
pub const R1_READY: u8 = 0x00;
/// OCR byte 1: card capacity status (SDHC/SDXC)
pub const OCR_CCS: u8 = 0x40;

/// Start token of a single-block data transfer
pub const START_BLOCK: u8 = 0xFE;
/// Mask for the status bits of a data response token
pub const DATA_RESPONSE_MASK: u8 = 0x1F;
/// Data response: block accepted
pub const DATA_ACCEPTED: u8 = 0x05;

// Polling limits
/// Reads spent waiting for a command response
pub const CMD_RESPONSE_TRIES: usize = 15;
/// CMD55/ACMD41 rounds before giving up on initialisation
pub const INIT_TRIES: usize = 1000;
/// Delay between CMD55/ACMD41 rounds
pub const INIT_RETRY_DELAY_US: u32 = 1000;
/// Reads spent waiting for the data token of a block read
pub const READ_TOKEN_TRIES: usize = 1000;
/// Reads spent waiting for the data response after a block write
pub const WRITE_RESPONSE_TRIES: usize = 10_000;
/// Reads spent waiting for the card to finish programming a block
pub const WRITE_BUSY_TRIES: usize = 10_000;
/// Idle bytes clocked out on wakeup (at least 74 clocks are required)
pub const WAKEUP_BYTES: usize = 10;

/// A framed SD command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdCommand([u8; 6]);

impl SdCommand {
    /// Frame command `index` with `argument` and `crc`
    pub const fn new(index: u8, argument: u32, crc: u8) -> Self {
        let arg = argument.to_be_bytes();
        Self([index | 0x40, arg[0], arg[1], arg[2], arg[3], crc | 0x01])
    }

    /// CMD17, READ_SINGLE_BLOCK
    pub const fn read_single_block(block: u32) -> Self {
        Self::new(17, block, 0)
    }

    /// CMD24, WRITE_BLOCK
    pub const fn write_block(block: u32) -> Self {
        Self::new(24, block, 0)
    }

    /// The bytes sent on the wire
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Command index without the transmission bit
    pub const fn index(&self) -> u8 {
        self.0[0] & 0x3F
    }

    /// Command argument
    pub const fn argument(&self) -> u32 {
        u32::from_be_bytes([self.0[1], self.0[2], self.0[3], self.0[4]])
    }
}

/// CMD0, GO_IDLE_STATE
pub const CMD0: SdCommand = SdCommand::new(0, 0, 0x94);
/// CMD8, SEND_IF_COND: 2.7-3.6 V, check pattern 0xAA
pub const CMD8: SdCommand = SdCommand::new(8, 0x0000_01AA, 0x86);
/// CMD55, APP_CMD
pub const CMD55: SdCommand = SdCommand::new(55, 0x0000_01AA, 0x86);
/// ACMD41, SD_SEND_OP_COND with HCS set
pub const ACMD41: SdCommand = SdCommand::new(41, 0x4000_0000, 0x00);
/// CMD58, READ_OCR
pub const CMD58: SdCommand = SdCommand::new(58, 0x4000_0000, 0x00);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_framing() {
        assert_eq!(CMD0.as_bytes(), &[0x40, 0x00, 0x00, 0x00, 0x00, 0x95]);
        assert_eq!(CMD8.as_bytes(), &[0x48, 0x00, 0x00, 0x01, 0xAA, 0x87]);
        assert_eq!(ACMD41.as_bytes(), &[0x69, 0x40, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(CMD58.as_bytes(), &[0x7A, 0x40, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_block_argument_big_endian() {
        let cmd = SdCommand::read_single_block(0x0012_3456);
        assert_eq!(cmd.as_bytes(), &[0x51, 0x00, 0x12, 0x34, 0x56, 0x01]);
        assert_eq!(cmd.index(), 17);
        assert_eq!(cmd.argument(), 0x0012_3456);

        assert_eq!(SdCommand::write_block(1).as_bytes()[0], 0x58);
    }
}
