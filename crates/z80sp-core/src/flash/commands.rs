//! SST39SF0x0 command sequences and timings
//!
//! The part only accepts a command after a fixed pattern of writes to two
//! magic addresses. All sequences are issued with MREQ held low.

// ============================================================================
// Unlock pattern
// ============================================================================

/// First unlock address
pub const UNLOCK_ADDR_1: u16 = 0x5555;
/// Second unlock address
pub const UNLOCK_ADDR_2: u16 = 0x2AAA;
/// Data written to the first unlock address
pub const UNLOCK_DATA_1: u8 = 0xAA;
/// Data written to the second unlock address
pub const UNLOCK_DATA_2: u8 = 0x55;

// ============================================================================
// Command bytes (written to UNLOCK_ADDR_1 after the unlock pattern)
// ============================================================================

/// Byte program
pub const BYTE_PROGRAM: u8 = 0xA0;
/// Erase setup, followed by a second unlock and the erase command
pub const ERASE_SETUP: u8 = 0x80;
/// Chip erase (to UNLOCK_ADDR_1)
pub const CHIP_ERASE: u8 = 0x10;
/// Sector erase (to any address within the sector)
pub const SECTOR_ERASE: u8 = 0x30;
/// Enter software ID mode
pub const ID_ENTRY: u8 = 0x90;
/// Exit software ID mode
pub const ID_EXIT: u8 = 0xF0;

// ============================================================================
// Geometry
// ============================================================================

/// Smallest erasable unit
pub const SECTOR_SIZE: u32 = 0x1000;
/// Sectors in the 64 KiB window seen by the Z80
pub const SECTORS_PER_BANK: u16 = 16;
/// Size of the window seen by the Z80
pub const BANK_SIZE: u32 = 0x1_0000;

// ============================================================================
// Timings (minimums from the datasheet, rounded up)
// ============================================================================

/// Byte program time
pub const BYTE_WRITE_WAIT_US: u32 = 25;
/// Sector erase time
pub const SECTOR_ERASE_WAIT_MS: u32 = 25;
/// Chip erase time
pub const CHIP_ERASE_WAIT_MS: u32 = 100;
/// ID mode entry/exit and access time
pub const ID_MODE_ACCESS_US: u32 = 10;

/// The three-write byte program prefix
pub const PROGRAM_PREFIX: [(u16, u8); 3] = [
    (UNLOCK_ADDR_1, UNLOCK_DATA_1),
    (UNLOCK_ADDR_2, UNLOCK_DATA_2),
    (UNLOCK_ADDR_1, BYTE_PROGRAM),
];

/// The five-write erase prefix; the sixth write selects chip or sector erase
pub const ERASE_PREFIX: [(u16, u8); 5] = [
    (UNLOCK_ADDR_1, UNLOCK_DATA_1),
    (UNLOCK_ADDR_2, UNLOCK_DATA_2),
    (UNLOCK_ADDR_1, ERASE_SETUP),
    (UNLOCK_ADDR_1, UNLOCK_DATA_1),
    (UNLOCK_ADDR_2, UNLOCK_DATA_2),
];

/// Setup, pulse and hold times of a single write strobe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStrobe {
    /// Address and data stable before WR falls
    pub setup_us: u32,
    /// WR low time
    pub pulse_us: u32,
    /// Address and data stable after WR rises
    pub hold_us: u32,
}

impl Default for WriteStrobe {
    fn default() -> Self {
        Self {
            setup_us: 10,
            pulse_us: 10,
            hold_us: 10,
        }
    }
}
