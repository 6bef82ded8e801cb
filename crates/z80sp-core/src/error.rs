//! Error types for z80sp-core
//!
//! This module provides no_std compatible error types that can be used
//! throughout the crate. The SD card driver has its own closed result set
//! (`SdError`) because callers present each outcome to the user separately.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Operation requires flash mode, but the flash is not active
    FlashInactive,
    /// Verification after programming found a mismatch
    VerifyFailed {
        /// Address of the first mismatching byte
        addr: u16,
        /// Byte that was programmed
        expected: u8,
        /// Byte read back from the flash
        found: u8,
    },
    /// Built-in program index does not exist
    InvalidProgram,
    /// Record payload exceeds the protocol maximum
    PayloadTooLong,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlashInactive => write!(f, "flash mode is not active"),
            Self::VerifyFailed {
                addr,
                expected,
                found,
            } => write!(
                f,
                "verify failed at 0x{:04X}: expected 0x{:02X}, found 0x{:02X}",
                addr, expected, found
            ),
            Self::InvalidProgram => write!(f, "no such built-in program"),
            Self::PayloadTooLong => write!(f, "record payload too long"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

/// Outcome of an SD card operation that did not succeed
///
/// Each variant identifies the phase in which the card stopped cooperating,
/// so diagnostics can tell a missing card from a hung write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdError {
    /// Card detect switch reports an empty slot
    NoCard,
    /// CMD0 (GO_IDLE_STATE) did not answer with R1 = 0x01
    NotIdle,
    /// CMD8 (SEND_IF_COND) did not answer with R1 = 0x01
    InvalidStatus,
    /// ACMD41 never reported the card ready
    NotReady,
    /// CMD58 reported a standard capacity card (only SDHC/SDXC are supported)
    InvalidCapacity,
    /// CMD17/CMD24 was not accepted (R1 != 0x00)
    CommandRejected,
    /// No data token arrived while reading a block
    ReadTimeout,
    /// Data response token reported the block as rejected
    WriteError,
    /// No data response token arrived after sending a block
    WriteTimeoutResponse,
    /// Card stayed busy after accepting a block
    WriteTimeoutBusy,
    /// Partition index is out of range or the partition is empty
    InvalidPartition,
    /// Built-in program index does not exist or does not fit the partition
    InvalidProgram,
}

impl fmt::Display for SdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCard => write!(f, "no card detected in SD slot"),
            Self::NotIdle => write!(f, "GO_IDLE_STATE command failed"),
            Self::InvalidStatus => write!(f, "SEND_IF_COND command failed"),
            Self::NotReady => write!(f, "card not ready, APP_CMD_41 timed out"),
            Self::InvalidCapacity => write!(f, "unsupported card, use SDHC or SDXC"),
            Self::CommandRejected => write!(f, "card rejected the block command"),
            Self::ReadTimeout => write!(f, "timeout while waiting for data token"),
            Self::WriteError => write!(f, "card rejected the data block"),
            Self::WriteTimeoutResponse => write!(f, "timeout while waiting for data response"),
            Self::WriteTimeoutBusy => write!(f, "timeout while card was busy writing"),
            Self::InvalidPartition => write!(f, "invalid partition"),
            Self::InvalidProgram => write!(f, "invalid program for partition"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SdError {}

/// Failure of [`SdCard::read_mbr`](crate::sd::SdCard::read_mbr), by phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbrError {
    /// The card could not be brought up
    Access(SdError),
    /// Block 0 could not be read
    Read(SdError),
}

impl MbrError {
    /// The underlying card error, regardless of phase
    pub fn sd_error(&self) -> SdError {
        match *self {
            Self::Access(e) | Self::Read(e) => e,
        }
    }
}

impl fmt::Display for MbrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access(e) => write!(f, "card access failed: {}", e),
            Self::Read(e) => write!(f, "reading MBR failed: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MbrError {}

impl From<MbrError> for SdError {
    fn from(e: MbrError) -> Self {
        e.sd_error()
    }
}
