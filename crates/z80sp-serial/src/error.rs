//! Error types for flash loader sessions

use thiserror::Error;
use z80sp_core::record::CommCode;

/// Flash loader client errors
#[derive(Debug, Error)]
pub enum LoaderError {
    /// No port answered the probe
    #[error("No flash loader found on any serial port")]
    NoDevice,

    /// The board did not answer in time
    #[error("Communication timeout")]
    Timeout,

    /// The board answered a record with an error code
    #[error("Record at 0x{address:04X} rejected with {code:?}")]
    Rejected {
        /// Address field of the rejected record
        address: u16,
        /// Code sent by the board
        code: CommCode,
    },

    /// Image cannot be sent in one session
    #[error("Invalid image size: {0} bytes (must be 1..=65535)")]
    InvalidImageSize(usize),

    /// Record could not be built
    #[error("Record error: {0}")]
    Record(#[from] z80sp_core::Error),

    /// I/O error during communication
    #[error("I/O error: {0}")]
    IoError(String),

    /// Serial port error
    #[error("Serial port error: {0}")]
    SerialError(#[from] serialport::Error),
}

/// Result type for flash loader operations
pub type Result<T> = core::result::Result<T, LoaderError>;

impl From<std::io::Error> for LoaderError {
    fn from(e: std::io::Error) -> Self {
        LoaderError::IoError(e.to_string())
    }
}
