//! Hex record protocol
//!
//! Records use the Intel HEX line format, `:LLAAAATT[DD..]CC`, with all
//! fields as uppercase hex pairs. They carry flash images (data and
//! end-of-file records) as well as the short command and acknowledgement
//! messages of the loader protocol (communication records).
//!
//! ```text
//!  :  04  0000  00  AABBCCDD  EE
//!  |  |   |     |   |         +-- two's complement of the byte sum
//!  |  |   |     |   +------------ payload
//!  |  |   |     +---------------- record type
//!  |  |   +---------------------- address
//!  |  +-------------------------- payload length
//!  +----------------------------- start code
//! ```

mod encode;
mod parser;

use heapless::Vec;

use crate::error::{Error, Result};

pub use encode::EncodedRecord;
pub use parser::{ParseResult, RecordParser};

/// Largest payload accepted by the parser
pub const MAX_PAYLOAD: usize = 64;

/// Length of the longest encoded record
pub const MAX_ENCODED_LEN: usize = 1 + 2 + 4 + 2 + 2 * MAX_PAYLOAD + 2;

/// Record payload storage
pub type Payload = Vec<u8, MAX_PAYLOAD>;

/// Record type codes
pub mod record_type {
    /// Data for the flash window
    pub const DATA: u8 = 0x00;
    /// End of the image
    pub const END_OF_FILE: u8 = 0x01;
    /// Loader protocol message, one [`CommCode`](super::CommCode) byte of payload
    pub const COMMUNICATION: u8 = 0xAA;
}

/// Payload codes of communication records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommCode {
    /// Host probe: is a loader listening?
    Function0 = 0xF0,
    /// Acknowledge, no action taken
    Acknowledge0 = 0xA0,
    /// Acknowledge, record processed
    Acknowledge1 = 0xA1,
    /// Inbound record was malformed
    Error0 = 0xE0,
    /// Inbound record could not be written or verified
    Error1 = 0xE1,
}

impl CommCode {
    /// Decode a payload byte
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0xF0 => Some(Self::Function0),
            0xA0 => Some(Self::Acknowledge0),
            0xA1 => Some(Self::Acknowledge1),
            0xE0 => Some(Self::Error0),
            0xE1 => Some(Self::Error1),
            _ => None,
        }
    }

    /// Whether this code reports a failure
    pub fn is_error(self) -> bool {
        matches!(self, Self::Error0 | Self::Error1)
    }
}

/// A single record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexRecord {
    /// Record type, see [`record_type`]
    pub record_type: u8,
    /// 16-bit address field
    pub address: u16,
    /// Up to [`MAX_PAYLOAD`] data bytes
    pub payload: Payload,
}

impl HexRecord {
    /// Build a record, failing if the payload is longer than [`MAX_PAYLOAD`]
    pub fn new(record_type: u8, address: u16, payload: &[u8]) -> Result<Self> {
        let payload = Payload::from_slice(payload).map_err(|_| Error::PayloadTooLong)?;
        Ok(Self {
            record_type,
            address,
            payload,
        })
    }

    /// Data record
    pub fn data(address: u16, payload: &[u8]) -> Result<Self> {
        Self::new(record_type::DATA, address, payload)
    }

    /// End-of-file record
    pub fn end_of_file() -> Self {
        Self {
            record_type: record_type::END_OF_FILE,
            ..Default::default()
        }
    }

    /// Communication record carrying `code`
    pub fn communication(code: CommCode) -> Self {
        let mut payload = Payload::new();
        // capacity is MAX_PAYLOAD, one byte always fits
        let _ = payload.push(code as u8);
        Self {
            record_type: record_type::COMMUNICATION,
            address: 0,
            payload,
        }
    }

    /// The code of a one-byte communication record
    pub fn comm_code(&self) -> Option<CommCode> {
        if self.record_type != record_type::COMMUNICATION || self.payload.len() != 1 {
            return None;
        }
        CommCode::from_u8(self.payload[0])
    }

    /// Checksum byte as transmitted
    pub fn checksum(&self) -> u8 {
        let [hi, lo] = self.address.to_be_bytes();
        let sum = self
            .payload
            .iter()
            .fold(
                (self.payload.len() as u8)
                    .wrapping_add(hi)
                    .wrapping_add(lo)
                    .wrapping_add(self.record_type),
                |acc, &b| acc.wrapping_add(b),
            );
        (!sum).wrapping_add(1)
    }

    /// ASCII form of the record, without line terminator
    pub fn encode(&self) -> EncodedRecord {
        EncodedRecord::new(self)
    }
}

impl core::fmt::Display for HexRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.encode().as_str())
    }
}
