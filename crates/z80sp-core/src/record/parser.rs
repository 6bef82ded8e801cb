//! Streaming record parser

use super::{HexRecord, MAX_PAYLOAD};

/// Outcome of feeding one character to the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseResult {
    /// More characters are needed
    Incomplete,
    /// A record with a matching checksum was completed
    Valid,
    /// The record was malformed and has been dropped
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Length,
    Address,
    Type,
    Data,
    Checksum,
}

impl State {
    /// Hex characters in one field of this state
    fn field_chars(self) -> u8 {
        match self {
            Self::Address => 4,
            _ => 2,
        }
    }
}

/// Character-at-a-time record parser
///
/// Everything outside a record is ignored, so records may be separated by
/// line breaks or any other noise. After a [`ParseResult::Valid`] the record
/// stays available through [`record`](Self::record) until the next start code.
#[derive(Debug, Clone)]
pub struct RecordParser {
    state: State,
    chars: u8,
    field: u16,
    length: u8,
    checksum: u8,
    record: HexRecord,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordParser {
    /// Create a parser waiting for a start code
    pub fn new() -> Self {
        Self {
            state: State::Start,
            chars: 0,
            field: 0,
            length: 0,
            checksum: 0,
            record: HexRecord::default(),
        }
    }

    /// Drop any partial record and wait for the next start code
    pub fn reset(&mut self) {
        self.state = State::Start;
        self.chars = 0;
        self.field = 0;
    }

    /// The record assembled so far; complete after [`ParseResult::Valid`]
    pub fn record(&self) -> &HexRecord {
        &self.record
    }

    /// Whether a record is being received
    pub fn in_record(&self) -> bool {
        self.state != State::Start
    }

    /// Feed one character
    pub fn update(&mut self, c: u8) -> ParseResult {
        if self.state == State::Start {
            if c == b':' {
                self.begin();
            }
            return ParseResult::Incomplete;
        }

        let Some(nibble) = hex_value(c) else {
            // a start code inside a record resynchronises on the new record
            self.reset();
            if c == b':' {
                self.begin();
            }
            return ParseResult::Error;
        };

        self.field = (self.field << 4) | u16::from(nibble);
        self.chars += 1;
        if self.chars < self.state.field_chars() {
            return ParseResult::Incomplete;
        }

        let value = self.field;
        self.chars = 0;
        self.field = 0;

        match self.state {
            State::Start => {}
            State::Length => {
                self.length = value as u8;
                self.add(self.length);
                if usize::from(self.length) > MAX_PAYLOAD {
                    self.reset();
                    return ParseResult::Error;
                }
                self.state = State::Address;
            }
            State::Address => {
                self.record.address = value;
                let [hi, lo] = value.to_be_bytes();
                self.add(hi);
                self.add(lo);
                self.state = State::Type;
            }
            State::Type => {
                self.record.record_type = value as u8;
                self.add(value as u8);
                self.state = if self.length > 0 {
                    State::Data
                } else {
                    State::Checksum
                };
            }
            State::Data => {
                let byte = value as u8;
                self.add(byte);
                // length is bounded by MAX_PAYLOAD above
                let _ = self.record.payload.push(byte);
                if self.record.payload.len() == usize::from(self.length) {
                    self.state = State::Checksum;
                }
            }
            State::Checksum => {
                self.state = State::Start;
                let expected = (!self.checksum).wrapping_add(1);
                if expected == value as u8 {
                    return ParseResult::Valid;
                }
                log::debug!(
                    "record: checksum 0x{:02X}, expected 0x{:02X}",
                    value,
                    expected
                );
                return ParseResult::Error;
            }
        }
        ParseResult::Incomplete
    }

    fn begin(&mut self) {
        self.state = State::Length;
        self.chars = 0;
        self.field = 0;
        self.checksum = 0;
        self.record.payload.clear();
    }

    fn add(&mut self, byte: u8) {
        self.checksum = self.checksum.wrapping_add(byte);
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
