//! Record serialisation

use core::fmt;

use super::{HexRecord, MAX_ENCODED_LEN};

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// An encoded record in a fixed buffer
#[derive(Clone)]
pub struct EncodedRecord {
    buf: [u8; MAX_ENCODED_LEN],
    len: usize,
}

impl EncodedRecord {
    pub(super) fn new(record: &HexRecord) -> Self {
        let mut out = Self {
            buf: [0; MAX_ENCODED_LEN],
            len: 0,
        };
        let [hi, lo] = record.address.to_be_bytes();

        out.push(b':');
        out.push_hex(record.payload.len() as u8);
        out.push_hex(hi);
        out.push_hex(lo);
        out.push_hex(record.record_type);
        for &byte in &record.payload {
            out.push_hex(byte);
        }
        out.push_hex(record.checksum());
        out
    }

    fn push(&mut self, c: u8) {
        self.buf[self.len] = c;
        self.len += 1;
    }

    fn push_hex(&mut self, byte: u8) {
        self.push(HEX_DIGITS[usize::from(byte >> 4)]);
        self.push(HEX_DIGITS[usize::from(byte & 0x0F)]);
    }

    /// The ASCII bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The record as a string
    pub fn as_str(&self) -> &str {
        // only ':' and hex digits are ever written
        core::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }

    /// Number of ASCII bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; a record has at least its header
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for EncodedRecord {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for EncodedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncodedRecord").field(&self.as_str()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{CommCode, MAX_PAYLOAD};
    use super::*;

    #[test]
    fn test_encode_data() {
        let record = HexRecord::data(0x0000, &[0xAA, 0xBB, 0xCC, 0xDD]).unwrap();
        assert_eq!(record.encode().as_str(), ":04000000AABBCCDDEE");
    }

    #[test]
    fn test_encode_fixed_records() {
        assert_eq!(HexRecord::end_of_file().encode().as_str(), ":00000001FF");
        assert_eq!(
            HexRecord::communication(CommCode::Acknowledge1)
                .encode()
                .as_str(),
            ":010000AAA1B4"
        );
    }

    #[test]
    fn test_encode_max_length() {
        let record = HexRecord::data(0xFFFF, &[0x5A; MAX_PAYLOAD]).unwrap();
        let encoded = record.encode();
        assert_eq!(encoded.len(), MAX_ENCODED_LEN);
        assert_eq!(&encoded.as_bytes()[..9], b":40FFFF00");
    }
}
