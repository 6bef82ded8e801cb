//! Flash part identification

use core::fmt;

/// SST / Microchip JEDEC manufacturer ID
pub const VENDOR_SST: u8 = 0xBF;

/// Vendor and device ID as read in software ID mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChipId {
    /// JEDEC manufacturer ID (address 0x0000)
    pub vendor: u8,
    /// Device ID (address 0x0001)
    pub device: u8,
}

/// A flash part this board is known to work with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipInfo {
    /// JEDEC manufacturer ID
    pub vendor: u8,
    /// Device ID
    pub device: u8,
    /// Part name
    pub name: &'static str,
    /// Total size in bytes
    pub size: u32,
}

/// Supported parts
pub static KNOWN_CHIPS: &[ChipInfo] = &[
    ChipInfo {
        vendor: VENDOR_SST,
        device: 0xB5,
        name: "SST39SF010A",
        size: 128 * 1024,
    },
    ChipInfo {
        vendor: VENDOR_SST,
        device: 0xB6,
        name: "SST39SF020A",
        size: 256 * 1024,
    },
    ChipInfo {
        vendor: VENDOR_SST,
        device: 0xB7,
        name: "SST39SF040",
        size: 512 * 1024,
    },
];

impl ChipId {
    /// Create an ID from its two bytes
    pub const fn new(vendor: u8, device: u8) -> Self {
        Self { vendor, device }
    }

    /// Find the part in [`KNOWN_CHIPS`]
    pub fn lookup(&self) -> Option<&'static ChipInfo> {
        KNOWN_CHIPS
            .iter()
            .find(|c| c.vendor == self.vendor && c.device == self.device)
    }
}

impl fmt::Display for ChipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lookup() {
            Some(info) => write!(
                f,
                "{} ({:02X}:{:02X}, {} KiB)",
                info.name,
                self.vendor,
                self.device,
                info.size / 1024
            ),
            None => write!(f, "unknown ({:02X}:{:02X})", self.vendor, self.device),
        }
    }
}
