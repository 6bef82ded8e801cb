//! IOREQ snapshot mailbox
//!
//! The board latches address and data on every Z80 IO request in an edge
//! interrupt. The handler must not decode or log anything; it posts the raw
//! snapshot here and the poll loop picks it up later. The slot holds a single
//! snapshot: a newer request overwrites one that has not been taken yet.

use core::sync::atomic::{AtomicU32, Ordering};

const VALID: u32 = 1 << 31;
const DATA_SHIFT: u32 = 16;

/// A decoded IO request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoRequest {
    /// IO port (low byte of the address bus)
    pub port: u8,
    /// Full address bus at the time of the request
    pub address: u16,
    /// Data bus at the time of the request
    pub data: u8,
}

/// Single-slot handoff between interrupt and poll context
///
/// Both sides touch the slot with one atomic word operation, so no lock or
/// critical section is needed.
#[derive(Debug, Default)]
pub struct IoreqMailbox {
    slot: AtomicU32,
}

impl IoreqMailbox {
    /// An empty mailbox, usable in a `static`
    pub const fn new() -> Self {
        Self {
            slot: AtomicU32::new(0),
        }
    }

    /// Store a snapshot (interrupt context)
    pub fn post(&self, address: u16, data: u8) {
        let word = VALID | (u32::from(data) << DATA_SHIFT) | u32::from(address);
        self.slot.store(word, Ordering::Release);
    }

    /// Take the pending snapshot, if any, and clear the slot (poll context)
    pub fn take(&self) -> Option<IoRequest> {
        let word = self.slot.swap(0, Ordering::AcqRel);
        if word & VALID == 0 {
            return None;
        }
        let address = word as u16;
        Some(IoRequest {
            port: address as u8,
            address,
            data: (word >> DATA_SHIFT) as u8,
        })
    }

    /// Whether a snapshot is waiting
    pub fn is_pending(&self) -> bool {
        self.slot.load(Ordering::Acquire) & VALID != 0
    }
}

/// Poll-side consumer of the IOREQ mailbox
#[derive(Debug, Default)]
pub struct IoreqMonitor {
    count: u32,
}

impl IoreqMonitor {
    /// Create a monitor with a zero request count
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and decode the mailbox
    pub fn process(&mut self, mailbox: &IoreqMailbox) -> Option<IoRequest> {
        let request = mailbox.take()?;
        self.count = self.count.wrapping_add(1);
        log::debug!(
            "ioreq #{}: port 0x{:02X} data 0x{:02X}",
            self.count,
            request.port,
            request.data
        );
        Some(request)
    }

    /// Number of requests processed so far
    pub fn count(&self) -> u32 {
        self.count
    }
}
