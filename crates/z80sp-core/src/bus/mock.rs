//! Recording pin double for unit tests

use core::cell::RefCell;
use std::collections::VecDeque;
use std::vec::Vec;

use crate::hal::{BusPins, ControlLines, DriveMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PinEvent {
    Drive(ControlLines, DriveMode),
    Lines(ControlLines, bool),
    Address(u16),
    ReleaseAddress,
    Data(u8),
    ReleaseData,
    DelayUs(u32),
    DelayMs(u32),
}

/// A strobe observed on the bus, captured at the falling edge of RD or WR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Strobe {
    pub io: bool,
    pub write: bool,
    pub address: u16,
    pub data: u8,
}

pub(crate) struct MockPins {
    pub events: Vec<PinEvent>,
    pub strobes: Vec<Strobe>,
    pub high: ControlLines,
    pub push_pull: ControlLines,
    pub address: Option<u16>,
    pub data_out: Option<u8>,
    /// Bytes returned by successive data reads, 0xFF once drained
    pub inputs: RefCell<VecDeque<u8>>,
    pub elapsed_us: u64,
}

impl MockPins {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            strobes: Vec::new(),
            high: ControlLines::empty(),
            push_pull: ControlLines::empty(),
            address: None,
            data_out: None,
            inputs: RefCell::new(VecDeque::new()),
            elapsed_us: 0,
        }
    }

    pub fn is_high(&self, lines: ControlLines) -> bool {
        self.high.contains(lines)
    }

    pub fn queue_input(&self, bytes: &[u8]) {
        self.inputs.borrow_mut().extend(bytes.iter().copied());
    }

    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.strobes
            .iter()
            .filter(|s| s.write)
            .map(|s| (s.address, s.data))
            .collect()
    }
}

impl BusPins for MockPins {
    fn set_drive_mode(&mut self, lines: ControlLines, mode: DriveMode) {
        self.events.push(PinEvent::Drive(lines, mode));
        match mode {
            DriveMode::PushPull => self.push_pull.insert(lines),
            DriveMode::OpenDrain => self.push_pull.remove(lines),
        }
    }

    fn set_lines(&mut self, lines: ControlLines, high: bool) {
        self.events.push(PinEvent::Lines(lines, high));
        let was = self.high;
        self.high.set(lines, high);

        let falling = was & !self.high;
        if falling.intersects(ControlLines::RD | ControlLines::WR) {
            self.strobes.push(Strobe {
                io: !self.high.contains(ControlLines::IOREQ),
                write: falling.contains(ControlLines::WR),
                address: self.address.unwrap_or(0xFFFF),
                data: self.data_out.unwrap_or(0xFF),
            });
        }
    }

    fn write_address(&mut self, address: u16) {
        self.events.push(PinEvent::Address(address));
        self.address = Some(address);
    }

    fn release_address(&mut self) {
        self.events.push(PinEvent::ReleaseAddress);
        self.address = None;
    }

    fn write_data(&mut self, data: u8) {
        self.events.push(PinEvent::Data(data));
        self.data_out = Some(data);
    }

    fn release_data(&mut self) {
        self.events.push(PinEvent::ReleaseData);
        self.data_out = None;
    }

    fn read_data(&self) -> u8 {
        self.inputs.borrow_mut().pop_front().unwrap_or(0xFF)
    }

    fn read_address(&self) -> u16 {
        self.address.unwrap_or(0xFFFF)
    }

    fn delay_us(&mut self, us: u32) {
        self.events.push(PinEvent::DelayUs(us));
        self.elapsed_us += u64::from(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.events.push(PinEvent::DelayMs(ms));
        self.elapsed_us += u64::from(ms) * 1000;
    }
}
