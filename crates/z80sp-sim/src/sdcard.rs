//! SD card model in SPI mode
//!
//! The card is driven bit by bit from the SPI output latch. It samples MOSI
//! and shifts out the next MISO bit on every rising clock edge while selected.
//! Only the commands needed to bring up an SDHC card and move single blocks
//! are understood; everything else is answered with "illegal command".

use std::collections::{BTreeMap, VecDeque};

use z80sp_core::sd::BLOCK_SIZE;
use z80sp_core::spi::SpiOut;

/// Clocks with the card deselected required before CMD0 is accepted
pub const WAKEUP_CLOCKS: u32 = 74;

// R1 bits
const R1_IDLE: u8 = 0x01;
const R1_ILLEGAL_COMMAND: u8 = 0x04;
const R1_ADDRESS_ERROR: u8 = 0x20;

const START_BLOCK: u8 = 0xFE;
/// Data response token for an accepted block
const DATA_ACCEPTED: u8 = 0xE5;

/// Card parameters
#[derive(Debug, Clone)]
pub struct CardConfig {
    /// Capacity in 512-byte blocks
    pub blocks: u32,
    /// Report the CCS bit in the OCR (SDHC/SDXC)
    pub high_capacity: bool,
    /// ACMD41 rounds until the card leaves the idle state
    pub init_polls: u32,
    /// Busy bytes sent after a block write
    pub busy_bytes: usize,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            blocks: 16 * 1024 * 1024, // 8 GiB
            high_capacity: true,
            init_polls: 3,
            busy_bytes: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CardState {
    /// Native mode, waiting for CMD0
    PowerUp,
    /// SPI mode, initialisation running
    Idle,
    /// Initialised, accepts data commands
    Ready,
}

#[derive(Debug, Clone)]
enum Receive {
    Command(Vec<u8>),
    WriteToken(u32),
    WriteData(u32, Vec<u8>),
    WriteCrc(usize),
}

/// Simulated SDHC card
#[derive(Debug, Clone)]
pub struct SimSdCard {
    config: CardConfig,
    blocks: BTreeMap<u32, [u8; BLOCK_SIZE]>,
    state: CardState,
    app_command: bool,
    init_remaining: u32,
    wake_clocks: u32,
    selected: bool,
    clock: bool,
    bit: u8,
    rx: u8,
    tx: u8,
    miso: bool,
    outbound: VecDeque<u8>,
    receive: Receive,
    commands: Vec<u8>,
}

impl SimSdCard {
    /// Create a blank, powered-down card
    pub fn new(config: CardConfig) -> Self {
        Self {
            config,
            blocks: BTreeMap::new(),
            state: CardState::PowerUp,
            app_command: false,
            init_remaining: 0,
            wake_clocks: 0,
            selected: false,
            clock: false,
            bit: 0,
            rx: 0,
            tx: 0xFF,
            miso: true,
            outbound: VecDeque::new(),
            receive: Receive::Command(Vec::new()),
            commands: Vec::new(),
        }
    }

    /// Card parameters
    pub fn config(&self) -> &CardConfig {
        &self.config
    }

    /// Contents of a block; never written blocks read as zeros
    pub fn block(&self, block: u32) -> [u8; BLOCK_SIZE] {
        self.blocks.get(&block).copied().unwrap_or([0; BLOCK_SIZE])
    }

    /// Replace the contents of a block
    pub fn set_block(&mut self, block: u32, data: [u8; BLOCK_SIZE]) {
        self.blocks.insert(block, data);
    }

    /// Blocks that have been written
    pub fn written_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.blocks.keys().copied()
    }

    /// Whether the card finished initialisation
    pub fn is_ready(&self) -> bool {
        self.state == CardState::Ready
    }

    /// Indices of all commands received, in order
    pub fn commands(&self) -> &[u8] {
        &self.commands
    }

    /// Level the card drives on MISO
    pub fn miso(&self) -> bool {
        !self.selected || self.miso
    }

    /// Follow a new state of the SPI output latch
    pub fn update(&mut self, latch: SpiOut) {
        let selected = !latch.contains(SpiOut::SSEL);
        if selected != self.selected {
            self.selected = selected;
            self.bit = 0;
            self.rx = 0;
            self.miso = true;
            if !selected {
                // deselect aborts any transfer in progress
                self.outbound.clear();
                self.receive = Receive::Command(Vec::new());
            }
        }

        let clock = latch.contains(SpiOut::CLK);
        if clock && !self.clock {
            self.rising_edge(latch.contains(SpiOut::MOSI));
        }
        self.clock = clock;
    }

    fn rising_edge(&mut self, mosi: bool) {
        if !self.selected {
            self.wake_clocks = self.wake_clocks.saturating_add(1);
            return;
        }

        if self.bit == 0 {
            self.tx = self.outbound.pop_front().unwrap_or(0xFF);
        }
        self.miso = self.tx & (0x80 >> self.bit) != 0;
        self.rx = (self.rx << 1) | u8::from(mosi);
        self.bit += 1;

        if self.bit == 8 {
            let byte = self.rx;
            self.bit = 0;
            self.rx = 0;
            self.receive_byte(byte);
        }
    }

    fn receive_byte(&mut self, byte: u8) {
        let idle = Receive::Command(Vec::new());
        self.receive = match std::mem::replace(&mut self.receive, idle) {
            Receive::Command(mut frame) => {
                // wait for the start and transmission bits
                if frame.is_empty() && byte & 0xC0 != 0x40 {
                    Receive::Command(frame)
                } else {
                    frame.push(byte);
                    if frame.len() == 6 {
                        self.command(&frame)
                    } else {
                        Receive::Command(frame)
                    }
                }
            }
            Receive::WriteToken(block) => {
                if byte == START_BLOCK {
                    Receive::WriteData(block, Vec::with_capacity(BLOCK_SIZE))
                } else {
                    Receive::WriteToken(block)
                }
            }
            Receive::WriteData(block, mut data) => {
                data.push(byte);
                if data.len() == BLOCK_SIZE {
                    let mut stored = [0u8; BLOCK_SIZE];
                    stored.copy_from_slice(&data);
                    self.blocks.insert(block, stored);
                    log::trace!("sim sd: block {} written", block);
                    Receive::WriteCrc(2)
                } else {
                    Receive::WriteData(block, data)
                }
            }
            Receive::WriteCrc(remaining) => {
                if remaining > 1 {
                    Receive::WriteCrc(remaining - 1)
                } else {
                    self.outbound.push_back(DATA_ACCEPTED);
                    self.outbound
                        .extend(std::iter::repeat(0x00).take(self.config.busy_bytes));
                    Receive::Command(Vec::new())
                }
            }
        };
    }

    /// Execute a complete command frame and queue its response
    fn command(&mut self, frame: &[u8]) -> Receive {
        let index = frame[0] & 0x3F;
        let argument = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
        let app = std::mem::take(&mut self.app_command);
        self.commands.push(index);
        log::trace!(
            "sim sd: {}CMD{} {:08X}",
            if app { "A" } else { "" },
            index,
            argument
        );

        if self.state == CardState::PowerUp && index != 0 {
            return Receive::Command(Vec::new());
        }

        let r1 = if self.state == CardState::Ready {
            0x00
        } else {
            R1_IDLE
        };
        // one byte of command response time
        self.outbound.clear();
        self.outbound.push_back(0xFF);

        match (index, app) {
            (0, _) => {
                if self.state == CardState::PowerUp && self.wake_clocks < WAKEUP_CLOCKS {
                    log::debug!("sim sd: CMD0 after only {} clocks", self.wake_clocks);
                    self.outbound.clear();
                    return Receive::Command(Vec::new());
                }
                self.state = CardState::Idle;
                self.init_remaining = self.config.init_polls.max(1);
                self.outbound.push_back(R1_IDLE);
            }
            (8, _) => {
                let voltage = ((argument >> 8) & 0x0F) as u8;
                let pattern = argument as u8;
                self.outbound
                    .extend([r1, 0x00, 0x00, voltage, pattern]);
            }
            (55, _) => {
                self.app_command = true;
                self.outbound.push_back(r1);
            }
            (41, true) => {
                if self.state == CardState::Idle {
                    self.init_remaining -= 1;
                    if self.init_remaining == 0 {
                        self.state = CardState::Ready;
                    }
                }
                self.outbound.push_back(if self.state == CardState::Ready {
                    0x00
                } else {
                    R1_IDLE
                });
            }
            (58, _) => {
                let mut ocr0 = 0x00;
                if self.state == CardState::Ready {
                    ocr0 |= 0x80;
                    if self.config.high_capacity {
                        ocr0 |= 0x40;
                    }
                }
                self.outbound.extend([r1, ocr0, 0xFF, 0x80, 0x00]);
            }
            (17, false) if self.state == CardState::Ready => {
                if argument >= self.config.blocks {
                    self.outbound.push_back(R1_ADDRESS_ERROR);
                } else {
                    let data = self.block(argument);
                    self.outbound.extend([0x00, 0xFF, START_BLOCK]);
                    self.outbound.extend(data);
                    self.outbound.extend([0xFF, 0xFF]);
                }
            }
            (24, false) if self.state == CardState::Ready => {
                if argument >= self.config.blocks {
                    self.outbound.push_back(R1_ADDRESS_ERROR);
                } else {
                    self.outbound.push_back(0x00);
                    return Receive::WriteToken(argument);
                }
            }
            _ => self.outbound.push_back(r1 | R1_ILLEGAL_COMMAND),
        }
        Receive::Command(Vec::new())
    }
}
