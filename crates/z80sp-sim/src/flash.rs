//! SST39SF0x0 model on the memory bus

use z80sp_core::flash::commands::{
    BYTE_PROGRAM, CHIP_ERASE, ERASE_SETUP, ID_ENTRY, ID_EXIT, SECTOR_ERASE, SECTOR_SIZE,
    UNLOCK_ADDR_1, UNLOCK_ADDR_2, UNLOCK_DATA_1, UNLOCK_DATA_2,
};

/// Position in a command sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sequence {
    Idle,
    Unlock1,
    Unlock2,
    Program,
    EraseSetup,
    EraseUnlock1,
    EraseUnlock2,
}

/// Parallel NOR flash that decodes the software command protocol
///
/// The Z80 window maps to the first 64 KiB of the array. Programming can only
/// clear bits, erasing sets them again. Timing is not enforced.
#[derive(Debug, Clone)]
pub struct SimFlash {
    vendor: u8,
    device: u8,
    data: Vec<u8>,
    sequence: Sequence,
    id_mode: bool,
    byte_programs: u64,
    sector_erases: u64,
    chip_erases: u64,
}

impl SimFlash {
    /// Create an erased part
    pub fn new(vendor: u8, device: u8, size: usize) -> Self {
        Self {
            vendor,
            device,
            data: vec![0xFF; size],
            sequence: Sequence::Idle,
            id_mode: false,
            byte_programs: 0,
            sector_erases: 0,
            chip_erases: 0,
        }
    }

    /// The whole array
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The whole array, for preloading contents
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Whether software ID mode is active
    pub fn in_id_mode(&self) -> bool {
        self.id_mode
    }

    /// Number of bytes programmed so far
    pub fn byte_programs(&self) -> u64 {
        self.byte_programs
    }

    /// Number of sector erases so far
    pub fn sector_erases(&self) -> u64 {
        self.sector_erases
    }

    /// Number of chip erases so far
    pub fn chip_erases(&self) -> u64 {
        self.chip_erases
    }

    /// Output of the part for a read cycle at `address`
    pub fn read(&self, address: u16) -> u8 {
        if self.id_mode {
            return if address & 1 == 0 {
                self.vendor
            } else {
                self.device
            };
        }
        self.data.get(usize::from(address)).copied().unwrap_or(0xFF)
    }

    /// Apply a write cycle
    pub fn write(&mut self, address: u16, data: u8) {
        // only A0..A14 are decoded for command addresses
        let command_address = address & 0x7FFF;

        self.sequence = match (self.sequence, command_address, data) {
            (Sequence::Program, _, _) => {
                self.program(address, data);
                Sequence::Idle
            }
            (Sequence::EraseUnlock2, UNLOCK_ADDR_1, CHIP_ERASE) => {
                self.erase_chip();
                Sequence::Idle
            }
            (Sequence::EraseUnlock2, _, SECTOR_ERASE) => {
                self.erase_sector(address);
                Sequence::Idle
            }
            (_, _, ID_EXIT) => {
                if self.id_mode {
                    log::trace!("sim flash: leaving ID mode");
                }
                self.id_mode = false;
                Sequence::Idle
            }
            (Sequence::Idle, UNLOCK_ADDR_1, UNLOCK_DATA_1) => Sequence::Unlock1,
            (Sequence::Unlock1, UNLOCK_ADDR_2, UNLOCK_DATA_2) => Sequence::Unlock2,
            (Sequence::Unlock2, UNLOCK_ADDR_1, BYTE_PROGRAM) => Sequence::Program,
            (Sequence::Unlock2, UNLOCK_ADDR_1, ERASE_SETUP) => Sequence::EraseSetup,
            (Sequence::Unlock2, UNLOCK_ADDR_1, ID_ENTRY) => {
                log::trace!("sim flash: entering ID mode");
                self.id_mode = true;
                Sequence::Idle
            }
            (Sequence::EraseSetup, UNLOCK_ADDR_1, UNLOCK_DATA_1) => Sequence::EraseUnlock1,
            (Sequence::EraseUnlock1, UNLOCK_ADDR_2, UNLOCK_DATA_2) => Sequence::EraseUnlock2,
            (sequence, _, _) => {
                if sequence != Sequence::Idle {
                    log::debug!(
                        "sim flash: sequence {:?} aborted by {:02X} at {:04X}",
                        sequence,
                        data,
                        address
                    );
                }
                Sequence::Idle
            }
        };
    }

    fn program(&mut self, address: u16, data: u8) {
        if let Some(byte) = self.data.get_mut(usize::from(address)) {
            *byte &= data;
            self.byte_programs += 1;
        }
    }

    fn erase_sector(&mut self, address: u16) {
        let start = usize::from(address) & !(SECTOR_SIZE as usize - 1);
        let end = (start + SECTOR_SIZE as usize).min(self.data.len());
        if start < end {
            self.data[start..end].fill(0xFF);
        }
        self.sector_erases += 1;
        log::trace!("sim flash: sector erase at {:05X}", start);
    }

    fn erase_chip(&mut self) {
        self.data.fill(0xFF);
        self.chip_erases += 1;
        log::trace!("sim flash: chip erase");
    }
}
