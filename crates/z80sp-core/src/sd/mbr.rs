//! Classic PC master boot record

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::command::BLOCK_SIZE;

/// Offset of the partition table in block 0
pub const PARTITION_TABLE_OFFSET: usize = 0x1BE;
/// Offset of the boot signature in block 0
pub const SIGNATURE_OFFSET: usize = 510;
/// Boot signature
pub const SIGNATURE: [u8; 2] = [0x55, 0xAA];
/// Number of primary partition entries
pub const PARTITION_COUNT: usize = 4;

/// Partition type written by [`Mbr::formatted`]
pub const PARTITION_TYPE_LINUX: u8 = 0x83;
/// First block of the first formatted partition
pub const FORMAT_FIRST_BLOCK: u32 = 0x800;
/// Size of each formatted partition in blocks (128 MiB)
pub const FORMAT_PARTITION_BLOCKS: u32 = 0x4_0000;

/// On-disk partition table entry
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
struct RawPartitionEntry {
    status: u8,
    chs_first: [u8; 3],
    partition_type: u8,
    chs_last: [u8; 3],
    lba_start: [u8; 4],
    sectors: [u8; 4],
}

const ENTRY_SIZE: usize = core::mem::size_of::<RawPartitionEntry>();

/// A primary partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Partition {
    /// First block (LBA)
    pub block: u32,
    /// Size in blocks
    pub size: u32,
    /// Partition type byte
    pub partition_type: u8,
    /// Status byte (0x80 = bootable)
    pub status: u8,
}

impl Partition {
    /// Whether the entry describes a partition
    pub fn is_used(&self) -> bool {
        self.block != 0
    }

    fn from_raw(raw: &RawPartitionEntry) -> Self {
        Self {
            block: u32::from_le_bytes(raw.lba_start),
            size: u32::from_le_bytes(raw.sectors),
            partition_type: raw.partition_type,
            status: raw.status,
        }
    }

    fn to_raw(self) -> RawPartitionEntry {
        RawPartitionEntry {
            status: self.status,
            partition_type: self.partition_type,
            lba_start: self.block.to_le_bytes(),
            sectors: self.size.to_le_bytes(),
            ..Default::default()
        }
    }
}

/// Parsed partition table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mbr {
    /// Number of entries with a nonzero start block
    pub partitions: u8,
    /// All four entries, used or not
    pub table: [Partition; PARTITION_COUNT],
}

impl Mbr {
    /// Parse block 0 of a card
    ///
    /// A block without the boot signature yields an empty table.
    pub fn parse(block: &[u8; BLOCK_SIZE]) -> Self {
        if block[SIGNATURE_OFFSET..] != SIGNATURE {
            return Self::default();
        }

        let mut mbr = Self::default();
        let entries = &block[PARTITION_TABLE_OFFSET..SIGNATURE_OFFSET];
        for (slot, bytes) in mbr.table.iter_mut().zip(entries.chunks_exact(ENTRY_SIZE)) {
            if let Ok(raw) = RawPartitionEntry::read_from_bytes(bytes) {
                *slot = Partition::from_raw(&raw);
            }
        }
        mbr.partitions = mbr.table.iter().filter(|p| p.is_used()).count() as u8;
        mbr
    }

    /// Four equal Linux partitions, back to back after the first 1 MiB
    pub fn formatted() -> Self {
        let mut table = [Partition::default(); PARTITION_COUNT];
        for (index, partition) in (0u32..).zip(table.iter_mut()) {
            *partition = Partition {
                block: FORMAT_FIRST_BLOCK + index * FORMAT_PARTITION_BLOCKS,
                size: FORMAT_PARTITION_BLOCKS,
                partition_type: PARTITION_TYPE_LINUX,
                status: 0x00,
            };
        }
        Self {
            partitions: PARTITION_COUNT as u8,
            table,
        }
    }

    /// Store the table and the boot signature into block 0
    ///
    /// The boot code area is left untouched.
    pub fn write_to(&self, block: &mut [u8; BLOCK_SIZE]) {
        let entries = &mut block[PARTITION_TABLE_OFFSET..SIGNATURE_OFFSET];
        for (partition, bytes) in self.table.iter().zip(entries.chunks_exact_mut(ENTRY_SIZE)) {
            bytes.copy_from_slice(partition.to_raw().as_bytes());
        }
        block[SIGNATURE_OFFSET..].copy_from_slice(&SIGNATURE);
    }

    /// A fresh block 0 holding only this table
    pub fn to_block(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        self.write_to(&mut block);
        block
    }

    /// Entry `index` if it exists and has a nonzero size
    pub fn partition(&self, index: usize) -> Option<&Partition> {
        self.table.get(index).filter(|p| p.size != 0)
    }

    /// Iterate over the used entries
    pub fn used(&self) -> impl Iterator<Item = &Partition> {
        self.table.iter().filter(|p| p.is_used())
    }
}
