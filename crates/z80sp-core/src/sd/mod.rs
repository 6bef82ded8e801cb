//! SD card access over the bit-banged SPI port

mod card;
pub mod command;
mod mbr;

pub use card::{Response, SdCard};
pub use command::{SdCommand, BLOCK_SIZE};
pub use mbr::{
    Mbr, Partition, FORMAT_FIRST_BLOCK, FORMAT_PARTITION_BLOCKS, PARTITION_COUNT,
    PARTITION_TYPE_LINUX,
};

pub use crate::error::{MbrError, SdError};
