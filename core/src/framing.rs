//! Position tracking through a tape recording.
//!
//! The firmware spends a different number of cycles between two bytes
//! depending on where it is in the file. `TapeCursor` records that position
//! for one encode or decode run and yields the delay carried into the next
//! byte.

use crate::block::ProgramType;
use crate::timing::{inter_byte_delay, ENTER_BYTE_CYCLES, INTER_BIT_DELAY, SYNC_BYTE_ENTRY_DELAY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilePosition {
    Leader = 0,
    SyncByte = 1,
    ProgramTypeByte = 2,
    InsideBlock = 3,
    BlockChecksum0 = 4,
    BlockChecksumN = 5,
    Trailer = 6,
}

impl FilePosition {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Checksum position following the given block.
    pub fn block_checksum(block_index: usize) -> FilePosition {
        if block_index == 0 {
            FilePosition::BlockChecksum0
        } else {
            FilePosition::BlockChecksumN
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockPosition {
    LengthHigh = 0,
    LengthLow = 1,
    LengthChecksum = 2,
    FirstDataByte = 3,
    InteriorDataByte = 4,
    LastDataByte = 5,
}

impl BlockPosition {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Position of data byte `index` in a block of `len` bytes.
    pub fn for_data_byte(index: usize, len: usize) -> BlockPosition {
        if index + 1 == len {
            BlockPosition::LastDataByte
        } else if index == 0 {
            BlockPosition::FirstDataByte
        } else {
            BlockPosition::InteriorDataByte
        }
    }
}

/// Run context shared by every byte of one encode or decode pass.
#[derive(Debug, Clone)]
pub struct TapeCursor {
    pub file: FilePosition,
    pub block_position: BlockPosition,
    pub block_index: usize,
    pub program_type: ProgramType,
    /// Cycles carried into period 0 of the next bit.
    pub carried_delay: i64,
}

impl TapeCursor {
    pub fn new() -> Self {
        Self {
            file: FilePosition::Leader,
            block_position: BlockPosition::LengthHigh,
            block_index: 0,
            program_type: ProgramType::Basic,
            carried_delay: ENTER_BYTE_CYCLES,
        }
    }

    /// Leader, sync bit and trailer are timed without offsets or carried delay.
    pub fn is_tail(&self) -> bool {
        matches!(self.file, FilePosition::Leader | FilePosition::Trailer)
    }

    /// Data bits of blocks 1 and 2 use the short loop counts.
    pub fn uses_fast_bits(&self) -> bool {
        self.file == FilePosition::InsideBlock && self.block_index > 0
    }

    /// Move to the sync byte right after the sync bit.
    pub fn enter_sync_byte(&mut self) {
        self.file = FilePosition::SyncByte;
        self.carried_delay = SYNC_BYTE_ENTRY_DELAY;
    }

    pub fn enter_program_type(&mut self) {
        self.file = FilePosition::ProgramTypeByte;
    }

    pub fn enter_block(&mut self, block_index: usize) {
        self.file = FilePosition::InsideBlock;
        self.block_index = block_index;
        self.block_position = BlockPosition::LengthHigh;
    }

    pub fn enter_block_checksum(&mut self) {
        self.file = FilePosition::block_checksum(self.block_index);
    }

    pub fn enter_trailer(&mut self) {
        self.file = FilePosition::Trailer;
    }

    pub fn bit_done(&mut self) {
        self.carried_delay = INTER_BIT_DELAY;
    }

    /// Set the delay carried into the next byte from the current position.
    pub fn byte_done(&mut self) {
        self.carried_delay = inter_byte_delay(
            self.file,
            self.block_position,
            self.block_index,
            self.program_type,
        );
    }
}

impl Default for TapeCursor {
    fn default() -> Self {
        Self::new()
    }
}
