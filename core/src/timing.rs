//! Firmware timing model shared by the encoder and the decoder.
//!
//! All delays are expressed in CPU cycles of the 2 MHz tape routine. The
//! waveform is produced and consumed by mapping a cycle count onto a sample
//! index at the stream's sample rate.

use crate::framing::{BlockPosition, FilePosition};
use crate::block::ProgramType;

pub const CPU_FREQUENCY: i64 = 2_000_000;

/// Cycles one polling loop costs in each bit period.
pub const CYCLES_PER_LOOP: [i64; 4] = [32, 37, 32, 37];

/// Cycles per loop while writing leader, sync bit and trailer.
pub const TAIL_CYCLES_PER_LOOP: i64 = 32;

/// Extra cycles spent before sampling period 2.
pub const PERIOD_2_EXTRA_CYCLES: i64 = 10;

pub const ENTER_BYTE_CYCLES: i64 = 58;
pub const EXIT_BYTE_CYCLES: i64 = 25;
pub const INTER_BITS_CYCLES: i64 = 38;
pub const SYNC_BIT_EXIT_CYCLES: i64 = 50;
pub const SYNC_BIT_TO_BYTE_CYCLES: i64 = 67;

/// Penalty after a wrong sync byte, before the leader search re-arms.
pub const SYNC_BYTE_FAILURE_CYCLES: i64 = 367;

/// Delay between two bits of the same byte.
pub const INTER_BIT_DELAY: i64 = EXIT_BYTE_CYCLES + INTER_BITS_CYCLES + ENTER_BYTE_CYCLES;

/// Delay between the sync bit and the first bit of the sync byte.
pub const SYNC_BYTE_ENTRY_DELAY: i64 =
    SYNC_BIT_EXIT_CYCLES + SYNC_BIT_TO_BYTE_CYCLES + ENTER_BYTE_CYCLES;

/// Caller overhead between two bytes of a block, per block and block position.
const IN_BLOCK_DELAYS: [[i64; 6]; 3] = [
    [211, 194, 432, 435, 435, 435],
    [211, 194, 346, 262, 262, 240],
    [211, 194, 346, 262, 262, 240],
];

/// Caller overhead between bytes outside a block, per program type and file position.
const FILE_POSITION_DELAYS: [[i64; 7]; 3] = [
    [0, 172, 420, 0, 561, 514, 0],
    [0, 172, 336, 0, 603, 571, 0],
    [0, 172, 336, 0, 614, 657, 0],
];

/// One of the four sub-intervals of an encoded bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitPeriod {
    P0 = 0,
    P1 = 1,
    P2 = 2,
    P3 = 3,
}

impl BitPeriod {
    pub const ALL: [BitPeriod; 4] = [BitPeriod::P0, BitPeriod::P1, BitPeriod::P2, BitPeriod::P3];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn cycles_per_loop(self) -> i64 {
        CYCLES_PER_LOOP[self.index()]
    }

    /// Periods 1 and 3 sit at the TTL high level, 0 and 2 at the low level.
    pub fn is_high(self) -> bool {
        self.index() & 1 == 1
    }
}

/// Row selector of a hardware profile's loop-count table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitKind {
    LowFast = 0,
    HighFast = 1,
    LowNorm = 2,
    HighNorm = 3,
    Leader = 4,
    Trailer = 5,
    SyncBit = 6,
}

impl BitKind {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn for_data_bit(fast: bool, bit: bool) -> BitKind {
        match (fast, bit) {
            (true, false) => BitKind::LowFast,
            (true, true) => BitKind::HighFast,
            (false, false) => BitKind::LowNorm,
            (false, true) => BitKind::HighNorm,
        }
    }
}

/// Delay carried into the first period of the byte following one written at
/// the given position.
pub fn inter_byte_delay(
    file: FilePosition,
    block_position: BlockPosition,
    block_index: usize,
    program_type: ProgramType,
) -> i64 {
    if file == FilePosition::InsideBlock {
        EXIT_BYTE_CYCLES + IN_BLOCK_DELAYS[block_index][block_position.index()] + ENTER_BYTE_CYCLES
    } else {
        EXIT_BYTE_CYCLES + ENTER_BYTE_CYCLES + FILE_POSITION_DELAYS[program_type.index()][file.index()]
    }
}

/// Number of samples needed to cover at least `cycles` CPU cycles.
///
/// Rounds up, and never returns zero.
pub fn samples_for_cycles(cycles: i64, sample_rate: u32) -> u64 {
    let scaled = cycles.max(0) as u64 * sample_rate as u64;
    let cpu = CPU_FREQUENCY as u64;
    let samples = scaled / cpu;
    if samples == 0 || samples * cpu != scaled {
        samples + 1
    } else {
        samples
    }
}

/// Cycle counter driving sample reads.
#[derive(Debug, Clone, Copy)]
pub struct CpuClock {
    cycles: i64,
    sample_rate: i64,
}

impl CpuClock {
    pub fn new(start: i64, sample_rate: u32) -> Self {
        Self {
            cycles: start,
            sample_rate: sample_rate as i64,
        }
    }

    pub fn advance(&mut self, cycles: i64) {
        self.cycles += cycles;
    }

    pub fn cycles(&self) -> i64 {
        self.cycles
    }

    /// Sample index at the current cycle, truncated toward zero.
    pub fn sample_index(&self) -> i64 {
        self.cycles * self.sample_rate / CPU_FREQUENCY
    }
}
