//! Hardware timing presets.
//!
//! Each preset carries loop counts tuned against one playback target (real
//! DAI machines with different cassette interfaces, and the MAME emulator).
//! The numbers are empirical and must be kept exactly as they are.

use crate::error::{DgvError, Result};
use crate::timing::{BitKind, CPU_FREQUENCY, TAIL_CYCLES_PER_LOOP};
use crate::waveform::{PcmFormat, SampleWidth};

/// Minimum loop counts per `BitKind` row and `BitPeriod` column.
pub type LoopTable = [[i64; 4]; 7];

/// Signal polarity on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Normal,
    Inverted,
}

impl Polarity {
    pub fn is_inverted(self) -> bool {
        self == Polarity::Inverted
    }

    pub fn flipped(self) -> Polarity {
        match self {
            Polarity::Normal => Polarity::Inverted,
            Polarity::Inverted => Polarity::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareProfile {
    pub index: usize,
    pub name: &'static str,
    pub loops: LoopTable,
    pub period_offsets: [i64; 4],
    pub channels: u16,
    pub width: SampleWidth,
    pub polarity: Polarity,
    pub sample_rate: u32,
    pub leader_ms: u32,
    pub trailer_ms: u32,
}

pub const PRESET_COUNT: usize = 10;
pub const DEFAULT_PRESET: usize = 7;

/// Presets converted by batch mode.
pub const BATCH_PRESETS: std::ops::Range<usize> = 0..8;

pub const MIN_SAMPLE_RATE: u32 = 20_000;
pub const MAX_SAMPLE_RATE: u32 = 1_000_000;

// Normal-speed, leader, trailer and sync rows shared by most presets.
const V4_SLOW_ROWS: [[i64; 4]; 5] = [
    [17, 10, 17, 25],
    [17, 25, 17, 10],
    [10, 17, 10, 17],
    [10, 10, 14, 14],
    [10, 10, 10, 10],
];

const fn with_fast_rows(low_fast: [i64; 4], high_fast: [i64; 4]) -> LoopTable {
    [
        low_fast,
        high_fast,
        V4_SLOW_ROWS[0],
        V4_SLOW_ROWS[1],
        V4_SLOW_ROWS[2],
        V4_SLOW_ROWS[3],
        V4_SLOW_ROWS[4],
    ]
}

struct Preset {
    name: &'static str,
    loops: LoopTable,
    period_offsets: [i64; 4],
    inverted: bool,
    sample_rate: u32,
    leader_ms: u32,
    trailer_ms: u32,
}

static PRESETS: [Preset; PRESET_COUNT] = [
    Preset {
        name: "_DgvDaiK7",
        loops: [
            [13, 16, 28, 25],
            [26, 25, 15, 16],
            [13, 16, 28, 25],
            [26, 25, 17, 16],
            [17, 18, 17, 18],
            [12, 13, 17, 17],
            [29, 29, 19, 20],
        ],
        period_offsets: [0, 0, 0, 0],
        inverted: true,
        sample_rate: 24_000,
        leader_ms: 2900,
        trailer_ms: 10,
    },
    Preset {
        name: "_DgvDaiV4",
        loops: with_fast_rows([5, 3, 5, 5], [5, 5, 5, 3]),
        period_offsets: [-35, 35, -35, 35],
        inverted: true,
        sample_rate: 48_000,
        leader_ms: 600,
        trailer_ms: 10,
    },
    Preset {
        name: "_DgvDAIV7A",
        loops: with_fast_rows([5, 3, 5, 5], [5, 5, 5, 3]),
        period_offsets: [-22, 42, -22, 42],
        inverted: true,
        sample_rate: 48_000,
        leader_ms: 600,
        trailer_ms: 10,
    },
    Preset {
        name: "_DgvDaiV7B",
        loops: with_fast_rows([4, 3, 4, 4], [4, 5, 4, 3]),
        period_offsets: [-22, 42, -22, 42],
        inverted: true,
        sample_rate: 96_000,
        leader_ms: 600,
        trailer_ms: 10,
    },
    Preset {
        name: "_DgvDaiV7C",
        loops: with_fast_rows([4, 3, 4, 4], [4, 5, 4, 3]),
        period_offsets: [-42, 42, -42, 42],
        inverted: true,
        sample_rate: 384_000,
        leader_ms: 600,
        trailer_ms: 10,
    },
    Preset {
        name: "_DgvDaiV7T",
        loops: with_fast_rows([2, 2, 2, 3], [2, 4, 2, 2]),
        period_offsets: [0, 14, 0, 14],
        inverted: true,
        sample_rate: 192_000,
        leader_ms: 600,
        trailer_ms: 10,
    },
    Preset {
        name: "_DgvDaiV7U",
        loops: with_fast_rows([1, 2, 1, 3], [1, 4, 1, 2]),
        period_offsets: [0, 0, 0, 0],
        inverted: true,
        sample_rate: 384_000,
        leader_ms: 600,
        trailer_ms: 10,
    },
    Preset {
        name: "_DgvMameA",
        loops: [
            [1, 0, 1, 1],
            [1, 2, 1, 0],
            [3, 2, 3, 5],
            [3, 6, 3, 4],
            [10, 17, 10, 17],
            [10, 10, 14, 14],
            [10, 10, 10, 10],
        ],
        period_offsets: [0, 22, 0, 22],
        inverted: false,
        sample_rate: 96_000,
        leader_ms: 250,
        trailer_ms: 0,
    },
    Preset {
        name: "_DgvMameB",
        loops: with_fast_rows([1, 1, 1, 2], [1, 3, 1, 1]),
        period_offsets: [0, 0, 0, 0],
        inverted: false,
        sample_rate: 96_000,
        leader_ms: 600,
        trailer_ms: 10,
    },
    Preset {
        name: "_DgvTest9",
        loops: with_fast_rows([2, 2, 3, 3], [2, 4, 3, 2]),
        period_offsets: [-7, 7, -7, 7],
        inverted: true,
        sample_rate: 192_000,
        leader_ms: 600,
        trailer_ms: 10,
    },
];

impl HardwareProfile {
    /// Select a preset by index.
    pub fn preset(index: usize) -> Result<Self> {
        let preset = PRESETS.get(index).ok_or_else(|| {
            DgvError::InvalidOption(format!(
                "hardware preset {} out of range 0..{}",
                index, PRESET_COUNT
            ))
        })?;
        Ok(Self::from_preset(index, preset))
    }

    fn from_preset(index: usize, preset: &Preset) -> Self {
        Self {
            index,
            name: preset.name,
            loops: preset.loops,
            period_offsets: preset.period_offsets,
            channels: 1,
            width: SampleWidth::Byte,
            polarity: if preset.inverted {
                Polarity::Inverted
            } else {
                Polarity::Normal
            },
            sample_rate: preset.sample_rate,
            leader_ms: preset.leader_ms,
            trailer_ms: preset.trailer_ms,
        }
    }

    /// All preset names, in index order.
    pub fn preset_names() -> impl Iterator<Item = &'static str> {
        PRESETS.iter().map(|p| p.name)
    }

    pub fn with_channels(mut self, channels: u16) -> Result<Self> {
        if !(1..=2).contains(&channels) {
            return Err(DgvError::InvalidOption(format!(
                "channel count {} not supported",
                channels
            )));
        }
        self.channels = channels;
        Ok(self)
    }

    pub fn with_width(mut self, width: SampleWidth) -> Self {
        self.width = width;
        self
    }

    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Result<Self> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(DgvError::InvalidOption(format!(
                "sample rate {} outside {}..={}",
                sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
            )));
        }
        self.sample_rate = sample_rate;
        Ok(self)
    }

    pub fn format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            width: self.width,
        }
    }

    pub fn loops(&self, kind: BitKind) -> &[i64; 4] {
        &self.loops[kind.index()]
    }

    /// Cycles one leader, trailer or sync bit lasts.
    pub fn tail_bit_cycles(&self, kind: BitKind) -> i64 {
        self.loops(kind).iter().sum::<i64>() * TAIL_CYCLES_PER_LOOP
    }

    /// Number of leader bits written before the sync bit.
    pub fn leader_bits(&self) -> u64 {
        let cycles = self.leader_ms as i64 * CPU_FREQUENCY / 1000;
        (cycles / self.tail_bit_cycles(BitKind::Leader).max(1)) as u64
    }

    /// Number of trailer bits written after the last block. The divisor
    /// is one leader bit plus one trailer bit.
    pub fn trailer_bits(&self) -> u64 {
        let cycles = self.trailer_ms as i64 * CPU_FREQUENCY / 1000;
        let divisor = self.tail_bit_cycles(BitKind::Leader) + self.tail_bit_cycles(BitKind::Trailer);
        (cycles / divisor.max(1)) as u64 + 1
    }
}

impl Default for HardwareProfile {
    fn default() -> Self {
        Self::from_preset(DEFAULT_PRESET, &PRESETS[DEFAULT_PRESET])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_mame_a() {
        let profile = HardwareProfile::default();
        assert_eq!(profile.name, "_DgvMameA");
        assert_eq!(profile.sample_rate, 96_000);
        assert_eq!(profile.channels, 1);
        assert_eq!(profile.width, SampleWidth::Byte);
        assert_eq!(profile.polarity, Polarity::Normal);
        assert_eq!(profile, HardwareProfile::preset(DEFAULT_PRESET).unwrap());
    }

    #[test]
    fn test_preset_out_of_range() {
        match HardwareProfile::preset(PRESET_COUNT) {
            Err(DgvError::InvalidOption(_)) => {}
            other => panic!("expected InvalidOption, got {:?}", other),
        }
    }

    #[test]
    fn test_shared_rows() {
        let v4 = HardwareProfile::preset(1).unwrap();
        let v7b = HardwareProfile::preset(3).unwrap();
        assert_eq!(v4.loops[2..], v7b.loops[2..]);
        assert_eq!(v7b.loops[0], [4, 3, 4, 4]);
        assert_eq!(v7b.loops[6], [10, 10, 10, 10]);
    }

    #[test]
    fn test_leader_and_trailer_bit_counts() {
        let mame = HardwareProfile::default();
        // 250 ms = 500_000 cycles, one leader bit = 54 loops * 32 cycles
        assert_eq!(mame.leader_bits(), 500_000 / 1728);
        // no trailer duration still writes one bit
        assert_eq!(mame.trailer_bits(), 1);

        let k7 = HardwareProfile::preset(0).unwrap();
        assert_eq!(k7.leader_bits(), 5_800_000 / (70 * 32));
        assert_eq!(k7.trailer_bits(), 20_000 / (70 * 32 + 59 * 32) + 1);
        assert_eq!(k7.trailer_bits(), 5);
    }

    #[test]
    fn test_overrides_validate() {
        let profile = HardwareProfile::default();
        assert!(profile.clone().with_sample_rate(19_999).is_err());
        assert!(profile.clone().with_sample_rate(1_000_001).is_err());
        assert!(profile.clone().with_channels(3).is_err());

        let custom = profile
            .with_sample_rate(44_100)
            .unwrap()
            .with_channels(2)
            .unwrap()
            .with_width(SampleWidth::Word)
            .with_polarity(Polarity::Inverted);
        let format = custom.format();
        assert_eq!(format.sample_rate, 44_100);
        assert_eq!(format.channels, 2);
        assert_eq!(format.width, SampleWidth::Word);
        assert!(custom.polarity.is_inverted());
    }

    #[test]
    fn test_batch_presets_exclude_late_ones() {
        assert_eq!(BATCH_PRESETS.len(), 8);
        let names: Vec<_> = HardwareProfile::preset_names().collect();
        assert_eq!(names.len(), PRESET_COUNT);
        assert_eq!(names[9], "_DgvTest9");
    }
}
