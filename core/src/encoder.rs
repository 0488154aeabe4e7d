use log::{debug, trace};

use crate::block::{Block, DaiProgram};
use crate::error::Result;
use crate::framing::{BlockPosition, TapeCursor};
use crate::profile::HardwareProfile;
use crate::timing::{samples_for_cycles, BitKind, BitPeriod, PERIOD_2_EXTRA_CYCLES, TAIL_CYCLES_PER_LOOP};
use crate::waveform::{SampleSink, Waveform};
use crate::SYNC_BYTE;

/// Turns a program into a tape waveform for one hardware profile.
pub struct Encoder {
    profile: HardwareProfile,
    smooth_signal: bool,
}

impl Encoder {
    pub fn new(profile: HardwareProfile) -> Self {
        Self {
            profile,
            smooth_signal: false,
        }
    }

    /// Write the first sample of every period at a softer level.
    pub fn with_smoothing(mut self, smooth_signal: bool) -> Self {
        self.smooth_signal = smooth_signal;
        self
    }

    pub fn profile(&self) -> &HardwareProfile {
        &self.profile
    }

    /// Encode a program into an in-memory waveform.
    pub fn encode(&self, program: &DaiProgram) -> Result<Waveform> {
        let mut wave = Waveform::new(self.profile.format());
        self.encode_to(program, &mut wave)?;
        Ok(wave)
    }

    /// Encode a program into any sample sink.
    ///
    /// Returns the number of frames written. A sink error aborts the run; the
    /// caller owns whatever was already written and should discard it.
    pub fn encode_to<S: SampleSink>(&self, program: &DaiProgram, sink: &mut S) -> Result<u64> {
        program.validate()?;

        let mut run = EncodeRun::new(&self.profile, self.smooth_signal, sink);
        run.cursor.program_type = program.program_type;
        debug!(
            "Encoding {:?} program with {} ({} leader bits)",
            program.program_type,
            self.profile.name,
            self.profile.leader_bits()
        );

        run.write_leader()?;
        run.write_sync_byte(SYNC_BYTE)?;

        run.cursor.enter_program_type();
        run.write_byte(program.program_type.as_byte())?;

        for (index, block) in program.blocks.iter().enumerate() {
            run.write_block(index, block)?;
        }
        run.write_trailer()?;

        debug!("Wrote {} frames", run.frames);
        Ok(run.frames)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(HardwareProfile::default())
    }
}

pub(crate) struct EncodeRun<'a, S: SampleSink> {
    profile: &'a HardwareProfile,
    smooth_signal: bool,
    sink: &'a mut S,
    pub(crate) cursor: TapeCursor,
    frames: u64,
}

impl<'a, S: SampleSink> EncodeRun<'a, S> {
    pub(crate) fn new(profile: &'a HardwareProfile, smooth_signal: bool, sink: &'a mut S) -> Self {
        Self {
            profile,
            smooth_signal,
            sink,
            cursor: TapeCursor::new(),
            frames: 0,
        }
    }

    /// Leader bits followed by the sync bit.
    pub(crate) fn write_leader(&mut self) -> Result<()> {
        for _ in 0..self.profile.leader_bits() {
            self.write_bit(BitKind::Leader)?;
        }
        self.write_bit(BitKind::SyncBit)
    }

    pub(crate) fn write_sync_byte(&mut self, value: u8) -> Result<()> {
        self.cursor.enter_sync_byte();
        self.write_byte(value)
    }

    fn write_block(&mut self, index: usize, block: &Block) -> Result<()> {
        self.cursor.enter_block(index);
        let [high, low] = block.length.to_be_bytes();
        self.write_byte(high)?;
        self.cursor.block_position = BlockPosition::LengthLow;
        self.write_byte(low)?;
        self.cursor.block_position = BlockPosition::LengthChecksum;
        self.write_byte(block.length_checksum)?;

        let len = block.data.len();
        for (i, &byte) in block.data.iter().enumerate() {
            self.cursor.block_position = BlockPosition::for_data_byte(i, len);
            self.write_byte(byte)?;
        }

        self.cursor.enter_block_checksum();
        self.write_byte(block.data_checksum)?;
        trace!("Block {}: {} bytes", index, len);
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<()> {
        self.cursor.enter_trailer();
        for _ in 0..self.profile.trailer_bits() {
            self.write_bit(BitKind::Trailer)?;
        }
        Ok(())
    }

    /// Sample level of the low TTL state as written on the wire.
    #[cfg(test)]
    pub(crate) fn low_level(&self) -> i16 {
        self.profile.width.level(self.profile.polarity.is_inverted(), false)
    }

    /// Minimum cycles a period must last for the firmware to count `loops`.
    fn period_cycles(&self, kind: BitKind, period: BitPeriod) -> i64 {
        let loops = self.profile.loops(kind)[period.index()];
        if self.cursor.is_tail() {
            return TAIL_CYCLES_PER_LOOP * loops;
        }

        let mut cycles = period.cycles_per_loop() * loops + self.profile.period_offsets[period.index()];
        match period {
            // the first loop overlaps the carried-in delay
            BitPeriod::P0 => cycles += self.cursor.carried_delay - period.cycles_per_loop(),
            BitPeriod::P2 => cycles += PERIOD_2_EXTRA_CYCLES,
            _ => {}
        }
        cycles.max(0)
    }

    fn write_bit(&mut self, kind: BitKind) -> Result<()> {
        let width = self.profile.width;
        for period in BitPeriod::ALL {
            let count = samples_for_cycles(self.period_cycles(kind, period), self.profile.sample_rate);
            let high = period.is_high() != self.profile.polarity.is_inverted();
            for i in 0..count {
                let level = width.level(high, self.smooth_signal && i == 0);
                for _ in 0..self.profile.channels {
                    self.sink.put_sample(level)?;
                }
            }
            self.frames += count;
        }
        self.cursor.bit_done();
        Ok(())
    }

    pub(crate) fn write_byte(&mut self, value: u8) -> Result<()> {
        for shift in (0..8).rev() {
            let bit = (value >> shift) & 1 == 1;
            self.write_bit(BitKind::for_data_bit(self.cursor.uses_fast_bits(), bit))?;
        }
        self.cursor.byte_done();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::ProgramType;
    use crate::error::DgvError;
    use crate::profile::Polarity;
    use crate::waveform::SampleWidth;

    fn small_program() -> DaiProgram {
        DaiProgram::from_payloads(ProgramType::Basic, b"AB", b"\x00\xFF", b"").unwrap()
    }

    struct FailingSink {
        remaining: usize,
    }

    impl SampleSink for FailingSink {
        fn put_sample(&mut self, _sample: i16) -> Result<()> {
            if self.remaining == 0 {
                return Err(DgvError::SampleWrite("disk full".to_string()));
            }
            self.remaining -= 1;
            Ok(())
        }
    }

    #[test]
    fn test_waveform_starts_with_low_period() {
        let encoder = Encoder::default();
        let wave = encoder.encode(&small_program()).unwrap();
        assert_eq!(wave.format.sample_rate, 96_000);
        assert_eq!(wave.samples[0], SampleWidth::Byte.level(false, false));

        // leader period 0 lasts 10 loops of 32 cycles = 320 cycles = 15.36 samples
        let first_run = wave.samples.iter().take_while(|&&s| s == wave.samples[0]).count();
        assert_eq!(first_run, 16);
    }

    #[test]
    fn test_frame_count_matches_samples() {
        let profile = HardwareProfile::default().with_channels(2).unwrap();
        let encoder = Encoder::new(profile);
        let mut wave = Waveform::new(encoder.profile().format());
        let frames = encoder.encode_to(&small_program(), &mut wave).unwrap();
        assert_eq!(wave.samples.len() as u64, frames * 2);
        assert_eq!(wave.frames() as u64, frames);
    }

    #[test]
    fn test_inverted_polarity_swaps_levels() {
        let normal = Encoder::default().encode(&small_program()).unwrap();
        let profile = HardwareProfile::default().with_polarity(Polarity::Inverted);
        let inverted = Encoder::new(profile).encode(&small_program()).unwrap();
        assert_eq!(normal.samples.len(), inverted.samples.len());
        assert_eq!(inverted.samples[0], SampleWidth::Byte.level(true, false));
    }

    #[test]
    fn test_smoothing_only_touches_period_edges() {
        let plain = Encoder::default().encode(&small_program()).unwrap();
        let smooth = Encoder::default()
            .with_smoothing(true)
            .encode(&small_program())
            .unwrap();
        assert_eq!(plain.samples.len(), smooth.samples.len());
        assert_eq!(smooth.samples[0], SampleWidth::Byte.level(false, true));
        assert_eq!(smooth.samples[1], plain.samples[1]);
    }

    #[test]
    fn test_sink_failure_aborts() {
        let mut sink = FailingSink { remaining: 1000 };
        match Encoder::default().encode_to(&small_program(), &mut sink) {
            Err(DgvError::SampleWrite(_)) => {}
            other => panic!("expected SampleWrite, got {:?}", other),
        }
    }

    #[test]
    fn test_fast_blocks_are_shorter() {
        let slow = DaiProgram::from_payloads(ProgramType::Binary, &[0x5A; 200], b"", b"").unwrap();
        let fast = DaiProgram::from_payloads(ProgramType::Binary, b"", &[0x5A; 200], b"").unwrap();
        let slow_len = Encoder::default().encode(&slow).unwrap().samples.len();
        let fast_len = Encoder::default().encode(&fast).unwrap().samples.len();
        assert!(fast_len < slow_len, "fast {} slow {}", fast_len, slow_len);
    }
}
