use log::{debug, trace, warn};

use crate::block::{Block, DaiProgram, ProgramType, BLOCK_COUNT, MAX_NAME_BLOCK_LEN};
use crate::checksum::{byte_checksum, word_checksum, CHECKSUM_SEED};
use crate::error::{DgvError, Result};
use crate::framing::{BlockPosition, TapeCursor};
use crate::profile::Polarity;
use crate::sync::{LeaderSearch, PulseProbe, PULSE_CAP};
use crate::timing::{BitPeriod, CpuClock, PERIOD_2_EXTRA_CYCLES, SYNC_BYTE_FAILURE_CYCLES};
use crate::waveform::{Waveform, TRIGGER_HIGH, TRIGGER_LOW};
use crate::SYNC_BYTE;

/// Clock value before the first read; the leader search spends 26 cycles
/// before its first poll, which lands on sample 0.
pub const DECODER_START_CYCLES: i64 = -26;

/// How many wrong sync bytes are tolerated before giving up.
pub const MAX_SYNC_RESYNCS: u32 = 1;

/// Replays the firmware read routine over a waveform.
pub struct Decoder {
    polarity: Polarity,
    channel: u16,
}

impl Decoder {
    pub fn new(polarity: Polarity) -> Self {
        Self {
            polarity,
            channel: 0,
        }
    }

    /// Read levels from another channel of a multi-channel stream.
    pub fn with_channel(mut self, channel: u16) -> Self {
        self.channel = channel;
        self
    }

    pub fn decode(&self, wave: &Waveform) -> Result<DaiProgram> {
        // the clock never advances past sample 0 without a rate
        if wave.format.sample_rate == 0 {
            return Err(DgvError::UnsupportedFormat("zero sample rate".to_string()));
        }
        if self.channel >= wave.format.channels {
            return Err(DgvError::UnsupportedFormat(format!(
                "channel {} not present in {}-channel stream",
                self.channel, wave.format.channels
            )));
        }

        let mut reader = TapeReader {
            wave,
            frames: wave.frames(),
            polarity: self.polarity,
            channel: self.channel,
            clock: CpuClock::new(DECODER_START_CYCLES, wave.format.sample_rate),
            cursor: TapeCursor::new(),
        };

        reader.synchronize()?;
        let program_type = reader.read_program_type()?;

        let mut blocks = Vec::with_capacity(BLOCK_COUNT);
        for index in 0..BLOCK_COUNT {
            blocks.push(reader.read_block(index)?);
        }
        let [name, payload, table]: [Block; BLOCK_COUNT] = blocks
            .try_into()
            .map_err(|_| DgvError::InvalidDaiData("wrong block count".to_string()))?;

        debug!(
            "Decoded {:?} program: {} + {} + {} bytes",
            program_type,
            name.len(),
            payload.len(),
            table.len()
        );
        DaiProgram::new(program_type, [name, payload, table])
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(Polarity::Normal)
    }
}

/// Decode trying the normal polarity first, then the inverted one.
///
/// Returns the program and the polarity that decoded it. When both fail the
/// error of the inverted attempt is returned.
pub fn decode_any_parity(wave: &Waveform) -> Result<(DaiProgram, Polarity)> {
    let mut polarity = Polarity::Normal;
    match Decoder::new(polarity).decode(wave) {
        Ok(program) => Ok((program, polarity)),
        Err(err) => {
            warn!("Decoding with {:?} polarity failed ({}), retrying inverted", polarity, err);
            polarity = polarity.flipped();
            let program = Decoder::new(polarity).decode(wave)?;
            Ok((program, polarity))
        }
    }
}

struct TapeReader<'a> {
    wave: &'a Waveform,
    frames: usize,
    polarity: Polarity,
    channel: u16,
    clock: CpuClock,
    cursor: TapeCursor,
}

impl TapeReader<'_> {
    fn read_ttl(&self) -> Result<u8> {
        let index = self.clock.sample_index().max(0) as usize;
        if index >= self.frames {
            return Err(DgvError::EndOfStream);
        }
        self.wave.ttl_at(index, self.channel, self.polarity)
    }

    /// Lock onto the leader and read the sync byte, re-arming once on a bad one.
    fn synchronize(&mut self) -> Result<()> {
        let mut resyncs = 0;
        loop {
            self.cursor = TapeCursor::new();
            LeaderSearch::new().run(self).map_err(|err| match err {
                DgvError::EndOfStream => DgvError::LeaderNotFound,
                other => other,
            })?;
            debug!("Leader locked at cycle {}", self.clock.cycles());

            self.cursor.enter_sync_byte();
            let sync = self.read_byte()?;
            if sync == SYNC_BYTE {
                return Ok(());
            }
            if resyncs >= MAX_SYNC_RESYNCS {
                return Err(DgvError::SyncByteMismatch(sync));
            }
            resyncs += 1;
            warn!("Sync byte {:#04x} instead of {:#04x}, searching leader again", sync, SYNC_BYTE);
            self.clock.advance(SYNC_BYTE_FAILURE_CYCLES);
        }
    }

    fn read_program_type(&mut self) -> Result<ProgramType> {
        self.cursor.enter_program_type();
        let value = self.read_bits()?;
        let program_type = ProgramType::try_from(value)?;
        // the delay after this byte depends on the type just read
        self.cursor.program_type = program_type;
        self.cursor.byte_done();
        debug!("Program type {:?}", program_type);
        Ok(program_type)
    }

    fn read_block(&mut self, index: usize) -> Result<Block> {
        self.cursor.enter_block(index);
        let high = self.read_byte()?;
        self.cursor.block_position = BlockPosition::LengthLow;
        let low = self.read_byte()?;
        self.cursor.block_position = BlockPosition::LengthChecksum;
        let length_checksum = self.read_byte()?;

        let length = u16::from_be_bytes([high, low]);
        if length_checksum != word_checksum(length) {
            return Err(DgvError::LengthChecksumMismatch { block: index });
        }
        let len = length as usize;
        if index == 0 && len >= MAX_NAME_BLOCK_LEN {
            return Err(DgvError::InvalidBlockLength { block: index, len });
        }
        trace!("Block {} length {}", index, len);

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| DgvError::BlockAllocation { block: index, len })?;

        let mut checksum = CHECKSUM_SEED;
        for i in 0..len {
            self.cursor.block_position = BlockPosition::for_data_byte(i, len);
            let byte = self.read_byte()?;
            checksum = byte_checksum(byte, checksum);
            data.push(byte);
        }

        self.cursor.enter_block_checksum();
        let data_checksum = self.read_byte()?;
        if data_checksum != checksum {
            return Err(DgvError::BlockChecksumMismatch { block: index });
        }

        Ok(Block {
            length,
            length_checksum,
            data,
            data_checksum,
        })
    }

    fn read_byte(&mut self) -> Result<u8> {
        let value = self.read_bits()?;
        self.cursor.byte_done();
        Ok(value)
    }

    /// Eight bits, most significant first, without the trailing byte delay.
    fn read_bits(&mut self) -> Result<u8> {
        let mut value = 0u8;
        for _ in 0..8 {
            value = (value << 1) | self.read_bit()? as u8;
            self.cursor.bit_done();
        }
        Ok(value)
    }

    /// A bit is 1 when its first high period outlasts the second.
    fn read_bit(&mut self) -> Result<bool> {
        let mut counts = [0u32; 4];
        for period in BitPeriod::ALL {
            let loop_delay = period.cycles_per_loop();
            let mut offset = match period {
                BitPeriod::P0 => self.cursor.carried_delay,
                _ => loop_delay,
            };
            if period == BitPeriod::P2 {
                offset += PERIOD_2_EXTRA_CYCLES;
            }
            let trigger = if period.is_high() { TRIGGER_LOW } else { TRIGGER_HIGH };
            counts[period.index()] = self.level_change_loop(trigger, offset, loop_delay, true)?;
        }
        Ok(counts[1] > counts[3])
    }
}

impl PulseProbe for TapeReader<'_> {
    fn level_change_loop(&mut self, trigger: u8, offset: i64, loop_delay: i64, capped: bool) -> Result<u32> {
        self.clock.advance(offset);
        let mut count = 0u32;
        loop {
            let ttl = self.read_ttl()?;
            let waiting = if trigger >= 128 { ttl < trigger } else { ttl > trigger };
            if count < PULSE_CAP - 1 || capped {
                count += 1;
            }
            if waiting {
                self.clock.advance(loop_delay);
            }
            if !waiting || (capped && count == PULSE_CAP) {
                return Ok(count);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncodeRun, Encoder};
    use crate::profile::HardwareProfile;
    use crate::waveform::{PcmFormat, SampleWidth};

    fn pac_program() -> DaiProgram {
        DaiProgram::from_payloads(ProgramType::Basic, b"PAC", &[0u8; 100], b"").unwrap()
    }

    fn reader_over(wave: &Waveform) -> TapeReader<'_> {
        TapeReader {
            wave,
            frames: wave.frames(),
            polarity: Polarity::Normal,
            channel: 0,
            clock: CpuClock::new(0, wave.format.sample_rate),
            cursor: TapeCursor::new(),
        }
    }

    fn square(samples: &[i16]) -> Waveform {
        let format = PcmFormat {
            sample_rate: 2_000_000,
            channels: 1,
            width: SampleWidth::Byte,
        };
        Waveform::from_samples(format, samples.to_vec()).unwrap()
    }

    #[test]
    fn test_level_change_loop_counts_polls() {
        // one sample per cycle: 5 low samples, then high
        let mut samples = vec![-128i16; 5];
        samples.extend(vec![127i16; 10]);
        let wave = square(&samples);
        let mut reader = reader_over(&wave);
        let count = reader.level_change_loop(TRIGGER_HIGH, 0, 1, true).unwrap();
        assert_eq!(count, 6);
        assert_eq!(reader.clock.cycles(), 5);
    }

    #[test]
    fn test_level_change_loop_caps_at_255() {
        let wave = square(&vec![-128i16; 1000]);
        let mut reader = reader_over(&wave);
        assert_eq!(reader.level_change_loop(TRIGGER_HIGH, 0, 1, true).unwrap(), 255);

        let mut reader = reader_over(&wave);
        match reader.level_change_loop(TRIGGER_HIGH, 0, 1, false) {
            Err(DgvError::EndOfStream) => {}
            other => panic!("expected EndOfStream, got {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_default_profile() {
        let program = pac_program();
        let wave = Encoder::default().encode(&program).unwrap();
        let decoded = Decoder::new(Polarity::Normal).decode(&wave).unwrap();
        assert_eq!(decoded, program);
    }

    #[test]
    fn test_wrong_polarity_fails() {
        let wave = Encoder::default().encode(&pac_program()).unwrap();
        assert!(Decoder::new(Polarity::Inverted).decode(&wave).is_err());
    }

    #[test]
    fn test_any_parity_finds_inverted_recording() {
        let profile = HardwareProfile::preset(3).unwrap();
        assert!(profile.polarity.is_inverted());
        let wave = Encoder::new(profile).encode(&pac_program()).unwrap();
        let (decoded, polarity) = decode_any_parity(&wave).unwrap();
        assert_eq!(polarity, Polarity::Inverted);
        assert_eq!(decoded, pac_program());
    }

    /// Two recordings back to back, the first with its sync byte replaced.
    fn with_bad_sync_prefix(bad_recordings: usize) -> Waveform {
        let encoder = Encoder::default();
        let good = encoder.encode(&pac_program()).unwrap();
        let mut samples = Vec::new();
        for _ in 0..bad_recordings {
            samples.extend(corrupt_sync_byte(&encoder));
        }
        samples.extend(good.samples);
        Waveform::from_samples(good.format, samples).unwrap()
    }

    /// Leader and sync bit, a wrong sync byte, then silence.
    fn corrupt_sync_byte(encoder: &Encoder) -> Vec<i16> {
        let mut wave = Waveform::new(encoder.profile().format());
        let mut run = EncodeRun::new(encoder.profile(), false, &mut wave);
        run.write_leader().unwrap();
        run.write_sync_byte(0x54).unwrap();
        let low = run.low_level();
        wave.samples.extend(vec![low; 4000]);
        wave.samples
    }

    #[test]
    fn test_single_bad_sync_byte_resyncs() {
        let wave = with_bad_sync_prefix(1);
        assert_eq!(Decoder::default().decode(&wave).unwrap(), pac_program());
    }

    #[test]
    fn test_repeated_bad_sync_byte_fails() {
        let wave = with_bad_sync_prefix(2);
        match Decoder::default().decode(&wave) {
            Err(DgvError::SyncByteMismatch(_)) => {}
            other => panic!("expected SyncByteMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_name_block_rejected() {
        let encoder = Encoder::default();
        let mut wave = Waveform::new(encoder.profile().format());
        let mut run = EncodeRun::new(encoder.profile(), false, &mut wave);
        run.write_leader().unwrap();
        run.write_sync_byte(SYNC_BYTE).unwrap();
        run.cursor.enter_program_type();
        run.write_byte(ProgramType::Basic.as_byte()).unwrap();
        run.cursor.enter_block(0);
        run.write_byte(0x01).unwrap();
        run.cursor.block_position = BlockPosition::LengthLow;
        run.write_byte(0x00).unwrap();
        run.cursor.block_position = BlockPosition::LengthChecksum;
        run.write_byte(word_checksum(256)).unwrap();
        let low = run.low_level();
        wave.samples.extend(vec![low; 4000]);

        match Decoder::default().decode(&wave) {
            Err(DgvError::InvalidBlockLength { block: 0, len: 256 }) => {}
            other => panic!("expected InvalidBlockLength, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_sample_rate_terminates() {
        let mut wave = Waveform::new(PcmFormat {
            sample_rate: 0,
            channels: 1,
            width: SampleWidth::Byte,
        });
        wave.samples = vec![-128; 1000];
        match Decoder::default().decode(&wave) {
            Err(DgvError::UnsupportedFormat(_)) => {}
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_channel_rejected() {
        let wave = Encoder::default().encode(&pac_program()).unwrap();
        match Decoder::default().with_channel(1).decode(&wave) {
            Err(DgvError::UnsupportedFormat(_)) => {}
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }
}
