//! In-memory PCM waveform and the TTL view the tape routine sees of it.
//!
//! Samples are kept interleaved in the signed 16-bit domain used by `hound`:
//! 8-bit unsigned samples are stored shifted down by 128.

use crate::error::{DgvError, Result};
use crate::profile::Polarity;

/// TTL threshold a falling level must cross.
pub const TRIGGER_LOW: u8 = 96;
/// TTL threshold a rising level must cross.
pub const TRIGGER_HIGH: u8 = 160;

const BYTE_LEVELS: [i16; 2] = [0 - 128, 255 - 128];
const BYTE_SMOOTH_LEVELS: [i16; 2] = [50 - 128, 208 - 128];
const WORD_LEVELS: [i16; 2] = [-28835, 28835];
const WORD_SMOOTH_LEVELS: [i16; 2] = [-26214, 26214];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleWidth {
    /// 8-bit unsigned
    Byte,
    /// 16-bit signed
    Word,
}

impl SampleWidth {
    pub fn bits(self) -> u16 {
        match self {
            SampleWidth::Byte => 8,
            SampleWidth::Word => 16,
        }
    }

    pub fn from_bits(bits: u16) -> Result<Self> {
        match bits {
            8 => Ok(SampleWidth::Byte),
            16 => Ok(SampleWidth::Word),
            other => Err(DgvError::UnsupportedFormat(format!(
                "{} bits per sample",
                other
            ))),
        }
    }

    /// Output sample for a TTL level.
    pub fn level(self, high: bool, smoothed: bool) -> i16 {
        let levels = match (self, smoothed) {
            (SampleWidth::Byte, false) => BYTE_LEVELS,
            (SampleWidth::Byte, true) => BYTE_SMOOTH_LEVELS,
            (SampleWidth::Word, false) => WORD_LEVELS,
            (SampleWidth::Word, true) => WORD_SMOOTH_LEVELS,
        };
        levels[high as usize]
    }

    /// Map a stored sample onto the 0..=255 TTL scale.
    pub fn ttl(self, sample: i16, polarity: Polarity) -> u8 {
        let value = match self {
            SampleWidth::Byte => (sample as i32 + 128).clamp(0, 255),
            SampleWidth::Word => sample as i32 / 256 + 128,
        } as u8;
        if polarity.is_inverted() {
            255 - value
        } else {
            value
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub width: SampleWidth,
}

/// Destination of encoded samples.
pub trait SampleSink {
    fn put_sample(&mut self, sample: i16) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct Waveform {
    pub format: PcmFormat,
    pub samples: Vec<i16>,
}

impl Waveform {
    pub fn new(format: PcmFormat) -> Self {
        Self {
            format,
            samples: Vec::new(),
        }
    }

    pub fn from_samples(format: PcmFormat, samples: Vec<i16>) -> Result<Self> {
        if format.channels == 0 {
            return Err(DgvError::UnsupportedFormat("zero channels".to_string()));
        }
        if format.sample_rate == 0 {
            return Err(DgvError::UnsupportedFormat("zero sample rate".to_string()));
        }
        Ok(Self { format, samples })
    }

    /// Number of complete frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1) as usize
    }

    /// TTL value of one channel at a frame index.
    pub fn ttl_at(&self, frame: usize, channel: u16, polarity: Polarity) -> Result<u8> {
        let index = frame * self.format.channels as usize + channel as usize;
        let sample = self
            .samples
            .get(index)
            .copied()
            .ok_or_else(|| DgvError::SampleRead(format!("no sample at frame {}", frame)))?;
        Ok(self.format.width.ttl(sample, polarity))
    }
}

impl SampleSink for Waveform {
    fn put_sample(&mut self, sample: i16) -> Result<()> {
        self.samples.push(sample);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_land_on_ttl_extremes() {
        let byte = SampleWidth::Byte;
        assert_eq!(byte.ttl(byte.level(false, false), Polarity::Normal), 0);
        assert_eq!(byte.ttl(byte.level(true, false), Polarity::Normal), 255);
        assert_eq!(byte.ttl(byte.level(true, true), Polarity::Normal), 208);
        assert_eq!(byte.ttl(byte.level(false, true), Polarity::Inverted), 205);

        let word = SampleWidth::Word;
        assert_eq!(word.ttl(word.level(true, false), Polarity::Normal), 240);
        assert_eq!(word.ttl(word.level(false, false), Polarity::Normal), 16);
        assert_eq!(word.ttl(word.level(true, true), Polarity::Normal), 230);
    }

    #[test]
    fn test_smoothed_levels_still_cross_triggers() {
        for width in [SampleWidth::Byte, SampleWidth::Word] {
            let high = width.ttl(width.level(true, true), Polarity::Normal);
            let low = width.ttl(width.level(false, true), Polarity::Normal);
            assert!(high > TRIGGER_HIGH, "{:?}", width);
            assert!(low < TRIGGER_LOW, "{:?}", width);
        }
    }

    #[test]
    fn test_word_ttl_truncates_toward_zero() {
        assert_eq!(SampleWidth::Word.ttl(-255, Polarity::Normal), 128);
        assert_eq!(SampleWidth::Word.ttl(-256, Polarity::Normal), 127);
        assert_eq!(SampleWidth::Word.ttl(i16::MIN, Polarity::Normal), 0);
        assert_eq!(SampleWidth::Word.ttl(i16::MAX, Polarity::Normal), 255);
    }

    #[test]
    fn test_stereo_frames_read_selected_channel() {
        let format = PcmFormat {
            sample_rate: 48_000,
            channels: 2,
            width: SampleWidth::Byte,
        };
        let wave = Waveform::from_samples(format, vec![-128, 127, 127, -128, 0]).unwrap();
        assert_eq!(wave.frames(), 2);
        assert_eq!(wave.ttl_at(0, 0, Polarity::Normal).unwrap(), 0);
        assert_eq!(wave.ttl_at(0, 1, Polarity::Normal).unwrap(), 255);
        assert_eq!(wave.ttl_at(1, 1, Polarity::Normal).unwrap(), 0);
        assert!(wave.ttl_at(5, 0, Polarity::Normal).is_err());
    }

    #[test]
    fn test_unsupported_width() {
        assert!(SampleWidth::from_bits(24).is_err());
        assert_eq!(SampleWidth::from_bits(16).unwrap(), SampleWidth::Word);
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let format = PcmFormat {
            sample_rate: 0,
            channels: 1,
            width: SampleWidth::Byte,
        };
        match Waveform::from_samples(format, vec![-128; 1000]) {
            Err(DgvError::UnsupportedFormat(_)) => {}
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }
}
