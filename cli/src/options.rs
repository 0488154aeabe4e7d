//! Compact profile options string, e.g. `--V7MBNF96000`.
//!
//! `V<d>` selects a preset, then `M`/`S` (mono/stereo), `B`/`W` (1 or 2 bytes
//! per sample), `N`/`I` (normal/inverted) and `F<rate>` override it.

use dgv_core::profile::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
use dgv_core::{DgvError, HardwareProfile, Polarity, Result, SampleWidth};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileOptions {
    pub preset: Option<usize>,
    pub channels: Option<u16>,
    pub width: Option<SampleWidth>,
    pub polarity: Option<Polarity>,
    pub sample_rate: Option<u32>,
}

impl ProfileOptions {
    pub fn parse(text: &str) -> Result<Self> {
        let body = text.strip_prefix("--").unwrap_or(text);
        let chars: Vec<char> = body.chars().map(|c| c.to_ascii_uppercase()).collect();
        let mut options = ProfileOptions::default();

        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                'V' => {
                    let digit = chars
                        .get(i + 1)
                        .and_then(|c| c.to_digit(10))
                        .ok_or_else(|| invalid(text, "V needs a preset digit"))?;
                    options.preset = Some(digit as usize);
                    i += 1;
                }
                'M' => options.channels = Some(1),
                'S' => options.channels = Some(2),
                'B' => options.width = Some(SampleWidth::Byte),
                'W' => options.width = Some(SampleWidth::Word),
                'N' => options.polarity = Some(Polarity::Normal),
                'I' => options.polarity = Some(Polarity::Inverted),
                'F' => {
                    let digits: String = chars[i + 1..].iter().take_while(|c| c.is_ascii_digit()).collect();
                    let rate: u32 = digits
                        .parse()
                        .map_err(|_| invalid(text, "F needs a sample rate"))?;
                    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate) {
                        return Err(invalid(text, "sample rate out of range"));
                    }
                    options.sample_rate = Some(rate);
                    i += digits.len();
                }
                other => return Err(invalid(text, &format!("unknown option '{}'", other))),
            }
            i += 1;
        }
        Ok(options)
    }

    /// Build the profile: preset first, overrides after.
    pub fn apply(&self) -> Result<HardwareProfile> {
        let profile = match self.preset {
            Some(index) => HardwareProfile::preset(index)?,
            None => HardwareProfile::default(),
        };
        self.apply_overrides(profile)
    }

    /// Apply everything but the preset selection to a profile.
    pub fn apply_overrides(&self, mut profile: HardwareProfile) -> Result<HardwareProfile> {
        if let Some(channels) = self.channels {
            profile = profile.with_channels(channels)?;
        }
        if let Some(width) = self.width {
            profile = profile.with_width(width);
        }
        if let Some(polarity) = self.polarity {
            profile = profile.with_polarity(polarity);
        }
        if let Some(rate) = self.sample_rate {
            profile = profile.with_sample_rate(rate)?;
        }
        Ok(profile)
    }
}

/// Canonical options string describing a profile.
pub fn format_options(profile: &HardwareProfile) -> String {
    format!(
        "--V{}{}{}{}F{}",
        profile.index,
        if profile.channels == 2 { 'S' } else { 'M' },
        match profile.width {
            SampleWidth::Byte => 'B',
            SampleWidth::Word => 'W',
        },
        if profile.polarity.is_inverted() { 'I' } else { 'N' },
        profile.sample_rate
    )
}

fn invalid(text: &str, reason: &str) -> DgvError {
    DgvError::InvalidOption(format!("{}: {}", text, reason))
}
