use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use dgv_core::profile::BATCH_PRESETS;
use dgv_core::{
    decode_any_parity, read_dai_file, write_dai_file, DaiProgram, DgvError, Encoder,
    HardwareProfile, PcmFormat, SampleSink, SampleWidth, Waveform,
};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{error, info, warn};
use thiserror::Error;

use crate::options::{format_options, ProfileOptions};

/// Suffix of `.dai` files produced from WAV input.
pub const DAI_SUFFIX: &str = "_Dgv";

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Codec(#[from] DgvError),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),

    #[error("{failed} of {total} batch conversions failed")]
    Batch { failed: usize, total: usize },
}

impl CliError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Codec(e) => e.code().unsigned_abs() as u8,
            CliError::Wav(_) => 17,
            CliError::Io(_) => 12,
            CliError::Usage(_) => 3,
            CliError::Batch { .. } => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Dai,
    Wav,
}

impl FileKind {
    pub fn of(path: &Path) -> Option<FileKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "dai" => Some(FileKind::Dai),
            "wav" => Some(FileKind::Wav),
            _ => None,
        }
    }
}

/// Adapts a `hound` writer to the encoder's sample sink.
struct WavSink<W: Write + Seek> {
    writer: WavWriter<W>,
}

impl<W: Write + Seek> SampleSink for WavSink<W> {
    fn put_sample(&mut self, sample: i16) -> dgv_core::Result<()> {
        self.writer
            .write_sample(sample)
            .map_err(|e| DgvError::SampleWrite(e.to_string()))
    }
}

pub fn wav_spec(format: &PcmFormat) -> WavSpec {
    WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.width.bits(),
        sample_format: SampleFormat::Int,
    }
}

pub fn read_wav(path: &Path) -> Result<Waveform> {
    let mut reader = WavReader::open(path)
        .map_err(|e| DgvError::WavOpen(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int {
        return Err(DgvError::UnsupportedFormat("floating point samples".to_string()).into());
    }
    let format = PcmFormat {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        width: SampleWidth::from_bits(spec.bits_per_sample)?,
    };
    info!(
        "Read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| DgvError::SampleRead(e.to_string()))?;
    Ok(Waveform::from_samples(format, samples)?)
}

/// Encode a program straight into a WAV file.
pub fn write_wav(path: &Path, program: &DaiProgram, encoder: &Encoder) -> Result<u64> {
    let spec = wav_spec(&encoder.profile().format());
    let writer = WavWriter::new(BufWriter::new(File::create(path)?), spec)?;
    let mut sink = WavSink { writer };
    let frames = encoder.encode_to(program, &mut sink)?;
    sink.writer.finalize()?;
    Ok(frames)
}

/// Default `.dai` name for a WAV input.
pub fn dai_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    input.with_file_name(format!("{}{}.dai", stem, DAI_SUFFIX))
}

/// Default WAV name for a `.dai` input: stem, profile name, then options.
pub fn wav_output_path(input: &Path, profile: &HardwareProfile) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    let stem = stem.strip_suffix(DAI_SUFFIX).unwrap_or(stem);
    input.with_file_name(format!("{}{}{}.wav", stem, profile.name, format_options(profile)))
}

/// True for WAV names this tool produced.
pub fn is_generated_wav(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    HardwareProfile::preset_names().any(|preset| name.contains(preset))
}

/// Run a conversion, removing its output when it fails.
fn with_cleanup<T>(output: &Path, convert: impl FnOnce() -> Result<T>) -> Result<T> {
    let result = convert();
    if result.is_err() && output.exists() {
        if let Err(e) = fs::remove_file(output) {
            warn!("Could not remove {}: {}", output.display(), e);
        }
    }
    result
}

pub fn dai_to_wav(input: &Path, output: Option<&Path>, profile: &HardwareProfile, smooth: bool) -> Result<PathBuf> {
    let program = read_dai_file(input)?;
    info!(
        "Read {:?} program '{}' from {}",
        program.program_type,
        String::from_utf8_lossy(program.name()),
        input.display()
    );

    let output = output.map(Path::to_path_buf).unwrap_or_else(|| wav_output_path(input, profile));
    let encoder = Encoder::new(profile.clone()).with_smoothing(smooth);
    let frames = with_cleanup(&output, || write_wav(&output, &program, &encoder))?;
    info!(
        "Encoded {} frames ({:.2} s) to {}",
        frames,
        frames as f64 / profile.sample_rate as f64,
        output.display()
    );
    Ok(output)
}

pub fn wav_to_dai(input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let program = decode_wav(input)?;
    let output = output.map(Path::to_path_buf).unwrap_or_else(|| dai_output_path(input));
    with_cleanup(&output, || Ok(write_dai_file(&output, &program)?))?;
    info!("Wrote {}", output.display());
    Ok(output)
}

/// Decode a WAV file and encode it again with another profile.
pub fn wav_to_wav(input: &Path, output: Option<&Path>, profile: &HardwareProfile, smooth: bool) -> Result<PathBuf> {
    let program = decode_wav(input)?;
    let output = output.map(Path::to_path_buf).unwrap_or_else(|| wav_output_path(input, profile));
    if output == input {
        return Err(CliError::Usage("output would overwrite the input".to_string()));
    }
    let encoder = Encoder::new(profile.clone()).with_smoothing(smooth);
    with_cleanup(&output, || write_wav(&output, &program, &encoder))?;
    info!("Wrote {}", output.display());
    Ok(output)
}

fn decode_wav(input: &Path) -> Result<DaiProgram> {
    let wave = read_wav(input)?;
    let (program, polarity) = decode_any_parity(&wave)?;
    info!(
        "Decoded {:?} program '{}' ({:?} polarity): {} + {} + {} bytes",
        program.program_type,
        String::from_utf8_lossy(program.name()),
        polarity,
        program.blocks[0].len(),
        program.blocks[1].len(),
        program.blocks[2].len()
    );
    Ok(program)
}

/// Convert every WAV in a directory to `.dai`, then every `.dai` to WAV
/// once per batch preset.
pub fn batch(dir: &Path, options: &ProfileOptions, smooth: bool) -> Result<usize> {
    let mut total = 0;
    let mut failed = 0;

    for input in list_files(dir, FileKind::Wav)? {
        if is_generated_wav(&input) {
            continue;
        }
        total += 1;
        if let Err(e) = wav_to_dai(&input, None) {
            error!("{}: {}", input.display(), e);
            failed += 1;
        }
    }

    for input in list_files(dir, FileKind::Dai)? {
        for index in BATCH_PRESETS {
            total += 1;
            let profile = options.apply_overrides(HardwareProfile::preset(index)?)?;
            if let Err(e) = dai_to_wav(&input, None, &profile, smooth) {
                error!("{} ({}): {}", input.display(), profile.name, e);
                failed += 1;
            }
        }
    }

    info!("Batch: {} conversions, {} failed", total, failed);
    if failed > 0 {
        return Err(CliError::Batch { failed, total });
    }
    Ok(total)
}

fn list_files(dir: &Path, kind: FileKind) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && FileKind::of(&path) == Some(kind) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
