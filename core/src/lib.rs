//! DAI cassette tape codec
//!
//! Converts DAI programs to and from PCM waveforms by replaying the timing of
//! the machine's tape firmware, cycle by cycle.

pub mod error;
pub mod checksum;
pub mod timing;
pub mod profile;
pub mod framing;
pub mod block;
pub mod waveform;
pub mod sync;
pub mod encoder;
pub mod decoder;
pub mod dai_file;

pub use block::{Block, DaiProgram, ProgramType};
pub use dai_file::{read_dai, read_dai_file, write_dai, write_dai_file};
pub use decoder::{decode_any_parity, Decoder};
pub use encoder::Encoder;
pub use error::{DgvError, Result};
pub use profile::{HardwareProfile, Polarity};
pub use waveform::{PcmFormat, SampleSink, SampleWidth, Waveform};

/// Literal byte following the sync bit.
pub const SYNC_BYTE: u8 = 0x55;
