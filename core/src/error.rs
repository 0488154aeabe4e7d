use thiserror::Error;

#[derive(Debug, Error)]
pub enum DgvError {
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Failed to open WAV stream: {0}")]
    WavOpen(String),

    #[error("Failed to read .dai file: {0}")]
    DaiRead(String),

    #[error("Invalid .dai data: {0}")]
    InvalidDaiData(String),

    #[error("Checksum mismatch in .dai block {block}")]
    DaiChecksum { block: usize },

    #[error("Failed to write samples: {0}")]
    SampleWrite(String),

    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read samples: {0}")]
    SampleRead(String),

    #[error("End of samples reached")]
    EndOfStream,

    #[error("Leader not found")]
    LeaderNotFound,

    #[error("Sync byte mismatch: expected 0x55, found {0:#04x}")]
    SyncByteMismatch(u8),

    #[error("Invalid program type {0:#04x}")]
    InvalidProgramType(u8),

    #[error("Failed to allocate {len} bytes for block {block}")]
    BlockAllocation { block: usize, len: usize },

    #[error("Invalid length {len} for block {block}")]
    InvalidBlockLength { block: usize, len: usize },

    #[error("Length checksum mismatch in block {block}")]
    LengthChecksumMismatch { block: usize },

    #[error("Block checksum mismatch in block {block}")]
    BlockChecksumMismatch { block: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DgvError {
    /// Signed status code reported to callers and used as process exit status.
    pub fn code(&self) -> i32 {
        match self {
            DgvError::InvalidOption(_) => -3,
            DgvError::WavOpen(_) => -4,
            DgvError::DaiRead(_) => -6,
            DgvError::InvalidDaiData(_) => -7,
            DgvError::DaiChecksum { .. } => -11,
            DgvError::SampleWrite(_) | DgvError::Io(_) => -12,
            DgvError::UnsupportedFormat(_) => -17,
            DgvError::SampleRead(_) => -18,
            DgvError::EndOfStream => -19,
            DgvError::LeaderNotFound => -20,
            DgvError::SyncByteMismatch(_) => -21,
            DgvError::InvalidProgramType(_) => -22,
            DgvError::BlockAllocation { .. } => -23,
            DgvError::InvalidBlockLength { .. } => -24,
            DgvError::LengthChecksumMismatch { .. } => -25,
            DgvError::BlockChecksumMismatch { .. } => -27,
        }
    }
}

pub type Result<T> = std::result::Result<T, DgvError>;
