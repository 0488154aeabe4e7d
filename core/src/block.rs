use crate::checksum::{data_checksum, word_checksum, CHECKSUM_SEED};
use crate::error::{DgvError, Result};

pub const BLOCK_COUNT: usize = 3;

/// Block 0 (the program name) must be shorter than this.
pub const MAX_NAME_BLOCK_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramType {
    Basic = 0x30,
    Binary = 0x31,
    Table = 0x32,
}

impl ProgramType {
    pub fn index(self) -> usize {
        self as usize - ProgramType::Basic as usize
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ProgramType {
    type Error = DgvError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x30 => Ok(ProgramType::Basic),
            0x31 => Ok(ProgramType::Binary),
            0x32 => Ok(ProgramType::Table),
            other => Err(DgvError::InvalidProgramType(other)),
        }
    }
}

/// One length-prefixed, checksummed record of a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub length: u16,
    pub length_checksum: u8,
    pub data: Vec<u8>,
    pub data_checksum: u8,
}

impl Block {
    /// Build a block from its payload, computing both checksums.
    pub fn new(data: Vec<u8>) -> Result<Self> {
        let length = u16::try_from(data.len()).map_err(|_| DgvError::InvalidBlockLength {
            block: 0,
            len: data.len(),
        })?;
        Ok(Self {
            length,
            length_checksum: word_checksum(length),
            data_checksum: data_checksum(&data),
            data,
        })
    }

    pub fn empty() -> Self {
        Self {
            length: 0,
            length_checksum: word_checksum(0),
            data: Vec::new(),
            data_checksum: CHECKSUM_SEED,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::empty()
    }
}

/// A complete program: its type and the name, payload and table blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaiProgram {
    pub program_type: ProgramType,
    pub blocks: [Block; BLOCK_COUNT],
}

impl DaiProgram {
    pub fn new(program_type: ProgramType, blocks: [Block; BLOCK_COUNT]) -> Result<Self> {
        let program = Self {
            program_type,
            blocks,
        };
        program.validate()?;
        Ok(program)
    }

    /// Build a program from raw payloads.
    pub fn from_payloads(
        program_type: ProgramType,
        name: &[u8],
        payload: &[u8],
        table: &[u8],
    ) -> Result<Self> {
        let blocks = [name, payload, table]
            .iter()
            .enumerate()
            .map(|(i, data)| {
                Block::new(data.to_vec()).map_err(|_| DgvError::InvalidBlockLength {
                    block: i,
                    len: data.len(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let [b0, b1, b2]: [Block; BLOCK_COUNT] = blocks
            .try_into()
            .map_err(|_| DgvError::InvalidDaiData("wrong block count".to_string()))?;
        Self::new(program_type, [b0, b1, b2])
    }

    /// Check lengths and both checksums of every block.
    pub fn validate(&self) -> Result<()> {
        for (i, block) in self.blocks.iter().enumerate() {
            if block.data.len() != block.length as usize
                || (i == 0 && block.data.len() >= MAX_NAME_BLOCK_LEN)
            {
                return Err(DgvError::InvalidBlockLength {
                    block: i,
                    len: block.data.len(),
                });
            }
            if block.length_checksum != word_checksum(block.length) {
                return Err(DgvError::LengthChecksumMismatch { block: i });
            }
            if block.data_checksum != data_checksum(&block.data) {
                return Err(DgvError::BlockChecksumMismatch { block: i });
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &[u8] {
        &self.blocks[0].data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_type_conversion() {
        assert_eq!(ProgramType::try_from(0x31).unwrap(), ProgramType::Binary);
        assert_eq!(ProgramType::Table.index(), 2);
        match ProgramType::try_from(0x33) {
            Err(DgvError::InvalidProgramType(0x33)) => {}
            other => panic!("expected InvalidProgramType, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_block_carries_seed() {
        let block = Block::new(Vec::new()).unwrap();
        assert_eq!(block, Block::empty());
        assert_eq!(block.data_checksum, 0x56);
    }

    #[test]
    fn test_name_block_length_boundary() {
        let ok = DaiProgram::from_payloads(ProgramType::Basic, &[b'A'; 255], b"", b"");
        assert!(ok.is_ok());

        match DaiProgram::from_payloads(ProgramType::Basic, &[b'A'; 256], b"", b"") {
            Err(DgvError::InvalidBlockLength { block: 0, len: 256 }) => {}
            other => panic!("expected InvalidBlockLength, got {:?}", other),
        }

        // Only the name block is limited.
        assert!(DaiProgram::from_payloads(ProgramType::Basic, b"X", &[0u8; 4000], b"").is_ok());
    }

    #[test]
    fn test_validate_detects_tampering() {
        let mut program = DaiProgram::from_payloads(ProgramType::Binary, b"NAME", b"\x01\x02", b"").unwrap();
        program.blocks[1].data[0] ^= 0x40;
        match program.validate() {
            Err(DgvError::BlockChecksumMismatch { block: 1 }) => {}
            other => panic!("expected BlockChecksumMismatch, got {:?}", other),
        }

        let mut program = DaiProgram::from_payloads(ProgramType::Binary, b"NAME", b"", b"").unwrap();
        program.blocks[2].length_checksum ^= 1;
        match program.validate() {
            Err(DgvError::LengthChecksumMismatch { block: 2 }) => {}
            other => panic!("expected LengthChecksumMismatch, got {:?}", other),
        }
    }
}
