//! `.dai` container: the program type byte followed by the three blocks,
//! each as big-endian length, length checksum, data and data checksum.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use crate::block::{Block, DaiProgram, ProgramType, BLOCK_COUNT, MAX_NAME_BLOCK_LEN};
use crate::checksum::{data_checksum, word_checksum};
use crate::error::{DgvError, Result};

pub fn read_dai<R: Read>(reader: &mut R) -> Result<DaiProgram> {
    let [type_byte] = read_array::<1, _>(reader)?;
    let program_type = ProgramType::try_from(type_byte)
        .map_err(|_| DgvError::InvalidDaiData(format!("program type {:#04x}", type_byte)))?;

    let mut blocks = Vec::with_capacity(BLOCK_COUNT);
    for index in 0..BLOCK_COUNT {
        let [high, low, length_checksum] = read_array::<3, _>(reader)?;
        let length = u16::from_be_bytes([high, low]);
        if length_checksum != word_checksum(length) {
            return Err(DgvError::InvalidDaiData(format!(
                "length checksum of block {}",
                index
            )));
        }
        if index == 0 && length as usize >= MAX_NAME_BLOCK_LEN {
            return Err(DgvError::InvalidDaiData(format!("name block length {}", length)));
        }

        let mut data = vec![0u8; length as usize];
        reader.read_exact(&mut data).map_err(read_error)?;
        let [stored_checksum] = read_array::<1, _>(reader)?;
        if stored_checksum != data_checksum(&data) {
            return Err(DgvError::DaiChecksum { block: index });
        }

        blocks.push(Block {
            length,
            length_checksum,
            data,
            data_checksum: stored_checksum,
        });
    }

    let [name, payload, table]: [Block; BLOCK_COUNT] = blocks
        .try_into()
        .map_err(|_| DgvError::InvalidDaiData("wrong block count".to_string()))?;
    DaiProgram::new(program_type, [name, payload, table])
}

pub fn write_dai<W: Write>(writer: &mut W, program: &DaiProgram) -> Result<()> {
    program.validate()?;
    writer.write_all(&[program.program_type.as_byte()])?;
    for block in &program.blocks {
        writer.write_all(&block.length.to_be_bytes())?;
        writer.write_all(&[block.length_checksum])?;
        writer.write_all(&block.data)?;
        writer.write_all(&[block.data_checksum])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_dai_file(path: &Path) -> Result<DaiProgram> {
    let file = File::open(path)
        .map_err(|e| DgvError::DaiRead(format!("{}: {}", path.display(), e)))?;
    read_dai(&mut BufReader::new(file))
}

pub fn write_dai_file(path: &Path, program: &DaiProgram) -> Result<()> {
    let file = File::create(path)?;
    write_dai(&mut BufWriter::new(file), program)
}

fn read_array<const N: usize, R: Read>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(read_error)?;
    Ok(buf)
}

fn read_error(err: std::io::Error) -> DgvError {
    if err.kind() == ErrorKind::UnexpectedEof {
        DgvError::DaiRead("file truncated".to_string())
    } else {
        DgvError::DaiRead(err.to_string())
    }
}
