//! ISO 9660 volume descriptor set: the 7-byte common header plus the
//! Primary and Supplementary (Joliet) descriptor bodies.
//!
//! Grounded on `examples/original_source/dumpdisc/iso9660.py`'s
//! `VolumeDescriptor` subclass registry (`PrimaryVolumeDescriptor`,
//! `SupplementaryVolumeDescriptor`) and, for the field order/naming
//! convention, `examples/other_examples/901e7ef7_hxyulin-iso-rs__src-lib.rs.rs`'s
//! `PrimaryVolumeDescriptor`.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use deku::prelude::*;
use std::io::{Cursor, Read};

use crate::common::Dump;
use crate::error::{Error, Result};

pub const STANDARD_IDENTIFIER: &[u8; 5] = b"CD001";

#[derive(Debug, Clone, DekuRead)]
pub struct VolumeDescriptorHeader {
    pub descriptor_type: u8,
    #[deku(count = "5")]
    pub standard_identifier: Vec<u8>,
    pub version: u8,
}

#[derive(Debug, Clone)]
pub enum VolumeDescriptor {
    BootRecord,
    Primary(PrimaryVolumeDescriptor),
    Supplementary(SupplementaryVolumeDescriptor),
    PartitionDescriptor,
    Terminator,
}

/// Reads dual-endian (LSB-then-MSB) `u16`/`u32` fields used throughout the
/// directory-record and volume-descriptor layouts, validating both halves
/// agree — a mismatch means corruption or a non-ISO 9660 structure.
fn read_both_u16(cur: &mut Cursor<&[u8]>) -> Result<u16> {
    let lsb = cur.read_u16::<LittleEndian>()?;
    let msb = cur.read_u16::<BigEndian>()?;
    if lsb != msb {
        return Err(Error::StructureInvalid(format!(
            "LSB/MSB u16 mismatch: {lsb:#06x} != {msb:#06x}"
        )));
    }
    Ok(lsb)
}

fn read_both_u32(cur: &mut Cursor<&[u8]>) -> Result<u32> {
    let lsb = cur.read_u32::<LittleEndian>()?;
    let msb = cur.read_u32::<BigEndian>()?;
    if lsb != msb {
        return Err(Error::StructureInvalid(format!(
            "LSB/MSB u32 mismatch: {lsb:#010x} != {msb:#010x}"
        )));
    }
    Ok(lsb)
}

fn read_fixed_string(cur: &mut Cursor<&[u8]>, len: usize) -> Result<String> {
    let mut buf = vec![0u8; len];
    cur.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).trim_end().to_string())
}

fn skip(cur: &mut Cursor<&[u8]>, len: usize) -> Result<()> {
    let mut buf = vec![0u8; len];
    cur.read_exact(&mut buf)?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PrimaryVolumeDescriptor {
    pub system_identifier: String,
    pub volume_identifier: String,
    pub volume_space_size: u32,
    pub volume_set_size: u16,
    pub volume_sequence_number: u16,
    pub logical_block_size: u16,
    pub path_table_size: u32,
    pub type_l_path_table: u32,
    pub type_m_path_table: u32,
    pub root_directory_record: Vec<u8>,
    pub volume_set_identifier: String,
    pub publisher_identifier: String,
    pub data_preparer_identifier: String,
    pub application_identifier: String,
}

#[derive(Debug, Clone)]
pub struct SupplementaryVolumeDescriptor {
    pub volume_flags: u8,
    pub system_identifier: String,
    pub volume_identifier: String,
    pub volume_space_size: u32,
    pub escape_sequences: [u8; 32],
    pub volume_set_size: u16,
    pub volume_sequence_number: u16,
    pub logical_block_size: u16,
    pub path_table_size: u32,
    pub type_l_path_table: u32,
    pub type_m_path_table: u32,
    pub root_directory_record: Vec<u8>,
    pub volume_set_identifier: String,
}

impl SupplementaryVolumeDescriptor {
    /// Recognized Joliet Level 1/2/3 UCS-2 escape sequences (`25 2F 40/43/45`).
    /// Anything else is a non-Joliet supplementary descriptor, explicitly
    /// out of scope.
    pub fn is_joliet(&self) -> bool {
        matches!(
            &self.escape_sequences[0..3],
            [0x25, 0x2F, 0x40] | [0x25, 0x2F, 0x43] | [0x25, 0x2F, 0x45]
        )
    }
}

impl VolumeDescriptor {
    /// Parses one 2048-byte volume descriptor.
    pub fn parse(block: &[u8]) -> Result<VolumeDescriptor> {
        let ((_rest, _), header) = VolumeDescriptorHeader::from_bytes((block, 0))
            .map_err(|e| Error::StructureInvalid(format!("volume descriptor header: {e}")))?;
        if header.standard_identifier != STANDARD_IDENTIFIER {
            return Err(Error::SignatureInvalid("ISO 9660 standard identifier"));
        }

        match header.descriptor_type {
            0 => Ok(VolumeDescriptor::BootRecord),
            1 => Ok(VolumeDescriptor::Primary(Self::parse_primary(block)?)),
            2 => {
                let svd = Self::parse_supplementary(block)?;
                Ok(VolumeDescriptor::Supplementary(svd))
            }
            3 => Ok(VolumeDescriptor::PartitionDescriptor),
            255 => Ok(VolumeDescriptor::Terminator),
            other => Err(Error::UnknownVariant {
                what: "ISO 9660 volume descriptor type",
                tag: other.to_string(),
            }),
        }
    }

    fn parse_primary(block: &[u8]) -> Result<PrimaryVolumeDescriptor> {
        let mut cur = Cursor::new(block);
        cur.set_position(7);
        skip(&mut cur, 1)?; // unused
        let system_identifier = read_fixed_string(&mut cur, 32)?;
        let volume_identifier = read_fixed_string(&mut cur, 32)?;
        skip(&mut cur, 8)?; // unused
        let volume_space_size = read_both_u32(&mut cur)?;
        skip(&mut cur, 32)?; // unused
        let volume_set_size = read_both_u16(&mut cur)?;
        let volume_sequence_number = read_both_u16(&mut cur)?;
        let logical_block_size = read_both_u16(&mut cur)?;
        let path_table_size = read_both_u32(&mut cur)?;
        let type_l_path_table = cur.read_u32::<LittleEndian>()?;
        skip(&mut cur, 4)?; // optional type L
        let type_m_path_table = cur.read_u32::<BigEndian>()?;
        skip(&mut cur, 4)?; // optional type M
        let mut root_directory_record = vec![0u8; 34];
        cur.read_exact(&mut root_directory_record)?;
        let volume_set_identifier = read_fixed_string(&mut cur, 128)?;
        let publisher_identifier = read_fixed_string(&mut cur, 128)?;
        let data_preparer_identifier = read_fixed_string(&mut cur, 128)?;
        let application_identifier = read_fixed_string(&mut cur, 128)?;

        Ok(PrimaryVolumeDescriptor {
            system_identifier,
            volume_identifier,
            volume_space_size,
            volume_set_size,
            volume_sequence_number,
            logical_block_size,
            path_table_size,
            type_l_path_table,
            type_m_path_table,
            root_directory_record,
            volume_set_identifier,
            publisher_identifier,
            data_preparer_identifier,
            application_identifier,
        })
    }

    fn parse_supplementary(block: &[u8]) -> Result<SupplementaryVolumeDescriptor> {
        let mut cur = Cursor::new(block);
        cur.set_position(7);
        let volume_flags = cur.read_u8()?;
        let system_identifier = read_fixed_string_utf16(&mut cur, 32)?;
        let volume_identifier = read_fixed_string_utf16(&mut cur, 32)?;
        skip(&mut cur, 8)?; // unused
        let volume_space_size = read_both_u32(&mut cur)?;
        let mut escape_sequences = [0u8; 32];
        cur.read_exact(&mut escape_sequences)?;
        let volume_set_size = read_both_u16(&mut cur)?;
        let volume_sequence_number = read_both_u16(&mut cur)?;
        let logical_block_size = read_both_u16(&mut cur)?;
        let path_table_size = read_both_u32(&mut cur)?;
        let type_l_path_table = cur.read_u32::<LittleEndian>()?;
        skip(&mut cur, 4)?;
        let type_m_path_table = cur.read_u32::<BigEndian>()?;
        skip(&mut cur, 4)?;
        let mut root_directory_record = vec![0u8; 34];
        cur.read_exact(&mut root_directory_record)?;
        let volume_set_identifier = read_fixed_string_utf16(&mut cur, 128)?;

        Ok(SupplementaryVolumeDescriptor {
            volume_flags,
            system_identifier,
            volume_identifier,
            volume_space_size,
            escape_sequences,
            volume_set_size,
            volume_sequence_number,
            logical_block_size,
            path_table_size,
            type_l_path_table,
            type_m_path_table,
            root_directory_record,
            volume_set_identifier,
        })
    }
}

/// Joliet text fields are UTF-16BE, space-padded.
fn read_fixed_string_utf16(cur: &mut Cursor<&[u8]>, byte_len: usize) -> Result<String> {
    let mut buf = vec![0u8; byte_len];
    cur.read_exact(&mut buf)?;
    let units: Vec<u16> = buf
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units).trim_end().to_string())
}

impl Dump for PrimaryVolumeDescriptor {
    fn dump(&self, indent: usize) -> String {
        crate::common::indent_lines(
            indent,
            &format!(
                "PrimaryVolumeDescriptor\n  volume_identifier: {}\n  volume_space_size: {}\n  logical_block_size: {}\n  path_table_size: {}",
                self.volume_identifier, self.volume_space_size, self.logical_block_size, self.path_table_size
            ),
        )
    }
}

impl Dump for SupplementaryVolumeDescriptor {
    fn dump(&self, indent: usize) -> String {
        crate::common::indent_lines(
            indent,
            &format!(
                "SupplementaryVolumeDescriptor (Joliet: {})\n  volume_identifier: {}\n  logical_block_size: {}",
                self.is_joliet(),
                self.volume_identifier,
                self.logical_block_size
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth_pvd() -> Vec<u8> {
        let mut block = vec![0u8; 2048];
        block[0] = 1;
        block[1..6].copy_from_slice(STANDARD_IDENTIFIER);
        block[6] = 1;
        block[40..40 + 5].copy_from_slice(b"DISC1");
        block[80..84].copy_from_slice(&100u32.to_le_bytes());
        block[84..88].copy_from_slice(&100u32.to_be_bytes());
        block[120..122].copy_from_slice(&1u16.to_le_bytes());
        block[122..124].copy_from_slice(&1u16.to_be_bytes());
        block[124..126].copy_from_slice(&1u16.to_le_bytes());
        block[126..128].copy_from_slice(&1u16.to_be_bytes());
        block[128..130].copy_from_slice(&2048u16.to_le_bytes());
        block[130..132].copy_from_slice(&2048u16.to_be_bytes());
        block
    }

    #[test]
    fn parses_primary_volume_descriptor() {
        let block = synth_pvd();
        let vd = VolumeDescriptor::parse(&block).unwrap();
        match vd {
            VolumeDescriptor::Primary(pvd) => {
                assert_eq!(pvd.volume_identifier, "DISC1");
                assert_eq!(pvd.volume_space_size, 100);
                assert_eq!(pvd.logical_block_size, 2048);
            }
            _ => panic!("expected Primary"),
        }
    }

    #[test]
    fn rejects_lsb_msb_mismatch() {
        let mut block = synth_pvd();
        block[84] = 0xFF; // corrupt MSB half of volume_space_size
        let err = VolumeDescriptor::parse(&block).unwrap_err();
        assert!(matches!(err, Error::StructureInvalid(_)));
    }

    #[test]
    fn rejects_bad_standard_identifier() {
        let mut block = synth_pvd();
        block[1] = b'X';
        let err = VolumeDescriptor::parse(&block).unwrap_err();
        assert!(matches!(err, Error::SignatureInvalid(_)));
    }

    #[test]
    fn recognizes_terminator() {
        let mut block = vec![0u8; 2048];
        block[0] = 255;
        block[1..6].copy_from_slice(STANDARD_IDENTIFIER);
        assert!(matches!(
            VolumeDescriptor::parse(&block).unwrap(),
            VolumeDescriptor::Terminator
        ));
    }
}
