//! ISO 9660 directory records: the 34+-byte fixed-plus-variable structure
//! that both path tables and directory extents are built from.
//!
//! Grounded on `examples/original_source/dumpdisc/iso9660.py`'s
//! `DirectoryRecord`, including the CDXA/RIFF fallback in `read_content` for
//! files stored as Mode 2 Form 2 sectors that wrap their payload in a RIFF
//! container.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::common::{Dump, File as FileTrait};
use crate::error::{Error, Result};
use crate::image::Image;
use crate::sector::{Sector, FORM2_DATA_SIZE, RAW_SECTOR_SIZE};

const FILE_FLAG_DIRECTORY: u8 = 0x02;

/// Identifiers in a Primary Volume Descriptor's directory tree are ASCII
/// (d-characters); identifiers under a Joliet Supplementary Volume
/// Descriptor are UTF-16BE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Ascii,
    Utf16Be,
}

/// Splits off a trailing `;version` suffix. For ASCII identifiers this is a
/// literal `;` byte search; for Joliet's UTF-16BE identifiers, searching for
/// the single byte `0x3B` would wrongly match the low byte of an unrelated
/// BMP code point, so the search instead looks for the big-endian code unit
/// `U+003B` (the byte pair `00 3B`) on a 2-byte boundary.
fn split_version_suffix(bytes: &[u8], encoding: Encoding) -> &[u8] {
    match encoding {
        Encoding::Ascii => match bytes.iter().position(|&b| b == b';') {
            Some(pos) => &bytes[..pos],
            None => bytes,
        },
        Encoding::Utf16Be => {
            let mut pos = None;
            let mut i = 0;
            while i + 1 < bytes.len() {
                if bytes[i] == 0x00 && bytes[i + 1] == 0x3B {
                    pos = Some(i);
                    break;
                }
                i += 2;
            }
            match pos {
                Some(p) => &bytes[..p],
                None => bytes,
            }
        }
    }
}

fn decode_identifier(bytes: &[u8], encoding: Encoding) -> String {
    let trimmed = split_version_suffix(bytes, encoding);
    match encoding {
        Encoding::Ascii => String::from_utf8_lossy(trimmed).to_string(),
        Encoding::Utf16Be => {
            let units: Vec<u16> = trimmed
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryRecord {
    pub extent_location: u32,
    pub data_length: u32,
    pub recording_datetime: [u8; 7],
    pub file_flags: u8,
    pub volume_sequence_number: u16,
    pub identifier: String,
    pub is_self: bool,
    pub is_parent: bool,
}

impl DirectoryRecord {
    pub fn is_directory(&self) -> bool {
        self.file_flags & FILE_FLAG_DIRECTORY != 0
    }

    /// Parses one directory record starting at `buf`'s current position,
    /// returning the record and the number of bytes consumed (the record's
    /// own `length` byte, which may include padding). Records never cross a
    /// logical-block boundary; a length of zero signals "skip to the next
    /// block", which the directory walker handles.
    pub fn parse(buf: &[u8], encoding: Encoding) -> Result<Option<(DirectoryRecord, usize)>> {
        if buf.is_empty() || buf[0] == 0 {
            return Ok(None);
        }
        let length = buf[0] as usize;
        if length < 33 || length > buf.len() {
            return Err(Error::StructureInvalid(format!(
                "directory record length {length} out of range"
            )));
        }
        let mut cur = Cursor::new(&buf[..length]);
        let _record_length = cur.read_u8()?;
        let _ext_attr_length = cur.read_u8()?;
        let extent_lsb = cur.read_u32::<LittleEndian>()?;
        let extent_msb = cur.read_u32::<BigEndian>()?;
        if extent_lsb != extent_msb {
            return Err(Error::StructureInvalid(
                "directory record extent LSB/MSB mismatch".into(),
            ));
        }
        let size_lsb = cur.read_u32::<LittleEndian>()?;
        let size_msb = cur.read_u32::<BigEndian>()?;
        if size_lsb != size_msb {
            return Err(Error::StructureInvalid(
                "directory record size LSB/MSB mismatch".into(),
            ));
        }
        let mut recording_datetime = [0u8; 7];
        cur.read_exact(&mut recording_datetime)?;
        let file_flags = cur.read_u8()?;
        let _file_unit_size = cur.read_u8()?;
        let _interleave_gap_size = cur.read_u8()?;
        let vsn_lsb = cur.read_u16::<LittleEndian>()?;
        let vsn_msb = cur.read_u16::<BigEndian>()?;
        if vsn_lsb != vsn_msb {
            return Err(Error::StructureInvalid(
                "directory record volume sequence number LSB/MSB mismatch".into(),
            ));
        }
        let identifier_length = cur.read_u8()? as usize;
        let mut identifier_bytes = vec![0u8; identifier_length];
        cur.read_exact(&mut identifier_bytes)?;

        let is_self = identifier_length == 1 && identifier_bytes[0] == 0;
        let is_parent = identifier_length == 1 && identifier_bytes[0] == 1;
        let identifier = if is_self {
            ".".to_string()
        } else if is_parent {
            "..".to_string()
        } else {
            decode_identifier(&identifier_bytes, encoding)
        };

        Ok(Some((
            DirectoryRecord {
                extent_location: extent_lsb,
                data_length: size_lsb,
                recording_datetime,
                file_flags,
                volume_sequence_number: vsn_lsb,
                identifier,
                is_self,
                is_parent,
            },
            length,
        )))
    }

    /// Iterates the directory records stored in this record's extent,
    /// skipping padding between records and never crossing into the next
    /// logical block's content (each block is parsed independently).
    pub fn list_entries(
        &self,
        image: &mut dyn Image,
        block_size: usize,
        encoding: Encoding,
    ) -> Result<Vec<DirectoryRecord>> {
        let block_count = self.data_length.div_ceil(block_size as u32) as usize;
        image.seek_block(self.extent_location as u64)?;
        let raw = image.read_blocks(block_count)?;
        let mut entries = Vec::new();
        for block in raw.chunks(block_size) {
            let mut offset = 0;
            while offset < block.len() {
                match DirectoryRecord::parse(&block[offset..], encoding)? {
                    None => break,
                    Some((record, consumed)) => {
                        entries.push(record);
                        offset += consumed;
                    }
                }
            }
        }
        Ok(entries)
    }

    /// Reads this record's file content. Mode 2 Form 2 sectors wrap CDXA
    /// payloads in a RIFF container (`RIFF....CDXA`); when present, the
    /// real content starts after that 44-byte header rather than at the
    /// extent's first byte.
    ///
    /// When the cooked read fails (the underlying image cooked a Form 2
    /// sector whose checksums it insisted on validating and rejected), this
    /// falls back to a raw-sector re-read that skips checksum validation and
    /// synthesizes the CDXA/RIFF container around the recovered payload
    /// itself, since a raw re-read never carries one.
    pub fn read_content(&self, image: &mut dyn Image, block_size: usize) -> Result<Vec<u8>> {
        let block_count = self.data_length.div_ceil(block_size as u32) as usize;
        image.seek_block(self.extent_location as u64)?;
        match image.read_blocks(block_count) {
            Ok(mut raw) => {
                raw.truncate(self.data_length as usize);
                if raw.len() >= 44 && &raw[0..4] == b"RIFF" && &raw[8..12] == b"CDXA" {
                    Ok(raw[44..].to_vec())
                } else {
                    Ok(raw)
                }
            }
            Err(_) => {
                image.seek_block(self.extent_location as u64)?;
                let raw_sectors = image.read_blocks_raw(block_count)?;
                let mut payload = Vec::with_capacity(block_count * FORM2_DATA_SIZE);
                for (i, chunk) in raw_sectors.chunks(RAW_SECTOR_SIZE).enumerate() {
                    let sector = Sector::parse_with_options(
                        chunk,
                        self.extent_location as u64 + i as u64,
                        false,
                        false,
                    )?;
                    payload.extend_from_slice(&sector.user_data);
                }
                payload.truncate(self.data_length as usize);
                Ok(build_cdxa_container(&payload))
            }
        }
    }
}

/// Synthesizes a `RIFF....CDXA` container around a recovered Form 2 payload:
/// `RIFF <size+36> CDXA fmt  <16 bytes> data <size>`, 44 bytes of header.
fn build_cdxa_container(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(44 + payload.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(payload.len() as u32 + 36).to_le_bytes());
    out.extend_from_slice(b"CDXA");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

impl Dump for DirectoryRecord {
    fn dump(&self, indent: usize) -> String {
        crate::common::indent_lines(
            indent,
            &format!(
                "DirectoryRecord {}\n  extent: {}\n  size: {}\n  flags: {:#04x}",
                self.identifier, self.extent_location, self.data_length, self.file_flags
            ),
        )
    }
}

pub struct Iso9660File {
    pub(crate) record: DirectoryRecord,
    pub(crate) image: std::rc::Rc<std::cell::RefCell<dyn Image>>,
    pub(crate) block_size: usize,
}

impl Dump for Iso9660File {
    fn dump(&self, indent: usize) -> String {
        self.record.dump(indent)
    }
}

impl FileTrait for Iso9660File {
    fn name(&self) -> &str {
        &self.record.identifier
    }

    fn size(&self) -> u64 {
        self.record.data_length as u64
    }

    fn read(&self) -> Result<Vec<u8>> {
        let mut image = self.image.borrow_mut();
        self.record.read_content(&mut *image, self.block_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth_record(name: &str, extent: u32, size: u32, flags: u8) -> Vec<u8> {
        let id_len = name.len();
        let mut pad = if (33 + id_len) % 2 != 0 { 1 } else { 0 };
        if id_len == 0 {
            pad = 0;
        }
        let length = 33 + id_len + pad;
        let mut buf = vec![0u8; length];
        buf[0] = length as u8;
        buf[1] = 0;
        buf[2..6].copy_from_slice(&extent.to_le_bytes());
        buf[6..10].copy_from_slice(&extent.to_be_bytes());
        buf[10..14].copy_from_slice(&size.to_le_bytes());
        buf[14..18].copy_from_slice(&size.to_be_bytes());
        buf[25] = flags;
        buf[28..30].copy_from_slice(&1u16.to_le_bytes());
        buf[30..32].copy_from_slice(&1u16.to_be_bytes());
        buf[32] = id_len as u8;
        buf[33..33 + id_len].copy_from_slice(name.as_bytes());
        buf
    }

    #[test]
    fn parses_simple_record() {
        let buf = synth_record("FOO.TXT", 20, 4096, 0);
        let (record, consumed) = DirectoryRecord::parse(&buf, Encoding::Ascii).unwrap().unwrap();
        assert_eq!(record.identifier, "FOO.TXT");
        assert_eq!(record.extent_location, 20);
        assert_eq!(record.data_length, 4096);
        assert_eq!(consumed, buf.len());
        assert!(!record.is_directory());
    }

    #[test]
    fn zero_length_signals_end() {
        let buf = vec![0u8; 10];
        assert!(DirectoryRecord::parse(&buf, Encoding::Ascii).unwrap().is_none());
    }

    #[test]
    fn self_and_parent_identifiers() {
        let mut buf = synth_record("", 1, 2048, 0x02);
        buf[32] = 1;
        buf.push(0);
        let (record, _) = DirectoryRecord::parse(&buf, Encoding::Ascii).unwrap().unwrap();
        assert!(record.is_self);
        assert_eq!(record.identifier, ".");
    }

    /// An image whose cooked reads always fail but whose raw reads hand
    /// back synthesized Mode 2 Form 2 sectors, exercising `read_content`'s
    /// CDXA/RIFF fallback.
    struct FailingCookedImage {
        raw_sectors: Vec<u8>,
        current_block: u64,
    }

    impl Image for FailingCookedImage {
        fn block_size(&self) -> usize {
            crate::sector::COOKED_SECTOR_SIZE
        }
        fn current_block(&self) -> u64 {
            self.current_block
        }
        fn seek_block(&mut self, block: u64) -> Result<()> {
            self.current_block = block;
            Ok(())
        }
        fn read_blocks(&mut self, _count: usize) -> Result<Vec<u8>> {
            Err(Error::EdcInvalid(self.current_block))
        }
        fn read_blocks_raw(&mut self, count: usize) -> Result<Vec<u8>> {
            let start = self.current_block as usize * RAW_SECTOR_SIZE;
            let end = start + count * RAW_SECTOR_SIZE;
            self.current_block += count as u64;
            Ok(self.raw_sectors[start..end].to_vec())
        }
        fn total_blocks(&self) -> Option<u64> {
            Some(1)
        }
    }

    fn synth_raw_form2_sector(payload: &[u8]) -> Vec<u8> {
        use crate::sector::SubHeader;
        let mut buf = vec![0u8; RAW_SECTOR_SIZE];
        buf[0..12].copy_from_slice(&[
            0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
        ]);
        buf[12] = 0x00;
        buf[13] = 0x02;
        buf[14] = 0x00;
        buf[15] = 2;
        buf[18] = SubHeader::FORM2_FLAG;
        buf[22] = SubHeader::FORM2_FLAG;
        buf[24..24 + payload.len()].copy_from_slice(payload);
        buf
    }

    #[test]
    fn read_content_falls_back_to_raw_and_synthesizes_cdxa() {
        let payload = vec![0xAB; 100];
        let raw_sectors = synth_raw_form2_sector(&payload);
        let mut image = FailingCookedImage {
            raw_sectors,
            current_block: 0,
        };
        let record = DirectoryRecord {
            extent_location: 0,
            data_length: 100,
            recording_datetime: [0; 7],
            file_flags: 0,
            volume_sequence_number: 1,
            identifier: "FOO.XA".into(),
            is_self: false,
            is_parent: false,
        };
        let content = record
            .read_content(&mut image, crate::sector::COOKED_SECTOR_SIZE)
            .unwrap();
        assert_eq!(&content[0..4], b"RIFF");
        assert_eq!(&content[8..12], b"CDXA");
        assert_eq!(content.len(), 44 + 100);
        assert_eq!(&content[44..], &payload[..]);
    }

    #[test]
    fn joliet_version_split_ignores_low_byte_coincidence() {
        // U+FF1B (fullwidth semicolon) ends in the same low byte as ASCII
        // ';' but must not be mistaken for a version separator.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0xFF1Bu16.to_be_bytes());
        bytes.extend_from_slice(&0x0041u16.to_be_bytes()); // 'A'
        assert_eq!(split_version_suffix(&bytes, Encoding::Utf16Be), &bytes[..]);

        let mut versioned = Vec::new();
        versioned.extend_from_slice(&0x0041u16.to_be_bytes()); // 'A'
        versioned.extend_from_slice(&0x003Bu16.to_be_bytes()); // ';'
        versioned.extend_from_slice(&0x0031u16.to_be_bytes()); // '1'
        assert_eq!(
            split_version_suffix(&versioned, Encoding::Utf16Be),
            &versioned[..2]
        );
    }
}
