//! Master Directory Block: the classic-HFS superblock at allocation block 2
//! of an `Apple_HFS` partition. Parsed manually (not with `deku`) because
//! its 162-byte body interleaves scalar fields with a Pascal-string volume
//! label and several embedded extent descriptors that are easiest to read
//! sequentially off a `Cursor`.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::apple::extent::ExtentGroup;
use crate::apple::mac_time_to_unix;
use crate::common::Dump;
use crate::error::{Error, Result};

pub const MDB_SIGNATURE: &[u8; 2] = b"BD";

#[derive(Debug, Clone)]
pub struct MasterDirectoryBlock {
    pub creation_time: i64,
    pub modification_time: i64,
    pub attributes: u16,
    pub root_directory_files: u16,
    pub volume_bitmap_block: u16,
    pub allocation_blocks: u16,
    pub allocation_block_size: u32,
    pub default_clump_size: u32,
    pub extents_start_block: u16,
    pub next_catalog_node_id: u32,
    pub free_allocation_blocks: u16,
    pub volume_label: String,
    pub backup_time: i64,
    pub backup_sequence_number: u16,
    pub write_count: u32,
    pub extents_clump_size: u32,
    pub catalog_clump_size: u32,
    pub root_directory_directories: u16,
    pub total_files: u32,
    pub total_directories: u32,
    pub finder_info: [u32; 8],
    pub embedded_volume_signature: u16,
    pub extents_file_size: u32,
    pub extents_file_extents: ExtentGroup,
    pub catalog_file_size: u32,
    pub catalog_file_extents: ExtentGroup,
}

impl MasterDirectoryBlock {
    pub fn parse(block: &[u8]) -> Result<MasterDirectoryBlock> {
        if block.len() < 162 {
            return Err(Error::IoShort {
                expected: 162,
                got: block.len(),
            });
        }
        let mut cur = Cursor::new(block);
        let mut signature = [0u8; 2];
        cur.read_exact(&mut signature)?;
        if &signature != MDB_SIGNATURE {
            return Err(Error::SignatureInvalid("HFS Master Directory Block"));
        }

        let creation_time = mac_time_to_unix(cur.read_u32::<BigEndian>()?);
        let modification_time = mac_time_to_unix(cur.read_u32::<BigEndian>()?);
        let attributes = cur.read_u16::<BigEndian>()?;
        let root_directory_files = cur.read_u16::<BigEndian>()?;
        let volume_bitmap_block = cur.read_u16::<BigEndian>()?;
        let _alloc_search_start = cur.read_u16::<BigEndian>()?;
        let allocation_blocks = cur.read_u16::<BigEndian>()?;
        let allocation_block_size = cur.read_u32::<BigEndian>()?;
        if allocation_block_size % 512 != 0 {
            return Err(Error::StructureInvalid(
                "HFS allocation block size not a multiple of 512".into(),
            ));
        }
        let default_clump_size = cur.read_u32::<BigEndian>()?;
        let extents_start_block = cur.read_u16::<BigEndian>()?;
        let next_catalog_node_id = cur.read_u32::<BigEndian>()?;
        let free_allocation_blocks = cur.read_u16::<BigEndian>()?;

        let label_len = cur.read_u8()? as usize;
        let mut label_buf = [0u8; 27];
        cur.read_exact(&mut label_buf)?;
        let volume_label = String::from_utf8_lossy(&label_buf[..label_len.min(27)]).to_string();

        let backup_time = mac_time_to_unix(cur.read_u32::<BigEndian>()?);
        let backup_sequence_number = cur.read_u16::<BigEndian>()?;
        let write_count = cur.read_u32::<BigEndian>()?;
        let extents_clump_size = cur.read_u32::<BigEndian>()?;
        let catalog_clump_size = cur.read_u32::<BigEndian>()?;
        let root_directory_directories = cur.read_u16::<BigEndian>()?;
        let total_files = cur.read_u32::<BigEndian>()?;
        let total_directories = cur.read_u32::<BigEndian>()?;

        let mut finder_info = [0u32; 8];
        for slot in finder_info.iter_mut() {
            *slot = cur.read_u32::<BigEndian>()?;
        }

        let embedded_volume_signature = cur.read_u16::<BigEndian>()?;
        let _embedded_extent = cur.read_u32::<BigEndian>()?;

        let extents_file_size = cur.read_u32::<BigEndian>()?;
        let mut extents_extent_buf = [0u8; ExtentGroup::ENCODED_SIZE];
        cur.read_exact(&mut extents_extent_buf)?;
        let extents_file_extents = ExtentGroup::parse(&extents_extent_buf)?;

        let catalog_file_size = cur.read_u32::<BigEndian>()?;
        let mut catalog_extent_buf = [0u8; ExtentGroup::ENCODED_SIZE];
        cur.read_exact(&mut catalog_extent_buf)?;
        let catalog_file_extents = ExtentGroup::parse(&catalog_extent_buf)?;

        Ok(MasterDirectoryBlock {
            creation_time,
            modification_time,
            attributes,
            root_directory_files,
            volume_bitmap_block,
            allocation_blocks,
            allocation_block_size,
            default_clump_size,
            extents_start_block,
            next_catalog_node_id,
            free_allocation_blocks,
            volume_label,
            backup_time,
            backup_sequence_number,
            write_count,
            extents_clump_size,
            catalog_clump_size,
            root_directory_directories,
            total_files,
            total_directories,
            finder_info,
            embedded_volume_signature,
            extents_file_size,
            extents_file_extents,
            catalog_file_size,
            catalog_file_extents,
        })
    }

    /// Converts an allocation block number to an absolute 512-byte block
    /// number on the partition.
    pub fn allocation_block_to_512(&self, allocation_block: u32) -> u64 {
        let blocks_per_alloc = self.allocation_block_size / 512;
        self.extents_start_block as u64 + allocation_block as u64 * blocks_per_alloc as u64
    }
}

impl Dump for MasterDirectoryBlock {
    fn dump(&self, indent: usize) -> String {
        crate::common::indent_lines(
            indent,
            &format!(
                "MasterDirectoryBlock {:?}\n  allocation_blocks: {}\n  allocation_block_size: {}\n  total_files: {}\n  total_directories: {}\n  catalog_file_size: {}",
                self.volume_label,
                self.allocation_blocks,
                self.allocation_block_size,
                self.total_files,
                self.total_directories,
                self.catalog_file_size
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth_mdb() -> Vec<u8> {
        let mut buf = vec![0u8; 162];
        buf[0..2].copy_from_slice(b"BD");
        buf[20..22].copy_from_slice(&10u16.to_be_bytes()); // allocation_blocks
        buf[22..26].copy_from_slice(&512u32.to_be_bytes()); // allocation_block_size
        buf[34] = 5; // volume_label length
        buf[35..40].copy_from_slice(b"Label");
        buf
    }

    #[test]
    fn parses_signature_and_core_fields() {
        let mdb = MasterDirectoryBlock::parse(&synth_mdb()).unwrap();
        assert_eq!(mdb.volume_label, "Label");
        assert_eq!(mdb.allocation_blocks, 10);
        assert_eq!(mdb.allocation_block_size, 512);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut buf = synth_mdb();
        buf[0] = b'X';
        let err = MasterDirectoryBlock::parse(&buf).unwrap_err();
        assert!(matches!(err, Error::SignatureInvalid(_)));
    }

    #[test]
    fn rejects_non_512_multiple_block_size() {
        let mut buf = synth_mdb();
        buf[22..26].copy_from_slice(&500u32.to_be_bytes());
        let err = MasterDirectoryBlock::parse(&buf).unwrap_err();
        assert!(matches!(err, Error::StructureInvalid(_)));
    }
}
