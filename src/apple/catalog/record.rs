//! Catalog B-tree leaf record bodies: directory, file, and the two thread
//! record kinds, dispatched on the 16-bit record type tag every catalog
//! record begins with.
//!
//! Field layout follows the on-disc `HFSCatalogFolder` / `HFSCatalogFile` /
//! `HFSCatalogThread` structures (Inside Macintosh: Files).

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::apple::extent::ExtentGroup;
use crate::apple::mac_time_to_unix;
use crate::common::Dump;
use crate::error::{Error, Result};

const RECORD_TYPE_DIRECTORY: u16 = 1;
const RECORD_TYPE_FILE: u16 = 2;
const RECORD_TYPE_DIRECTORY_THREAD: u16 = 3;
const RECORD_TYPE_FILE_THREAD: u16 = 4;

#[derive(Debug, Clone)]
pub struct DirectoryRecord {
    pub flags: u16,
    pub valence: u16,
    pub folder_id: u32,
    pub create_time: i64,
    pub modify_time: i64,
}

#[derive(Debug, Clone)]
pub struct FileRecord {
    pub flags: u8,
    pub file_id: u32,
    pub data_logical_size: u32,
    pub data_extents: ExtentGroup,
    pub resource_logical_size: u32,
    pub resource_extents: ExtentGroup,
    pub create_time: i64,
    pub modify_time: i64,
}

#[derive(Debug, Clone)]
pub struct ThreadRecord {
    pub parent_id: u32,
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum CatalogRecord {
    Directory(DirectoryRecord),
    File(FileRecord),
    DirectoryThread(ThreadRecord),
    FileThread(ThreadRecord),
}

impl CatalogRecord {
    pub fn parse(buf: &[u8]) -> Result<CatalogRecord> {
        let mut cur = Cursor::new(buf);
        let record_type = cur.read_u16::<BigEndian>()?;
        match record_type {
            RECORD_TYPE_DIRECTORY => {
                let flags = cur.read_u16::<BigEndian>()?;
                let valence = cur.read_u16::<BigEndian>()?;
                let folder_id = cur.read_u32::<BigEndian>()?;
                let create_time = mac_time_to_unix(cur.read_u32::<BigEndian>()?);
                let modify_time = mac_time_to_unix(cur.read_u32::<BigEndian>()?);
                Ok(CatalogRecord::Directory(DirectoryRecord {
                    flags,
                    valence,
                    folder_id,
                    create_time,
                    modify_time,
                }))
            }
            RECORD_TYPE_FILE => {
                let flags = cur.read_u8()?;
                let _file_type = cur.read_i8()?;
                let mut user_info = [0u8; 16];
                cur.read_exact(&mut user_info)?;
                let file_id = cur.read_u32::<BigEndian>()?;
                let _data_start_block = cur.read_u16::<BigEndian>()?;
                let data_logical_size = cur.read_u32::<BigEndian>()?;
                let _data_physical_size = cur.read_u32::<BigEndian>()?;
                let _rsrc_start_block = cur.read_u16::<BigEndian>()?;
                let resource_logical_size = cur.read_u32::<BigEndian>()?;
                let _rsrc_physical_size = cur.read_u32::<BigEndian>()?;
                let create_time = mac_time_to_unix(cur.read_u32::<BigEndian>()?);
                let modify_time = mac_time_to_unix(cur.read_u32::<BigEndian>()?);
                let _backup_time = cur.read_u32::<BigEndian>()?;
                let mut finder_info = [0u8; 16];
                cur.read_exact(&mut finder_info)?;
                let _clump_size = cur.read_u16::<BigEndian>()?;
                let mut data_extent_buf = [0u8; ExtentGroup::ENCODED_SIZE];
                cur.read_exact(&mut data_extent_buf)?;
                let data_extents = ExtentGroup::parse(&data_extent_buf)?;
                let mut rsrc_extent_buf = [0u8; ExtentGroup::ENCODED_SIZE];
                cur.read_exact(&mut rsrc_extent_buf)?;
                let resource_extents = ExtentGroup::parse(&rsrc_extent_buf)?;
                Ok(CatalogRecord::File(FileRecord {
                    flags,
                    file_id,
                    data_logical_size,
                    data_extents,
                    resource_logical_size,
                    resource_extents,
                    create_time,
                    modify_time,
                }))
            }
            RECORD_TYPE_DIRECTORY_THREAD => {
                Ok(CatalogRecord::DirectoryThread(parse_thread(&mut cur)?))
            }
            RECORD_TYPE_FILE_THREAD => Ok(CatalogRecord::FileThread(parse_thread(&mut cur)?)),
            other => Err(Error::UnknownVariant {
                what: "catalog record type",
                tag: other.to_string(),
            }),
        }
    }
}

fn parse_thread(cur: &mut Cursor<&[u8]>) -> Result<ThreadRecord> {
    let mut reserved = [0u8; 8];
    cur.read_exact(&mut reserved)?;
    let parent_id = cur.read_u32::<BigEndian>()?;
    let name_length = cur.read_u8()? as usize;
    let mut name_bytes = vec![0u8; name_length.min(31)];
    cur.read_exact(&mut name_bytes)?;
    Ok(ThreadRecord {
        parent_id,
        name: String::from_utf8_lossy(&name_bytes).to_string(),
    })
}

impl Dump for CatalogRecord {
    fn dump(&self, indent: usize) -> String {
        let body = match self {
            CatalogRecord::Directory(d) => {
                format!("Directory folder_id={} valence={}", d.folder_id, d.valence)
            }
            CatalogRecord::File(f) => format!(
                "File file_id={} data_size={} rsrc_size={}",
                f.file_id, f.data_logical_size, f.resource_logical_size
            ),
            CatalogRecord::DirectoryThread(t) => {
                format!("DirectoryThread parent={} name={:?}", t.parent_id, t.name)
            }
            CatalogRecord::FileThread(t) => {
                format!("FileThread parent={} name={:?}", t.parent_id, t.name)
            }
        };
        crate::common::indent_lines(indent, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_directory_record() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u16.to_be_bytes()); // type
        buf.extend_from_slice(&0u16.to_be_bytes()); // flags
        buf.extend_from_slice(&3u16.to_be_bytes()); // valence
        buf.extend_from_slice(&42u32.to_be_bytes()); // folder_id
        buf.extend_from_slice(&0u32.to_be_bytes()); // create
        buf.extend_from_slice(&0u32.to_be_bytes()); // modify
        let record = CatalogRecord::parse(&buf).unwrap();
        match record {
            CatalogRecord::Directory(d) => {
                assert_eq!(d.folder_id, 42);
                assert_eq!(d.valence, 3);
            }
            _ => panic!("expected directory"),
        }
    }

    #[test]
    fn rejects_unknown_record_type() {
        let buf = 9u16.to_be_bytes().to_vec();
        let err = CatalogRecord::parse(&buf).unwrap_err();
        assert!(matches!(err, Error::UnknownVariant { .. }));
    }
}
