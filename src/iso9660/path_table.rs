//! Path tables (types L and M): a flat, sequential alternative to walking
//! directory extents, used here only for inspection — nothing in the
//! `Directory`/`File` surface consults them, matching the original.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::common::Dump;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct PathTableEntry {
    pub name: String,
    pub extent_location: u32,
    pub parent_directory_number: u16,
}

#[derive(Debug, Clone, Copy)]
pub enum PathTableOrder {
    /// Type L: all numeric fields little-endian.
    L,
    /// Type M: all numeric fields big-endian.
    M,
}

pub fn parse_path_table(buf: &[u8], order: PathTableOrder) -> Result<Vec<PathTableEntry>> {
    let mut cur = Cursor::new(buf);
    let mut entries = Vec::new();
    while (cur.position() as usize) < buf.len() {
        let name_length = match cur.read_u8() {
            Ok(0) | Err(_) => break,
            Ok(n) => n as usize,
        };
        let _ext_attr_length = cur.read_u8()?;
        let extent_location = match order {
            PathTableOrder::L => cur.read_u32::<LittleEndian>()?,
            PathTableOrder::M => cur.read_u32::<BigEndian>()?,
        };
        let parent_directory_number = match order {
            PathTableOrder::L => cur.read_u16::<LittleEndian>()?,
            PathTableOrder::M => cur.read_u16::<BigEndian>()?,
        };
        let mut name_bytes = vec![0u8; name_length];
        cur.read_exact(&mut name_bytes)?;
        if name_length % 2 != 0 {
            let mut pad = [0u8; 1];
            cur.read_exact(&mut pad)?;
        }
        let name = if name_length == 1 && name_bytes[0] == 0 {
            String::new() // root entry
        } else {
            String::from_utf8_lossy(&name_bytes).to_string()
        };
        entries.push(PathTableEntry {
            name,
            extent_location,
            parent_directory_number,
        });
    }
    Ok(entries)
}

impl Dump for PathTableEntry {
    fn dump(&self, indent: usize) -> String {
        crate::common::indent_lines(
            indent,
            &format!(
                "PathTableEntry {:?} extent={} parent={}",
                self.name, self.extent_location, self.parent_directory_number
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_root_then_one_child() {
        let mut buf = Vec::new();
        buf.push(1); // name_length
        buf.push(0); // ext_attr_length
        buf.extend_from_slice(&20u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.push(0); // root name byte
        buf.push(3); // name_length
        buf.push(0);
        buf.extend_from_slice(&30u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(b"FOO");
        buf.push(0); // padding for odd length

        let entries = parse_path_table(&buf, PathTableOrder::L).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "");
        assert_eq!(entries[1].name, "FOO");
        assert_eq!(entries[1].extent_location, 30);
    }
}
