//! Catalog (and Extents Overflow) B-tree keys.
//!
//! The original only ever compares keys by parent CNID — enough to group a
//! directory's children contiguously, but not a true total order. This
//! crate keeps that parent-only comparator for enumeration (so a directory
//! listing walks exactly the records the original would) and adds the full
//! `(parent_id, name)` order for point lookup, per spec.md's Open Question.

use byteorder::{BigEndian, ReadBytesExt};
use std::cmp::Ordering;
use std::io::{Cursor, Read};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogKey {
    pub parent_id: u32,
    pub name: String,
}

impl CatalogKey {
    pub fn parse(buf: &[u8]) -> Result<(CatalogKey, usize)> {
        let mut cur = Cursor::new(buf);
        let key_length = cur.read_u8()? as usize;
        let _reserved = cur.read_u8()?;
        let parent_id = cur.read_u32::<BigEndian>()?;
        let name_length = cur.read_u8()? as usize;
        let mut name_bytes = vec![0u8; name_length];
        cur.read_exact(&mut name_bytes)?;
        let name = String::from_utf8_lossy(&name_bytes).to_string();
        // key_length counts everything after the length byte itself.
        Ok((CatalogKey { parent_id, name }, key_length + 1))
    }

    /// Full `(parent_id, name)` order, case-insensitive on the ASCII range
    /// (classic HFS's "Macintosh civilized" name comparison for the
    /// portion this crate needs to support).
    pub fn cmp_full(&self, other: &CatalogKey) -> Ordering {
        self.parent_id.cmp(&other.parent_id).then_with(|| {
            self.name
                .to_ascii_lowercase()
                .cmp(&other.name.to_ascii_lowercase())
        })
    }

    /// Parent-only order, used for the enumeration search key — matches
    /// the original's actual (incomplete) comparison behavior.
    pub fn cmp_enumeration(&self, other: &CatalogKey) -> Ordering {
        self.parent_id.cmp(&other.parent_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtentKey {
    pub fork_is_resource: bool,
    pub file_id: u32,
    pub start_block: u16,
}

impl ExtentKey {
    pub fn parse(buf: &[u8]) -> Result<(ExtentKey, usize)> {
        let mut cur = Cursor::new(buf);
        let key_length = cur.read_u8()? as usize;
        let fork_type = cur.read_u8()?;
        let file_id = cur.read_u32::<BigEndian>()?;
        let start_block = cur.read_u16::<BigEndian>()?;
        Ok((
            ExtentKey {
                fork_is_resource: fork_type != 0,
                file_id,
                start_block,
            },
            key_length + 1,
        ))
    }

    pub fn cmp_full(&self, other: &ExtentKey) -> Ordering {
        self.file_id
            .cmp(&other.file_id)
            .then_with(|| self.fork_is_resource.cmp(&other.fork_is_resource))
            .then_with(|| self.start_block.cmp(&other.start_block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth_key(parent_id: u32, name: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        let key_length = (6 + name.len()) as u8;
        buf.push(key_length);
        buf.push(0); // reserved
        buf.extend_from_slice(&parent_id.to_be_bytes());
        buf.push(name.len() as u8);
        buf.extend_from_slice(name.as_bytes());
        buf
    }

    #[test]
    fn parses_catalog_key() {
        let buf = synth_key(42, "README");
        let (key, consumed) = CatalogKey::parse(&buf).unwrap();
        assert_eq!(key.parent_id, 42);
        assert_eq!(key.name, "README");
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn enumeration_order_ignores_name() {
        let a = CatalogKey { parent_id: 5, name: "Z".into() };
        let b = CatalogKey { parent_id: 5, name: "A".into() };
        assert_eq!(a.cmp_enumeration(&b), Ordering::Equal);
        assert_eq!(a.cmp_full(&b), Ordering::Greater);
    }
}
