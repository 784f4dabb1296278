//! HFS extent descriptors: a fixed-length triple of (start allocation
//! block, block count) pairs, as embedded in the MDB and in Catalog/Extents
//! Overflow records.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtentDescriptor {
    pub start_block: u16,
    pub block_count: u16,
}

/// Always exactly three descriptors; an unused slot has `block_count == 0`.
#[derive(Debug, Clone, Copy)]
pub struct ExtentGroup {
    pub extents: [ExtentDescriptor; 3],
}

impl ExtentGroup {
    pub const ENCODED_SIZE: usize = 12;

    pub fn parse(buf: &[u8]) -> Result<ExtentGroup> {
        let mut cur = Cursor::new(buf);
        let mut extents = [ExtentDescriptor {
            start_block: 0,
            block_count: 0,
        }; 3];
        for slot in extents.iter_mut() {
            slot.start_block = cur.read_u16::<BigEndian>()?;
            slot.block_count = cur.read_u16::<BigEndian>()?;
        }
        Ok(ExtentGroup { extents })
    }

    pub fn total_blocks(&self) -> u32 {
        self.extents.iter().map(|e| e.block_count as u32).sum()
    }

    /// Allocation-block ranges covered by this group's non-empty slots, in
    /// order.
    pub fn ranges(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.extents
            .iter()
            .filter(|e| e.block_count > 0)
            .map(|e| (e.start_block, e.block_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_descriptors() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&10u16.to_be_bytes());
        buf.extend_from_slice(&5u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        let group = ExtentGroup::parse(&buf).unwrap();
        assert_eq!(group.total_blocks(), 5);
        assert_eq!(group.ranges().collect::<Vec<_>>(), vec![(10, 5)]);
    }
}
