//! Generic B-tree node layer shared by the Catalog File and the Extents
//! Overflow File: node descriptor, header record, used-node bitmap, and the
//! record-offset-table walk common to both trees.
//!
//! Grounded on `examples/original_source/dumpdisc/apple.py`'s `BTree`/
//! `BTreeNode` classes; the offset-table-from-the-tail layout is
//! cross-checked against
//! `examples/other_examples/17a46314_Dil4rd-dpp__hfsplus-src-btree.rs.rs`,
//! whose classic HFS record set this crate's catalog narrows down to.

use byteorder::{BigEndian, ReadBytesExt};
use deku::prelude::*;
use itertools::Itertools;
use std::io::Cursor;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Index,
    Header,
    Map,
}

impl NodeKind {
    fn from_raw(v: i8) -> Option<NodeKind> {
        match v {
            -1 => Some(NodeKind::Leaf),
            0 => Some(NodeKind::Index),
            1 => Some(NodeKind::Header),
            2 => Some(NodeKind::Map),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, DekuRead)]
#[deku(endian = "big")]
struct RawNodeDescriptor {
    forward_link: u32,
    backward_link: u32,
    kind: i8,
    height: u8,
    num_records: u16,
    reserved: u16,
}

#[derive(Debug, Clone)]
pub struct NodeDescriptor {
    pub forward_link: u32,
    pub backward_link: u32,
    pub kind: NodeKind,
    pub height: u8,
    pub num_records: u16,
}

impl NodeDescriptor {
    pub fn parse(node: &[u8]) -> Result<NodeDescriptor> {
        let ((_rest, _), raw) = RawNodeDescriptor::from_bytes((node, 0))
            .map_err(|e| Error::StructureInvalid(format!("b-tree node descriptor: {e}")))?;
        let kind = NodeKind::from_raw(raw.kind).ok_or_else(|| Error::UnknownVariant {
            what: "b-tree node kind",
            tag: raw.kind.to_string(),
        })?;
        Ok(NodeDescriptor {
            forward_link: raw.forward_link,
            backward_link: raw.backward_link,
            kind,
            height: raw.height,
            num_records: raw.num_records,
        })
    }
}

#[derive(Debug, Clone, DekuRead)]
#[deku(endian = "big")]
pub struct HeaderRecord {
    pub tree_depth: u16,
    pub root_node: u32,
    pub leaf_records: u32,
    pub first_leaf_node: u32,
    pub last_leaf_node: u32,
    pub node_size: u16,
    pub max_key_length: u16,
    pub total_nodes: u32,
    pub free_nodes: u32,
}

impl HeaderRecord {
    const NODE_DESCRIPTOR_SIZE: usize = 14;

    pub fn parse(node: &[u8]) -> Result<HeaderRecord> {
        let ((_rest, _), record) =
            HeaderRecord::from_bytes((&node[Self::NODE_DESCRIPTOR_SIZE..], 0))
                .map_err(|e| Error::StructureInvalid(format!("b-tree header record: {e}")))?;
        Ok(record)
    }

    /// MSB-first bitmap of which nodes in the file are allocated, stored
    /// after the header record and a padding region, running to the end of
    /// the header node.
    pub fn used_node_bitmap(node: &[u8]) -> Vec<bool> {
        const BITMAP_START: usize = 256;
        let mut bits = Vec::new();
        for &byte in &node[BITMAP_START..] {
            for shift in (0..8).rev() {
                bits.push((byte >> shift) & 1 != 0);
            }
        }
        bits
    }
}

/// Reads offset-table slot `slot` (0-indexed from the start of the table,
/// which itself sits at the tail of the node in reverse order); slot
/// `num_records` is the trailing entry marking the start of free space.
fn offset_at(node: &[u8], node_size: usize, num_records: u16, slot: u16) -> Result<usize> {
    let addr = node_size - 2 * (num_records as usize - slot as usize + 1);
    let mut cur = Cursor::new(&node[addr..addr + 2]);
    Ok(cur.read_u16::<BigEndian>()? as usize)
}

/// Returns the byte range of record `index` within `node`.
pub fn record_bytes(node: &[u8], node_size: usize, num_records: u16, index: u16) -> Result<&[u8]> {
    if index >= num_records {
        return Err(Error::StructureInvalid(format!(
            "b-tree record index {index} out of range ({num_records} records)"
        )));
    }
    let start = offset_at(node, node_size, num_records, index)?;
    let end = offset_at(node, node_size, num_records, index + 1)?;
    Ok(&node[start..end])
}

/// All record slices in a node, in order: reads the `num_records + 1`
/// offset-table entries, then pairs up consecutive offsets into the byte
/// range of each record.
pub fn records<'a>(node: &'a [u8], node_size: usize, num_records: u16) -> Result<Vec<&'a [u8]>> {
    let offsets: Vec<usize> = (0..=num_records)
        .map(|slot| offset_at(node, node_size, num_records, slot))
        .collect::<Result<_>>()?;
    Ok(offsets
        .into_iter()
        .tuple_windows()
        .map(|(start, end)| &node[start..end])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth_node_with_two_records(node_size: usize, rec0: &[u8], rec1: &[u8]) -> Vec<u8> {
        let mut node = vec![0u8; node_size];
        node[8] = 0; // kind = index (unused here, only offsets tested)
        let r0_start = 14;
        let r0_end = r0_start + rec0.len();
        let r1_start = r0_end;
        let r1_end = r1_start + rec1.len();
        node[r0_start..r0_end].copy_from_slice(rec0);
        node[r1_start..r1_end].copy_from_slice(rec1);
        // offset table: [offset(rec0), offset(rec1), free_space]
        node[node_size - 6..node_size - 4].copy_from_slice(&(r0_start as u16).to_be_bytes());
        node[node_size - 4..node_size - 2].copy_from_slice(&(r1_start as u16).to_be_bytes());
        node[node_size - 2..node_size].copy_from_slice(&(r1_end as u16).to_be_bytes());
        node
    }

    #[test]
    fn reads_two_records_via_offset_table() {
        let node = synth_node_with_two_records(512, b"hello", b"world!");
        let recs = records(&node, 512, 2).unwrap();
        assert_eq!(recs[0], b"hello");
        assert_eq!(recs[1], b"world!");
    }

    #[test]
    fn node_kind_rejects_unknown_value() {
        let mut node = vec![0u8; 512];
        node[8] = 99;
        let err = NodeDescriptor::parse(&node).unwrap_err();
        assert!(matches!(err, Error::UnknownVariant { .. }));
    }
}
