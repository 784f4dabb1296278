//! Extents Overflow File: a B-tree keyed by `(file_id, fork, start_block)`
//! holding the continuation extents for any fork whose 3 inline extent
//! descriptors don't cover its full allocation.
//!
//! spec.md's Open Question notes the original silently truncates such
//! files; this module is what makes that lookup actually happen.

use std::cmp::Ordering;

use super::btree::{records, HeaderRecord, NodeDescriptor, NodeKind};
use super::key::ExtentKey;
use crate::apple::extent::ExtentGroup;
use crate::error::{Error, Result};

pub struct ExtentsOverflowFile {
    nodes: Vec<Vec<u8>>,
    node_size: usize,
    header: HeaderRecord,
}

impl ExtentsOverflowFile {
    pub fn open(raw: Vec<u8>) -> Result<ExtentsOverflowFile> {
        let node_size = super::peek_node_size(&raw)? as usize;
        let nodes: Vec<Vec<u8>> = raw.chunks(node_size).map(|c| c.to_vec()).collect();
        let header = HeaderRecord::parse(&nodes[0])?;
        Ok(ExtentsOverflowFile {
            nodes,
            node_size,
            header,
        })
    }

    /// Finds the continuation extents for the fork identified by
    /// `(file_id, is_resource)` starting at allocation block `start_block`
    /// (the first block not covered by the inline extents).
    pub fn lookup(
        &self,
        file_id: u32,
        is_resource: bool,
        start_block: u16,
    ) -> Result<Option<ExtentGroup>> {
        let target = ExtentKey {
            fork_is_resource: is_resource,
            file_id,
            start_block,
        };
        let mut node_index = self.header.root_node;
        loop {
            if node_index as usize >= self.nodes.len() {
                return Ok(None);
            }
            let node = &self.nodes[node_index as usize];
            let descriptor = NodeDescriptor::parse(node)?;
            let recs = records(node, self.node_size, descriptor.num_records)?;
            match descriptor.kind {
                NodeKind::Leaf => {
                    for rec in recs {
                        let (key, consumed) = ExtentKey::parse(rec)?;
                        if key == target {
                            return Ok(Some(ExtentGroup::parse(&rec[consumed..])?));
                        }
                    }
                    return Ok(None);
                }
                NodeKind::Index => {
                    let mut chosen = None;
                    for rec in &recs {
                        let (key, consumed) = ExtentKey::parse(rec)?;
                        if key.cmp_full(&target) != Ordering::Greater {
                            chosen = Some(u32::from_be_bytes(
                                rec[consumed..consumed + 4].try_into().unwrap(),
                            ));
                        } else {
                            break;
                        }
                    }
                    match chosen {
                        Some(child) => node_index = child,
                        None => return Ok(None),
                    }
                }
                _ => {
                    return Err(Error::StructureInvalid(
                        "unexpected node kind while descending extents overflow tree".into(),
                    ))
                }
            }
        }
    }
}
