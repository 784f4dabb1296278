//! The Catalog File: a B-tree mapping `(parent_id, name)` to directory and
//! file records, plus the two thread record kinds used to recover a node's
//! name/parent given only its CNID.

pub mod btree;
pub mod key;
pub mod overflow;
pub mod record;

use std::cmp::Ordering;
use std::cell::RefCell;
use std::rc::Rc;

use byteorder::{BigEndian, ReadBytesExt};

use btree::{records, HeaderRecord, NodeDescriptor, NodeKind};
use key::CatalogKey;
use overflow::ExtentsOverflowFile;
use record::CatalogRecord;

use crate::apple::extent::ExtentGroup;
use crate::apple::mdb::MasterDirectoryBlock;
use crate::error::{Error, Result};
use crate::image::Image;

/// CNID of the Extents Overflow File itself, fixed by the HFS format.
const EXTENTS_FILE_ID: u32 = 3;
/// CNID of the Catalog File itself.
pub const CATALOG_FILE_ID: u32 = 4;
pub const ROOT_PARENT_ID: u32 = 1;
pub const ROOT_DIRECTORY_ID: u32 = 2;

fn peek_node_size(raw: &[u8]) -> Result<u16> {
    if raw.len() < 34 {
        return Err(Error::IoShort {
            expected: 34,
            got: raw.len(),
        });
    }
    let mut cur = std::io::Cursor::new(&raw[32..34]);
    Ok(cur.read_u16::<BigEndian>()?)
}

/// Reads a fork's full logical content given its inline extents, consulting
/// the Extents Overflow File for continuation extents when the inline
/// extents don't cover `logical_size`.
pub fn read_fork(
    image: &Rc<RefCell<dyn Image>>,
    mdb: &MasterDirectoryBlock,
    extents: &ExtentGroup,
    file_id: u32,
    is_resource: bool,
    logical_size: u32,
    overflow: Option<&ExtentsOverflowFile>,
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(logical_size as usize);
    let mut remaining_blocks =
        logical_size.div_ceil(mdb.allocation_block_size) as i64 - extents.total_blocks() as i64;
    let mut group = *extents;
    loop {
        for (start, count) in group.ranges() {
            for b in 0..count {
                let alloc_block = start as u32 + b as u32;
                let block_512 = mdb.allocation_block_to_512(alloc_block);
                let bytes = crate::apple::read_512_at(image, block_512)?;
                out.extend_from_slice(&bytes);
            }
        }
        if remaining_blocks <= 0 {
            break;
        }
        let next_start = group
            .ranges()
            .last()
            .map(|(start, count)| start + count)
            .unwrap_or(0);
        let overflow = overflow.ok_or_else(|| {
            Error::StructureInvalid(format!(
                "file {file_id} fork needs continuation extents but no Extents Overflow File is available"
            ))
        })?;
        match overflow.lookup(file_id, is_resource, next_start)? {
            Some(next_group) => {
                remaining_blocks -= next_group.total_blocks() as i64;
                group = next_group;
            }
            None => {
                return Err(Error::StructureInvalid(format!(
                    "file {file_id} fork truncated: no continuation extents at block {next_start}"
                )))
            }
        }
    }
    out.truncate(logical_size as usize);
    Ok(out)
}

pub struct CatalogFile {
    nodes: Vec<Vec<u8>>,
    node_size: usize,
    header: HeaderRecord,
}

impl CatalogFile {
    pub fn open(raw: Vec<u8>) -> Result<CatalogFile> {
        let node_size = peek_node_size(&raw)? as usize;
        let nodes: Vec<Vec<u8>> = raw.chunks(node_size).map(|c| c.to_vec()).collect();
        let header = HeaderRecord::parse(&nodes[0])?;
        Ok(CatalogFile {
            nodes,
            node_size,
            header,
        })
    }

    /// Directory and file entries directly contained in `parent_id`,
    /// matching the parent-only grouping the original performs (see
    /// `key::CatalogKey::cmp_enumeration`). Descends the root/index nodes
    /// to the first leaf that could hold such a record, then walks forward
    /// through the leaf chain only as far as the matching run extends —
    /// same-`parent_id` records are contiguous in key order, so this never
    /// rescans the whole tree.
    pub fn enumerate(&self, parent_id: u32) -> Result<Vec<(CatalogKey, CatalogRecord)>> {
        let target = CatalogKey {
            parent_id,
            name: String::new(),
        };

        let mut node_index = self.header.root_node;
        loop {
            if node_index as usize >= self.nodes.len() {
                return Ok(Vec::new());
            }
            let node = &self.nodes[node_index as usize];
            let descriptor = NodeDescriptor::parse(node)?;
            match descriptor.kind {
                NodeKind::Leaf => break,
                NodeKind::Index => {
                    let recs = records(node, self.node_size, descriptor.num_records)?;
                    let mut chosen = None;
                    for rec in &recs {
                        let (key, consumed) = CatalogKey::parse(rec)?;
                        if key.cmp_enumeration(&target) != Ordering::Greater {
                            chosen = Some(u32::from_be_bytes(
                                rec[consumed..consumed + 4].try_into().unwrap(),
                            ));
                        } else {
                            break;
                        }
                    }
                    node_index = match chosen {
                        Some(child) => child,
                        // target is smaller than every key here; descend via
                        // the leftmost child to reach the first leaf.
                        None => match recs.first() {
                            Some(rec) => {
                                let (_, consumed) = CatalogKey::parse(rec)?;
                                u32::from_be_bytes(rec[consumed..consumed + 4].try_into().unwrap())
                            }
                            None => return Ok(Vec::new()),
                        },
                    };
                }
                _ => {
                    return Err(Error::StructureInvalid(
                        "unexpected node kind while descending catalog tree".into(),
                    ))
                }
            }
        }

        let mut out = Vec::new();
        let mut started = false;
        loop {
            if node_index as usize >= self.nodes.len() {
                break;
            }
            let node = &self.nodes[node_index as usize];
            let descriptor = NodeDescriptor::parse(node)?;
            let mut stop = false;
            for rec in records(node, self.node_size, descriptor.num_records)? {
                let (key, consumed) = CatalogKey::parse(rec)?;
                match key.cmp_enumeration(&target) {
                    Ordering::Equal => {
                        started = true;
                        out.push((key, CatalogRecord::parse(&rec[consumed..])?));
                    }
                    Ordering::Greater if started => {
                        stop = true;
                        break;
                    }
                    _ => {}
                }
            }
            if stop || descriptor.forward_link == 0 {
                break;
            }
            node_index = descriptor.forward_link;
        }
        Ok(out)
    }

    /// Point lookup by the full `(parent_id, name)` key, descending the
    /// tree from the root instead of scanning every leaf.
    pub fn lookup(&self, parent_id: u32, name: &str) -> Result<Option<CatalogRecord>> {
        let target = CatalogKey {
            parent_id,
            name: name.to_string(),
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
                        let (key, consumed) = CatalogKey::parse(rec)?;
                        if key.cmp_full(&target) == Ordering::Equal {
                            return Ok(Some(CatalogRecord::parse(&rec[consumed..])?));
                        }
                    }
                    return Ok(None);
                }
                NodeKind::Index => {
                    let mut chosen = None;
                    for rec in &recs {
                        let (key, consumed) = CatalogKey::parse(rec)?;
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
                        "unexpected node kind while descending catalog tree".into(),
                    ))
                }
            }
        }
    }
}

pub(crate) fn load_extents_overflow(
    image: &Rc<RefCell<dyn Image>>,
    mdb: &MasterDirectoryBlock,
) -> Result<ExtentsOverflowFile> {
    let raw = read_fork(
        image,
        mdb,
        &mdb.extents_file_extents,
        EXTENTS_FILE_ID,
        false,
        mdb.extents_file_size,
        None,
    )?;
    ExtentsOverflowFile::open(raw)
}

pub(crate) fn load_catalog(
    image: &Rc<RefCell<dyn Image>>,
    mdb: &MasterDirectoryBlock,
    overflow: &ExtentsOverflowFile,
) -> Result<CatalogFile> {
    let raw = read_fork(
        image,
        mdb,
        &mdb.catalog_file_extents,
        CATALOG_FILE_ID,
        false,
        mdb.catalog_file_size,
        Some(overflow),
    )?;
    CatalogFile::open(raw)
}
