//! Apple (classic HFS, not HFS Plus) decoder: Driver Descriptor, Partition
//! Map, Master Directory Block, Catalog B-tree, and the `Partition`/
//! `Directory`/`File` tree built on top of them.
//!
//! Grounded on `examples/original_source/dumpdisc/apple.py`'s
//! `Volume`/`Partition`/`HFSPartition`/`ExtentGroup`/`CatalogFile`/`BTree`
//! class hierarchy.

pub mod catalog;
pub mod directory;
pub mod extent;
pub mod mdb;
pub mod partition_map;

pub use directory::{HfsDirectory, HfsFile, HfsPartition};

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::image::Image;

const DRIVER_DESCRIPTOR_BLOCK: u64 = 0;
const PARTITION_MAP_FIRST_BLOCK: u64 = 1;
const BLOCK_SIZE: usize = 512;

/// Unix epoch offset of the HFS/Mac epoch (1904-01-01), in seconds.
pub const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

pub fn mac_time_to_unix(mac_seconds: u32) -> i64 {
    mac_seconds as i64 - MAC_EPOCH_OFFSET
}

/// Probes a device image for an Apple partition map and returns the first
/// `Apple_HFS` partition found, already parsed down to its Master
/// Directory Block.
pub fn probe(image: Rc<RefCell<dyn Image>>) -> Result<HfsPartition> {
    let driver_block = read_512(&image, DRIVER_DESCRIPTOR_BLOCK)?;
    if &driver_block[0..2] != b"ER" {
        return Err(Error::SignatureInvalid("Apple Driver Descriptor"));
    }
    let _driver_descriptor = partition_map::DriverDescriptorRecord::parse(&driver_block)?;

    let mut block_index = PARTITION_MAP_FIRST_BLOCK;
    loop {
        let block = read_512(&image, block_index)?;
        if &block[0..2] != b"PM" {
            break;
        }
        let entry = partition_map::PartitionMapEntry::parse(&block)?;
        let partition_count = entry.partition_count as u64;
        if entry.partition_type.trim_end_matches('\0') == "Apple_HFS" {
            let start = entry.partition_start as u64;
            return HfsPartition::open(image, start);
        }
        block_index += 1;
        if block_index > partition_count {
            break;
        }
    }
    Err(Error::StructureInvalid(
        "no Apple_HFS partition found in partition map".into(),
    ))
}

fn read_512(image: &Rc<RefCell<dyn Image>>, block_512: u64) -> Result<Vec<u8>> {
    let mut img = image.borrow_mut();
    let logical_block_size = img.block_size();
    // Partition-map blocks are always 512 bytes regardless of the
    // underlying image's logical block size.
    let per_logical = logical_block_size / BLOCK_SIZE;
    if per_logical <= 1 {
        img.seek_block(block_512)?;
        let mut buf = img.read_blocks(1)?;
        buf.truncate(BLOCK_SIZE);
        Ok(buf)
    } else {
        let logical = block_512 / per_logical as u64;
        let sub = (block_512 % per_logical as u64) as usize;
        img.seek_block(logical)?;
        let buf = img.read_blocks(1)?;
        Ok(buf[sub * BLOCK_SIZE..(sub + 1) * BLOCK_SIZE].to_vec())
    }
}

pub(crate) fn read_512_at(image: &Rc<RefCell<dyn Image>>, block_512: u64) -> Result<Vec<u8>> {
    read_512(image, block_512)
}
