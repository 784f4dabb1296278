//! Apple Driver Descriptor (block 0) and Partition Map entries (block 1+),
//! each a fixed 512-byte structure. Parsed with `deku` since neither needs
//! validation woven between fields.

use deku::prelude::*;

use crate::error::{Error, Result};

#[derive(Debug, Clone, DekuRead)]
#[deku(endian = "big")]
pub struct DriverDescriptorRecord {
    #[deku(count = "2")]
    pub signature: Vec<u8>,
    pub block_size: u16,
    pub block_count: u32,
    pub device_type: u16,
    pub device_id: u16,
    pub driver_data: u32,
    pub driver_descriptor_count: u16,
    #[deku(count = "64")]
    pub driver_descriptor_table: Vec<u8>,
}

impl DriverDescriptorRecord {
    pub fn parse(block: &[u8]) -> Result<DriverDescriptorRecord> {
        let ((_rest, _), record) = DriverDescriptorRecord::from_bytes((block, 0))
            .map_err(|e| Error::StructureInvalid(format!("driver descriptor: {e}")))?;
        if record.signature != b"ER" {
            return Err(Error::SignatureInvalid("Apple Driver Descriptor"));
        }
        if record.block_size != 512 {
            return Err(Error::StructureInvalid(format!(
                "Apple Driver Descriptor block size {} is not 512",
                record.block_size
            )));
        }
        Ok(record)
    }
}

#[derive(Debug, Clone, DekuRead)]
#[deku(endian = "big")]
struct RawPartitionMapEntry {
    #[deku(count = "2")]
    signature: Vec<u8>,
    #[deku(count = "2")]
    unused: Vec<u8>,
    partition_count: u32,
    partition_start: u32,
    partition_block_count: u32,
    #[deku(count = "32")]
    partition_name: Vec<u8>,
    #[deku(count = "32")]
    partition_type: Vec<u8>,
    logical_block_start: u32,
    logical_block_count: u32,
    flags: u32,
}

#[derive(Debug, Clone)]
pub struct PartitionMapEntry {
    pub partition_count: u32,
    pub partition_start: u32,
    pub partition_block_count: u32,
    pub partition_name: String,
    pub partition_type: String,
    pub logical_block_start: u32,
    pub logical_block_count: u32,
    pub flags: u32,
}

fn trim_c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).to_string()
}

impl PartitionMapEntry {
    pub fn parse(block: &[u8]) -> Result<PartitionMapEntry> {
        let ((_rest, _), raw) = RawPartitionMapEntry::from_bytes((block, 0))
            .map_err(|e| Error::StructureInvalid(format!("partition map entry: {e}")))?;
        if raw.signature != b"PM" {
            return Err(Error::SignatureInvalid("Apple Partition Map entry"));
        }
        Ok(PartitionMapEntry {
            partition_count: raw.partition_count,
            partition_start: raw.partition_start,
            partition_block_count: raw.partition_block_count,
            partition_name: trim_c_string(&raw.partition_name),
            partition_type: trim_c_string(&raw.partition_type),
            logical_block_start: raw.logical_block_start,
            logical_block_count: raw.logical_block_count,
            flags: raw.flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partition_map_entry() {
        let mut block = vec![0u8; 512];
        block[0..2].copy_from_slice(b"PM");
        block[4..8].copy_from_slice(&3u32.to_be_bytes());
        block[8..12].copy_from_slice(&1u32.to_be_bytes());
        block[12..16].copy_from_slice(&1000u32.to_be_bytes());
        block[16..25].copy_from_slice(b"Customer\0");
        block[48..58].copy_from_slice(b"Apple_HFS\0");
        let entry = PartitionMapEntry::parse(&block).unwrap();
        assert_eq!(entry.partition_count, 3);
        assert_eq!(entry.partition_block_count, 1000);
        assert_eq!(entry.partition_type, "Apple_HFS");
    }

    #[test]
    fn rejects_bad_signature() {
        let block = vec![0u8; 512];
        let err = PartitionMapEntry::parse(&block).unwrap_err();
        assert!(matches!(err, Error::SignatureInvalid(_)));
    }

    #[test]
    fn driver_descriptor_rejects_non_512_block_size() {
        let mut block = vec![0u8; 512];
        block[0..2].copy_from_slice(b"ER");
        block[2..4].copy_from_slice(&1024u16.to_be_bytes());
        let err = DriverDescriptorRecord::parse(&block).unwrap_err();
        assert!(matches!(err, Error::StructureInvalid(_)));
    }
}
