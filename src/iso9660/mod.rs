//! ISO 9660 (with Joliet) decoder: scans the volume descriptor set starting
//! at logical block 16 and exposes one `Partition`/`Directory`/`File` tree
//! per usable descriptor found — a hybrid disc carrying both a Primary and
//! a Joliet Supplementary descriptor yields both partitions.

pub mod directory;
pub mod path_table;
pub mod volume;

use std::cell::RefCell;
use std::rc::Rc;

use directory::{DirectoryRecord, Encoding, Iso9660File};
use volume::VolumeDescriptor;

use crate::common::{Directory, Dump, Partition};
use crate::error::{Error, Result};
use crate::image::Image;
use crate::sector::COOKED_SECTOR_SIZE;

const SYSTEM_AREA_BLOCKS: u64 = 16;

/// Which volume descriptor a partition was built from — a disc carrying
/// both a Primary and a Joliet Supplementary descriptor yields one
/// `Iso9660Partition` of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    Primary,
    Joliet,
}

pub struct Iso9660Partition {
    volume_identifier: String,
    root: DirectoryRecord,
    encoding: Encoding,
    kind: PartitionKind,
    image: Rc<RefCell<dyn Image>>,
}

impl Iso9660Partition {
    /// Scans the volume descriptor set and builds one partition per usable
    /// Primary/Supplementary descriptor found before the Terminator — both
    /// a Primary and a Joliet partition when both are present on the disc,
    /// rather than picking only the richer of the two.
    pub fn probe(image: Rc<RefCell<dyn Image>>) -> Result<Vec<Iso9660Partition>> {
        let mut primary: Option<volume::PrimaryVolumeDescriptor> = None;
        let mut joliet: Option<volume::SupplementaryVolumeDescriptor> = None;

        for block_index in SYSTEM_AREA_BLOCKS.. {
            let block = {
                let mut img = image.borrow_mut();
                img.seek_block(block_index)?;
                img.read_blocks(1)?
            };
            let descriptor = VolumeDescriptor::parse(&block)?;
            match descriptor {
                VolumeDescriptor::Primary(pvd) => primary = Some(pvd),
                VolumeDescriptor::Supplementary(svd) => {
                    if svd.is_joliet() {
                        joliet = Some(svd);
                    } else {
                        return Err(Error::NotSupported(
                            "non-Joliet Supplementary Volume Descriptor (UCS-2 level other than Joliet's escape sequences)".into(),
                        ));
                    }
                }
                VolumeDescriptor::Terminator => break,
                _ => {}
            }
        }

        let mut partitions = Vec::new();

        if let Some(pvd) = primary {
            let root = DirectoryRecord::parse(&pvd.root_directory_record, Encoding::Ascii)?
                .ok_or_else(|| Error::StructureInvalid("empty root directory record".into()))?
                .0;
            partitions.push(Iso9660Partition {
                volume_identifier: pvd.volume_identifier.clone(),
                root,
                encoding: Encoding::Ascii,
                kind: PartitionKind::Primary,
                image: image.clone(),
            });
        }

        if let Some(svd) = joliet {
            let root = DirectoryRecord::parse(&svd.root_directory_record, Encoding::Utf16Be)?
                .ok_or_else(|| Error::StructureInvalid("empty Joliet root directory record".into()))?
                .0;
            partitions.push(Iso9660Partition {
                volume_identifier: svd.volume_identifier.clone(),
                root,
                encoding: Encoding::Utf16Be,
                kind: PartitionKind::Joliet,
                image,
            });
        }

        if partitions.is_empty() {
            return Err(Error::StructureInvalid(
                "no Primary Volume Descriptor found".into(),
            ));
        }
        Ok(partitions)
    }
}

impl Dump for Iso9660Partition {
    fn dump(&self, indent: usize) -> String {
        crate::common::indent_lines(
            indent,
            &format!(
                "ISO9660 Partition {:?} (joliet: {})",
                self.volume_identifier,
                self.encoding == Encoding::Utf16Be
            ),
        )
    }
}

impl Partition for Iso9660Partition {
    type Dir = Iso9660Directory;

    fn label(&self) -> &str {
        &self.volume_identifier
    }

    fn type_tag(&self) -> &'static str {
        match self.kind {
            PartitionKind::Primary => "iso9660",
            PartitionKind::Joliet => "joliet",
        }
    }

    fn root(&self) -> Result<Iso9660Directory> {
        Ok(Iso9660Directory {
            record: self.root.clone(),
            encoding: self.encoding,
            image: self.image.clone(),
        })
    }
}

pub struct Iso9660Directory {
    record: DirectoryRecord,
    encoding: Encoding,
    image: Rc<RefCell<dyn Image>>,
}

impl Dump for Iso9660Directory {
    fn dump(&self, indent: usize) -> String {
        self.record.dump(indent)
    }
}

impl Directory for Iso9660Directory {
    type File = Iso9660File;
    type Dir = Iso9660Directory;

    fn name(&self) -> &str {
        &self.record.identifier
    }

    fn subdirectories(&self) -> Result<Vec<Iso9660Directory>> {
        let entries = {
            let mut img = self.image.borrow_mut();
            self.record
                .list_entries(&mut *img, COOKED_SECTOR_SIZE, self.encoding)?
        };
        Ok(entries
            .into_iter()
            .filter(|e| e.is_directory() && !e.is_self && !e.is_parent)
            .map(|record| Iso9660Directory {
                record,
                encoding: self.encoding,
                image: self.image.clone(),
            })
            .collect())
    }

    fn files(&self) -> Result<Vec<Iso9660File>> {
        let entries = {
            let mut img = self.image.borrow_mut();
            self.record
                .list_entries(&mut *img, COOKED_SECTOR_SIZE, self.encoding)?
        };
        Ok(entries
            .into_iter()
            .filter(|e| !e.is_directory())
            .map(|record| Iso9660File {
                record,
                image: self.image.clone(),
                block_size: COOKED_SECTOR_SIZE,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::IsoImage;
    use std::io::Write;

    fn synth_record(name: &str, extent: u32, size: u32, flags: u8) -> Vec<u8> {
        let id_len = name.len().max(1);
        let pad = if (33 + id_len) % 2 != 0 { 1 } else { 0 };
        let length = 33 + id_len + pad;
        let mut buf = vec![0u8; length];
        buf[0] = length as u8;
        buf[2..6].copy_from_slice(&extent.to_le_bytes());
        buf[6..10].copy_from_slice(&extent.to_be_bytes());
        buf[10..14].copy_from_slice(&size.to_le_bytes());
        buf[14..18].copy_from_slice(&size.to_be_bytes());
        buf[25] = flags;
        buf[28..30].copy_from_slice(&1u16.to_le_bytes());
        buf[30..32].copy_from_slice(&1u16.to_be_bytes());
        buf[32] = id_len as u8;
        if !name.is_empty() {
            buf[33..33 + name.len()].copy_from_slice(name.as_bytes());
        }
        buf
    }

    #[test]
    fn probe_finds_primary_volume_descriptor_and_root() {
        let mut image_bytes = vec![0u8; COOKED_SECTOR_SIZE * 19];

        // Primary Volume Descriptor at block 16.
        let pvd_block = &mut image_bytes[16 * COOKED_SECTOR_SIZE..17 * COOKED_SECTOR_SIZE];
        pvd_block[0] = 1;
        pvd_block[1..6].copy_from_slice(volume::STANDARD_IDENTIFIER);
        pvd_block[6] = 1;
        pvd_block[40..45].copy_from_slice(b"DISC1");
        pvd_block[80..84].copy_from_slice(&19u32.to_le_bytes());
        pvd_block[84..88].copy_from_slice(&19u32.to_be_bytes());
        pvd_block[128..130].copy_from_slice(&2048u16.to_le_bytes());
        pvd_block[130..132].copy_from_slice(&2048u16.to_be_bytes());
        let root_record = synth_record("", 18, 2048, 0x02);
        pvd_block[156..156 + root_record.len()].copy_from_slice(&root_record);

        // Terminator at block 17.
        let term_block = &mut image_bytes[17 * COOKED_SECTOR_SIZE..18 * COOKED_SECTOR_SIZE];
        term_block[0] = 255;
        term_block[1..6].copy_from_slice(volume::STANDARD_IDENTIFIER);

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&image_bytes).unwrap();
        let image: Rc<RefCell<dyn Image>> =
            Rc::new(RefCell::new(IsoImage::open(tmp.path()).unwrap()));

        let mut partitions = Iso9660Partition::probe(image).unwrap();
        assert_eq!(partitions.len(), 1);
        let partition = partitions.remove(0);
        assert_eq!(partition.label(), "DISC1");
        assert_eq!(partition.type_tag(), "iso9660");
        let root = partition.root().unwrap();
        assert_eq!(root.name(), ".");
    }
}
