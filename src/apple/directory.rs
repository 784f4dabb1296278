//! `Partition`/`Directory`/`File` implementations over classic HFS: ties
//! the Master Directory Block, Extents Overflow File, and Catalog File
//! together into the tree the rest of the crate walks.

use std::cell::RefCell;
use std::rc::Rc;

use crate::apple::catalog::overflow::ExtentsOverflowFile;
use crate::apple::catalog::record::CatalogRecord;
use crate::apple::catalog::{self, CatalogFile, ROOT_DIRECTORY_ID, ROOT_PARENT_ID};
use crate::apple::mdb::MasterDirectoryBlock;
use crate::apple::read_512_at;
use crate::common::{Directory, Dump, File as FileTrait, Partition};
use crate::error::{Error, Result};
use crate::image::Image;

pub struct HfsPartition {
    image: Rc<RefCell<dyn Image>>,
    mdb: Rc<MasterDirectoryBlock>,
    overflow: Rc<ExtentsOverflowFile>,
    catalog: Rc<CatalogFile>,
}

impl HfsPartition {
    /// `partition_start` is the partition's first 512-byte block on the
    /// device; the MDB lives at allocation block 2 from there.
    pub fn open(image: Rc<RefCell<dyn Image>>, partition_start: u64) -> Result<HfsPartition> {
        let mdb_block = read_512_at(&image, partition_start + 2)?;
        let mdb = MasterDirectoryBlock::parse(&mdb_block)?;
        let overflow = catalog::load_extents_overflow(&image, &mdb)?;
        let catalog = catalog::load_catalog(&image, &mdb, &overflow)?;
        Ok(HfsPartition {
            image,
            mdb: Rc::new(mdb),
            overflow: Rc::new(overflow),
            catalog: Rc::new(catalog),
        })
    }
}

impl Dump for HfsPartition {
    fn dump(&self, indent: usize) -> String {
        self.mdb.dump(indent)
    }
}

impl Partition for HfsPartition {
    type Dir = HfsDirectory;

    fn label(&self) -> &str {
        &self.mdb.volume_label
    }

    fn type_tag(&self) -> &'static str {
        "applehfs"
    }

    fn root(&self) -> Result<HfsDirectory> {
        Ok(HfsDirectory {
            directory_id: ROOT_DIRECTORY_ID,
            name: self.mdb.volume_label.clone(),
            image: self.image.clone(),
            mdb: self.mdb.clone(),
            overflow: self.overflow.clone(),
            catalog: self.catalog.clone(),
        })
    }
}

pub struct HfsDirectory {
    directory_id: u32,
    name: String,
    image: Rc<RefCell<dyn Image>>,
    mdb: Rc<MasterDirectoryBlock>,
    overflow: Rc<ExtentsOverflowFile>,
    catalog: Rc<CatalogFile>,
}

impl Dump for HfsDirectory {
    fn dump(&self, indent: usize) -> String {
        crate::common::indent_lines(indent, &format!("Directory {:?} (id={})", self.name, self.directory_id))
    }
}

impl Directory for HfsDirectory {
    type File = HfsFile;
    type Dir = HfsDirectory;

    fn name(&self) -> &str {
        &self.name
    }

    fn subdirectories(&self) -> Result<Vec<HfsDirectory>> {
        let entries = self.catalog.enumerate(self.directory_id)?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, record)| match record {
                CatalogRecord::Directory(dir) => Some(HfsDirectory {
                    directory_id: dir.folder_id,
                    name: key.name,
                    image: self.image.clone(),
                    mdb: self.mdb.clone(),
                    overflow: self.overflow.clone(),
                    catalog: self.catalog.clone(),
                }),
                _ => None,
            })
            .collect())
    }

    fn files(&self) -> Result<Vec<HfsFile>> {
        let entries = self.catalog.enumerate(self.directory_id)?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, record)| match record {
                CatalogRecord::File(file) => Some(HfsFile {
                    name: key.name,
                    record: file,
                    image: self.image.clone(),
                    mdb: self.mdb.clone(),
                    overflow: self.overflow.clone(),
                }),
                _ => None,
            })
            .collect())
    }
}

pub struct HfsFile {
    name: String,
    record: crate::apple::catalog::record::FileRecord,
    image: Rc<RefCell<dyn Image>>,
    mdb: Rc<MasterDirectoryBlock>,
    overflow: Rc<ExtentsOverflowFile>,
}

impl Dump for HfsFile {
    fn dump(&self, indent: usize) -> String {
        crate::common::indent_lines(
            indent,
            &format!(
                "File {:?} (data: {} bytes, rsrc: {} bytes)",
                self.name, self.record.data_logical_size, self.record.resource_logical_size
            ),
        )
    }
}

impl FileTrait for HfsFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.record.data_logical_size as u64
    }

    fn read(&self) -> Result<Vec<u8>> {
        catalog::read_fork(
            &self.image,
            &self.mdb,
            &self.record.data_extents,
            self.record.file_id,
            false,
            self.record.data_logical_size,
            Some(&self.overflow),
        )
    }

    fn streams(&self) -> Vec<&'static str> {
        if self.record.resource_logical_size > 0 {
            vec!["rsrc"]
        } else {
            Vec::new()
        }
    }

    fn get_content(&self, stream: &str) -> Result<Vec<u8>> {
        match stream {
            "rsrc" => self.read_resource_fork(),
            other => Err(Error::NotSupported(format!("no such stream: {other}"))),
        }
    }
}

impl HfsFile {
    pub fn read_resource_fork(&self) -> Result<Vec<u8>> {
        catalog::read_fork(
            &self.image,
            &self.mdb,
            &self.record.resource_extents,
            self.record.file_id,
            true,
            self.record.resource_logical_size,
            Some(&self.overflow),
        )
    }
}

/// Recovers a node's containing directory name and parent id from its
/// thread record — used by front-ends that need a path from a bare CNID
/// (e.g. error reporting), mirroring the original's thread-record walk.
pub fn path_components(catalog: &CatalogFile, mut node_id: u32) -> Result<Vec<String>> {
    let mut components = Vec::new();
    while node_id != ROOT_PARENT_ID {
        match find_thread(catalog, node_id)? {
            Some((parent_id, name)) => {
                components.push(name);
                node_id = parent_id;
            }
            None => break,
        }
    }
    components.reverse();
    Ok(components)
}

fn find_thread(catalog: &CatalogFile, node_id: u32) -> Result<Option<(u32, String)>> {
    for (key, record) in catalog.enumerate(node_id)? {
        if key.name.is_empty() {
            if let CatalogRecord::DirectoryThread(t) | CatalogRecord::FileThread(t) = record {
                return Ok(Some((t.parent_id, t.name)));
            }
        }
    }
    Ok(None)
}
