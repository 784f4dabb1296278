//! Top-level orchestrator: given an `Image`, tries each known filesystem
//! probe and returns whichever succeed, isolating one probe's failure from
//! the others.
//!
//! Grounded on `examples/original_source/dumpdisc/__init__.py`'s `Disc`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::apple;
use crate::common::Partition;
use crate::image::Image;
use crate::iso9660::Iso9660Partition;

pub enum DiscPartition {
    Iso9660(Iso9660Partition),
    Apple(apple::HfsPartition),
}

impl crate::common::Dump for DiscPartition {
    fn dump(&self, indent: usize) -> String {
        match self {
            DiscPartition::Iso9660(p) => p.dump(indent),
            DiscPartition::Apple(p) => p.dump(indent),
        }
    }
}

/// A disc image may carry an ISO 9660 filesystem, an Apple HFS partition
/// map, both (a hybrid disc), or neither.
pub struct Disc {
    pub partitions: Vec<DiscPartition>,
}

impl Disc {
    pub fn probe(image: Rc<RefCell<dyn Image>>) -> Disc {
        let mut partitions = Vec::new();

        if let Ok(isos) = Iso9660Partition::probe(image.clone()) {
            partitions.extend(isos.into_iter().map(DiscPartition::Iso9660));
        }
        if let Ok(hfs) = apple::probe(image.clone()) {
            partitions.push(DiscPartition::Apple(hfs));
        }

        Disc { partitions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::IsoImage;
    use crate::sector::COOKED_SECTOR_SIZE;
    use std::io::Write;

    #[test]
    fn probe_finds_nothing_on_blank_image() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; COOKED_SECTOR_SIZE * 20]).unwrap();
        let image: Rc<RefCell<dyn Image>> =
            Rc::new(RefCell::new(IsoImage::open(tmp.path()).unwrap()));

        let disc = Disc::probe(image);
        assert!(disc.partitions.is_empty());
    }
}
