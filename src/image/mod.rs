//! The `Image` trait and its layered implementors.
//!
//! An image is always composed bottom-up: a base reader (`IsoImage` for a
//! cooked `.iso`, `RawCdImage` for a raw `.bin`/`.img`) optionally wrapped by
//! `OffsetImage` (skip a leading partition/session offset), then
//! `BadMapImage` (fail reads into a known-bad region) and/or `DdRescueImage`
//! (consult a ddrescue mapfile), in that order — mirroring
//! `examples/original_source/dumpdisc/image.py`'s composition.

mod badmap;
mod ddrescue;
mod offset;
mod rawcd;

pub use badmap::BadMapImage;
pub use ddrescue::DdRescueImage;
pub use offset::OffsetImage;
pub use rawcd::RawCdImage;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};
use crate::sector::COOKED_SECTOR_SIZE;

/// A seekable source of fixed-size logical blocks.
///
/// All block addresses and counts are in units of `block_size()`, which is
/// always `COOKED_SECTOR_SIZE` (2048) for the filesystem decoders built on
/// top of this trait — `RawCdImage` performs the raw-to-cooked conversion
/// internally so that everything above it never sees a 2352-byte sector.
pub trait Image {
    fn block_size(&self) -> usize;

    /// The block address the next read will start from.
    fn current_block(&self) -> u64;

    fn seek_block(&mut self, block: u64) -> Result<()>;

    /// Reads `count` blocks starting at the current position, advancing it.
    fn read_blocks(&mut self, count: usize) -> Result<Vec<u8>>;

    /// Reads `count` blocks as uncoked, unvalidated raw sectors (2352 bytes
    /// each for a CD image), advancing the current position the same way
    /// `read_blocks` does. Only RAW-backed images support this; cooked
    /// images (and any wrapper whose inner image doesn't support it) return
    /// `Error::NotSupported`. Used by the ISO 9660 CDXA fallback to recover
    /// a Mode 2 Form 2 sector's payload when the cooked read already failed.
    fn read_blocks_raw(&mut self, _count: usize) -> Result<Vec<u8>> {
        Err(Error::NotSupported(
            "raw sector reads are only available on RAW-backed images".into(),
        ))
    }

    /// Total number of blocks, when known in advance (cooked images always
    /// know this from file length; some raw/ddrescue-backed images do not).
    fn total_blocks(&self) -> Option<u64>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Base image over an already-cooked (2048-byte logical block) file, such as
/// a plain `.iso`.
pub struct IsoImage {
    file: File,
    current_block: u64,
    total_blocks: u64,
}

impl IsoImage {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(IsoImage {
            file,
            current_block: 0,
            total_blocks: len / COOKED_SECTOR_SIZE as u64,
        })
    }

    pub fn from_file(file: File) -> Result<Self> {
        let len = file.metadata()?.len();
        Ok(IsoImage {
            file,
            current_block: 0,
            total_blocks: len / COOKED_SECTOR_SIZE as u64,
        })
    }
}

impl Image for IsoImage {
    fn block_size(&self) -> usize {
        COOKED_SECTOR_SIZE
    }

    fn current_block(&self) -> u64 {
        self.current_block
    }

    fn seek_block(&mut self, block: u64) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(block * COOKED_SECTOR_SIZE as u64))?;
        self.current_block = block;
        Ok(())
    }

    fn read_blocks(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; count * COOKED_SECTOR_SIZE];
        self.file.read_exact(&mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::IoShort {
                    expected: buf.len(),
                    got: 0,
                }
            } else {
                Error::Io(e)
            }
        })?;
        self.current_block += count as u64;
        Ok(buf)
    }

    fn total_blocks(&self) -> Option<u64> {
        Some(self.total_blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn iso_image_reads_sequential_blocks() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let mut data = vec![0u8; COOKED_SECTOR_SIZE * 3];
        data[COOKED_SECTOR_SIZE] = 0xAB;
        tmp.write_all(&data).unwrap();
        let mut img = IsoImage::open(tmp.path()).unwrap();
        assert_eq!(img.total_blocks(), Some(3));
        img.seek_block(1).unwrap();
        let block = img.read_blocks(1).unwrap();
        assert_eq!(block[0], 0xAB);
        assert_eq!(img.current_block(), 2);
    }
}
