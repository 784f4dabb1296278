//! Wraps an inner image with a GNU ddrescue mapfile: byte ranges tagged with
//! a single-character status (`+` finished, `-` bad-sector, `*` non-tried,
//! `/` non-trimmed, `?` legacy non-tried). Only `+` ranges are readable.

use crate::error::{Error, Result};

use super::badmap::parse_int_auto_base;
use super::Image;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Range {
    start_block: u64,
    end_block: u64, // exclusive
    finished: bool,
}

pub struct DdRescueImage<I: Image> {
    inner: I,
    ranges: Vec<Range>,
}

impl<I: Image> DdRescueImage<I> {
    pub fn load(inner: I, reader: impl std::io::Read) -> Result<Self> {
        let block_size = inner.block_size() as u64;
        let mut ranges = Vec::new();
        let mut header_consumed = false;
        for line in std::io::BufReader::new(reader)
            .lines_checked()?
        {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            // The mapfile's first non-comment line is always the mandatory
            // `<current_pos> <status>[ <pass>]` header, not a range.
            if !header_consumed {
                header_consumed = true;
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(pos), Some(size), Some(status)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            let pos = parse_int_auto_base(pos).ok_or_else(|| {
                Error::StructureInvalid(format!("bad ddrescue position: {pos}"))
            })?;
            let size = parse_int_auto_base(size).ok_or_else(|| {
                Error::StructureInvalid(format!("bad ddrescue size: {size}"))
            })?;
            let finished = status == "+";
            ranges.push(Range {
                start_block: pos / block_size,
                end_block: (pos + size).div_ceil(block_size),
                finished,
            });
        }
        Ok(DdRescueImage { inner, ranges })
    }

    fn is_finished(&self, block: u64) -> bool {
        self.ranges
            .iter()
            .find(|r| block >= r.start_block && block < r.end_block)
            .map(|r| r.finished)
            // A block with no matching range was never reported on; treat
            // it as finished rather than refuse every read on a partial map.
            .unwrap_or(true)
    }
}

trait LinesChecked {
    fn lines_checked(self) -> Result<Vec<String>>;
}

impl<R: std::io::BufRead> LinesChecked for R {
    fn lines_checked(self) -> Result<Vec<String>> {
        self.lines().collect::<std::io::Result<Vec<_>>>().map_err(Error::from)
    }
}

impl<I: Image> Image for DdRescueImage<I> {
    fn block_size(&self) -> usize {
        self.inner.block_size()
    }

    fn current_block(&self) -> u64 {
        self.inner.current_block()
    }

    fn seek_block(&mut self, block: u64) -> Result<()> {
        self.inner.seek_block(block)
    }

    fn read_blocks(&mut self, count: usize) -> Result<Vec<u8>> {
        let start = self.inner.current_block();
        for b in start..start + count as u64 {
            if !self.is_finished(b) {
                return Err(Error::BadBlock(b));
            }
        }
        self.inner.read_blocks(count)
    }

    fn read_blocks_raw(&mut self, count: usize) -> Result<Vec<u8>> {
        let start = self.inner.current_block();
        for b in start..start + count as u64 {
            if !self.is_finished(b) {
                return Err(Error::BadBlock(b));
            }
        }
        self.inner.read_blocks_raw(count)
    }

    fn total_blocks(&self) -> Option<u64> {
        self.inner.total_blocks()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::IsoImage;
    use std::io::Write;

    #[test]
    fn bad_range_rejects_read() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; 2048 * 4]).unwrap();
        let inner = IsoImage::open(tmp.path()).unwrap();
        // First non-comment line is the mandatory header, not a range; the
        // two ranges below split the 4-block file cleanly at block 2.
        let map = "# Mapfile\n0x00000000     0\n0x00000000  0x00001000  +\n0x00001000  0x00001000  -\n";
        let mut image = DdRescueImage::load(inner, map.as_bytes()).unwrap();
        image.seek_block(0).unwrap();
        assert!(image.read_blocks(1).is_ok());
        image.seek_block(2).unwrap();
        let err = image.read_blocks(1).unwrap_err();
        assert!(matches!(err, Error::BadBlock(2)));
    }
}
