//! Wraps an inner image, shifting every block address by a fixed offset —
//! used to skip a leading session/partition gap before the filesystem
//! actually starts.

use crate::error::Result;

use super::Image;

pub struct OffsetImage<I: Image> {
    inner: I,
    offset: u64,
}

impl<I: Image> OffsetImage<I> {
    pub fn new(inner: I, offset: u64) -> Self {
        OffsetImage { inner, offset }
    }
}

impl<I: Image> Image for OffsetImage<I> {
    fn block_size(&self) -> usize {
        self.inner.block_size()
    }

    fn current_block(&self) -> u64 {
        // Documented fix: the caller-visible block number is relative to
        // the offset image's own origin, not the inner image's.
        self.inner.current_block() + self.offset
    }

    fn seek_block(&mut self, block: u64) -> Result<()> {
        self.inner.seek_block(block.saturating_sub(self.offset))
    }

    fn read_blocks(&mut self, count: usize) -> Result<Vec<u8>> {
        self.inner.read_blocks(count)
    }

    fn read_blocks_raw(&mut self, count: usize) -> Result<Vec<u8>> {
        self.inner.read_blocks_raw(count)
    }

    fn total_blocks(&self) -> Option<u64> {
        self.inner.total_blocks().map(|n| n + self.offset)
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
    fn offset_shifts_current_block() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; 2048 * 4]).unwrap();
        let inner = IsoImage::open(tmp.path()).unwrap();
        let mut offset = OffsetImage::new(inner, 16);
        offset.seek_block(16).unwrap();
        assert_eq!(offset.current_block(), 16);
        offset.read_blocks(1).unwrap();
        assert_eq!(offset.current_block(), 17);
    }
}
