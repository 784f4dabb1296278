//! Wraps an inner image with an explicit list of known-bad block numbers,
//! loaded from a plain text file (one address per line, `0x`/`0o`/decimal).

use std::collections::BTreeSet;
use std::io::BufRead;

use crate::error::{Error, Result};

use super::Image;

pub struct BadMapImage<I: Image> {
    inner: I,
    bad_blocks: BTreeSet<u64>,
}

impl<I: Image> BadMapImage<I> {
    pub fn new(inner: I, bad_blocks: BTreeSet<u64>) -> Self {
        BadMapImage { inner, bad_blocks }
    }

    /// Parses a bad-block map: one address per line, blank lines and `#`
    /// comments ignored. Accepts `0x`-prefixed hex, `0`-prefixed octal, and
    /// plain decimal, matching Python's `int(line, 0)` auto-base parsing.
    pub fn load(inner: I, reader: impl std::io::Read) -> Result<Self> {
        let mut bad_blocks = BTreeSet::new();
        for line in std::io::BufReader::new(reader).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let addr = parse_int_auto_base(line).ok_or_else(|| {
                Error::StructureInvalid(format!("invalid bad-block map entry: {line}"))
            })?;
            bad_blocks.insert(addr);
        }
        Ok(BadMapImage { inner, bad_blocks })
    }
}

pub(crate) fn parse_int_auto_base(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(rest, 16).ok()
    } else if let Some(rest) = s.strip_prefix("0o").or_else(|| s.strip_prefix("0O")) {
        u64::from_str_radix(rest, 8).ok()
    } else if s.len() > 1 && s.starts_with('0') && s.bytes().all(|b| b.is_ascii_digit()) {
        u64::from_str_radix(&s[1..], 8).ok()
    } else {
        s.parse::<u64>().ok()
    }
}

impl<I: Image> Image for BadMapImage<I> {
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
            if self.bad_blocks.contains(&b) {
                return Err(Error::BadBlock(b));
            }
        }
        self.inner.read_blocks(count)
    }

    fn read_blocks_raw(&mut self, count: usize) -> Result<Vec<u8>> {
        let start = self.inner.current_block();
        for b in start..start + count as u64 {
            if self.bad_blocks.contains(&b) {
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

    #[test]
    fn auto_base_parses_hex_octal_decimal() {
        assert_eq!(parse_int_auto_base("0x1A"), Some(26));
        assert_eq!(parse_int_auto_base("032"), Some(26));
        assert_eq!(parse_int_auto_base("26"), Some(26));
    }

    #[test]
    fn load_skips_blank_and_comment_lines() {
        use crate::image::IsoImage;
        use std::io::Write;
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; 2048 * 4]).unwrap();
        let inner = IsoImage::open(tmp.path()).unwrap();
        let map = "# comment\n\n0x2\n5\n";
        let image = BadMapImage::load(inner, map.as_bytes()).unwrap();
        assert!(image.bad_blocks.contains(&2));
        assert!(image.bad_blocks.contains(&5));
        assert_eq!(image.bad_blocks.len(), 2);
    }
}
