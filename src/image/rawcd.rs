//! Base image over a raw CD dump (2352 bytes/sector), cooking each sector
//! down to its 2048-byte user-data payload on read.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};
use crate::sector::{Sector, COOKED_SECTOR_SIZE, RAW_SECTOR_SIZE};

use super::Image;

pub struct RawCdImage {
    file: File,
    current_block: u64,
    total_blocks: u64,
    strict_size: bool,
}

impl RawCdImage {
    pub fn open(path: &std::path::Path, strict_size: bool) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(RawCdImage {
            file,
            current_block: 0,
            total_blocks: len / RAW_SECTOR_SIZE as u64,
            strict_size,
        })
    }
}

impl Image for RawCdImage {
    fn block_size(&self) -> usize {
        COOKED_SECTOR_SIZE
    }

    fn current_block(&self) -> u64 {
        self.current_block
    }

    fn seek_block(&mut self, block: u64) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(block * RAW_SECTOR_SIZE as u64))?;
        self.current_block = block;
        Ok(())
    }

    fn read_blocks(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(count * COOKED_SECTOR_SIZE);
        let mut raw = vec![0u8; RAW_SECTOR_SIZE];
        for _ in 0..count {
            let n = read_up_to(&mut self.file, &mut raw)?;
            if n == 0 {
                return Err(Error::IoShort {
                    expected: RAW_SECTOR_SIZE,
                    got: 0,
                });
            }
            let sector = Sector::parse(&raw[..n], self.current_block, self.strict_size)?;
            out.extend_from_slice(&sector.user_data[..COOKED_SECTOR_SIZE.min(sector.user_data.len())]);
            self.current_block += 1;
        }
        Ok(out)
    }

    fn read_blocks_raw(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(count * RAW_SECTOR_SIZE);
        let mut raw = vec![0u8; RAW_SECTOR_SIZE];
        for _ in 0..count {
            let n = read_up_to(&mut self.file, &mut raw)?;
            if n == 0 {
                return Err(Error::IoShort {
                    expected: RAW_SECTOR_SIZE,
                    got: 0,
                });
            }
            out.extend_from_slice(&raw[..n]);
            self.current_block += 1;
        }
        Ok(out)
    }

    fn total_blocks(&self) -> Option<u64> {
        Some(self.total_blocks)
    }
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}
