//! Readers for optical disc images: ISO 9660 (with Joliet), classic Apple
//! HFS, and the raw CD sector / EDC-ECC layer underneath both.
//!
//! The crate is layered bottom-up:
//!
//! - [`cdrom`] — EDC and Reed-Solomon ECC parity used by raw sectors.
//! - [`sector`] — RAW 2352-byte sector parsing (Mode 0/1/2, Form 1/2).
//! - [`image`] — the [`image::Image`] trait and its composable
//!   implementations (cooked file, raw CD, offset, bad-block map,
//!   ddrescue map).
//! - [`common`] — the [`common::Partition`]/[`common::Directory`]/
//!   [`common::File`]/[`common::Dump`] traits both decoders implement.
//! - [`iso9660`] and [`apple`] — the two filesystem decoders.
//! - [`disc`] — tries both decoders against one image.

pub mod apple;
pub mod cdrom;
pub mod common;
pub mod disc;
pub mod error;
pub mod image;
pub mod iso9660;
pub mod sector;

pub use disc::Disc;
pub use error::{Error, Result};
