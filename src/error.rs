//! Crate-wide error taxonomy.
//!
//! One enum for every failure class an image layer or filesystem decoder
//! can raise. Kept flat (no per-module error types) because every error
//! eventually crosses the `Image` trait boundary and the caller needs a
//! single type to match on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// An overlay (bad-block map or ddrescue map) refused a read.
    #[error("bad block at address {0}")]
    BadBlock(u64),

    /// The underlying reader returned fewer bytes than requested.
    #[error("short read: expected {expected} bytes, got {got}")]
    IoShort { expected: usize, got: usize },

    /// A raw sector's 12-byte sync pattern did not match.
    #[error("sync pattern invalid for sector {0}")]
    SyncInvalid(u64),

    /// A raw sector's 32-bit EDC did not verify.
    #[error("edc invalid for sector {0}")]
    EdcInvalid(u64),

    /// A raw sector's P/Q ECC parity did not verify.
    #[error("ecc invalid for sector {0}")]
    EccInvalid(u64),

    /// A raw sector's mode byte (or Mode 2 submode flags) was not recognized.
    #[error("invalid mode {mode} for sector {sector}")]
    ModeInvalid { sector: u64, mode: u8 },

    /// A magic/signature field did not match what was expected.
    #[error("signature invalid: {0}")]
    SignatureInvalid(&'static str),

    /// A fixed-field constraint failed: LE/BE mismatch, non-zero reserved
    /// byte, a size that must be a multiple of something, etc.
    #[error("structure invalid: {0}")]
    StructureInvalid(String),

    /// A type tag did not match any known subclass (volume descriptor kind,
    /// Apple partition type, B-tree node kind, catalog record kind).
    #[error("unknown variant for {what}: {tag}")]
    UnknownVariant { what: &'static str, tag: String },

    /// Recognized but deliberately unsupported (non-Joliet supplementary
    /// descriptors, additional Joliet escape sequences).
    #[error("not supported: {0}")]
    NotSupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
