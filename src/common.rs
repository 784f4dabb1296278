//! Shared traits implemented by both filesystem decoders: the caller-facing
//! `Partition`/`Directory`/`File` surface, and the `Dump` trait every
//! structural type supports for the inspection front-end.
//!
//! Grounded on `examples/original_source/dumpdisc/common.py`'s
//! `Partition`/`Directory`/`File`/`Dumpeable` base classes.

/// An indented, multi-line textual report, mirroring `Dumpeable.dump`.
pub trait Dump {
    fn dump(&self, indent: usize) -> String;
}

pub(crate) fn indent_lines(indent: usize, body: &str) -> String {
    let pad = "  ".repeat(indent);
    body.lines()
        .map(|l| format!("{pad}{l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A single filesystem found on a disc image. A hybrid disc can carry more
/// than one (e.g. both a Primary and a Joliet ISO 9660 partition); each
/// gets its own `Disc::partitions` entry, distinguished by `type_tag`.
pub trait Partition: Dump {
    type Dir: Directory;

    fn label(&self) -> &str;

    fn root(&self) -> crate::error::Result<Self::Dir>;

    /// Short machine-readable kind tag (`"iso9660"`, `"joliet"`,
    /// `"applehfs"`), used by front-ends to distinguish partitions of the
    /// same `Dir`/`File` shape but different origin.
    fn type_tag(&self) -> &'static str;
}

pub trait Directory: Dump {
    type File: File;
    type Dir: Directory;

    fn name(&self) -> &str;

    /// Breadth-first-friendly enumeration: returns subdirectories and files
    /// directly contained in this directory, `.`/`..` already excluded.
    fn subdirectories(&self) -> crate::error::Result<Vec<Self::Dir>>;
    fn files(&self) -> crate::error::Result<Vec<Self::File>>;
}

pub trait File: Dump {
    fn name(&self) -> &str;
    fn size(&self) -> u64;

    /// Reads the file's full content, resolving fragmented extents and any
    /// filesystem-specific wrapper (CDXA/RIFF for ISO 9660 Mode 2 Form 2,
    /// the Extents Overflow File for HFS) transparently.
    fn read(&self) -> crate::error::Result<Vec<u8>>;

    /// Additional named streams beyond the default content (e.g. `"rsrc"`
    /// for an HFS resource fork). Empty for filesystems with only one fork.
    fn streams(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Reads one of the streams named by `streams()`.
    fn get_content(&self, stream: &str) -> crate::error::Result<Vec<u8>> {
        Err(crate::error::Error::NotSupported(format!(
            "no such stream: {stream}"
        )))
    }
}
