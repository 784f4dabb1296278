//! Inspection front-end: prints a breadth-first tree of every partition
//! found on a disc image, each entry prefixed `+` for a directory or `-`
//! for a file, followed by each structural type's `Dump` report.
//!
//! Grounded on `examples/original_source/dump.py`'s argument surface and
//! walk order.

use std::cell::RefCell;
use std::fs::File;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use discimage::common::{Directory, Dump, File as FileTrait, Partition};
use discimage::disc::{Disc, DiscPartition};
use discimage::image::{BadMapImage, DdRescueImage, Image, IsoImage, OffsetImage, RawCdImage};

#[derive(Parser)]
#[command(about = "Dump the structure of an ISO 9660 / Apple HFS disc image")]
struct Args {
    /// Path to the disc image.
    image: PathBuf,

    /// Treat the image as a raw CD dump (2352 bytes/sector) instead of a
    /// cooked (2048 bytes/sector) image.
    #[arg(short = 'r', long)]
    rawimage: bool,

    /// GNU ddrescue mapfile describing which regions were recovered.
    #[arg(short = 'm', long)]
    ddrmap: Option<PathBuf>,

    /// Plain-text bad-block list (one address per line).
    #[arg(short = 'b', long)]
    badmap: Option<PathBuf>,

    /// Starting block number to skip to before the filesystem begins.
    #[arg(short = 's', long, conflicts_with = "offset")]
    start: Option<u64>,

    /// Starting byte offset to skip to before the filesystem begins.
    #[arg(short = 'o', long, conflicts_with = "start")]
    offset: Option<u64>,
}

/// Wraps a `Box<dyn Image>` so each layer (`OffsetImage`, `BadMapImage`,
/// `DdRescueImage`) — all generic over a concrete `Image` type — can be
/// stacked on top of whatever came before without knowing its exact type.
struct BoxedImage(Box<dyn Image>);

impl Image for BoxedImage {
    fn block_size(&self) -> usize {
        self.0.block_size()
    }
    fn current_block(&self) -> u64 {
        self.0.current_block()
    }
    fn seek_block(&mut self, block: u64) -> discimage::Result<()> {
        self.0.seek_block(block)
    }
    fn read_blocks(&mut self, count: usize) -> discimage::Result<Vec<u8>> {
        self.0.read_blocks(count)
    }
    fn read_blocks_raw(&mut self, count: usize) -> discimage::Result<Vec<u8>> {
        self.0.read_blocks_raw(count)
    }
    fn total_blocks(&self) -> Option<u64> {
        self.0.total_blocks()
    }
    fn close(&mut self) -> discimage::Result<()> {
        self.0.close()
    }
}

fn build_image(args: &Args) -> discimage::Result<Rc<RefCell<dyn Image>>> {
    let mut image: Box<dyn Image> = if args.rawimage {
        Box::new(RawCdImage::open(&args.image, false)?)
    } else {
        Box::new(IsoImage::open(&args.image)?)
    };

    let block_offset = args
        .start
        .or_else(|| args.offset.map(|o| o / image.block_size() as u64));
    if let Some(offset) = block_offset {
        image = Box::new(OffsetImage::new(BoxedImage(image), offset));
    }

    if let Some(path) = &args.badmap {
        let file = File::open(path)?;
        image = Box::new(BadMapImage::load(BoxedImage(image), file)?);
    }

    if let Some(path) = &args.ddrmap {
        let file = File::open(path)?;
        image = Box::new(DdRescueImage::load(BoxedImage(image), file)?);
    }

    Ok(Rc::new(RefCell::new(BoxedImage(image))))
}

fn walk<D: Directory>(dir: &D, depth: usize) {
    println!("{}+ {}", "  ".repeat(depth), dir.name());
    match dir.files() {
        Ok(files) => {
            for file in &files {
                println!("{}- {}", "  ".repeat(depth + 1), file.name());
                println!("{}", file.dump(depth + 2));
            }
        }
        Err(e) => log::warn!("failed to list files in {:?}: {e}", dir.name()),
    }
    match dir.subdirectories() {
        Ok(subdirs) => {
            for subdir in &subdirs {
                walk(subdir, depth + 1);
            }
        }
        Err(e) => log::warn!("failed to list subdirectories in {:?}: {e}", dir.name()),
    }
}

fn main() -> discimage::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let image = build_image(&args)?;
    let disc = Disc::probe(image);

    if disc.partitions.is_empty() {
        log::warn!("no recognizable filesystem found");
    }

    for partition in &disc.partitions {
        match partition {
            DiscPartition::Iso9660(p) => {
                println!("{}", p.dump(0));
                walk(&p.root()?, 0);
            }
            DiscPartition::Apple(p) => {
                println!("{}", p.dump(0));
                walk(&p.root()?, 0);
            }
        }
    }

    Ok(())
}
