//! Extraction front-end: walks every partition found on a disc image and
//! writes each file's content to disk under an output directory, preserving
//! the directory tree.
//!
//! Grounded on `examples/original_source/extract.py`'s argument surface and
//! walk order; shares `discdump`'s image-layering logic.

use std::cell::RefCell;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::Parser;
use discimage::common::{Directory, File as FileTrait, Partition};
use discimage::disc::{Disc, DiscPartition};
use discimage::image::{BadMapImage, DdRescueImage, Image, IsoImage, OffsetImage, RawCdImage};

#[derive(Parser)]
#[command(about = "Extract the files of an ISO 9660 / Apple HFS disc image to a directory")]
struct Args {
    /// Path to the disc image.
    image: PathBuf,

    /// Directory to extract files into; created if missing.
    #[arg(short = 'd', long, default_value = "extracted")]
    destination: PathBuf,

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

fn extract<D: Directory>(dir: &D, destination: &Path) -> discimage::Result<()> {
    std::fs::create_dir_all(destination)?;

    for file in dir.files()? {
        let path = destination.join(sanitize(file.name()));
        match file.read() {
            Ok(content) => {
                std::fs::write(&path, content)?;
                log::info!("wrote {}", path.display());
            }
            Err(e) => log::warn!("failed to read {:?}: {e}", file.name()),
        }

        for stream in file.streams() {
            let stream_path =
                destination.join(format!("{}.{stream}", sanitize(file.name())));
            match file.get_content(stream) {
                Ok(content) => {
                    std::fs::write(&stream_path, content)?;
                    log::info!("wrote {}", stream_path.display());
                }
                Err(e) => log::warn!(
                    "failed to read {:?} stream {stream:?}: {e}",
                    file.name()
                ),
            }
        }
    }

    for subdir in dir.subdirectories()? {
        extract(&subdir, &destination.join(sanitize(subdir.name())))?;
    }

    Ok(())
}

/// Strips path separators from a filesystem-supplied name before it's used
/// as a path component, so a crafted identifier can't escape the
/// destination directory.
fn sanitize(name: &str) -> String {
    name.replace(['/', '\\'], "_")
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
                let dest = args.destination.join(p.label());
                extract(&p.root()?, &dest)?;
            }
            DiscPartition::Apple(p) => {
                let dest = args.destination.join(p.label());
                extract(&p.root()?, &dest)?;
            }
        }
    }

    Ok(())
}
