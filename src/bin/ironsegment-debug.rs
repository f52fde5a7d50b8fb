use std::{fs::File, io::BufReader, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use ironsegment::{debug::debug_file, reader::FileReader};

/// Produce a listing of the sections in an IronSegment file
///
/// Each section is shown with its offset, identifier and size.  Manifests are decoded and image
/// sections show their image ID.
#[derive(Parser)]
struct Args {
    /// The path to the file to dump
    file: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let file = File::open(&args.file).with_context(|| format!("Opening {:?}", args.file))?;
    let mut reader = FileReader::open(BufReader::new(file))
        .with_context(|| format!("Reading {:?}", args.file))?;
    debug_file(&mut std::io::stdout().lock(), &mut reader)
}
