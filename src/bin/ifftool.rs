//! Inspect, validate and rewrite iff files from the command line.
//! Set `RUST_LOG=iff=trace` to follow the parser chunk by chunk.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use iff::prelude::*;
use iff::ilbm::{self, Image};


#[derive(Parser)]
#[command(name = "ifftool")]
#[command(about = "Inspect, validate and rewrite iff files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {

    /// Print the chunk tree of a file
    Dump {
        file: PathBuf,
    },

    /// Validate a file, including the rules of bitmap images
    Check {
        file: PathBuf,
    },

    /// Read a file and write it again, comparing the bytes with the original
    Roundtrip {
        file: PathBuf,

        /// Also write the rewritten file to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the bitmap images in a file
    Images {
        file: PathBuf,
    },
}


fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Dump { file } => dump(&file),
        Command::Check { file } => check(&file),
        Command::Roundtrip { file, output } => roundtrip(&file, output.as_deref()),
        Command::Images { file } => images(&file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {}", error);
            ExitCode::FAILURE
        }
    }
}

fn dump(file: &Path) -> UnitResult {
    let chunk = Chunk::read_from_file(file, ilbm::registry())?;
    print!("{}", chunk);
    Ok(())
}

fn check(file: &Path) -> UnitResult {
    let chunk = Chunk::read_from_file(file, ilbm::registry())?;
    chunk.validate(ilbm::registry())?;

    if chunk.search_forms(&ilbm::IMAGE_FORM_TYPES).is_empty() {
        println!("{}: valid", file.display());
        return Ok(());
    }

    let images = ilbm::extract_images(&chunk)?;
    ilbm::check_images(&chunk, ilbm::registry(), &images)?;
    println!("{}: valid, {} images", file.display(), images.len());
    Ok(())
}

fn roundtrip(file: &Path, output: Option<&Path>) -> UnitResult {
    let original = std::fs::read(file)?;
    let chunks = Chunk::read_all_from_buffered(original.as_slice(), ilbm::registry())?;

    let mut written = Vec::with_capacity(original.len());
    for chunk in &chunks {
        chunk.write(&mut written)?;
    }

    if let Some(output) = output {
        std::fs::write(output, &written)?;
    }

    match written.iter().zip(&original).position(|(a, b)| a != b) {
        Some(position) => Err(Error::Invalid(format!("rewritten file differs at byte {}", position).into())),
        None if written.len() != original.len() => Err(Error::Invalid(format!(
            "rewritten file has {} bytes, but the original has {} bytes",
            written.len(), original.len()
        ).into())),
        None => {
            println!("{}: {} bytes are identical", file.display(), written.len());
            Ok(())
        }
    }
}

fn images(file: &Path) -> UnitResult {
    let chunk = Chunk::read_from_file(file, ilbm::registry())?;

    for (index, image) in ilbm::extract_images(&chunk)?.iter().enumerate() {
        describe(index, image)?;
    }

    Ok(())
}

fn describe(index: usize, image: &Image<'_>) -> UnitResult {
    let header = image.header()?;

    println!(
        "#{} {}: {}x{} at {},{}, {} planes, {}, masking {}",
        index, image.form_type, header.width, header.height, header.x, header.y,
        header.planes, header.compression()?, header.masking
    );

    if let Some(color_map) = image.color_map {
        println!("  palette: {} colors", color_map.registers.len());
    }

    if let Some(viewport) = image.viewport {
        println!(
            "  viewport: {:#x}, hold-and-modify {}, extra-halfbrite {}",
            viewport.mode, viewport.is_hold_and_modify(), viewport.is_extra_halfbrite()
        );
    }

    for range in &image.color_ranges {
        println!(
            "  color range {}..={}, rate {}, active {}",
            range.low, range.high, range.rate, range.is_active()
        );
    }

    for range in &image.dranges {
        println!("  dynamic range {}..={}, rate {}", range.min, range.max, range.rate);
    }

    for cycle in &image.cycle_infos {
        println!(
            "  cycle {}..={}, direction {}, {}s {}us",
            cycle.start, cycle.end, cycle.direction, cycle.seconds, cycle.microseconds
        );
    }

    Ok(())
}
