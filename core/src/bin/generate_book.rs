//! Script to generate a Connect Four opening book.
//!
//! The script must be run with the maximum depth specified as the first command-line argument,
//! and an optional path to save the opening book to (default: book.bin).

use connect4_solver::OpeningBookGenerator;
use std::env;
use std::error::Error;

/// `log2` of the on-disk table's slot count; see `OpeningBook`'s file format.
const DEFAULT_LOG_SIZE: u8 = 23;

/// On-disk width, in bytes, of each stored partial key; 4 bytes comfortably covers `key3` values
/// at any book depth without truncation.
const DEFAULT_KEY_WIDTH_BYTES: u8 = 4;

fn main() -> Result<(), Box<dyn Error>> {
    // Collects and parses command-line arguments
    let args: Vec<String> = env::args().collect();
    let max_depth: usize = args
        .get(1)
        .and_then(|arg| arg.parse().ok())
        .expect("Please specify a maximum depth as the first command line argument.");
    let path = args.get(2).map_or("book.bin", |s| s.as_str());

    println!("Generating opening book up to depth {max_depth}...");
    let book = OpeningBookGenerator::generate(max_depth, DEFAULT_LOG_SIZE, DEFAULT_KEY_WIDTH_BYTES);

    println!("Saving book to '{path}'...");
    book.save(path)?;
    println!("Successfully saved opening book.");

    Ok(())
}
