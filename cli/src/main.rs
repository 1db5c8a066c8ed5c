//! A batch command-line front end for the Connect Four solver.
//!
//! Reads one move-sequence per line from standard input and writes the solved score of the
//! resulting position to standard output, one line at a time. An invalid move sequence prints
//! an empty line to standard output and a diagnostic to standard error, matching the external
//! interface described in the solver's opening-book and move-sequence conventions.

use clap::Parser;
use connect4_solver::{Position, Solver};
use std::io::{self, BufRead, Write};
use std::time::Duration;

/// Solves Connect Four positions supplied as move-sequence strings on standard input.
#[derive(Parser)]
#[command(name = "connect4-solver", about = "A strong Connect Four solver")]
struct Cli {
    /// Path to a precomputed opening book file. A malformed or missing book is non-fatal: the
    /// solver falls back to unaided search and a diagnostic is printed to standard error.
    #[arg(long)]
    book: Option<String>,

    /// Maximum search depth in plies. Omit for an exact solve.
    #[arg(long)]
    max_depth: Option<usize>,

    /// Wall-clock time budget per position, in seconds. Omit for an exact solve.
    #[arg(long)]
    time_limit: Option<f64>,
}

fn main() {
    let cli = Cli::parse();

    let mut solver = Solver::new();
    if let Some(path) = &cli.book {
        // `load_opening_book` already prints its own diagnostic on failure; the solver simply
        // continues without book assistance.
        let _ = solver.load_opening_book(path);
    }

    let time_limit = cli.time_limit.map(Duration::from_secs_f64);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in io::stdin().lock().lines() {
        let line = line.expect("failed to read standard input");
        let moves = line.trim();

        match Position::from_moves(moves) {
            Ok(position) => {
                solver.reset();
                let score = if cli.max_depth.is_some() || time_limit.is_some() {
                    let max_depth = cli.max_depth.unwrap_or(Position::BOARD_SIZE);
                    match solver.solve_to_depth(&position, max_depth, time_limit) {
                        Ok((score, _)) => Some(score),
                        Err(err) => {
                            eprintln!("search cancelled for '{moves}': {err}");
                            None
                        }
                    }
                } else {
                    Some(solver.solve(&position))
                };

                match score {
                    Some(score) => writeln!(out, "{score}").expect("failed to write to standard output"),
                    None => writeln!(out).expect("failed to write to standard output"),
                }
            }
            Err(err) => {
                eprintln!("invalid position '{moves}': {err}");
                writeln!(out).expect("failed to write to standard output");
            }
        }
    }
}
