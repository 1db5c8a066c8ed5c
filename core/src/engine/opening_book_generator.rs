//! A generator for creating a Connect Four opening book.

use crate::{OpeningBook, Position, Solver};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

// Each thread gets its own Solver instance, so position solves never share transposition-table
// state across threads.
thread_local! {
    static THREAD_SOLVER: RefCell<Solver> = RefCell::new(Solver::new());
}

/// A utility struct for generating a new `OpeningBook` by exhaustively solving every position
/// reachable within a given number of moves.
pub struct OpeningBookGenerator;

impl OpeningBookGenerator {
    /// Generates book entries for all positions up to a given depth.
    ///
    /// Positions are deduplicated by their reflection-canonical `key3`, so a position and its
    /// mirror image are only ever solved once.
    ///
    /// # Arguments
    /// * `max_depth` — the maximum number of moves to generate positions for; becomes the book's
    ///   stored depth `D`.
    /// * `log_size` — `log2` of the on-disk table's slot count, passed through to `OpeningBook`.
    /// * `key_width_bytes` — on-disk width of each partial key, one of 1, 2, 4.
    ///
    /// # Returns
    /// A new `OpeningBook` instance containing the solved positions.
    pub fn generate(max_depth: usize, log_size: u8, key_width_bytes: u8) -> OpeningBook {
        let scores = Arc::new(Mutex::new(HashMap::new()));

        // A set of all seen canonical keys, to avoid exploring a position and its mirror twice.
        let seen = Arc::new(Mutex::new(HashSet::new()));

        let start_pos = Position::new();
        seen.lock().unwrap().insert(start_pos.key3());
        let mut current_level = vec![start_pos];

        for depth in 0..=max_depth {
            if current_level.is_empty() {
                break;
            }

            println!("Processing depth {depth}, {} positions", current_level.len());
            let progress_bar = Self::create_progress_bar(current_level.len() as u64);

            let next_level_positions: Vec<Vec<Position>> = current_level
                .par_iter()
                .progress_with(progress_bar)
                .map(|pos| {
                    THREAD_SOLVER.with(|s| {
                        let mut solver = s.borrow_mut();
                        let key3 = pos.key3();
                        let score = solver.solve(pos);
                        scores.lock().unwrap().insert(key3, score);
                        Self::generate_children(pos)
                    })
                })
                .collect();

            let mut next_level = Vec::new();
            let mut seen_guard = seen.lock().unwrap();
            for positions in next_level_positions {
                for pos in positions {
                    if seen_guard.insert(pos.key3()) {
                        next_level.push(pos);
                    }
                }
            }
            current_level = next_level;
        }

        let scores = Arc::try_unwrap(scores)
            .expect("all worker threads have finished")
            .into_inner()
            .expect("mutex is not poisoned");

        println!("Generation complete. Final book size: {}", scores.len());
        OpeningBook::from_entries(&scores, max_depth as u8, log_size, key_width_bytes)
    }

    /// Helper function to generate all possible non-terminal child positions of a given position.
    fn generate_children(pos: &Position) -> Vec<Position> {
        let mut children = Vec::with_capacity(Position::WIDTH);
        let possible_moves = pos.possible();
        for col in 0..Position::WIDTH {
            if (possible_moves & Position::column_mask(col)) > 0 {
                let mut next_pos = *pos;
                next_pos.play_column(col);
                if !next_pos.is_won_position() {
                    children.push(next_pos);
                }
            }
        }
        children
    }

    /// Helper function to create a progress bar for tracking book generation.
    fn create_progress_bar(len: u64) -> ProgressBar {
        let progress_bar_style = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] \
                [{wide_bar:.cyan/blue}] {human_pos}/{human_len} ({eta})"
            )
            .unwrap()
            .progress_chars("#>-");
        ProgressBar::new(len).with_style(progress_bar_style)
    }
}
