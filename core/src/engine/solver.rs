//! Provides the core solving logic for the Connect Four AI.

use super::heuristic;
use crate::{MoveSorter, OpeningBook, OpeningBookError, Position, TTFlag, TranspositionTable};
use std::fmt;
use std::time::{Duration, Instant};

/// Raised when a depth- or time-limited search is interrupted before it completes.
///
/// This unwinds all the way up to the iterative-deepening loop in [`Solver::solve_to_depth`],
/// which falls back to the best result from the most recently *completed* depth.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SearchCancelled;

impl fmt::Display for SearchCancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "search cancelled before completion")
    }
}

impl std::error::Error for SearchCancelled {}

/// A strong solver for finding the exact score of Connect Four positions.
///
/// This struct implements a high-performance negamax search algorithm with several
/// optimisations, including:
/// - Alpha-beta pruning with principal-variation search
/// - Score-based move ordering to prioritise stronger moves
/// - A transposition table to cache results of previously seen positions
/// - A binary search on the score for faster convergence when solving exactly
/// - An optional opening book for instant lookups of early-game positions
#[derive(Debug)]
pub struct Solver {
    /// A counter for the number of nodes explored since the last reset.
    pub explored_positions: usize,

    /// The transposition table used for caching search results.
    pub transposition_table: TranspositionTable,

    /// The opening book for instant lookups of early-game positions, if one was loaded.
    pub opening_book: Option<OpeningBook>,

    /// How often, in explored nodes, the search polls the clock for a time-limit check.
    /// Polling every node would dominate runtime at the bottom of the tree; polling too rarely
    /// would make cancellation sluggish.
    time_check_interval: usize,
}

impl Solver {
    /// A pre-sorted list of columns to check, starting from the centre column.
    const COLUMNS: [usize; Position::WIDTH] = const {
        let mut columns = [0; Position::WIDTH];
        let mut i = 0;
        while i < Position::WIDTH {
            columns[i] = (Position::WIDTH as i32 / 2 + (1 - 2 * (i as i32 % 2)) * (i as i32 + 1) / 2) as usize;
            i += 1;
        }
        columns
    };

    /// Creates a new, empty `Solver` with no opening book loaded.
    pub fn new() -> Solver {
        Self::default()
    }

    /// Attempts to load an opening book from the given path.
    ///
    /// Any header mismatch, truncated file, or out-of-range parameter leaves the book
    /// unloaded; a diagnostic is printed to standard error and the solver proceeds without
    /// book assistance.
    pub fn load_opening_book(&mut self, path: &str) -> Result<(), OpeningBookError> {
        match OpeningBook::load(path) {
            Ok(book) => {
                self.opening_book = Some(book);
                Ok(())
            }
            Err(err) => {
                eprintln!("failed to load opening book from {path}: {err}");
                Err(err)
            }
        }
    }

    /// Resets the solver's state, clearing the transposition table and node counter.
    pub fn reset(&mut self) {
        self.explored_positions = 0;
        self.transposition_table.reset();
    }

    /// Solves a position to find its exact score.
    ///
    /// This function uses a binary search over the possible score range, repeatedly calling the
    /// negamax search with a null window to test if the score is above a certain value. This
    /// allows faster convergence to the true score.
    ///
    /// Assumes that the given position is valid and not already won by either player.
    ///
    /// # Returns
    /// The exact score of the position, which reflects the outcome of the game assuming that both
    /// players play perfectly. A position has:
    /// - A positive score if the current player will win. 1 if they win with their last move, 2 if
    ///   they win with their second to last move, ...
    /// - A null score if the game will end in a draw
    /// - A negative score if the current player will lose. -1 if the opponent wins with their last
    ///   move, -2 if the opponent wins with their second to last move, ...
    pub fn solve(&mut self, position: &Position) -> i32 {
        self.explored_positions = 0;

        if let Some(score) = self.opening_book.as_ref().and_then(|book| book.get(position)) {
            return score;
        }

        let remaining = (Position::BOARD_SIZE - position.moves()) as i32;
        let mut min = -remaining / 2;
        let mut max = (remaining + 1) / 2;

        while min < max {
            let mut mid = min + (max - min) / 2;
            if mid <= 0 && min / 2 < mid {
                mid = min / 2
            } else if mid >= 0 && max / 2 > mid {
                mid = max / 2
            }

            // A null-window search around `mid`, with no time limit, can never be cancelled.
            let score = self
                .negamax(position, remaining as u8, mid, mid + 1, None, None)
                .expect("an unlimited search is never cancelled");

            if score <= mid {
                max = score;
            } else {
                min = score;
            }
        }

        min
    }

    /// Like [`solve`](Self::solve), but also returns the column of a best move achieving that
    /// score, if the position has any legal moves remaining.
    ///
    /// If the position already wins in one, that move is returned directly without another
    /// search. Otherwise, each legal root move is tried in center-out column order by negating
    /// `solve` on the resulting child, and the first one matching the overall score is returned.
    pub fn solve_with_move(&mut self, position: &Position) -> (i32, Option<usize>) {
        if let Some(column) = Self::immediate_winning_move(position) {
            let score = (Position::BOARD_SIZE + 1 - position.moves()) as i32 / 2;
            return (score, Some(column));
        }

        let score = self.solve(position);
        let best_move = Self::COLUMNS.iter().copied().find(|&column| {
            if !position.can_play(column) {
                return false;
            }
            let mut child = *position;
            child.play_column(column);
            -self.solve(&child) == score
        });

        (score, best_move)
    }

    /// Scores every legal column by negating [`solve`](Self::solve) on the resulting child.
    /// `None` marks a full column. Used for root move selection and analysis tooling.
    pub fn get_all_move_scores(&mut self, position: &Position) -> [Option<i32>; Position::WIDTH] {
        let mut scores = [None; Position::WIDTH];
        if position.is_won_position() || position.moves() == Position::BOARD_SIZE {
            return scores;
        }

        let possible_moves = position.possible();
        for &column in Self::COLUMNS.iter() {
            if possible_moves & Position::column_mask(column) == 0 {
                continue;
            }

            if position.is_winning_move(column) {
                scores[column] = Some((Position::BOARD_SIZE + 1 - position.moves()) as i32 / 2);
                continue;
            }

            let mut child = *position;
            child.play_column(column);
            scores[column] = Some(-self.solve(&child));
        }

        scores
    }

    /// Searches iteratively from depth 1 up to `max_depth`, optionally bounded by a wall-clock
    /// `time_limit`. Returns the score and best move of the deepest *completed* iteration.
    ///
    /// Each completed iteration's best move is carried forward as a principal-variation hint for
    /// the next, deeper iteration's move ordering. A cancellation that interrupts a mid-search
    /// iteration silently falls back to the previous, completed iteration's result; only a
    /// cancellation before depth 1 itself completes is surfaced as `Err(SearchCancelled)`.
    pub fn solve_to_depth(
        &mut self,
        position: &Position,
        max_depth: usize,
        time_limit: Option<Duration>,
    ) -> Result<(i32, Option<usize>), SearchCancelled> {
        self.explored_positions = 0;

        if let Some(column) = Self::immediate_winning_move(position) {
            let score = (Position::BOARD_SIZE + 1 - position.moves()) as i32 / 2;
            return Ok((score, Some(column)));
        }

        if let Some(score) = self.opening_book.as_ref().and_then(|book| book.get(position)) {
            return Ok((score, self.best_move_hint(position)));
        }

        let deadline = time_limit.map(|limit| Instant::now() + limit);
        let remaining = (Position::BOARD_SIZE - position.moves()) as usize;
        let max_depth = max_depth.min(remaining);

        let mut best: Option<(i32, Option<usize>)> = None;
        let mut pv_move = None;

        for depth in 1..=max_depth {
            let alpha = -((Position::BOARD_SIZE - position.moves()) as i32) / 2;
            let beta = (Position::BOARD_SIZE - position.moves()) as i32 / 2 + 1;

            match self.negamax(position, depth as u8, alpha, beta, pv_move, deadline) {
                Ok(score) => {
                    let mv = self.best_move_hint(position);
                    best = Some((score, mv));
                    pv_move = mv;

                    // A confirmed mate score cannot be improved on by searching deeper.
                    if score.abs() >= Position::MAX_SCORE {
                        break;
                    }
                }
                Err(SearchCancelled) => break,
            }
        }

        best.ok_or(SearchCancelled)
    }

    /// Returns the column of a move that wins immediately, if one exists.
    fn immediate_winning_move(position: &Position) -> Option<usize> {
        Self::COLUMNS
            .iter()
            .copied()
            .find(|&column| position.can_play(column) && position.is_winning_move(column))
    }

    /// Reads back the best move recorded for `position` in the transposition table, if present.
    fn best_move_hint(&self, position: &Position) -> Option<usize> {
        self.transposition_table
            .get(position.key())
            .and_then(|entry| entry.best_move)
    }

    /// Checks whether the time limit, if any, has been reached. Polled at the top of each node
    /// and before each child recursion so that cancellation is prompt without dominating runtime.
    #[inline(always)]
    fn time_up(&self, deadline: Option<Instant>) -> bool {
        self.explored_positions % self.time_check_interval == 0
            && deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// The core negamax search function with alpha-beta pruning and principal-variation search.
    ///
    /// `depth` counts down remaining plies to search; a full, exact solve passes the number of
    /// empty cells remaining, while a depth-limited search passes a smaller bound and falls back
    /// to [`heuristic::evaluate`] at the frontier.
    fn negamax(
        &mut self,
        position: &Position,
        depth: u8,
        mut alpha: i32,
        mut beta: i32,
        pv_move: Option<usize>,
        deadline: Option<Instant>,
    ) -> Result<i32, SearchCancelled> {
        self.explored_positions += 1;
        if self.time_up(deadline) {
            return Err(SearchCancelled);
        }

        // The caller never recurses into a position where the opponent has already won; the
        // check here covers the top-level call made directly against a possibly-terminal board.
        if position.is_won_position() {
            return Ok(-((Position::BOARD_SIZE - position.moves()) as i32) / 2);
        }

        if position.moves() == Position::BOARD_SIZE {
            return Ok(0);
        }

        if position.can_win_next() {
            return Ok((Position::BOARD_SIZE + 1 - position.moves()) as i32 / 2);
        }

        if depth == 0 {
            return Ok(heuristic::evaluate(position));
        }

        // Tightens the lower bound: the opponent cannot win before their next move.
        let min = -((Position::BOARD_SIZE - position.moves()) as i32 - 2) / 2;
        if alpha < min {
            if min >= beta {
                return Ok(min);
            }
            alpha = min;
        }

        // Tightens the upper bound: we cannot win immediately (handled above).
        let max = ((Position::BOARD_SIZE - position.moves()) as i32 - 1) / 2;
        if beta > max {
            if alpha >= max {
                return Ok(max);
            }
            beta = max;
        }

        let original_alpha = alpha;
        let key = position.key();
        let mut tt_best_move = None;
        if let Some(entry) = self.transposition_table.get(key) {
            tt_best_move = entry.best_move;
            if entry.depth >= depth {
                match entry.flag {
                    TTFlag::Exact => return Ok(entry.value),
                    TTFlag::LowerBound => alpha = alpha.max(entry.value),
                    TTFlag::UpperBound => beta = beta.min(entry.value),
                }
                if alpha >= beta {
                    return Ok(entry.value);
                }
            }
        }

        if let Some(score) = self.opening_book.as_ref().and_then(|book| book.get(position)) {
            return Ok(score);
        }

        let possible_moves = if depth as usize == Position::BOARD_SIZE - position.moves() {
            position.possible_non_losing_moves()
        } else {
            position.possible()
        };
        if possible_moves == 0 {
            return Ok(-((Position::BOARD_SIZE - position.moves()) as i32) / 2);
        }

        let moves = self.ordered_moves(position, possible_moves, pv_move, tt_best_move);

        let mut best_score = i32::MIN;
        let mut best_move = None;
        let mut first = true;

        for column in moves {
            let mut next_position = *position;
            next_position.play_column(column);

            let score = if first {
                -self.negamax(&next_position, depth - 1, -beta, -alpha, None, deadline)?
            } else {
                let probe = -self.negamax(&next_position, depth - 1, -alpha - 1, -alpha, None, deadline)?;
                if probe > alpha && probe < beta {
                    -self.negamax(&next_position, depth - 1, -beta, -alpha, None, deadline)?
                } else {
                    probe
                }
            };
            first = false;

            if score > best_score {
                best_score = score;
                best_move = Some(column);
            }
            if best_score > alpha {
                alpha = best_score;
            }
            if alpha >= beta {
                self.transposition_table
                    .put(key, best_score, TTFlag::LowerBound, depth, best_move);
                return Ok(best_score);
            }
        }

        let flag = if best_score <= original_alpha {
            TTFlag::UpperBound
        } else {
            TTFlag::Exact
        };
        self.transposition_table.put(key, best_score, flag, depth, best_move);

        Ok(best_score)
    }

    /// Builds a move-ordering list with, from highest to lowest priority: the PV hint, the TT's
    /// recorded best move, then the rest by immediate winning/blocking potential and center-biased
    /// column order.
    fn ordered_moves(
        &self,
        position: &Position,
        possible_moves: u64,
        pv_move: Option<usize>,
        tt_best_move: Option<usize>,
    ) -> MoveSorter {
        const SCORE_PV_MOVE: i32 = 30_000;
        const SCORE_TT_MOVE: i32 = 25_000;
        const SCORE_WINNING_MOVE: i32 = 20_000_000;
        const SCORE_BLOCKING_MOVE: i32 = 15_000_000;

        let opponent_wins = position.opponent_winning_position();

        let mut moves = MoveSorter::new();
        for &column in Self::COLUMNS.iter() {
            let move_bit = possible_moves & Position::column_mask(column);
            if move_bit == 0 {
                continue;
            }

            // A winning move would already have been caught above, in the caller, but the tier
            // is kept here for the (harmless, never-taken) case of a regenerated move list.
            let score = if pv_move == Some(column) {
                SCORE_PV_MOVE
            } else if tt_best_move == Some(column) {
                SCORE_TT_MOVE
            } else if position.is_winning_move(column) {
                SCORE_WINNING_MOVE
            } else if move_bit & opponent_wins != 0 {
                SCORE_BLOCKING_MOVE
            } else {
                position.score_move(move_bit) as i32
            };

            moves.add(column, score);
        }
        moves
    }
}

/// Default constructor for the `Solver` struct: an empty transposition table and no opening book.
impl Default for Solver {
    fn default() -> Solver {
        Solver {
            explored_positions: 0,
            transposition_table: TranspositionTable::new(),
            opening_book: None,
            time_check_interval: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_position_is_a_draw() {
        let mut solver = Solver::new();
        let position = Position::new();
        assert_eq!(solver.solve(&position), 0);
    }

    #[test]
    fn an_immediate_winning_move_scores_as_a_win_in_one() {
        let mut solver = Solver::new();
        let position = Position::from_moves("4455454").expect("valid moves");
        assert!(position.can_win_next());

        let (score, best_move) = solver.solve_with_move(&position);
        assert_eq!(score, (Position::BOARD_SIZE + 1 - position.moves()) as i32 / 2);
        assert!(position.is_winning_move(best_move.expect("a winning move exists")));
    }

    #[test]
    fn a_position_losing_in_two_plies_scores_as_a_near_term_loss() {
        let mut solver = Solver::new();
        // Five stones piled in column 4 with the opponent to move next wins for them.
        let position = Position::from_moves("44444").expect("valid moves");
        let score = solver.solve(&position);
        assert_eq!(score, -(Position::BOARD_SIZE as i32 - 5) / 2);
    }

    #[test]
    fn solve_to_depth_matches_an_exact_solve_near_the_end_of_the_game() {
        let mut solver = Solver::new();
        let position = Position::from_moves("4455454").expect("valid moves");

        let (exact_score, exact_move) = solver.solve_with_move(&position);

        let mut solver = Solver::new();
        let (limited_score, limited_move) = solver.solve_to_depth(&position, 1, None).expect("not cancelled");
        assert_eq!(limited_score, exact_score);
        assert_eq!(limited_move, exact_move);
    }

    #[test]
    fn negamax_at_the_depth_limit_still_reports_an_immediate_win_instead_of_the_heuristic() {
        // A non-root node reached with depth == 0: the side to move can complete a horizontal
        // four along the bottom row (columns 0-3), so can_win_next() must win out over the
        // depth==0 heuristic fallback regardless of which check negamax performs first.
        let mut solver = Solver::new();
        let position = Position::from_moves("172637").expect("valid moves");
        assert!(position.can_win_next());

        let win_score = (Position::BOARD_SIZE + 1 - position.moves()) as i32 / 2;
        let score = solver
            .negamax(&position, 0, -Position::MAX_SCORE, Position::MAX_SCORE + 1, None, None)
            .expect("an unlimited search is never cancelled");
        assert_eq!(score, win_score);
    }

    #[test]
    fn solve_to_depth_errors_when_the_time_limit_expires_before_depth_one_completes() {
        // Polling every node (instead of the default 4096) makes the already-elapsed deadline
        // take effect on the very first node, before depth 1 can complete.
        let mut solver = Solver { time_check_interval: 1, ..Solver::new() };
        let position = Position::new();
        let result = solver.solve_to_depth(&position, Position::BOARD_SIZE, Some(Duration::from_secs(0)));
        assert_eq!(result, Err(SearchCancelled));
    }

    #[test]
    fn get_all_move_scores_agrees_with_solve_with_move() {
        let mut solver = Solver::new();
        let position = Position::from_moves("33").expect("valid moves");

        let scores = solver.get_all_move_scores(&position);
        let (score, best_move) = solver.solve_with_move(&position);

        let best_move = best_move.expect("a move exists");
        assert_eq!(scores[best_move], Some(score));
        assert!(scores.iter().flatten().all(|&s| s <= score));
    }

    #[test]
    fn get_all_move_scores_leaves_full_columns_as_none() {
        let mut solver = Solver::new();
        let position = Position::from_moves("111111").expect("column 1 filled to the brim");

        let scores = solver.get_all_move_scores(&position);
        assert_eq!(scores[0], None);
        assert!(scores[1..].iter().all(|s| s.is_some()));
    }

    #[test]
    fn reset_clears_the_explored_position_counter_and_table() {
        let mut solver = Solver::new();
        let position = Position::new();
        solver.solve(&position);
        assert!(solver.explored_positions > 0);

        solver.reset();
        assert_eq!(solver.explored_positions, 0);
        assert!(solver.transposition_table.get(position.key()).is_none());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Plays a sequence of column choices against a fresh board, skipping illegal or post-game
    /// moves, and returns the resulting position along with the columns actually played.
    fn play_sequence(choices: &[usize]) -> (Position, Vec<usize>) {
        let mut pos = Position::new();
        let mut played = Vec::new();
        for &choice in choices {
            if pos.is_won_position() {
                break;
            }
            let col = choice % Position::WIDTH;
            if pos.can_play(col) {
                pos.play_column(col);
                played.push(col);
            }
        }
        (pos, played)
    }

    /// Biased towards the end of the game so each solve stays cheap enough to run many
    /// property-test cases.
    fn arbitrary_late_game_moves() -> impl Strategy<Value = Vec<usize>> {
        proptest::collection::vec(0..Position::WIDTH, Position::BOARD_SIZE - 8..=Position::BOARD_SIZE)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn solve_is_deterministic(choices in arbitrary_late_game_moves()) {
            let (position, _) = play_sequence(&choices);
            let mut a = Solver::new();
            let mut b = Solver::new();
            prop_assert_eq!(a.solve(&position), b.solve(&position));
        }

        #[test]
        fn solve_agrees_with_its_left_right_mirror(choices in arbitrary_late_game_moves()) {
            let (position, played) = play_sequence(&choices);
            let mirrored_moves: Vec<usize> = played.iter().map(|c| Position::WIDTH - 1 - c).collect();
            let (mirrored, _) = play_sequence(&mirrored_moves);

            let mut solver = Solver::new();
            let mut mirrored_solver = Solver::new();
            prop_assert_eq!(solver.solve(&position), mirrored_solver.solve(&mirrored));
        }

        #[test]
        fn solve_stays_within_theoretical_score_bounds(choices in arbitrary_late_game_moves()) {
            let (position, _) = play_sequence(&choices);
            if !position.is_won_position() && position.moves() < Position::BOARD_SIZE {
                let mut solver = Solver::new();
                let score = solver.solve(&position);
                prop_assert!(score >= Position::MIN_SCORE && score <= Position::MAX_SCORE);
            }
        }

        #[test]
        fn solve_with_move_picks_a_move_that_achieves_the_reported_score(choices in arbitrary_late_game_moves()) {
            let (position, _) = play_sequence(&choices);
            prop_assume!(!position.is_won_position() && position.moves() < Position::BOARD_SIZE);

            let mut solver = Solver::new();
            let (score, best_move) = solver.solve_with_move(&position);
            let best_move = best_move.expect("a non-terminal position always has a legal move");

            let mut child = position;
            child.play_column(best_move);
            let mut verifier = Solver::new();
            prop_assert_eq!(-verifier.solve(&child), score);
        }

        #[test]
        fn a_position_looked_up_in_its_own_book_matches_the_solver(choices in arbitrary_late_game_moves()) {
            let (position, _) = play_sequence(&choices);
            prop_assume!(!position.is_won_position());

            let mut solver = Solver::new();
            let score = solver.solve(&position);

            let mut entries = std::collections::HashMap::new();
            entries.insert(position.key3(), score);
            let book = OpeningBook::from_entries(&entries, position.moves() as u8, 10, 4);

            prop_assert_eq!(book.get(&position), Some(score));
        }
    }
}
