//! A static evaluation function used when the search is cut off before reaching a terminal
//! position, scoring a position by the board control and near-term threats it offers each side.

use crate::Position;

/// Shifts used to detect the four alignment directions (vertical, horizontal, and both
/// diagonals) when scanning for two-in-a-row-with-two-empty patterns.
const ALIGNMENT_SHIFTS: [usize; 4] = [1, Position::HEIGHT, Position::HEIGHT + 1, Position::HEIGHT + 2];

/// Scores `position` from the perspective of the player to move.
///
/// Rewards center-column control, immediate (three-in-a-row) threats, and further-off
/// (two-in-a-row, two gaps) potential, penalising the mirror image of each for the opponent.
pub(crate) fn evaluate(position: &Position) -> i32 {
    let (current, mask) = position.raw_bitboards();
    let opponent = current ^ mask;
    let empty = position.empty_mask();

    let mut score = 0i32;

    let center_mask = Position::column_mask(Position::WIDTH / 2);
    score += (current & center_mask).count_ones() as i32 * 3;

    let player_threats = position.winning_position().count_ones() as i32;
    score += player_threats * 5;

    let opponent_threats = position.opponent_winning_position().count_ones() as i32;
    score -= opponent_threats * 6;

    let (player_potential, opponent_potential) =
        count_two_and_two_patterns(current, opponent, empty);
    score += player_potential as i32 * 2;
    score -= opponent_potential as i32 * 3;

    score
}

/// Counts cells participating in a "two stones, two empty cells" pattern along any alignment
/// direction, for both `player` and `opponent`: `XX..`, `..XX`, `X.X.`, and `.X.X`.
fn count_two_and_two_patterns(player: u64, opponent: u64, empty: u64) -> (u32, u32) {
    let mut player_mask = 0u64;
    let mut opponent_mask = 0u64;

    for shift in ALIGNMENT_SHIFTS {
        let player_1 = player >> shift;
        let player_2 = player >> (2 * shift);
        let player_3 = player >> (3 * shift);

        let opponent_1 = opponent >> shift;
        let opponent_2 = opponent >> (2 * shift);
        let opponent_3 = opponent >> (3 * shift);

        let empty_1 = empty >> shift;
        let empty_2 = empty >> (2 * shift);
        let empty_3 = empty >> (3 * shift);

        player_mask |= player & player_1 & empty_2 & empty_3;
        player_mask |= empty & empty_1 & player_2 & player_3;
        player_mask |= player & empty_1 & player_2 & empty_3;
        player_mask |= empty & player_1 & empty_2 & player_3;

        opponent_mask |= opponent & opponent_1 & empty_2 & empty_3;
        opponent_mask |= empty & empty_1 & opponent_2 & opponent_3;
        opponent_mask |= opponent & empty_1 & opponent_2 & empty_3;
        opponent_mask |= empty & opponent_1 & empty_2 & opponent_3;
    }

    (player_mask.count_ones(), opponent_mask.count_ones())
}
