//! A transposition table implementation for storing and retrieving game state evaluations.

use crate::utils::next_prime;

/// A flag indicating what kind of information a transposition table entry represents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TTFlag {
    /// Flag for when the value is the exact score of a position.
    #[default]
    Exact,
    /// Flag for when the value is a lower bound for the position's score.
    LowerBound,
    /// Flag for when the value is an upper bound for the position's score.
    UpperBound,
}

/// Represents a single entry in the transposition table.
#[derive(Debug, Default, Copy, Clone)]
pub struct TTEntry {
    /// The low 32 bits of the position's key, used to verify the entry.
    pub key: u32,
    /// The evaluated score of the position.
    pub value: i32,
    /// The type of score held in the entry.
    pub flag: TTFlag,
    /// The search depth at which this entry was recorded.
    pub depth: u8,
    /// The column of the best move found at this entry, if any.
    pub best_move: Option<usize>,
    /// The age of the transposition table when the entry was created.
    age: u32,
}

/// A transposition table that stores results from previous searches to avoid
/// re-computing evaluations for the same game state.
///
/// Collisions are resolved with an always-replace policy, except that an entry is only
/// overwritten by a shallower one if the incumbent's own search depth does not exceed the
/// incoming one: deeper results are more expensive to recompute and are worth protecting
/// from eviction by cheaper, shallower probes.
#[derive(Debug)]
pub struct TranspositionTable {
    /// A list of table entries.
    entries: Vec<TTEntry>,
    /// The current age of the table, used to invalidate old entries without clearing them.
    age: u32,
}

impl TranspositionTable {
    /// Log2 of the table's slot count; the actual slot count is the smallest prime `>= 2^LOG_SIZE`.
    pub const LOG_SIZE: u32 = 24;

    /// The number of entries in the table. A large prime number is chosen to help avoid collisions.
    pub const SIZE: u64 = next_prime(1 << Self::LOG_SIZE);

    /// Creates a new empty transposition table, allocating space for all entries.
    pub fn new() -> TranspositionTable {
        Self::default()
    }

    /// Calculates the table index for a given position's key.
    #[inline(always)]
    fn index(&self, key: u64) -> usize {
        (key % Self::SIZE) as usize
    }

    /// Clears the table by incrementing the current age. O(1): all prior entries are
    /// implicitly invalidated the next time they're probed, without walking the array.
    pub fn reset(&mut self) {
        self.age = self.age.wrapping_add(1);
    }

    /// Stores a new entry in the table.
    ///
    /// Deep-preferred replacement: a still-valid incumbent entry is kept unless the new
    /// entry's search depth is at least as large.
    pub fn put(&mut self, key: u64, value: i32, flag: TTFlag, depth: u8, best_move: Option<usize>) {
        let pos = self.index(key);
        let incumbent = &self.entries[pos];
        let incumbent_is_current = incumbent.age == self.age;

        if incumbent_is_current && incumbent.depth > depth {
            return;
        }

        self.entries[pos] = TTEntry {
            key: key as u32,
            value,
            flag,
            depth,
            best_move,
            age: self.age,
        };
    }

    /// Retrieves an entry from the table if it exists and is valid.
    pub fn get(&self, key: u64) -> Option<&TTEntry> {
        let pos = self.index(key);
        let entry = &self.entries[pos];

        // Checks that both the key and age match to ensure correctness
        if entry.key == key as u32 && entry.age == self.age {
            Some(entry)
        } else {
            None
        }
    }
}

/// Default constructor for the `TranspositionTable` struct.
impl Default for TranspositionTable {
    fn default() -> TranspositionTable {
        TranspositionTable {
            entries: vec![TTEntry::default(); Self::SIZE as usize],
            age: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let mut table = TranspositionTable::new();
        table.put(42, 7, TTFlag::Exact, 5, Some(3));

        let entry = table.get(42).expect("entry should be present");
        assert_eq!(entry.value, 7);
        assert_eq!(entry.flag, TTFlag::Exact);
        assert_eq!(entry.depth, 5);
        assert_eq!(entry.best_move, Some(3));
    }

    #[test]
    fn get_misses_for_unknown_key() {
        let table = TranspositionTable::new();
        assert!(table.get(12345).is_none());
    }

    #[test]
    fn reset_invalidates_all_entries() {
        let mut table = TranspositionTable::new();
        table.put(42, 7, TTFlag::Exact, 5, None);
        table.reset();
        assert!(table.get(42).is_none());
    }

    #[test]
    fn deeper_entry_is_not_evicted_by_a_shallower_one() {
        let mut table = TranspositionTable::new();
        // Pick two keys that collide at the same slot.
        let key_a = 1u64;
        let key_b = key_a + TranspositionTable::SIZE;

        table.put(key_a, 10, TTFlag::Exact, 8, Some(1));
        table.put(key_b, 99, TTFlag::Exact, 2, Some(2));

        // The deeper entry for key_a should survive, so key_b now reads as a mismatched key.
        assert!(table.get(key_b).is_none());
        let entry = table.get(key_a).expect("deeper entry should remain");
        assert_eq!(entry.value, 10);
    }
}
