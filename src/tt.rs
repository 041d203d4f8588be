//! Direct-mapped transposition table keyed by the low bits of a 128-bit hash.

use crate::board::ChessMove;
use crate::zobrist::Hash128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Empty,
    Exact,
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub flag: Flag,
    pub hash: Hash128,
    pub score: f32,
    pub depth: u8,
    pub best_move: ChessMove,
}

impl Entry {
    fn empty() -> Entry {
        Entry {
            flag: Flag::Empty,
            hash: Hash128::ZERO,
            score: 0.0,
            depth: 0,
            best_move: ChessMove::sentinel(),
        }
    }
}

pub struct TranspositionTable {
    bits: u32,
    entries: Vec<Entry>,
}

impl TranspositionTable {
    pub fn new(bits: u32) -> TranspositionTable {
        let size = 1usize << bits;
        TranspositionTable {
            bits,
            entries: vec![Entry::empty(); size],
        }
    }

    fn index(&self, hash: Hash128) -> usize {
        hash.low_bits(self.bits) as usize
    }

    /// Returns the slot's entry regardless of whether its hash matches;
    /// callers must compare `entry.hash` against the probed position.
    pub fn probe(&self, hash: Hash128) -> &Entry {
        &self.entries[self.index(hash)]
    }

    pub fn store(&mut self, hash: Hash128, score: f32, depth: u8, flag: Flag, best_move: ChessMove) {
        let idx = self.index(hash);
        self.entries[idx] = Entry {
            flag,
            hash,
            score,
            depth,
            best_move,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::ChessMove;

    #[test]
    fn store_then_probe_round_trips() {
        let mut table = TranspositionTable::new(10);
        let hash = Hash128 { hi: 1, lo: 2 };
        table.store(hash, 42.0, 5, Flag::Exact, ChessMove::Flip { pos: 3, result: 0 });
        let entry = table.probe(hash);
        assert_eq!(entry.flag, Flag::Exact);
        assert_eq!(entry.hash, hash);
        assert_eq!(entry.score, 42.0);
        assert_eq!(entry.depth, 5);
    }

    #[test]
    fn fresh_table_slots_are_empty() {
        let table = TranspositionTable::new(4);
        let entry = table.probe(Hash128 { hi: 0, lo: 7 });
        assert_eq!(entry.flag, Flag::Empty);
    }
}
