//! This module implements Zobrist hashing for use in the transposition table.
//! See https://en.wikipedia.org/wiki/Zobrist_hashing for more information.
//!
//! Collisions in a 2^20-entry direct-mapped table must be vanishingly rare
//! even under deep tactical search, so keys here are 128 bits wide, composed
//! of two u64 words since Rust has no native 128-bit-wide bitwise-friendly
//! integer story for this kind of table indexing.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::board::Board;
use crate::pieces::Color;

pub const NUM_SQUARES: usize = 32;
/// 14 concrete identities plus the `EMPTY` and `COVERED` sentinels.
pub const NUM_PIECE_STATES: usize = 16;
pub const NUM_PLAYER_STATES: usize = 3;

/// Seed is fixed so that two processes produce byte-identical tables, which
/// keeps transposition-table keys reproducible across runs and tests.
const SEED: u64 = 0x7122;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Hash128 {
    pub hi: u64,
    pub lo: u64,
}

impl Hash128 {
    pub const ZERO: Hash128 = Hash128 { hi: 0, lo: 0 };

    /// Low `bits` bits of the value, used to index a `2^bits`-entry table.
    pub fn low_bits(&self, bits: u32) -> u64 {
        if bits >= 64 {
            self.lo
        } else {
            self.lo & ((1u64 << bits) - 1)
        }
    }
}

impl std::ops::BitXor for Hash128 {
    type Output = Hash128;
    fn bitxor(self, rhs: Hash128) -> Hash128 {
        Hash128 {
            hi: self.hi ^ rhs.hi,
            lo: self.lo ^ rhs.lo,
        }
    }
}

impl std::ops::BitXorAssign for Hash128 {
    fn bitxor_assign(&mut self, rhs: Hash128) {
        self.hi ^= rhs.hi;
        self.lo ^= rhs.lo;
    }
}

fn rand128(rng: &mut StdRng) -> Hash128 {
    Hash128 {
        hi: rng.gen::<u64>(),
        lo: rng.gen::<u64>(),
    }
}

pub struct ZobristHasher {
    // Random value for [square][piece-state], where piece-state is one of
    // the 14 concrete identities or the EMPTY/COVERED sentinels.
    piece: [[Hash128; NUM_PIECE_STATES]; NUM_SQUARES],

    // Random value for [player-state], indexed Red=0, Black=1, Unknown=2.
    player: [Hash128; NUM_PLAYER_STATES],
}

impl ZobristHasher {
    pub fn new() -> ZobristHasher {
        Self::with_seed(SEED)
    }

    pub fn with_seed(seed: u64) -> ZobristHasher {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut piece = [[Hash128::ZERO; NUM_PIECE_STATES]; NUM_SQUARES];
        for square in piece.iter_mut() {
            for state in square.iter_mut() {
                *state = rand128(&mut rng);
            }
        }
        let mut player = [Hash128::ZERO; NUM_PLAYER_STATES];
        for p in player.iter_mut() {
            *p = rand128(&mut rng);
        }
        ZobristHasher { piece, player }
    }

    pub fn piece_hash(&self, square: usize, state: u8) -> Hash128 {
        self.piece[square][state as usize]
    }

    pub fn player_hash(&self, color: Color) -> Hash128 {
        match color {
            Color::Red => self.player[0],
            Color::Black => self.player[1],
            Color::Unknown => self.player[2],
        }
    }

    // This is only ever called to check the incrementally maintained hash
    // against a from-scratch recomputation; production code updates
    // `Board::hash` directly via `piece_hash`/`player_hash`.
    pub fn full_hash(&self, board: &Board) -> Hash128 {
        let mut h = Hash128::ZERO;
        for square in 0..NUM_SQUARES {
            h ^= self.piece_hash(square, board.cell(square));
        }
        h ^= self.player_hash(board.side_to_move());
        h
    }
}

impl Default for ZobristHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_instances() {
        let a = ZobristHasher::new();
        let b = ZobristHasher::new();
        assert_eq!(a.piece_hash(0, 0), b.piece_hash(0, 0));
        assert_eq!(a.player_hash(Color::Red), b.player_hash(Color::Red));
    }

    #[test]
    fn low_bits_masks_correctly() {
        let h = Hash128 { hi: 0, lo: 0b1111_0000 };
        assert_eq!(h.low_bits(4), 0);
        assert_eq!(h.low_bits(8), 0b1111_0000);
    }
}
