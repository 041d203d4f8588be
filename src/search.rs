//! NegaScout search with chance nodes over flip outcomes.
//!
//! Iterative deepening drives a sequence of aspiration-windowed calls into
//! `negascout`, reusing the transposition table between iterations so that
//! the principal variation found at depth `d` seeds move ordering at depth
//! `d + 1`.

use std::time::{Duration, Instant};

use log::info;

use crate::board::{Board, ChessMove, Undo};
use crate::pieces::{self, Color, Piece};
use crate::tt::{Flag, TranspositionTable};

pub const INF: f32 = 1e9;
pub const DEPTH_HARD_LIMIT: u8 = 15;
const ASPIRATION_RANGE: f32 = 5.0;
const TIME_THRESHOLD: Duration = Duration::from_millis(100);
const MATE_SCORE: f32 = 2000.0;
const FLIPS_PER_DEPTH_INCREASE: u32 = 8;
pub const DEFAULT_TT_BITS: u32 = 20;

pub struct Agent {
    // The game as seen so far: opponent moves/flips and our own are both
    // committed here via `commit`.
    board: Board,

    // Reused across searches and across the whole game; never cleared by
    // `reset`.
    table: TranspositionTable,

    // This engine's own color. `Unknown` until the game's first flip commits it.
    color: Color,

    // Highest depth the mandatory (non-time-gated) search phase must reach;
    // grows every `FLIPS_PER_DEPTH_INCREASE` flips as the game thins out.
    depth_limit: u8,

    // Total flips committed so far, own and opponent's, driving `depth_limit` growth.
    num_flip: u32,

    // Per-move time budget in milliseconds, set by the `time_settings` command.
    time_limit: u32,

    // Remaining clock time in milliseconds, set by the `time_left` command.
    time_left: u32,

    // Root move found by the most recent `negascout` call with `save_root = true`.
    best_move_root: ChessMove,
}

impl Agent {
    pub fn new() -> Agent {
        Self::with_tt_bits(DEFAULT_TT_BITS)
    }

    pub fn with_tt_bits(bits: u32) -> Agent {
        Agent {
            board: Board::new(),
            table: TranspositionTable::new(bits),
            color: Color::Unknown,
            depth_limit: 3,
            num_flip: 0,
            time_limit: 0,
            time_left: 0,
            best_move_root: ChessMove::sentinel(),
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Read-only board access for protocol-level move validation.
    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn set_time_limit(&mut self, ms: u32) {
        self.time_limit = ms;
    }

    pub fn set_time_left(&mut self, ms: u32) {
        self.time_left = ms;
    }

    /// Mirrors the reference's minimal reset: only the board restarts, the
    /// transposition table and depth-growth counters carry over.
    pub fn reset(&mut self) {
        self.board = Board::new();
    }

    fn commit(&mut self, mv: ChessMove) {
        let mut undo = Undo::new();
        self.board.make_move(mv, &mut undo);
        if let ChessMove::Flip { .. } = mv {
            self.num_flip += 1;
            if self.num_flip % FLIPS_PER_DEPTH_INCREASE == 0 {
                self.depth_limit = (self.depth_limit + 1).min(DEPTH_HARD_LIMIT);
            }
        }
    }

    /// Apply a move asserted by the opponent.
    pub fn opponent_move(&mut self, src: u8, dst: u8) {
        self.commit(ChessMove::Move { src, dst });
    }

    /// Apply a flip asserted by the opponent.
    pub fn opponent_flip(&mut self, pos: u8, result: Piece) {
        self.commit(ChessMove::Flip { pos, result });
    }

    /// Pick a move for `self.color`, commit it to the board, and return it.
    pub fn generate_move(&mut self) -> ChessMove {
        if self.color == Color::Unknown {
            return ChessMove::flip_intent(0);
        }

        let mut undo = Undo::new();
        let (mut score, mut mv) = self.search_single_depth(-INF, INF, 3, &mut undo);

        let mut depth = 4u8;
        loop {
            let start = Instant::now();
            let (s, m) = self.aspiration_search(score, depth, &mut undo);
            score = s;
            mv = m;
            let elapsed = start.elapsed();
            info!(
                "iterative deepening depth={} score={:.1} elapsed={:?} move={}",
                depth, score, elapsed, mv
            );
            if depth >= self.depth_limit && elapsed > TIME_THRESHOLD {
                break;
            }
            if depth >= DEPTH_HARD_LIMIT {
                break;
            }
            depth += 1;
        }

        debug_assert!(undo.is_empty(), "search left unreversed moves on the board");
        self.commit(mv);
        mv
    }

    fn aspiration_search(&mut self, prev_score: f32, depth: u8, undo: &mut Undo) -> (f32, ChessMove) {
        let low = prev_score - ASPIRATION_RANGE;
        let high = prev_score + ASPIRATION_RANGE;
        let (mut score, mut mv) = self.search_single_depth(low, high, depth, undo);
        if score <= low {
            let (s, m) = self.search_single_depth(-INF, score, depth, undo);
            score = s;
            mv = m;
        } else if score >= high {
            let (s, m) = self.search_single_depth(score, INF, depth, undo);
            score = s;
            mv = m;
        }
        (score, mv)
    }

    fn search_single_depth(
        &mut self,
        alpha: f32,
        beta: f32,
        depth: u8,
        undo: &mut Undo,
    ) -> (f32, ChessMove) {
        self.best_move_root = ChessMove::sentinel();
        let color = self.color;
        let score = self.negascout(alpha, beta, depth, color, true, undo);
        (score, self.best_move_root)
    }

    fn negascout(
        &mut self,
        alpha: f32,
        beta: f32,
        depth: u8,
        side: Color,
        save_root: bool,
        undo: &mut Undo,
    ) -> f32 {
        if depth == 0 {
            return self.board.evaluate(side);
        }
        if self.board.terminate() {
            let winner = self.board.winner();
            return if winner == Color::Unknown {
                0.0
            } else if winner == side {
                MATE_SCORE * (depth as f32 + 1.0)
            } else {
                -MATE_SCORE * (depth as f32 + 1.0)
            };
        }

        let alpha_orig = alpha;
        let mut alpha = alpha;
        let mut beta = beta;
        let hash = self.board.hash();
        let mut score = -INF;
        let mut best_move = ChessMove::sentinel();

        let (flag, entry_hash, entry_score, entry_depth, entry_move) = {
            let entry = self.table.probe(hash);
            (entry.flag, entry.hash, entry.score, entry.depth, entry.best_move)
        };
        if flag != Flag::Empty && entry_hash == hash && self.board.playable(entry_move) {
            if entry_depth < depth {
                if flag == Flag::Exact {
                    // Seed the score only; `best_move` is left at the
                    // sentinel until the move loop below actually beats it,
                    // so a shallower TT hit can never make its way into the
                    // table (or `self.best_move_root`) as a "best" move.
                    score = entry_score;
                }
            } else {
                match flag {
                    Flag::Exact => return entry_score,
                    Flag::Lower => {
                        if entry_score >= beta {
                            return entry_score;
                        }
                        alpha = alpha.max(entry_score);
                    }
                    Flag::Upper => {
                        if entry_score <= alpha {
                            return entry_score;
                        }
                        beta = beta.min(entry_score);
                    }
                    Flag::Empty => {}
                }
            }
        }

        let moves = self.board.list_moves(side);
        let mut upper = beta;
        for mv in moves {
            self.board.make_move(mv, undo);
            let mut t = -self.negascout(-upper, -(alpha.max(score)), depth - 1, side.opponent(), false, undo);
            if t > score {
                if upper != beta && depth >= 3 && t < beta {
                    t = -self.negascout(-beta, -t, depth - 1, side.opponent(), false, undo);
                }
                score = t;
                best_move = mv;
                if save_root {
                    self.best_move_root = mv;
                }
            }
            undo.undo(&mut self.board);

            if score >= beta {
                self.table.store(hash, score, depth, Flag::Lower, best_move);
                return score;
            }
            upper = alpha.max(score) + 1.0;
        }

        let mut mask = self.board.covered_mask();
        while mask != 0 {
            let pos = mask.trailing_zeros() as u8;
            mask &= mask - 1;
            let alpha_prime = alpha.max(score);
            let mut weighted = 0.0f32;
            let mut denom = 0.0f32;
            for identity in 0..pieces::NUM_IDENTITIES as u8 {
                let count = self.board.covered_count(identity);
                if count == 0 {
                    continue;
                }
                self.board.make_move(ChessMove::Flip { pos, result: identity }, undo);
                let v = -self.negascout(-beta, -alpha_prime, depth - 1, side.opponent(), false, undo);
                undo.undo(&mut self.board);
                weighted += v * count as f32;
                denom += count as f32;
            }
            let expected = weighted / denom;
            if expected > score {
                score = expected;
                best_move = ChessMove::flip_intent(pos);
                if save_root {
                    self.best_move_root = best_move;
                }
                if expected >= beta {
                    self.table.store(hash, score, depth, Flag::Lower, best_move);
                    return score;
                }
            }
        }

        // `best_move` only stays the sentinel when a TT-seeded score from a
        // shallower entry survived both loops untouched; storing a
        // sentinel move would let a later `playable()` probe index the
        // board out of bounds, so skip the store rather than record one.
        if best_move != ChessMove::sentinel() {
            let flag = if score > alpha_orig { Flag::Exact } else { Flag::Upper };
            self.table.store(hash, score, depth, flag, best_move);
        }
        score
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pieces::{
        BLACK_GENERAL, BLACK_SOLDIER, RED_ADVISOR, RED_CANNON, RED_CHARIOT, RED_ELEPHANT,
        RED_GENERAL, RED_HORSE, RED_SOLDIER,
    };

    #[test]
    fn unknown_color_returns_scaffolding_flip_without_mutating() {
        let mut agent = Agent::new();
        let before = agent.board.hash();
        let mv = agent.generate_move();
        assert_eq!(mv, ChessMove::flip_intent(0));
        assert_eq!(agent.board.hash(), before);
    }

    #[test]
    fn mate_in_one_is_preferred_and_scored() {
        // RED_SOLDIER at a1 (square 0), BLACK_GENERAL alone at a2 (square 4):
        // red's only legal moves are the quiet step to b1 and the soldier's
        // special capture of the general.
        let grid = [
            "P---", "k---", "----", "----", "----", "----", "----", "----",
        ];
        let board = Board::from_layout(grid, [0; pieces::NUM_IDENTITIES], Color::Red);
        let mut agent = Agent::with_tt_bits(10);
        agent.board = board;
        agent.set_color(Color::Red);

        // generate_move's mandatory first iteration is depth 3; the capture
        // resolves the game one ply below that.
        let mut undo = Undo::new();
        let (score, mv) = agent.search_single_depth(-INF, INF, 3, &mut undo);
        assert_eq!(mv, ChessMove::Move { src: 0, dst: 4 });
        assert_eq!(score, MATE_SCORE * 3.0);
    }

    #[test]
    fn depth_limit_grows_every_eight_flips() {
        let mut agent = Agent::new();
        assert_eq!(agent.depth_limit, 3);
        let identities = [
            RED_SOLDIER,
            RED_CANNON,
            RED_HORSE,
            RED_CHARIOT,
            RED_ELEPHANT,
            RED_ADVISOR,
            RED_GENERAL,
            BLACK_SOLDIER,
        ];
        for (pos, &identity) in identities.iter().enumerate() {
            agent.opponent_flip(pos as u8, identity);
        }
        assert_eq!(agent.depth_limit, 4);
    }

    #[test]
    fn terminal_mate_score_is_color_relative() {
        let grid = [
            "----", "----", "----", "----", "----", "----", "----", "---k",
        ];
        let board = Board::from_layout(grid, [0; pieces::NUM_IDENTITIES], Color::Red);
        let mut agent = Agent::with_tt_bits(10);
        agent.board = board;
        // Black has only its general left; red has none, so black has won.
        assert!(agent.board.terminate());
        assert_eq!(agent.board.winner(), Color::Black);
        let _ = BLACK_GENERAL;
    }
}
