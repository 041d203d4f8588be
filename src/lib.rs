#![allow(dead_code)]

pub mod board;
pub mod pieces;
pub mod protocol;
pub mod search;
pub mod tt;
pub mod zobrist;

pub mod prelude {
    pub use crate::board::{Board, ChessMove, Undo};
    pub use crate::pieces::{self, Color, Piece};
    pub use crate::protocol::{EngineOptions, Server};
    pub use crate::search::Agent;
    pub use crate::tt::{Flag, TranspositionTable};
    pub use crate::zobrist::{Hash128, ZobristHasher};
}
