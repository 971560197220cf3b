//! Value types shared across the board and search modules.

mod bitboard;
mod castling;
mod moves;
mod piece;
mod square;

pub use bitboard::{
    file_bb, lsb, msb_index, pop_lsb, Bitboard, Squares, RANK_1, RANK_2, RANK_4, RANK_5, RANK_7,
    RANK_8,
};
pub use castling::CastRights;
pub use moves::{Move, MoveList, ScoredMove, ScoredMoveList, MAX_MOVES, MOVE_NONE, MOVE_NULL};
pub use piece::{Color, PackedPiece, PieceType};
pub use square::Square;
