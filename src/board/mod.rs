//! Board representation and move machinery.
//!
//! Bitboard position with incremental make/unmake, Zobrist hashing, staged
//! move generation, SEE and the FEN/UCI/SAN textual boundary. FRC positions
//! are first-class: castling rights carry rook files and castling moves are
//! encoded king-takes-rook.

pub mod attack_tables;
mod error;
mod fen;
mod legality;
mod magics;
mod make_unmake;
mod movegen;
mod san;
mod see;
mod state;
mod types;
mod zobrist;


pub use error::{FenError, MoveParseError, SanError};
pub use magics::{bishop_attacks, queen_attacks, rook_attacks};
pub use make_unmake::UndoInfo;
pub use movegen::{GenMode, GenPhase, MoveGen};
pub use state::{Board, DrawKind, PH_ENDGAME, PH_OPENING, START_FEN};
pub use types::{
    file_bb, lsb, msb_index, pop_lsb, Bitboard, CastRights, Color, Move, MoveList, PackedPiece,
    PieceType, ScoredMove, ScoredMoveList, Square, Squares, MAX_MOVES, MOVE_NONE, MOVE_NULL,
};

pub use attack_tables::{between, line, PASSER_SPAN};

/// One-shot process-wide table initialization (attack tables and magics).
/// Idempotent; the search driver calls it before the first search.
pub fn init_tables() {
    attack_tables::init();
}
