//! Zobrist hashing keys.
//!
//! Keys come from a fixed-seed RNG so hashes are reproducible across runs,
//! which keeps fixed-seed searches deterministic.

use once_cell::sync::Lazy;
use rand::prelude::*;

use super::types::{Color, PieceType, Square};

pub(crate) struct ZobristKeys {
    /// `pieces[color][piece_type][square]`
    pub pieces: [[[u64; 64]; 6]; 2],
    /// `castling[color][side]`, side 0 = kingside, 1 = queenside
    pub castling: [[u64; 2]; 2],
    /// Only the target file matters for en passant.
    pub ep_file: [u64; 8],
    pub side: u64,
}

pub(crate) static ZOBRIST: Lazy<ZobristKeys> = Lazy::new(|| {
    let mut rng = StdRng::seed_from_u64(0x0DDB_1A5E_5BA1_2E5D);
    let mut pieces = [[[0u64; 64]; 6]; 2];
    for color in &mut pieces {
        for pt in color.iter_mut() {
            for key in pt.iter_mut() {
                *key = rng.gen();
            }
        }
    }
    let mut castling = [[0u64; 2]; 2];
    for color in &mut castling {
        for key in color.iter_mut() {
            *key = rng.gen();
        }
    }
    let mut ep_file = [0u64; 8];
    for key in &mut ep_file {
        *key = rng.gen();
    }
    ZobristKeys {
        pieces,
        castling,
        ep_file,
        side: rng.gen(),
    }
});

#[inline]
pub(crate) fn piece_key(c: Color, pt: PieceType, sq: Square) -> u64 {
    ZOBRIST.pieces[c.index()][pt.index()][sq.index()]
}

#[inline]
pub(crate) fn castling_key(c: Color, kingside: bool) -> u64 {
    ZOBRIST.castling[c.index()][usize::from(!kingside)]
}

#[inline]
pub(crate) fn ep_key(file: u8) -> u64 {
    ZOBRIST.ep_file[file as usize]
}

#[inline]
pub(crate) fn side_key() -> u64 {
    ZOBRIST.side
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_stable_and_distinct() {
        let a = piece_key(Color::White, PieceType::Knight, Square::A1);
        let b = piece_key(Color::White, PieceType::Knight, Square::A1);
        assert_eq!(a, b);
        assert_ne!(
            piece_key(Color::White, PieceType::Knight, Square::A1),
            piece_key(Color::Black, PieceType::Knight, Square::A1)
        );
        assert_ne!(side_key(), 0);
    }
}
