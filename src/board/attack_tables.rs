//! Precomputed attack and geometry tables.
//!
//! All tables are built once on first use and read-only afterwards. Sliding
//! attacks live in `magics`; this module covers the leaper tables plus the
//! between/line/ray geometry the pin and check logic relies on.

use once_cell::sync::Lazy;

use super::types::{Bitboard, Color, Square};

const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (2, 1),
    (1, 2),
    (-1, 2),
    (-2, 1),
    (-2, -1),
    (-1, -2),
    (1, -2),
    (2, -1),
];

const KING_DELTAS: [(i8, i8); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

const DIAG_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ORTHO_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

fn leaper_table(deltas: &[(i8, i8)]) -> [Bitboard; 64] {
    let mut table = [0u64; 64];
    for (idx, entry) in table.iter_mut().enumerate() {
        let sq = Square::from_index(idx as u8);
        for &(df, dr) in deltas {
            if let Some(t) = sq.offset(df, dr) {
                *entry |= t.bb();
            }
        }
    }
    table
}

fn ray_table(dirs: &[(i8, i8)]) -> [Bitboard; 64] {
    let mut table = [0u64; 64];
    for (idx, entry) in table.iter_mut().enumerate() {
        let sq = Square::from_index(idx as u8);
        for &(df, dr) in dirs {
            let mut cur = sq;
            while let Some(t) = cur.offset(df, dr) {
                *entry |= t.bb();
                cur = t;
            }
        }
    }
    table
}

pub static KNIGHT_ATTACKS: Lazy<[Bitboard; 64]> = Lazy::new(|| leaper_table(&KNIGHT_DELTAS));

pub static KING_ATTACKS: Lazy<[Bitboard; 64]> = Lazy::new(|| leaper_table(&KING_DELTAS));

/// `PAWN_ATTACKS[color][sq]` = squares a pawn of `color` on `sq` attacks.
pub static PAWN_ATTACKS: Lazy<[[Bitboard; 64]; 2]> = Lazy::new(|| {
    let mut table = [[0u64; 64]; 2];
    for idx in 0..64 {
        let sq = Square::from_index(idx as u8);
        for (c, dr) in [(Color::White, 1i8), (Color::Black, -1i8)] {
            let mut mask = 0u64;
            for df in [-1i8, 1] {
                if let Some(t) = sq.offset(df, dr) {
                    mask |= t.bb();
                }
            }
            table[c.index()][idx] = mask;
        }
    }
    table
});

/// Full-board diagonal rays through each square (attacks on an empty board).
pub static DIAG_RAYS: Lazy<[Bitboard; 64]> = Lazy::new(|| ray_table(&DIAG_DIRS));

/// Full-board orthogonal rays through each square.
pub static ORTHO_RAYS: Lazy<[Bitboard; 64]> = Lazy::new(|| ray_table(&ORTHO_DIRS));

/// Squares strictly between two aligned squares, 0 when not on a common ray.
pub static BETWEEN: Lazy<Vec<[Bitboard; 64]>> = Lazy::new(|| {
    let mut table = vec![[0u64; 64]; 64];
    for a in 0..64usize {
        let sa = Square::from_index(a as u8);
        for &(df, dr) in DIAG_DIRS.iter().chain(ORTHO_DIRS.iter()) {
            let mut mask = 0u64;
            let mut cur = sa;
            while let Some(t) = cur.offset(df, dr) {
                table[a][t.index()] = mask;
                mask |= t.bb();
                cur = t;
            }
        }
    }
    table
});

/// Full ray through two aligned squares including both endpoints, 0 otherwise.
pub static LINE: Lazy<Vec<[Bitboard; 64]>> = Lazy::new(|| {
    let mut table = vec![[0u64; 64]; 64];
    for a in 0..64usize {
        let sa = Square::from_index(a as u8);
        for &(df, dr) in DIAG_DIRS.iter().chain(ORTHO_DIRS.iter()) {
            let mut ray = sa.bb();
            for dir in [(df, dr), (-df, -dr)] {
                let mut cur = sa;
                while let Some(t) = cur.offset(dir.0, dir.1) {
                    ray |= t.bb();
                    cur = t;
                }
            }
            let mut cur = sa;
            while let Some(t) = cur.offset(df, dr) {
                table[a][t.index()] = ray;
                table[t.index()][a] = ray;
                cur = t;
            }
        }
    }
    table
});

/// `PASSER_SPAN[color][sq]`: the three files ahead of a pawn of `color` on
/// `sq`, from the next rank to promotion. A pawn with no enemy pawn in this
/// span is a passer.
pub static PASSER_SPAN: Lazy<[[Bitboard; 64]; 2]> = Lazy::new(|| {
    let mut table = [[0u64; 64]; 2];
    for idx in 0..64usize {
        let sq = Square::from_index(idx as u8);
        for (c, dr) in [(Color::White, 1i8), (Color::Black, -1i8)] {
            let mut mask = 0u64;
            for df in [-1i8, 0, 1] {
                let mut cur = sq;
                while let Some(ahead) = cur.offset(0, dr) {
                    cur = ahead;
                    if let Some(t) = cur.offset(df, 0) {
                        mask |= t.bb();
                    }
                }
            }
            table[c.index()][idx] = mask;
        }
    }
    table
});

#[inline]
#[must_use]
pub fn between(a: Square, b: Square) -> Bitboard {
    BETWEEN[a.index()][b.index()]
}

#[inline]
#[must_use]
pub fn line(a: Square, b: Square) -> Bitboard {
    LINE[a.index()][b.index()]
}

/// Force initialization of every table. Called once before search; afterwards
/// lookups never hit the lazy-init path.
pub fn init() {
    Lazy::force(&KNIGHT_ATTACKS);
    Lazy::force(&KING_ATTACKS);
    Lazy::force(&PAWN_ATTACKS);
    Lazy::force(&DIAG_RAYS);
    Lazy::force(&ORTHO_RAYS);
    Lazy::force(&BETWEEN);
    Lazy::force(&LINE);
    Lazy::force(&PASSER_SPAN);
    super::magics::init();
}
