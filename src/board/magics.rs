//! Fancy magic bitboards for rook and bishop attacks.
//!
//! Magic factors are found at startup by seeded random search, so the tables
//! are deterministic across runs without shipping a constant block. The whole
//! structure is built once behind a `Lazy` and read-only afterwards.

use once_cell::sync::Lazy;
use rand::prelude::*;

use super::types::{Bitboard, Square};

const DIAG_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ORTHO_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

#[derive(Clone, Copy, Default)]
struct MagicEntry {
    mask: Bitboard,
    magic: u64,
    shift: u32,
    offset: usize,
}

impl MagicEntry {
    #[inline]
    fn index(&self, occ: Bitboard) -> usize {
        self.offset + ((occ & self.mask).wrapping_mul(self.magic) >> self.shift) as usize
    }
}

struct SliderTables {
    rook: [MagicEntry; 64],
    bishop: [MagicEntry; 64],
    attacks: Vec<Bitboard>,
}

static TABLES: Lazy<SliderTables> = Lazy::new(build_tables);

/// Slider attacks by scanning rays; used to fill the magic tables and as the
/// independent reference in tests.
#[must_use]
pub fn sliding_attacks_slow(sq: Square, occ: Bitboard, diagonal: bool) -> Bitboard {
    let dirs = if diagonal { &DIAG_DIRS } else { &ORTHO_DIRS };
    let mut attacks = 0u64;
    for &(df, dr) in dirs {
        let mut cur = sq;
        while let Some(t) = cur.offset(df, dr) {
            attacks |= t.bb();
            if occ & t.bb() != 0 {
                break;
            }
            cur = t;
        }
    }
    attacks
}

/// Relevant-occupancy mask: the rays with the final edge square of each
/// direction dropped.
fn relevant_mask(sq: Square, diagonal: bool) -> Bitboard {
    let dirs = if diagonal { &DIAG_DIRS } else { &ORTHO_DIRS };
    let mut mask = 0u64;
    for &(df, dr) in dirs {
        let mut cur = sq;
        while let Some(t) = cur.offset(df, dr) {
            if t.offset(df, dr).is_some() {
                mask |= t.bb();
            }
            cur = t;
        }
    }
    mask
}

/// Search for a magic factor mapping every subset of `mask` to a distinct
/// table slot. Sparse candidates converge in a handful of tries per square.
fn find_magic(
    sq: Square,
    mask: Bitboard,
    diagonal: bool,
    rng: &mut StdRng,
    scratch: &mut [Bitboard],
) -> u64 {
    let bits = mask.count_ones();
    let size = 1usize << bits;
    let shift = 64 - bits;

    // Precompute (occupancy subset, attacks) pairs via the carry-rippler.
    let mut subsets = Vec::with_capacity(size);
    let mut occ: Bitboard = 0;
    loop {
        subsets.push((occ, sliding_attacks_slow(sq, occ, diagonal)));
        occ = occ.wrapping_sub(mask) & mask;
        if occ == 0 {
            break;
        }
    }

    loop {
        let magic = rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>();
        if (mask.wrapping_mul(magic) >> 56).count_ones() < 6 {
            continue;
        }
        scratch[..size].fill(0);
        let mut ok = true;
        for &(occ, attacks) in &subsets {
            let idx = (occ.wrapping_mul(magic) >> shift) as usize;
            if scratch[idx] == 0 {
                scratch[idx] = attacks;
            } else if scratch[idx] != attacks {
                ok = false;
                break;
            }
        }
        if ok {
            return magic;
        }
    }
}

const MAGIC_SEED: u64 = 0x5EED_0F4B_17B0_A2D5;

fn build_tables() -> SliderTables {
    let mut rng = StdRng::seed_from_u64(MAGIC_SEED);
    let mut rook = [MagicEntry::default(); 64];
    let mut bishop = [MagicEntry::default(); 64];
    let mut attacks = Vec::new();
    let mut scratch = vec![0u64; 4096];

    for (diagonal, entries) in [(false, &mut rook), (true, &mut bishop)] {
        for idx in 0..64usize {
            let sq = Square::from_index(idx as u8);
            let mask = relevant_mask(sq, diagonal);
            let bits = mask.count_ones();
            let magic = find_magic(sq, mask, diagonal, &mut rng, &mut scratch);
            let entry = MagicEntry {
                mask,
                magic,
                shift: 64 - bits,
                offset: attacks.len(),
            };
            attacks.resize(attacks.len() + (1 << bits), 0);
            let mut occ: Bitboard = 0;
            loop {
                attacks[entry.index(occ)] = sliding_attacks_slow(sq, occ, diagonal);
                occ = occ.wrapping_sub(mask) & mask;
                if occ == 0 {
                    break;
                }
            }
            entries[idx] = entry;
        }
    }

    log::debug!(
        "magic tables built: {} KiB",
        attacks.len() * std::mem::size_of::<Bitboard>() / 1024
    );

    SliderTables {
        rook,
        bishop,
        attacks,
    }
}

#[inline]
#[must_use]
pub fn rook_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    let t = &*TABLES;
    let e = &t.rook[sq.index()];
    t.attacks[e.index(occ)]
}

#[inline]
#[must_use]
pub fn bishop_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    let t = &*TABLES;
    let e = &t.bishop[sq.index()];
    t.attacks[e.index(occ)]
}

#[inline]
#[must_use]
pub fn queen_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    rook_attacks(sq, occ) | bishop_attacks(sq, occ)
}

pub fn init() {
    Lazy::force(&TABLES);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_matches_slow_scan_on_random_occupancies() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let occ: Bitboard = rng.gen::<u64>() & rng.gen::<u64>();
            let sq = Square::from_index(rng.gen_range(0..64));
            assert_eq!(rook_attacks(sq, occ), sliding_attacks_slow(sq, occ, false));
            assert_eq!(bishop_attacks(sq, occ), sliding_attacks_slow(sq, occ, true));
        }
    }

    #[test]
    fn empty_board_rook_attacks() {
        let sq = Square::parse("d4").unwrap();
        assert_eq!(rook_attacks(sq, 0).count_ones(), 14);
        assert_eq!(bishop_attacks(sq, 0).count_ones(), 13);
    }
}
