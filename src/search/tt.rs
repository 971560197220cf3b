//! Lock-free bucketed transposition table.
//!
//! Each entry is two 64-bit words: a payload and the position signature XORed
//! with that payload. Readers reconstruct the signature and drop mismatches,
//! so torn reads under concurrent writers are filtered instead of locked out;
//! writers race and last-writer-wins. Replacement prefers shallow, stale,
//! non-exact entries within a four-slot bucket. Mate scores are stored as
//! distance-to-mate (ply-adjusted on both store and probe).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::board::{Move, MOVE_NONE};

use super::score::{self, Score, SC_INVALID};

pub const BUCKET: usize = 4;
const PAGE_ALIGN: usize = 4096;
const ENTRY_BYTES: usize = 16;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Bound {
    Upper = 0,
    Lower = 1,
    Exact = 2,
}

impl Bound {
    #[inline]
    fn from_bits(bits: u8) -> Bound {
        match bits & 3 {
            0 => Bound::Upper,
            1 => Bound::Lower,
            _ => Bound::Exact,
        }
    }
}

/// Decoded entry handed back by probe for eval tightening and singular
/// extension decisions.
#[derive(Clone, Copy)]
pub struct TtData {
    pub hit: bool,
    pub mv: Move,
    pub score: i16,
    pub depth: i32,
    pub bound: Bound,
    pub age: u8,
}

impl TtData {
    pub const MISS: TtData = TtData {
        hit: false,
        mv: MOVE_NONE,
        score: 0,
        depth: -1,
        bound: Bound::Upper,
        age: 0,
    };
}

#[derive(Default)]
struct Entry {
    key: AtomicU64,
    data: AtomicU64,
}

// data layout: move:16 | score:16 | depth:8 (i8) | genbound:8 (age<<2|bound)
#[inline]
fn pack_data(mv: Move, score: i16, depth: i32, genbound: u8) -> u64 {
    debug_assert!((-128..=127).contains(&depth));
    (mv.as_u16() as u64)
        | ((score as u16 as u64) << 16)
        | (((depth as i8) as u8 as u64) << 32)
        | ((genbound as u64) << 40)
}

#[inline]
fn unpack_data(data: u64) -> (Move, i16, i32, u8) {
    let mv = Move::from_u16(data as u16);
    let score = (data >> 16) as u16 as i16;
    let depth = ((data >> 32) as u8 as i8) as i32;
    let genbound = (data >> 40) as u8;
    (mv, score, depth, genbound)
}

pub struct TransTable {
    entries: Vec<Entry>,
    /// First entry index aligned to a page boundary.
    offset: usize,
    /// Entry-count mask; the table size is a power of two.
    mask: usize,
    hash_full_bits: [AtomicU64; 16],
    last_hash_full: AtomicU32,
}

impl TransTable {
    /// Allocate with the given size in MiB, rounded down to a power of two
    /// entries and aligned to a cache page.
    #[must_use]
    pub fn new(size_mb: usize) -> Self {
        let mut tt = TransTable {
            entries: Vec::new(),
            offset: 0,
            mask: 0,
            hash_full_bits: Default::default(),
            last_hash_full: AtomicU32::new(0),
        };
        tt.resize(size_mb.max(1) * 1024 * 1024);
        tt
    }

    /// Exclusive: only valid while no search is running.
    pub fn resize(&mut self, size_bytes: usize) {
        let want = (size_bytes / ENTRY_BYTES).max(BUCKET * 2);
        // Round down to a power of two.
        let count = 1usize << (usize::BITS - 1 - want.leading_zeros());
        let pad = PAGE_ALIGN / ENTRY_BYTES;
        let mut entries = Vec::with_capacity(count + pad);
        entries.resize_with(count + pad, Entry::default);
        let addr = entries.as_ptr() as usize;
        let offset = (PAGE_ALIGN - (addr % PAGE_ALIGN)) % PAGE_ALIGN / ENTRY_BYTES;
        self.entries = entries;
        self.offset = offset;
        self.mask = count - 1;
        self.clear_hash_full();
        log::debug!(
            "transposition table: {} entries ({} MiB)",
            count,
            count * ENTRY_BYTES / (1024 * 1024)
        );
    }

    /// Exclusive: wipe all entries.
    pub fn clear(&mut self) {
        for e in &self.entries {
            e.key.store(0, Ordering::Relaxed);
            e.data.store(0, Ordering::Relaxed);
        }
        self.clear_hash_full();
    }

    pub fn clear_hash_full(&self) {
        for word in &self.hash_full_bits {
            word.store(0, Ordering::Relaxed);
        }
        self.last_hash_full.store(0, Ordering::Relaxed);
    }

    #[inline]
    fn bucket_start(&self, sig: u64) -> usize {
        self.offset + ((sig as usize) & self.mask & !(BUCKET - 1))
    }

    /// Probe for a cutoff. Returns `(score, data)`: the score is `SC_INVALID`
    /// unless the entry is deep enough and its bound admits a cutoff against
    /// the window; `data.mv` is filled on any signature match regardless.
    #[must_use]
    pub fn probe(
        &self,
        sig: u64,
        ply: u32,
        depth: i32,
        alpha: Score,
        beta: Score,
    ) -> (Score, TtData) {
        let start = self.bucket_start(sig);
        for e in &self.entries[start..start + BUCKET] {
            let key = e.key.load(Ordering::Relaxed);
            let data = e.data.load(Ordering::Relaxed);
            if key ^ data != sig || data == 0 {
                continue;
            }
            let (mv, packed, edepth, genbound) = unpack_data(data);
            let out = TtData {
                hit: true,
                mv,
                score: packed,
                depth: edepth,
                bound: Bound::from_bits(genbound),
                age: genbound >> 2,
            };
            if edepth < depth {
                return (SC_INVALID, out);
            }
            let score = score::unpack_tt(packed, ply);
            let cutoff = match out.bound {
                Bound::Exact => true,
                Bound::Upper => score <= alpha,
                Bound::Lower => score >= beta,
            };
            return (if cutoff { score } else { SC_INVALID }, out);
        }
        (SC_INVALID, TtData::MISS)
    }

    /// Tighten a static eval with a matched entry's bound, when permitted.
    #[must_use]
    pub fn probe_eval(ply: u32, val: Score, data: &TtData) -> Score {
        if !data.hit {
            return SC_INVALID;
        }
        let score = score::unpack_tt(data.score, ply);
        match data.bound {
            Bound::Exact => score,
            Bound::Upper if score < val => score,
            Bound::Lower if score > val => score,
            _ => SC_INVALID,
        }
    }

    /// Store an entry. Within the bucket: reuse an exact signature match
    /// (keeping a markedly deeper same-age entry instead), otherwise replace
    /// the slot scoring worst on depth, age and exactness.
    pub fn store(
        &self,
        sig: u64,
        age: u8,
        mut mv: Move,
        score: Score,
        bound: Bound,
        depth: i32,
        ply: u32,
    ) {
        debug_assert!(score::is_valid(score));
        debug_assert!(score != -super::score::SC_INFINITY);

        let start = self.bucket_start(sig);
        let mut best: Option<&Entry> = None;
        let mut best_score = i32::MIN;
        let aged = age << 2;

        for e in &self.entries[start..start + BUCKET] {
            let key = e.key.load(Ordering::Relaxed);
            let data = e.data.load(Ordering::Relaxed);
            if data != 0 && key ^ data == sig {
                let (emv, _, edepth, genbound) = unpack_data(data);
                // Keep a much deeper entry from the same search.
                if genbound & 0xFC == aged && edepth > 0 {
                    let keep = if bound == Bound::Exact {
                        edepth > depth * 8
                    } else {
                        edepth > depth * 4
                    };
                    if keep {
                        return;
                    }
                }
                if mv == MOVE_NONE {
                    mv = emv;
                }
                best = Some(e);
                break;
            }
            let (_, _, edepth, genbound) = unpack_data(data);
            let escore = -edepth * 2
                + if genbound & 0xFC != aged { 256 } else { 0 }
                - i32::from(Bound::from_bits(genbound) == Bound::Exact);
            if escore > best_score {
                best = Some(e);
                best_score = escore;
            }
        }

        let slot = best.expect("bucket always yields a slot");
        let depth = depth.clamp(-128, 127);
        let data = pack_data(mv, score::pack_tt(score, ply), depth, aged | bound as u8);
        slot.data.store(data, Ordering::Relaxed);
        slot.key.store(sig ^ data, Ordering::Relaxed);
    }

    /// Per-mille occupancy at the given age, sampled over 1000 slots and
    /// cached in a bitmap between calls within one iteration.
    #[must_use]
    pub fn hash_full(&self, age: u8) -> u32 {
        let cached = self.last_hash_full.load(Ordering::Relaxed);
        if cached >= 1000 {
            return cached;
        }
        let size = self.mask + 1;
        let step = (size / 1000).max(1);
        let aged = age << 2;
        let mut res = 0u32;
        for i in 0..1000usize {
            let word = &self.hash_full_bits[i / 64];
            let bit = 1u64 << (i % 64);
            if word.load(Ordering::Relaxed) & bit != 0 {
                res += 1;
                continue;
            }
            let e = &self.entries[self.offset + (i * step) % size];
            let data = e.data.load(Ordering::Relaxed);
            let full = data != 0 && (unpack_data(data).3 & 0xFC) == aged;
            if full {
                res += 1;
                word.fetch_or(bit, Ordering::Relaxed);
            }
        }
        self.last_hash_full.store(res, Ordering::Relaxed);
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Square;
    use crate::search::score::{mate_in, SC_DRAW};

    fn mv() -> Move {
        Move::quiet(Square::E1, Square::E8)
    }

    #[test]
    fn store_probe_round_trip() {
        let tt = TransTable::new(1);
        tt.store(0xDEAD_BEEF, 1, mv(), 123, Bound::Exact, 8, 3);
        let (score, data) = tt.probe(0xDEAD_BEEF, 3, 8, -100, 100);
        assert_eq!(score, 123);
        assert!(data.hit);
        assert_eq!(data.mv, mv());
        assert_eq!(data.depth, 8);
        assert_eq!(data.bound, Bound::Exact);
    }

    #[test]
    fn shallow_entry_yields_move_but_no_score() {
        let tt = TransTable::new(1);
        tt.store(42, 0, mv(), 50, Bound::Exact, 4, 0);
        let (score, data) = tt.probe(42, 0, 9, -100, 100);
        assert_eq!(score, SC_INVALID);
        assert_eq!(data.mv, mv());
    }

    #[test]
    fn bounds_gate_cutoffs() {
        let tt = TransTable::new(1);
        tt.store(7, 0, mv(), 80, Bound::Lower, 6, 0);
        // Lower bound 80 cuts only when >= beta.
        assert_eq!(tt.probe(7, 0, 6, 0, 50).0, 80);
        assert_eq!(tt.probe(7, 0, 6, 90, 120).0, SC_INVALID);
        tt.store(8, 0, mv(), -20, Bound::Upper, 6, 0);
        assert_eq!(tt.probe(8, 0, 6, 10, 50).0, SC_INVALID);
        assert_eq!(tt.probe(8, 0, 6, -10, 50).0, -20);
    }

    #[test]
    fn mate_scores_rebase_across_plies() {
        let tt = TransTable::new(1);
        tt.store(99, 0, mv(), mate_in(12), Bound::Exact, 20, 4);
        let (score, _) = tt.probe(99, 6, 20, -32000, 32000);
        assert_eq!(score, mate_in(14));
    }

    #[test]
    fn mismatched_signature_is_ignored() {
        let tt = TransTable::new(1);
        tt.store(0x1111, 0, mv(), 55, Bound::Exact, 5, 0);
        let (score, data) = tt.probe(0x2222, 0, 1, -100, 100);
        assert_eq!(score, SC_INVALID);
        assert!(!data.hit);
    }

    #[test]
    fn probe_eval_tightens_by_bound() {
        let data = TtData {
            hit: true,
            mv: MOVE_NONE,
            score: 40,
            depth: 1,
            bound: Bound::Lower,
            age: 0,
        };
        assert_eq!(TransTable::probe_eval(0, 10, &data), 40);
        assert_eq!(TransTable::probe_eval(0, 90, &data), SC_INVALID);
        assert_eq!(TransTable::probe_eval(0, 90, &TtData::MISS), SC_INVALID);
    }

    #[test]
    fn replacement_prefers_stale_and_shallow() {
        let tt = TransTable::new(1);
        // Fill one bucket with four deep young entries, then store a new
        // position mapping to the same bucket: something must be evicted and
        // the new entry must be probeable.
        let base = 0x4000u64; // arbitrary
        for i in 0..4u64 {
            // Same bucket: identical low bits, different high bits.
            let sig = base | (i << 40);
            tt.store(sig, 1, mv(), 10, Bound::Exact, 20, 0);
        }
        let newcomer = base | (9 << 40);
        tt.store(newcomer, 2, mv(), 30, Bound::Exact, 2, 0);
        let (score, _) = tt.probe(newcomer, 0, 2, -100, 100);
        assert_eq!(score, 30);
    }

    #[test]
    fn hash_full_counts_current_age_only() {
        let tt = TransTable::new(1);
        assert_eq!(tt.hash_full(0), 0);
        let size = tt.mask + 1;
        let step = (size / 1000).max(1);
        for i in 0..1000u64 {
            // Fill the whole bucket so every sampled slot is occupied.
            for k in 0..BUCKET as u64 {
                tt.store(i * step as u64 + (k << 40), 3, mv(), 1, Bound::Exact, 1, 0);
            }
        }
        tt.clear_hash_full();
        assert!(tt.hash_full(3) > 500);
        tt.clear_hash_full();
        assert_eq!(tt.hash_full(4), 0);
    }

    #[test]
    fn draw_score_stores() {
        let tt = TransTable::new(1);
        tt.store(5, 0, MOVE_NONE, SC_DRAW, Bound::Exact, 3, 0);
        assert_eq!(tt.probe(5, 0, 3, -10, 10).0, SC_DRAW);
    }
}
