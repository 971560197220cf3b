//! Tablebase adapter.
//!
//! The probing backend is a pure oracle behind a trait: WDL probes are
//! assumed thread-safe, root probes are not and get serialized behind an
//! adapter-owned mutex. Without an oracle every probe reports unavailable
//! and the search proceeds as if no tablebases exist.

use parking_lot::Mutex;

use crate::board::{Board, Move};

use super::score::{Score, SC_DRAW, SC_TB_WIN};

/// Win/draw/loss classification from the side to move's perspective.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Wdl {
    Loss,
    BlessedLoss,
    Draw,
    CursedWin,
    Win,
}

/// A root move with its tablebase verdict and distance-to-zeroing.
#[derive(Clone, Copy, Debug)]
pub struct TbRootMove {
    pub mv: Move,
    pub wdl: Wdl,
    pub dtz: u32,
}

/// Probing backend. `probe_wdl` must be callable from any worker thread;
/// `probe_root` is only ever called under the adapter's lock.
pub trait TbOracle: Send + Sync {
    /// Largest piece count the oracle covers.
    fn max_pieces(&self) -> u32;

    /// WDL for the position, None when unavailable.
    fn probe_wdl(&self, board: &Board) -> Option<Wdl>;

    /// Per-move WDL/DTZ for every legal root move, None when unavailable.
    fn probe_root(&self, board: &Board) -> Option<Vec<TbRootMove>>;
}

pub struct Tablebases {
    oracle: Option<Box<dyn TbOracle>>,
    root_lock: Mutex<()>,
}

impl Tablebases {
    /// No oracle: every probe reports unavailable.
    #[must_use]
    pub fn none() -> Self {
        Tablebases {
            oracle: None,
            root_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_oracle(oracle: Box<dyn TbOracle>) -> Self {
        log::debug!("tablebase oracle attached, up to {} men", oracle.max_pieces());
        Tablebases {
            oracle: Some(oracle),
            root_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn max_pieces(&self) -> u32 {
        self.oracle.as_ref().map_or(0, |o| o.max_pieces())
    }

    /// Thread-safe WDL probe.
    #[must_use]
    pub fn probe_wdl(&self, board: &Board) -> Option<Wdl> {
        self.oracle.as_ref()?.probe_wdl(board)
    }

    /// Root probe, serialized: the backend is not reentrant for DTZ work.
    #[must_use]
    pub fn probe_root(&self, board: &Board) -> Option<Vec<TbRootMove>> {
        let oracle = self.oracle.as_ref()?;
        let _guard = self.root_lock.lock();
        oracle.probe_root(board)
    }

    /// In-tree score for a WDL verdict. Wins sit just under the tablebase
    /// band edge so real mates always rank higher; cursed wins and blessed
    /// losses are nudged off the draw score to steer toward or away from the
    /// fifty-move cliff.
    #[must_use]
    pub fn wdl_score(wdl: Wdl) -> Score {
        match wdl {
            Wdl::Win => SC_TB_WIN - 100,
            Wdl::Loss => -SC_TB_WIN + 100,
            Wdl::CursedWin => SC_DRAW + 1,
            Wdl::BlessedLoss => SC_DRAW - 1,
            Wdl::Draw => SC_DRAW,
        }
    }

    /// Root-move score: wins prefer the smallest distance-to-zeroing.
    #[must_use]
    pub fn root_score(rm: &TbRootMove) -> Score {
        match rm.wdl {
            Wdl::Win => SC_TB_WIN - rm.dtz as Score,
            Wdl::Loss => -SC_TB_WIN + rm.dtz as Score,
            Wdl::CursedWin => SC_DRAW + 1,
            Wdl::BlessedLoss => SC_DRAW - 1,
            Wdl::Draw => SC_DRAW,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_oracle_means_no_probes() {
        let tb = Tablebases::none();
        assert_eq!(tb.max_pieces(), 0);
        let board = Board::new();
        assert!(tb.probe_wdl(&board).is_none());
        assert!(tb.probe_root(&board).is_none());
    }

    #[test]
    fn score_mapping_bands() {
        assert!(Tablebases::wdl_score(Wdl::Win) > 10_000);
        assert!(Tablebases::wdl_score(Wdl::Win) < super::super::score::mate_in(127));
        assert_eq!(Tablebases::wdl_score(Wdl::Draw), SC_DRAW);
        assert_eq!(Tablebases::wdl_score(Wdl::CursedWin), SC_DRAW + 1);
        assert_eq!(
            Tablebases::wdl_score(Wdl::Loss),
            -Tablebases::wdl_score(Wdl::Win)
        );
    }

    #[test]
    fn root_scores_prefer_short_dtz() {
        let fast = TbRootMove {
            mv: Move::from_u16(1),
            wdl: Wdl::Win,
            dtz: 4,
        };
        let slow = TbRootMove {
            mv: Move::from_u16(2),
            wdl: Wdl::Win,
            dtz: 30,
        };
        assert!(Tablebases::root_score(&fast) > Tablebases::root_score(&slow));
    }

    struct StubOracle;

    impl TbOracle for StubOracle {
        fn max_pieces(&self) -> u32 {
            5
        }
        fn probe_wdl(&self, _board: &Board) -> Option<Wdl> {
            Some(Wdl::Win)
        }
        fn probe_root(&self, board: &Board) -> Option<Vec<TbRootMove>> {
            Some(
                board
                    .legal_moves()
                    .iter()
                    .map(|m| TbRootMove {
                        mv: *m,
                        wdl: Wdl::Draw,
                        dtz: 0,
                    })
                    .collect(),
            )
        }
    }

    #[test]
    fn oracle_pass_through() {
        let tb = Tablebases::with_oracle(Box::new(StubOracle));
        assert_eq!(tb.max_pieces(), 5);
        let board = Board::from_fen("8/8/8/8/8/8/6k1/4K2R w K - 0 1").unwrap();
        assert_eq!(tb.probe_wdl(&board), Some(Wdl::Win));
        assert!(tb.probe_root(&board).is_some());
    }
}
