//! Search: iterative deepening alpha-beta with quiescence, a shared
//! lock-free transposition table and lazy-SMP helper threads.
//!
//! The frontend drives everything through [`Search::iterate`] with a
//! [`SearchMode`] and receives progress and results through a callback.
//! Budget exhaustion is cooperative: every node polls an abort flag and
//! unwinds with the `SC_INVALID` poison score, which is never stored to the
//! table nor reported outward.

pub mod history;
pub mod repetition;
pub mod score;
pub mod tb;
pub mod tt;

mod node;
mod root;
mod smp;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::board::{Board, Move, MOVE_NONE};
use crate::eval::Eval;

use history::{History, Killers};
use repetition::RepStack;
use score::{Score, SC_DRAW};
use smp::{LazySmpWorker, WorkerShared};
use tb::Tablebases;
use tt::{Bound, TransTable};

pub use root::{RootMove, RootMoves};

/// Hard ply ceiling of the search tree.
pub const MAX_PLY: usize = 128;
/// Iterative-deepening depth ceiling.
pub const MAX_DEPTH: i32 = 64;

pub(crate) const MAX_STACK: usize = MAX_PLY + 16;

/// Fractional depth: extensions and reductions operate in 1/32 plies.
pub(crate) const FRAC_SHIFT: i32 = 5;
pub(crate) const FRAC_ONE_PLY: i32 = 1 << FRAC_SHIFT;

pub(crate) const SF_NO_TIMEOUT: u8 = 1;
pub(crate) const SF_NO_TABLEBASE: u8 = 2;
pub(crate) const SF_NO_NULL: u8 = 4;

/// What to search and how long. Zero means "no limit" for every numeric
/// field, mirroring the protocol's conventions.
#[derive(Clone, Debug)]
pub struct SearchMode {
    /// Restrict the root to these moves; empty means all legal moves.
    pub moves: Vec<Move>,
    /// Stop once a mate in this many moves is proven (0 = off).
    pub mate_search: u32,
    pub max_depth: i32,
    pub max_time_ms: u64,
    pub max_nodes: u64,
    pub multi_pv: u32,
    /// Hard wall-clock ceiling the blunder check may extend into.
    pub abs_limit_ms: u64,
    pub ponder: bool,
    pub fixed_time: bool,
}

impl SearchMode {
    /// Analysis mode: no limits at all.
    #[must_use]
    pub fn infinite() -> Self {
        SearchMode {
            moves: Vec::new(),
            mate_search: 0,
            max_depth: 0,
            max_time_ms: 0,
            max_nodes: 0,
            multi_pv: 1,
            abs_limit_ms: 0,
            ponder: false,
            fixed_time: false,
        }
    }

    #[must_use]
    pub fn depth(depth: i32) -> Self {
        SearchMode {
            max_depth: depth,
            ..SearchMode::infinite()
        }
    }

    #[must_use]
    pub fn time(ms: u64) -> Self {
        SearchMode {
            max_time_ms: ms,
            abs_limit_ms: ms,
            ..SearchMode::infinite()
        }
    }

    #[must_use]
    pub fn nodes(nodes: u64) -> Self {
        SearchMode {
            max_nodes: nodes,
            ..SearchMode::infinite()
        }
    }

    /// True when no limit of any kind applies; contempt is disabled then.
    #[must_use]
    pub fn analyzing(&self) -> bool {
        self.max_time_ms == 0
            && self.mate_search == 0
            && self.max_depth == 0
            && self.abs_limit_ms == 0
            && !self.fixed_time
    }
}

impl Default for SearchMode {
    fn default() -> Self {
        SearchMode::infinite()
    }
}

#[derive(Clone, Debug)]
pub struct CurMove {
    pub mv: Move,
    pub index: usize,
    pub count: usize,
}

#[derive(Clone, Debug)]
pub struct PvInfo {
    pub score: Score,
    pub bound: Bound,
    pub index: u32,
    pub moves: Vec<Move>,
}

/// One progress frame; any subset of fields may be present.
#[derive(Clone, Debug, Default)]
pub struct SearchInfo {
    pub depth: Option<i32>,
    pub sel_depth: Option<u32>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub hash_full: Option<u32>,
    pub tb_hits: Option<u64>,
    pub cur_move: Option<CurMove>,
    pub pv: Option<PvInfo>,
    pub best_move: Option<Move>,
    pub ponder_move: Option<Move>,
}

pub type SearchCallback = Arc<dyn Fn(&SearchInfo) + Send + Sync>;

/// Cloneable control handle: request a stop or deliver a ponderhit from
/// another thread while the search runs.
#[derive(Clone)]
pub struct SearchHandle {
    stop_request: Arc<AtomicBool>,
    ponder_hit: Arc<AtomicBool>,
}

impl SearchHandle {
    pub fn stop(&self) {
        self.stop_request.store(true, Ordering::Relaxed);
    }

    pub fn ponder_hit(&self) {
        self.ponder_hit.store(true, Ordering::Relaxed);
    }
}

/// Per-ply search stack entry.
#[derive(Clone, Copy)]
pub(crate) struct PlyEntry {
    pub killers: Killers,
    pub current: Move,
}

impl PlyEntry {
    const fn new() -> Self {
        PlyEntry {
            killers: Killers::new(),
            current: MOVE_NONE,
        }
    }
}

pub struct Search {
    pub board: Board,
    pub(crate) tt: Arc<TransTable>,
    pub(crate) tb: Arc<Tablebases>,
    pub(crate) eval: Eval,
    pub(crate) history: Box<History>,
    pub(crate) rep: RepStack,
    pub(crate) stack: Vec<PlyEntry>,
    pub(crate) tri_pv: Vec<Move>,
    pub(crate) root_moves: RootMoves,
    pub(crate) mode: SearchMode,
    pub(crate) callback: Option<SearchCallback>,

    pub(crate) age: u8,
    pub(crate) nodes: u64,
    pub(crate) tb_hits: u64,
    pub(crate) sel_depth: u32,
    pub(crate) min_qs_depth: i32,

    timeout_counter: u32,
    pub(crate) start_time: Instant,
    report_time: Instant,
    last_curmove_emit: bool,

    pub(crate) aborting: Arc<AtomicBool>,
    pub(crate) aborting_smp: Arc<AtomicBool>,
    stop_request: Arc<AtomicBool>,
    pub(crate) ponder_hit: Arc<AtomicBool>,
    pub(crate) can_stop: bool,
    pub(crate) search_flags: u8,

    contempt_factor: Score,
    elo_slowdown: Option<u32>,

    pub(crate) workers: Vec<LazySmpWorker>,
    pub(crate) worker_shared: Option<Arc<WorkerShared>>,

    pub(crate) iter_best: Move,
    pub(crate) iter_ponder: Move,
}

impl Search {
    #[must_use]
    pub fn new(tt: Arc<TransTable>, tb: Arc<Tablebases>) -> Self {
        crate::board::init_tables();
        Search {
            board: Board::new(),
            tt,
            tb,
            eval: Eval::new(),
            history: Box::new(History::new()),
            rep: RepStack::new(),
            stack: vec![PlyEntry::new(); MAX_STACK],
            tri_pv: vec![MOVE_NONE; root::TRI_PV_SIZE],
            root_moves: RootMoves::new(),
            mode: SearchMode::infinite(),
            callback: None,
            age: 0,
            nodes: 0,
            tb_hits: 0,
            sel_depth: 0,
            min_qs_depth: -MAX_DEPTH,
            timeout_counter: 0,
            start_time: Instant::now(),
            report_time: Instant::now(),
            last_curmove_emit: false,
            aborting: Arc::new(AtomicBool::new(false)),
            aborting_smp: Arc::new(AtomicBool::new(false)),
            stop_request: Arc::new(AtomicBool::new(false)),
            ponder_hit: Arc::new(AtomicBool::new(false)),
            can_stop: false,
            search_flags: 0,
            contempt_factor: SC_DRAW,
            elo_slowdown: None,
            workers: Vec::new(),
            worker_shared: None,
            iter_best: MOVE_NONE,
            iter_ponder: MOVE_NONE,
        }
    }

    pub fn set_callback(&mut self, callback: SearchCallback) {
        self.callback = Some(callback);
    }

    /// Control handle for the frontend thread.
    #[must_use]
    pub fn handle(&self) -> SearchHandle {
        SearchHandle {
            stop_request: Arc::clone(&self.stop_request),
            ponder_hit: Arc::clone(&self.ponder_hit),
        }
    }

    /// Contempt in centipawns from the engine's point of view; applied only
    /// when not analyzing.
    pub fn set_contempt(&mut self, contempt: Score) {
        self.contempt_factor = contempt;
    }

    #[must_use]
    pub fn contempt(&self) -> Score {
        self.contempt_factor
    }

    /// Artificial per-iteration slowdown in Elo below full strength.
    pub fn set_elo_slowdown(&mut self, below: Option<u32>) {
        self.elo_slowdown = below;
    }

    pub fn disable_tablebase(&mut self, off: bool) {
        if off {
            self.search_flags |= SF_NO_TABLEBASE;
        } else {
            self.search_flags &= !SF_NO_TABLEBASE;
        }
    }

    pub fn disable_null_move(&mut self, off: bool) {
        if off {
            self.search_flags |= SF_NO_NULL;
        } else {
            self.search_flags &= !SF_NO_NULL;
        }
    }

    /// Wipe per-game learning state (history, killers, eval caches).
    pub fn clear_state(&mut self) {
        self.history.clear();
        self.eval.clear();
        for e in self.stack.iter_mut() {
            *e = PlyEntry::new();
        }
    }

    /// Seed the repetition stack with the game history leading to the root.
    pub fn set_position_history(&mut self, sigs: &[(u64, bool)]) {
        self.rep.clear();
        for &(sig, irreversible) in sigs {
            self.rep.push(sig, irreversible);
        }
    }

    #[must_use]
    pub fn best_move(&self) -> Move {
        self.iter_best
    }

    #[must_use]
    pub fn ponder_move(&self) -> Move {
        self.iter_ponder
    }

    // ---- abort & timing --------------------------------------------------

    #[inline]
    pub(crate) fn unwinding(&self) -> bool {
        self.aborting.load(Ordering::Relaxed) || self.aborting_smp.load(Ordering::Relaxed)
    }

    pub(crate) fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Flush this worker's counters into the shared block the master reads.
    pub(crate) fn flush_worker_counters(&self) {
        if let Some(ws) = &self.worker_shared {
            ws.publish(self.nodes, self.tb_hits, self.sel_depth);
        }
    }

    /// Polled every 1024 node visits. Returns true when the budget ran out;
    /// also emits the once-per-second progress frame.
    pub(crate) fn timeout(&mut self) -> bool {
        self.timeout_counter = (self.timeout_counter + 1) & 1023;
        if self.timeout_counter != 0 {
            return false;
        }
        if self.search_flags & SF_NO_TIMEOUT != 0 {
            // Helper threads never time out, they only publish counters.
            self.flush_worker_counters();
            return false;
        }

        let elapsed = self.elapsed_ms();
        if !self.mode.ponder || self.ponder_hit.load(Ordering::Relaxed) {
            if self.mode.max_time_ms != 0 && elapsed >= self.mode.max_time_ms {
                return true;
            }
            if self.mode.max_nodes != 0 && self.nodes >= self.mode.max_nodes {
                return true;
            }
        }
        if self.stop_request.load(Ordering::Relaxed) && self.can_stop {
            return true;
        }

        if self.report_time.elapsed().as_millis() >= 1000 {
            self.report_time = Instant::now();
            self.last_curmove_emit = true;
            let nodes = self.smp_nodes();
            let mut info = SearchInfo {
                nodes: Some(nodes),
                nps: Some(if elapsed > 0 { nodes * 1000 / elapsed } else { 0 }),
                time_ms: Some(elapsed),
                hash_full: Some(self.tt.hash_full(self.age)),
                ..SearchInfo::default()
            };
            let tb_hits = self.smp_tb_hits();
            if tb_hits > 0 {
                info.tb_hits = Some(tb_hits);
            }
            self.send_info(&info);
        }
        false
    }

    /// Has the search been running long enough to chat about current moves?
    pub(crate) fn reporting_curmove(&self) -> bool {
        self.last_curmove_emit
    }

    pub(crate) fn send_info(&self, info: &SearchInfo) {
        if let Some(cb) = &self.callback {
            cb(info);
        }
    }

    /// Draw detection inside the search path: one repetition between
    /// irreversibility barriers, the fifty-move rule or bare material.
    #[inline]
    pub(crate) fn is_draw(&self) -> bool {
        self.rep.is_repetition(self.board.sig())
            || self.board.is_draw() != crate::board::DrawKind::NotDraw
    }

    /// Per-iteration reset: flags, counters, age bump, hash-full cache.
    pub(crate) fn init_iteration(&mut self) {
        self.iter_best = MOVE_NONE;
        self.iter_ponder = MOVE_NONE;
        self.can_stop = false;
        self.aborting.store(false, Ordering::Relaxed);
        self.stop_request.store(false, Ordering::Relaxed);
        self.ponder_hit.store(false, Ordering::Relaxed);
        self.timeout_counter = 1023;
        self.nodes = 0;
        self.tb_hits = 0;
        self.sel_depth = 0;
        self.start_time = Instant::now();
        self.report_time = self.start_time;
        self.last_curmove_emit = false;
        self.age = self.age.wrapping_add(1);
        self.tt.clear_hash_full();
    }

    pub(crate) fn effective_contempt(&self) -> Score {
        if self.mode.analyzing() {
            SC_DRAW
        } else {
            match self.board.turn() {
                crate::board::Color::White => self.contempt_factor,
                crate::board::Color::Black => -self.contempt_factor,
            }
        }
    }

    pub(crate) fn elo_limit_sleep(&mut self, iter_start_ms: u64) {
        let Some(below) = self.elo_slowdown else {
            return;
        };
        // Every 100 Elo below full strength doubles the think time.
        let spent = self.elapsed_ms().saturating_sub(iter_start_ms).max(1);
        let factor = f64::powf(2.0, f64::from(below) / 100.0);
        let mut delay = (spent as f64 * factor) as i64 - spent as i64;
        while delay > 0 && !self.aborting.load(Ordering::Relaxed) {
            std::thread::sleep(std::time::Duration::from_millis(1));
            self.timeout_counter = 1023;
            if self.timeout() {
                self.aborting.store(true, Ordering::Relaxed);
                break;
            }
            delay -= 1;
        }
    }
}

impl Drop for Search {
    fn drop(&mut self) {
        self.shutdown_workers();
    }
}

/// Result of a one-shot [`run_search`].
#[derive(Clone, Copy, Debug)]
pub struct SearchResult {
    pub score: Score,
    pub best_move: Move,
    pub ponder_move: Move,
}

/// One-shot entry point: search `board` under `mode`, reporting progress and
/// the final best move through `callback`. Sugar over building a [`Search`];
/// long-lived frontends should keep their own `Search` to retain the
/// transposition table, history and worker threads across moves.
pub fn run_search(
    board: &Board,
    mode: &SearchMode,
    tt: Arc<TransTable>,
    tb: Arc<Tablebases>,
    callback: SearchCallback,
) -> SearchResult {
    let mut search = Search::new(tt, tb);
    search.set_callback(callback);
    let score = search.iterate(board, mode);
    SearchResult {
        score,
        best_move: search.best_move(),
        ponder_move: search.ponder_move(),
    }
}
